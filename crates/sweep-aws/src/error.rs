//! AWS error classification
//!
//! This is the only place that inspects AWS error codes and messages. Every
//! adapter maps SDK failures through [`classify_sdk_error`] and hands the
//! engine a [`RemovalError`] with a provider-neutral classification.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use sweep_core::{Classification, Precondition, RemovalError};
use thiserror::Error;

/// AWS error categories for removal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AwsError {
    /// Resource was not found (already removed)
    #[error("Resource not found: {message}")]
    NotFound { code: String, message: String },

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded: {message}")]
    Throttled { code: String, message: String },

    /// Resource has dependent objects or is still in use (retryable)
    #[error("Resource has dependent objects: {message}")]
    DependencyViolation { code: String, message: String },

    /// Server-side or state-transition failure expected to clear up (retryable)
    #[error("Transient AWS failure: {message}")]
    Transient { code: String, message: String },

    /// The request never got a response (timeout, connection failure)
    #[error("Transport failure: {message}")]
    Transport { message: String },

    /// Deletion or termination protection is on
    #[error("Deletion protection enabled: {message}")]
    DeletionProtection { code: String, message: String },

    /// Caller is not allowed to do this (never retried)
    #[error("Access denied: {message}")]
    AccessDenied { code: String, message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AwsError::Throttled { .. }
                | AwsError::DependencyViolation { .. }
                | AwsError::Transient { .. }
                | AwsError::Transport { .. }
        )
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::NotFound { code, .. }
            | AwsError::Throttled { code, .. }
            | AwsError::DependencyViolation { code, .. }
            | AwsError::Transient { code, .. }
            | AwsError::DeletionProtection { code, .. }
            | AwsError::AccessDenied { code, .. } => Some(code),
            AwsError::Transport { .. } => None,
            AwsError::Sdk { code, .. } => code.as_deref(),
        }
    }

    /// Engine classification for this error
    pub fn classification(&self) -> Classification {
        match self {
            AwsError::NotFound { .. } => Classification::NotFound,
            AwsError::DeletionProtection { .. } => {
                Classification::RequiresPrecondition(Precondition::DisableDeletionProtection)
            }
            e if e.is_retryable() => Classification::Retryable,
            _ => Classification::Terminal,
        }
    }
}

impl From<AwsError> for RemovalError {
    fn from(e: AwsError) -> Self {
        let err = RemovalError::new(e.classification(), e.to_string());
        match e.code() {
            Some(code) => err.with_code(code),
            None => err,
        }
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidInstanceID.NotFound",
    "InvalidGroup.NotFound",
    "InvalidGroupId.NotFound",
    "InvalidPermission.NotFound",
    "NoSuchBucket",
    "NoSuchEntity",
    "ResourceNotFoundException",
    "DBClusterParameterGroupNotFound",
    "DBParameterGroupNotFound",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "SlowDown",
];

/// Known AWS error codes for dependency violations (resource still in use)
const DEPENDENCY_CODES: &[&str] = &[
    "DependencyViolation",
    "DeleteConflict",
    "InvalidGroup.InUse",
    "BucketNotEmpty",
    "InvalidDBParameterGroupState",
    "ResourceInUseException",
];

/// Known AWS error codes for transient server-side failures
const TRANSIENT_CODES: &[&str] = &[
    "InternalError",
    "InternalFailure",
    "InternalServerError",
    "ServiceUnavailable",
    "RequestTimeout",
    "IncorrectInstanceState",
    "OperationAborted",
];

/// Known AWS error codes for authorization failures
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "AuthFailure",
    "ExpiredToken",
    "UnrecognizedClientException",
];

/// Message fragments that identify deletion/termination protection
const DELETION_PROTECTION_MESSAGES: &[&str] = &[
    "deletion protection is activated",
    "disableApiTermination",
];

/// Classify an AWS error from its code and message.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();
    let owned = |c: &str| c.to_string();

    if DELETION_PROTECTION_MESSAGES
        .iter()
        .any(|fragment| message.contains(fragment))
    {
        return AwsError::DeletionProtection {
            code: code.map(owned).unwrap_or_default(),
            message,
        };
    }

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            code: owned(c),
            message,
        },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled {
            code: owned(c),
            message,
        },
        Some(c) if DEPENDENCY_CODES.contains(&c) => AwsError::DependencyViolation {
            code: owned(c),
            message,
        },
        Some(c) if TRANSIENT_CODES.contains(&c) => AwsError::Transient {
            code: owned(c),
            message,
        },
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied {
            code: owned(c),
            message,
        },
        _ => AwsError::Sdk {
            code: code.map(owned),
            message,
        },
    }
}

/// Classify any AWS SDK operation error.
///
/// Requests that never produced a response (timeouts, dispatch failures)
/// are transport failures and retryable; everything else is classified by
/// its service error code.
pub fn classify_sdk_error<E, R>(error: &SdkError<E, R>) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match error {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => AwsError::Transport {
            message: DisplayErrorContext(error).to_string(),
        },
        _ => {
            let message = error
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(error).to_string());
            classify_aws_error(error.code(), Some(&message))
        }
    }
}

/// Map an SDK error straight to a [`RemovalError`]
pub fn removal_error<E, R>(error: SdkError<E, R>) -> RemovalError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    classify_sdk_error(&error).into()
}
