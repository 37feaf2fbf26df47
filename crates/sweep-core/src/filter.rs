//! Filter engine
//!
//! Decides, per discovered resource, whether it is a removal candidate.
//! Evaluation order is: the resource's built-in safety filter, then exclude
//! rules, then include rules. Rules are compiled once from configuration so
//! a bad pattern fails before anything is evaluated.

use crate::config::{FiltersConfig, RuleConfig};
use crate::error::ConfigError;
use crate::properties::Properties;
use crate::resource::Resource;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// How a rule compares a value
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Prefix(String),
    Contains(String),
    Glob(glob::Pattern),
    Regex(Regex),
}

impl Matcher {
    /// Build a matcher from its config name and value
    pub fn compile(kind: &str, value: &str) -> Result<Self, ConfigError> {
        if value.is_empty() {
            return Err(ConfigError::EmptyFilterValue);
        }
        let matcher = match kind {
            "exact" => Matcher::Exact(value.to_string()),
            "prefix" => Matcher::Prefix(value.to_string()),
            "contains" => Matcher::Contains(value.to_string()),
            "glob" => Matcher::Glob(glob::Pattern::new(value).map_err(|source| {
                ConfigError::InvalidGlob {
                    pattern: value.to_string(),
                    source,
                }
            })?),
            "regex" => Matcher::Regex(Regex::new(value).map_err(|source| {
                ConfigError::InvalidRegex {
                    pattern: value.to_string(),
                    source,
                }
            })?),
            other => return Err(ConfigError::UnknownFilterType(other.to_string())),
        };
        Ok(matcher)
    }

    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Matcher::Exact(expected) => value == expected,
            Matcher::Prefix(prefix) => value.starts_with(prefix.as_str()),
            Matcher::Contains(needle) => value.contains(needle.as_str()),
            Matcher::Glob(pattern) => pattern.matches(value),
            Matcher::Regex(re) => re.is_match(value),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact(v) => write!(f, "exact \"{v}\""),
            Matcher::Prefix(v) => write!(f, "prefix \"{v}\""),
            Matcher::Contains(v) => write!(f, "contains \"{v}\""),
            Matcher::Glob(p) => write!(f, "glob \"{}\"", p.as_str()),
            Matcher::Regex(re) => write!(f, "regex \"{}\"", re.as_str()),
        }
    }
}

/// A compiled include or exclude rule
#[derive(Debug, Clone)]
pub struct FilterRule {
    /// Only applies to this resource type when set
    pub resource_type: Option<String>,
    /// Property to match; the resource identity when unset
    pub property: Option<String>,
    pub matcher: Matcher,
    /// Negate the match result
    pub invert: bool,
}

impl FilterRule {
    pub fn compile(config: &RuleConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            resource_type: config.resource_type.clone(),
            property: config.property.clone(),
            matcher: Matcher::compile(&config.match_type, &config.value)?,
            invert: config.invert,
        })
    }

    pub fn applies_to(&self, kind: &str) -> bool {
        self.resource_type.as_deref().is_none_or(|t| t == kind)
    }

    /// Match against a resource's identity and properties.
    ///
    /// A property the resource does not report matches as the empty string.
    pub fn matches(&self, identity: &str, properties: &Properties) -> bool {
        let value = match &self.property {
            Some(key) => properties.get(key).unwrap_or(""),
            None => identity,
        };
        self.matcher.is_match(value) != self.invert
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(kind) = &self.resource_type {
            write!(f, "{kind} ")?;
        }
        write!(f, "{} ", self.property.as_deref().unwrap_or("identity"))?;
        if self.invert {
            f.write_str("not ")?;
        }
        write!(f, "{}", self.matcher)
    }
}

/// Why a resource was not made a removal candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", content = "detail", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The resource's own safety filter objected
    Builtin(String),
    /// An exclude rule matched
    ExcludeRule(String),
    /// Include rules apply to this type and none matched
    NoIncludeMatch,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::Builtin(reason) => write!(f, "{reason}"),
            ExclusionReason::ExcludeRule(rule) => write!(f, "excluded by rule: {rule}"),
            ExclusionReason::NoIncludeMatch => f.write_str("no include rule matched"),
        }
    }
}

/// Result of evaluating one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Included,
    Excluded(ExclusionReason),
}

impl Disposition {
    pub fn is_included(&self) -> bool {
        matches!(self, Disposition::Included)
    }
}

/// Compiled include/exclude rule set
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    include: Vec<FilterRule>,
    exclude: Vec<FilterRule>,
}

impl FilterEngine {
    pub fn new(include: Vec<FilterRule>, exclude: Vec<FilterRule>) -> Self {
        Self { include, exclude }
    }

    /// Compile every rule, failing on the first malformed one
    pub fn compile(config: &FiltersConfig) -> Result<Self, ConfigError> {
        let include = config
            .include
            .iter()
            .map(FilterRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let exclude = config
            .exclude
            .iter()
            .map(FilterRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(include, exclude))
    }

    pub fn rule_count(&self) -> usize {
        self.include.len() + self.exclude.len()
    }

    /// Classify a resource of the given type
    pub fn evaluate(&self, kind: &str, resource: &dyn Resource) -> Disposition {
        if let Some(reason) = resource.filter() {
            return Disposition::Excluded(ExclusionReason::Builtin(reason));
        }

        let identity = resource.identify();
        let properties = resource.properties();
        self.evaluate_parts(kind, &identity, &properties)
    }

    /// Rule evaluation over already-extracted identity and properties
    pub fn evaluate_parts(&self, kind: &str, identity: &str, properties: &Properties) -> Disposition {
        if let Some(rule) = self
            .exclude
            .iter()
            .filter(|r| r.applies_to(kind))
            .find(|r| r.matches(identity, properties))
        {
            return Disposition::Excluded(ExclusionReason::ExcludeRule(rule.to_string()));
        }

        // Once any include rule exists, only resources one of them matches
        // are kept. A rule scoped to another type never matches.
        if self.include.is_empty() {
            return Disposition::Included;
        }
        if self
            .include
            .iter()
            .any(|r| r.applies_to(kind) && r.matches(identity, properties))
        {
            Disposition::Included
        } else {
            Disposition::Excluded(ExclusionReason::NoIncludeMatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::RemovalError;
    use async_trait::async_trait;

    struct Fixture {
        id: String,
        props: Properties,
        builtin: Option<String>,
    }

    #[async_trait]
    impl Resource for Fixture {
        fn identify(&self) -> String {
            self.id.clone()
        }

        fn filter(&self) -> Option<String> {
            self.builtin.clone()
        }

        async fn remove(&self) -> Result<(), RemovalError> {
            Ok(())
        }

        fn properties(&self) -> Properties {
            self.props.clone()
        }
    }

    fn fixture(id: &str, props: Properties) -> Fixture {
        Fixture {
            id: id.to_string(),
            props,
            builtin: None,
        }
    }

    fn rule(resource_type: Option<&str>, property: Option<&str>, kind: &str, value: &str) -> RuleConfig {
        RuleConfig {
            resource_type: resource_type.map(str::to_string),
            property: property.map(str::to_string),
            match_type: kind.to_string(),
            value: value.to_string(),
            invert: false,
        }
    }

    fn engine(include: Vec<RuleConfig>, exclude: Vec<RuleConfig>) -> FilterEngine {
        FilterEngine::compile(&FiltersConfig { include, exclude }).unwrap()
    }

    #[test]
    fn test_no_rules_includes_everything() {
        let e = FilterEngine::default();
        let r = fixture("bucket-1", Properties::new());
        assert_eq!(e.evaluate("S3Bucket", &r), Disposition::Included);
    }

    #[test]
    fn test_builtin_filter_wins() {
        let e = engine(vec![rule(None, None, "prefix", "default")], vec![]);
        let r = Fixture {
            id: "default.aurora5.6".to_string(),
            props: Properties::new(),
            builtin: Some("cannot delete default parameter group".to_string()),
        };
        assert_eq!(
            e.evaluate("RdsDbClusterParameterGroup", &r),
            Disposition::Excluded(ExclusionReason::Builtin(
                "cannot delete default parameter group".to_string()
            ))
        );
    }

    #[test]
    fn test_exclude_rule_on_tag() {
        let e = engine(
            vec![],
            vec![rule(None, Some("tag:Environment"), "exact", "production")],
        );
        let prod = fixture("db", Properties::new().with_tag("Environment", "production"));
        let ci = fixture("db", Properties::new().with_tag("Environment", "ci"));

        assert!(!e.evaluate("S3Bucket", &prod).is_included());
        assert!(e.evaluate("S3Bucket", &ci).is_included());
    }

    #[test]
    fn test_exclude_beats_include() {
        let e = engine(
            vec![rule(None, None, "prefix", "ci-")],
            vec![rule(None, None, "contains", "keep")],
        );
        let r = fixture("ci-keep-me", Properties::new());
        assert!(matches!(
            e.evaluate("S3Bucket", &r),
            Disposition::Excluded(ExclusionReason::ExcludeRule(_))
        ));
    }

    #[test]
    fn test_include_rules_scoped_by_type() {
        let e = engine(vec![rule(Some("S3Bucket"), None, "prefix", "ci-")], vec![]);

        let matching = fixture("ci-artifacts", Properties::new());
        let other = fixture("release-artifacts", Properties::new());

        assert!(e.evaluate("S3Bucket", &matching).is_included());
        assert_eq!(
            e.evaluate("S3Bucket", &other),
            Disposition::Excluded(ExclusionReason::NoIncludeMatch)
        );
        // Include rules gate every type, so a type no rule targets is excluded
        assert_eq!(
            e.evaluate("IAMRole", &matching),
            Disposition::Excluded(ExclusionReason::NoIncludeMatch)
        );
    }

    #[test]
    fn test_invert() {
        let mut cfg = rule(None, Some("tag:Owner"), "exact", "ci");
        cfg.invert = true;
        let e = engine(vec![], vec![cfg]);

        let ci = fixture("a", Properties::new().with_tag("Owner", "ci"));
        let someone = fixture("b", Properties::new().with_tag("Owner", "alice"));
        let untagged = fixture("c", Properties::new());

        assert!(e.evaluate("Ec2Instance", &ci).is_included());
        assert!(!e.evaluate("Ec2Instance", &someone).is_included());
        assert!(!e.evaluate("Ec2Instance", &untagged).is_included());
    }

    #[test]
    fn test_glob_and_regex() {
        let e = engine(
            vec![],
            vec![
                rule(None, None, "glob", "prod-*"),
                rule(None, Some("Name"), "regex", r"^keep-\d+$"),
            ],
        );
        assert!(!e.evaluate("X", &fixture("prod-db", Properties::new())).is_included());
        assert!(
            !e.evaluate("X", &fixture("x", Properties::new().with("Name", "keep-42")))
                .is_included()
        );
        assert!(
            e.evaluate("X", &fixture("x", Properties::new().with("Name", "keep-me")))
                .is_included()
        );
    }

    #[test]
    fn test_compile_errors() {
        let bad_regex = FiltersConfig {
            include: vec![],
            exclude: vec![rule(None, None, "regex", "(unclosed")],
        };
        assert!(matches!(
            FilterEngine::compile(&bad_regex),
            Err(ConfigError::InvalidRegex { .. })
        ));

        let bad_glob = FiltersConfig {
            include: vec![rule(None, None, "glob", "[")],
            exclude: vec![],
        };
        assert!(matches!(
            FilterEngine::compile(&bad_glob),
            Err(ConfigError::InvalidGlob { .. })
        ));

        assert!(matches!(
            Matcher::compile("fuzzy", "x"),
            Err(ConfigError::UnknownFilterType(_))
        ));
        assert!(matches!(
            Matcher::compile("exact", ""),
            Err(ConfigError::EmptyFilterValue)
        ));
    }

    #[test]
    fn test_rule_display() {
        let mut cfg = rule(Some("S3Bucket"), Some("tag:Env"), "exact", "prod");
        cfg.invert = true;
        let r = FilterRule::compile(&cfg).unwrap();
        assert_eq!(r.to_string(), "S3Bucket tag:Env not exact \"prod\"");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn matcher_kind() -> impl Strategy<Value = &'static str> {
            prop_oneof![Just("exact"), Just("prefix"), Just("contains"), Just("glob")]
        }

        proptest! {
            #[test]
            fn evaluation_is_idempotent(
                identity in "[a-z0-9-]{0,12}",
                tag in "[a-z]{0,6}",
                include_value in "[a-z0-9*-]{1,6}",
                exclude_value in "[a-z0-9*-]{1,6}",
                include_kind in matcher_kind(),
                exclude_kind in matcher_kind(),
                invert in any::<bool>(),
            ) {
                let mut exclude = rule(None, Some("tag:Owner"), exclude_kind, &exclude_value);
                exclude.invert = invert;
                let e = engine(vec![rule(None, None, include_kind, &include_value)], vec![exclude]);
                let props = Properties::new().with_tag("Owner", tag);

                let first = e.evaluate_parts("S3Bucket", &identity, &props);
                let second = e.evaluate_parts("S3Bucket", &identity, &props);
                prop_assert_eq!(&first, &second);

                let cloned = e.clone();
                prop_assert_eq!(first, cloned.evaluate_parts("S3Bucket", &identity, &props));
            }
        }
    }
}
