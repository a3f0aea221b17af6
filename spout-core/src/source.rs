//! Subscription predicates: which containers a listener wants records from.

use crate::models::{short_id, Container};

/// Exactly one matching rule per subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Source {
    /// Container whose 12-character short id equals the value.
    Id(String),
    /// Container whose name equals the value.
    Name(String),
    /// Containers whose name contains the value.
    Filter(String),
    #[default]
    All,
}

impl Source {
    /// Builds a predicate from optional request parameters.
    ///
    /// Empty values are ignored; precedence is id, name, filter, then all.
    pub fn from_parts(id: Option<&str>, name: Option<&str>, filter: Option<&str>) -> Self {
        let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);
        if let Some(id) = non_empty(id) {
            Source::Id(short_id(&id).to_string())
        } else if let Some(name) = non_empty(name) {
            Source::Name(name)
        } else if let Some(filter) = non_empty(filter) {
            Source::Filter(filter)
        } else {
            Source::All
        }
    }

    /// Parses a `predicate:value` path selector such as `id:0123456789ab`.
    ///
    /// An unknown predicate or an empty value selects every container.
    pub fn parse_selector(selector: &str) -> Self {
        match selector.split_once(':') {
            Some(("id", value)) => Self::from_parts(Some(value), None, None),
            Some(("name", value)) => Self::from_parts(None, Some(value), None),
            Some(("filter", value)) => Self::from_parts(None, None, Some(value)),
            _ => Source::All,
        }
    }

    pub fn matches(&self, container: &Container) -> bool {
        match self {
            Source::Id(id) => container.short_id() == id,
            Source::Name(name) => container.name == *name,
            Source::Filter(filter) => container.name.contains(filter.as_str()),
            Source::All => true,
        }
    }

    /// True when the predicate can select more than one container.
    pub fn is_multi(&self) -> bool {
        matches!(self, Source::All | Source::Filter(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web() -> Container {
        Container::new("0123456789abcdef0123", "web_v1.web.1")
    }

    #[test]
    fn id_matches_short_id_only() {
        assert!(Source::Id("0123456789ab".into()).matches(&web()));
        assert!(!Source::Id("0123456789".into()).matches(&web()));
        assert!(!Source::Id("ffffffffffff".into()).matches(&web()));
    }

    #[test]
    fn name_is_exact() {
        assert!(Source::Name("web_v1.web.1".into()).matches(&web()));
        assert!(!Source::Name("web".into()).matches(&web()));
    }

    #[test]
    fn filter_is_substring() {
        assert!(Source::Filter("web".into()).matches(&web()));
        assert!(!Source::Filter("worker".into()).matches(&web()));
    }

    #[test]
    fn all_matches_everything() {
        assert!(Source::All.matches(&web()));
        assert!(Source::All.is_multi());
        assert!(Source::Filter("x".into()).is_multi());
        assert!(!Source::Name("x".into()).is_multi());
        assert!(!Source::Id("x".into()).is_multi());
    }

    #[test]
    fn precedence_and_empty_values() {
        assert_eq!(
            Source::from_parts(Some("0123456789abcdef"), Some("web"), Some("w")),
            Source::Id("0123456789ab".into())
        );
        assert_eq!(
            Source::from_parts(Some(""), Some("web"), Some("w")),
            Source::Name("web".into())
        );
        assert_eq!(
            Source::from_parts(None, Some(""), Some("w")),
            Source::Filter("w".into())
        );
        assert_eq!(Source::from_parts(None, None, Some("")), Source::All);
    }

    #[test]
    fn selectors() {
        assert_eq!(
            Source::parse_selector("name:web_v1.web.1"),
            Source::Name("web_v1.web.1".into())
        );
        assert_eq!(
            Source::parse_selector("filter:web"),
            Source::Filter("web".into())
        );
        assert_eq!(
            Source::parse_selector("id:0123456789abcdef"),
            Source::Id("0123456789ab".into())
        );
        assert_eq!(Source::parse_selector("bogus:x"), Source::All);
        assert_eq!(Source::parse_selector("name:"), Source::All);
    }
}
