//! Selection criteria for module types.
//!
//! A [`Criteria`] is either an opaque query over (resolver, type) or a set of
//! structural filters. Each criteria carries the tags attached to every
//! module it matches.

pub mod builder;
pub mod finder;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::binary::{ModuleType, TypeRef};
use crate::resolver::TypeResolver;

pub use builder::CriteriaBuilder;
pub use finder::TypeFinder;

/// Custom match function. Authoritative when present.
pub type TypeQuery = Arc<dyn Fn(&dyn TypeResolver, &ModuleType) -> bool + Send + Sync>;

/// Filters and tags for selecting module types.
///
/// Every filter left as `None` is ignored; a criteria without any filters
/// matches every type.
#[derive(Clone, Default)]
pub struct Criteria {
    pub query: Option<TypeQuery>,
    pub is_abstract: Option<bool>,
    pub is_interface: Option<bool>,
    /// Glob over the full name, or an exact short/full name.
    pub name: Option<String>,
    pub inherits: Option<TypeRef>,
    pub implements: Option<TypeRef>,
    pub assignable_to: Option<TypeRef>,
    pub has_attribute: Option<String>,
    pub tags: Vec<String>,
}

impl Criteria {
    /// Catch-all criteria without tags.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn builder() -> CriteriaBuilder {
        CriteriaBuilder::new()
    }

    pub fn from_query<F>(query: F) -> Self
    where
        F: Fn(&dyn TypeResolver, &ModuleType) -> bool + Send + Sync + 'static,
    {
        Self {
            query: Some(Arc::new(query)),
            ..Self::default()
        }
    }

    /// Criteria from a plain predicate over the type.
    pub fn from_predicate<F>(predicate: F) -> Self
    where
        F: Fn(&ModuleType) -> bool + Send + Sync + 'static,
    {
        Self::from_query(move |_: &dyn TypeResolver, ty: &ModuleType| predicate(ty))
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tags.into_iter().fold(self, |criteria, tag| criteria.with_tag(tag))
    }

    /// Replace the tags with `[tag]`.
    pub fn tagged(tag: impl Into<String>, mut criteria: Criteria) -> Self {
        criteria.tags = vec![tag.into()];
        criteria
    }

    /// Whether any filter (or a query) is set.
    pub fn has_filters(&self) -> bool {
        self.query.is_some()
            || self.is_abstract.is_some()
            || self.is_interface.is_some()
            || self.name.is_some()
            || self.inherits.is_some()
            || self.implements.is_some()
            || self.assignable_to.is_some()
            || self.has_attribute.is_some()
    }
}

impl fmt::Debug for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Criteria")
            .field("query", &self.query.as_ref().map(|_| "<fn>"))
            .field("is_abstract", &self.is_abstract)
            .field("is_interface", &self.is_interface)
            .field("name", &self.name)
            .field("inherits", &self.inherits)
            .field("implements", &self.implements)
            .field("assignable_to", &self.assignable_to)
            .field("has_attribute", &self.has_attribute)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Ordered criteria list carried by catalog options.
#[derive(Debug, Clone, Default)]
pub struct FinderOptions {
    pub criteria: Vec<Criteria>,
}

impl FinderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criteria(mut self, criteria: impl Into<Criteria>) -> Self {
        self.criteria.push(criteria.into());
        self
    }

    /// Add named criteria; each gets its name as its only tag.
    pub fn with_tagged_criteria(mut self, tagged: HashMap<String, Criteria>) -> Self {
        let mut tagged: Vec<_> = tagged.into_iter().collect();
        tagged.sort_by(|a, b| a.0.cmp(&b.0));
        self.criteria
            .extend(tagged.into_iter().map(|(tag, criteria)| Criteria::tagged(tag, criteria)));
        self
    }

    pub fn with_filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&ModuleType) -> bool + Send + Sync + 'static,
    {
        self.with_criteria(Criteria::from_predicate(predicate))
    }

    pub fn with_tagged_filter<F>(self, tag: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&ModuleType) -> bool + Send + Sync + 'static,
    {
        self.with_criteria(Criteria::from_predicate(predicate).with_tag(tag))
    }

    /// Add criteria built from a fresh [`CriteriaBuilder`].
    pub fn configure<F>(self, configure: F) -> Self
    where
        F: FnOnce(CriteriaBuilder) -> CriteriaBuilder,
    {
        self.with_criteria(configure(CriteriaBuilder::new()).build())
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_deduplicated_in_order() {
        let criteria = Criteria::any().with_tags(["b", "a", "b"]).with_tag("a");
        assert_eq!(criteria.tags, vec!["b", "a"]);
        assert!(!criteria.has_filters());
    }

    #[test]
    fn test_tagged_criteria_replace_tags() {
        let mut map = HashMap::new();
        map.insert("operators".to_string(), Criteria::any().with_tag("ignored"));
        let options = FinderOptions::new().with_tagged_criteria(map);
        assert_eq!(options.criteria[0].tags, vec!["operators"]);
    }

    #[test]
    fn test_configure_uses_builder_defaults() {
        let options = FinderOptions::new().configure(|b| b.has_name("*Operator").tag("ops"));
        let criteria = &options.criteria[0];
        assert_eq!(criteria.is_abstract, Some(false));
        assert_eq!(criteria.is_interface, Some(false));
        assert_eq!(criteria.name.as_deref(), Some("*Operator"));
        assert_eq!(criteria.tags, vec!["ops"]);
    }

    #[test]
    fn test_plain_filters_are_untagged() {
        let options = FinderOptions::new()
            .with_filter(|ty| ty.name().ends_with("Operator"))
            .with_tagged_filter("ops", |_| true);
        assert!(options.criteria[0].query.is_some());
        assert!(options.criteria[0].tags.is_empty());
        assert_eq!(options.criteria[1].tags, vec!["ops"]);
    }
}
