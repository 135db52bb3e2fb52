//! Fluent construction of structural criteria.

use crate::binary::TypeRef;

use super::Criteria;

/// Builder for structural [`Criteria`].
///
/// Unless told otherwise the built criteria exclude abstract types and
/// interfaces.
#[derive(Debug, Clone)]
pub struct CriteriaBuilder {
    criteria: Criteria,
}

impl Default for CriteriaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CriteriaBuilder {
    pub fn new() -> Self {
        Self {
            criteria: Criteria {
                is_abstract: Some(false),
                is_interface: Some(false),
                ..Criteria::default()
            },
        }
    }

    /// Glob (`*`, `?`) over the full name, or an exact short or full name.
    pub fn has_name(mut self, name: impl Into<String>) -> Self {
        self.criteria.name = Some(name.into());
        self
    }

    pub fn implements(mut self, interface: TypeRef) -> Self {
        self.criteria.implements = Some(interface);
        self
    }

    pub fn inherits(mut self, base: TypeRef) -> Self {
        self.criteria.inherits = Some(base);
        self
    }

    /// `None` accepts both abstract and concrete types.
    pub fn is_abstract(mut self, is_abstract: Option<bool>) -> Self {
        self.criteria.is_abstract = is_abstract;
        self
    }

    /// `None` accepts both interfaces and non-interfaces.
    pub fn is_interface(mut self, is_interface: Option<bool>) -> Self {
        self.criteria.is_interface = is_interface;
        self
    }

    pub fn assignable_to(mut self, target: TypeRef) -> Self {
        self.criteria.assignable_to = Some(target);
        self
    }

    pub fn has_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.criteria.has_attribute = Some(attribute.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.criteria = self.criteria.with_tag(tag);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria = self.criteria.with_tags(tags);
        self
    }

    pub fn build(self) -> Criteria {
        self.criteria
    }
}

impl From<CriteriaBuilder> for Criteria {
    fn from(builder: CriteriaBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_excludes_abstract_types_and_interfaces() {
        let criteria = CriteriaBuilder::new().build();
        assert_eq!(criteria.is_abstract, Some(false));
        assert_eq!(criteria.is_interface, Some(false));

        let any = Criteria::any();
        assert_eq!(any.is_abstract, None);
        assert_eq!(any.is_interface, None);
        assert!(any.tags.is_empty());
    }

    #[test]
    fn test_builder_tags_are_unique_and_ordered() {
        let criteria = CriteriaBuilder::new()
            .tag("math")
            .tags(["ops", "math", "core"])
            .has_name("*Sum*")
            .is_interface(None)
            .build();
        assert_eq!(criteria.tags, vec!["math", "ops", "core"]);
        assert_eq!(criteria.name.as_deref(), Some("*Sum*"));
        assert_eq!(criteria.is_interface, None);
    }
}
