//! Evaluating criteria against types.

use std::sync::Arc;

use regex::RegexBuilder;

use crate::binary::{Binary, ModuleType, TypeRef};
use crate::error::{ModuleError, Result};
use crate::resolver::{is_assignable_to, TypeResolver};

use super::Criteria;

/// Matches types against [`Criteria`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeFinder;

impl TypeFinder {
    pub fn new() -> Self {
        Self
    }

    /// Publicly exported types of `binary` matching `criteria`.
    pub fn find(
        &self,
        criteria: Option<&Criteria>,
        binary: &Arc<Binary>,
        resolver: &dyn TypeResolver,
    ) -> Result<Vec<ModuleType>> {
        let criteria = criteria
            .ok_or_else(|| ModuleError::InvalidArgument("criteria is required".to_string()))?;

        Ok(binary
            .exported_types()
            .into_iter()
            .filter(|ty| self.is_match(criteria, ty, resolver))
            .collect())
    }

    /// Whether `ty` satisfies `criteria`.
    ///
    /// A query decides alone; otherwise every set filter must hold.
    pub fn is_match(&self, criteria: &Criteria, ty: &ModuleType, resolver: &dyn TypeResolver) -> bool {
        if let Some(query) = &criteria.query {
            return query(resolver, ty);
        }

        let descriptor = ty.descriptor();

        if let Some(is_abstract) = criteria.is_abstract {
            if descriptor.is_abstract != is_abstract {
                return false;
            }
        }

        if let Some(is_interface) = criteria.is_interface {
            if descriptor.is_interface != is_interface {
                return false;
            }
        }

        if let Some(name) = &criteria.name {
            if !name_matches(name, ty) {
                return false;
            }
        }

        let targets = [&criteria.inherits, &criteria.implements, &criteria.assignable_to];
        for target in targets.into_iter().flatten() {
            if !assignable(ty, target, resolver) {
                return false;
            }
        }

        if let Some(attribute) = &criteria.has_attribute {
            if !descriptor.has_attribute(attribute) {
                return false;
            }
        }

        true
    }
}

/// Glob match over the full name, or exact (case-insensitive) short or full
/// name.
pub fn name_matches(pattern: &str, ty: &ModuleType) -> bool {
    let full_name = ty.full_name();

    if glob_regex(pattern)
        .map(|regex| regex.is_match(&full_name))
        .unwrap_or(false)
    {
        return true;
    }

    pattern.eq_ignore_ascii_case(ty.name()) || pattern.eq_ignore_ascii_case(&full_name)
}

fn glob_regex(pattern: &str) -> Option<regex::Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\?", ".")
        .replace(r"\*", ".*");
    RegexBuilder::new(&format!("^{}$", escaped))
        .case_insensitive(true)
        .build()
        .ok()
}

/// `ty` is `target` itself, or reaches it through base types or interfaces.
fn assignable(ty: &ModuleType, target: &TypeRef, resolver: &dyn TypeResolver) -> bool {
    match resolver.find_type(target) {
        Some(target) => is_assignable_to(ty, &target, resolver),
        None => {
            tracing::debug!(target = %target, "Criteria target type not resolved");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{BinaryImage, TypeDescriptor};
    use crate::criteria::CriteriaBuilder;
    use crate::resolver::BinaryScope;

    fn fixture() -> (Arc<Binary>, BinaryScope) {
        let binary = Arc::new(Binary::from_image(
            BinaryImage::builder("Ops")
                .with_type(TypeDescriptor::new("ops", "IOperator").interface())
                .with_type(
                    TypeDescriptor::new("ops", "OperatorBase")
                        .abstract_type()
                        .with_interface(TypeRef::new("Ops", "ops::IOperator")),
                )
                .with_type(
                    TypeDescriptor::new("ops::math", "SumOperator")
                        .with_base(TypeRef::new("Ops", "ops::OperatorBase"))
                        .with_attribute("ops::Module"),
                )
                .with_type(TypeDescriptor::new("ops", "Helper"))
                .with_type(TypeDescriptor::new("ops", "HiddenOperator").private())
                .build(),
            None,
            None,
        ));
        let scope = BinaryScope::new(Arc::clone(&binary), None);
        (binary, scope)
    }

    fn names(types: &[ModuleType]) -> Vec<String> {
        types.iter().map(ModuleType::full_name).collect()
    }

    #[test]
    fn test_absent_criteria_is_an_error() {
        let (binary, scope) = fixture();
        assert!(matches!(
            TypeFinder::new().find(None, &binary, &scope),
            Err(ModuleError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_catch_all_matches_every_exported_type() {
        let (binary, scope) = fixture();
        let found = TypeFinder::new().find(Some(&Criteria::any()), &binary, &scope).unwrap();
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_name_glob_and_exact_paths() {
        let (binary, scope) = fixture();
        let finder = TypeFinder::new();

        let glob = Criteria { name: Some("*OPERATOR*".into()), ..Criteria::any() };
        assert_eq!(
            names(&finder.find(Some(&glob), &binary, &scope).unwrap()),
            vec!["ops::IOperator", "ops::OperatorBase", "ops::math::SumOperator"]
        );

        let single_char = Criteria { name: Some("ops::?elper".into()), ..Criteria::any() };
        assert_eq!(names(&finder.find(Some(&single_char), &binary, &scope).unwrap()), vec!["ops::Helper"]);

        let short = Criteria { name: Some("sumoperator".into()), ..Criteria::any() };
        assert_eq!(
            names(&finder.find(Some(&short), &binary, &scope).unwrap()),
            vec!["ops::math::SumOperator"]
        );
    }

    #[test]
    fn test_structural_filters() {
        let (binary, scope) = fixture();
        let finder = TypeFinder::new();

        let implementors = CriteriaBuilder::new()
            .implements(TypeRef::new("Ops", "ops::IOperator"))
            .build();
        assert_eq!(
            names(&finder.find(Some(&implementors), &binary, &scope).unwrap()),
            vec!["ops::math::SumOperator"]
        );

        let derived = CriteriaBuilder::new()
            .is_abstract(None)
            .inherits(TypeRef::new("Ops", "ops::OperatorBase"))
            .build();
        assert_eq!(
            names(&finder.find(Some(&derived), &binary, &scope).unwrap()),
            vec!["ops::OperatorBase", "ops::math::SumOperator"]
        );

        let assignable = CriteriaBuilder::new()
            .is_abstract(None)
            .is_interface(None)
            .assignable_to(TypeRef::new("Ops", "ops::IOperator"))
            .build();
        assert_eq!(finder.find(Some(&assignable), &binary, &scope).unwrap().len(), 3);

        let attributed = CriteriaBuilder::new().has_attribute("OPS::MODULE").build();
        assert_eq!(
            names(&finder.find(Some(&attributed), &binary, &scope).unwrap()),
            vec!["ops::math::SumOperator"]
        );

        let unresolved = CriteriaBuilder::new()
            .implements(TypeRef::new("Missing", "missing::IThing"))
            .build();
        assert!(finder.find(Some(&unresolved), &binary, &scope).unwrap().is_empty());
    }

    #[test]
    fn test_type_filters_include_the_target_itself() {
        let binary = Arc::new(Binary::from_image(
            BinaryImage::builder("Ops")
                .with_type(TypeDescriptor::new("ops", "IOperator").interface())
                .with_type(TypeDescriptor::new("ops", "Op").with_interface(TypeRef::new("Ops", "ops::IOperator")))
                .with_type(TypeDescriptor::new("ops", "Helper"))
                .build(),
            None,
            None,
        ));
        let scope = BinaryScope::new(Arc::clone(&binary), None);
        let finder = TypeFinder::new();
        let find = |builder: CriteriaBuilder| {
            let criteria = builder.is_interface(None).build();
            names(&finder.find(Some(&criteria), &binary, &scope).unwrap())
        };
        let operator = || TypeRef::new("Ops", "ops::IOperator");

        assert_eq!(find(CriteriaBuilder::new().inherits(TypeRef::new("Ops", "ops::Helper"))), vec!["ops::Helper"]);
        assert_eq!(find(CriteriaBuilder::new().inherits(operator())), vec!["ops::IOperator", "ops::Op"]);
        assert_eq!(find(CriteriaBuilder::new().implements(operator())), vec!["ops::IOperator", "ops::Op"]);
        assert_eq!(find(CriteriaBuilder::new().assignable_to(operator())), vec!["ops::IOperator", "ops::Op"]);
    }

    #[test]
    fn test_query_is_authoritative() {
        let (binary, scope) = fixture();
        let mut criteria = Criteria::from_predicate(|ty| ty.descriptor().is_interface);
        criteria.is_interface = Some(false);
        assert_eq!(
            names(&TypeFinder::new().find(Some(&criteria), &binary, &scope).unwrap()),
            vec!["ops::IOperator"]
        );
    }
}
