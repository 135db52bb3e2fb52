//! Type resolution across binaries.

use std::collections::HashSet;
use std::sync::Arc;

use crate::binary::{Binary, ModuleType, TypeRef};
use crate::host::HostEnvironment;

/// Resolves binaries and types by name on behalf of the criteria engine.
///
/// Implemented by the isolated [`LoadContext`](crate::context::LoadContext),
/// the metadata-only [`MetadataContext`](crate::context::MetadataContext) and
/// [`BinaryScope`].
pub trait TypeResolver: Send + Sync {
    /// Find a binary by name, loading it if the resolver's policy allows.
    fn find_binary(&self, name: &str) -> Option<Arc<Binary>>;

    /// Resolve a type reference to a concrete declaration.
    fn find_type(&self, type_ref: &TypeRef) -> Option<ModuleType> {
        let binary = self.find_binary(&type_ref.binary)?;
        let descriptor = binary.find_type(&type_ref.full_name)?;
        Some(ModuleType::new(binary, descriptor))
    }
}

/// Resolver over a single binary and its references, falling back to the
/// host.
pub struct BinaryScope {
    binary: Arc<Binary>,
    references: Vec<Arc<Binary>>,
    host: Option<Arc<HostEnvironment>>,
}

impl BinaryScope {
    pub fn new(binary: Arc<Binary>, host: Option<Arc<HostEnvironment>>) -> Self {
        Self {
            binary,
            references: Vec::new(),
            host,
        }
    }

    /// Binaries visible to this scope only; the host is left untouched.
    pub fn with_references(mut self, references: Vec<Arc<Binary>>) -> Self {
        self.references = references;
        self
    }
}

impl TypeResolver for BinaryScope {
    fn find_binary(&self, name: &str) -> Option<Arc<Binary>> {
        std::iter::once(&self.binary)
            .chain(self.references.iter())
            .find(|binary| binary.name().eq_ignore_ascii_case(name))
            .cloned()
            .or_else(|| self.host.as_ref().and_then(|host| host.try_load(name)))
    }
}

/// Whether `candidate` is `target` itself or derives from / implements it.
///
/// Base types and interfaces are followed transitively through `resolver`;
/// references that cannot be resolved end that branch of the walk.
pub fn is_assignable_to(candidate: &ModuleType, target: &ModuleType, resolver: &dyn TypeResolver) -> bool {
    let mut visited: HashSet<TypeRef> = HashSet::new();
    let mut pending = vec![candidate.clone()];

    while let Some(current) = pending.pop() {
        if current.is_same(target) {
            return true;
        }
        if !visited.insert(current.type_ref()) {
            continue;
        }

        let descriptor = current.descriptor();
        for parent in descriptor.base_types.iter().chain(descriptor.interfaces.iter()) {
            match resolver.find_type(parent) {
                Some(resolved) => pending.push(resolved),
                None => {
                    tracing::debug!(type_ref = %parent, "Unresolved base type while checking assignability");
                }
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{BinaryImage, TypeDescriptor};

    fn binary(image: BinaryImage) -> Arc<Binary> {
        Arc::new(Binary::from_image(image, None, None))
    }

    #[test]
    fn test_assignability_follows_chain_across_binaries() {
        let host = Arc::new(HostEnvironment::new("/nonexistent"));
        host.register(Binary::from_image(
            BinaryImage::builder("Contracts")
                .with_type(TypeDescriptor::new("contracts", "IOperator").interface())
                .build(),
            None,
            None,
        ));

        let plugin = binary(
            BinaryImage::builder("Ops")
                .with_type(
                    TypeDescriptor::new("ops", "OperatorBase")
                        .abstract_type()
                        .with_interface(TypeRef::new("Contracts", "contracts::IOperator")),
                )
                .with_type(
                    TypeDescriptor::new("ops", "Sum").with_base(TypeRef::new("Ops", "ops::OperatorBase")),
                )
                .build(),
        );
        let scope = BinaryScope::new(Arc::clone(&plugin), Some(host));

        let sum = scope.find_type(&TypeRef::new("Ops", "ops::Sum")).unwrap();
        let base = scope.find_type(&TypeRef::new("Ops", "ops::OperatorBase")).unwrap();
        let contract = scope
            .find_type(&TypeRef::new("Contracts", "contracts::IOperator"))
            .unwrap();

        assert!(is_assignable_to(&sum, &sum, &scope));
        assert!(is_assignable_to(&sum, &base, &scope));
        assert!(is_assignable_to(&sum, &contract, &scope));
        assert!(!is_assignable_to(&base, &sum, &scope));
    }

    #[test]
    fn test_cyclic_declarations_terminate() {
        let plugin = binary(
            BinaryImage::builder("Loop")
                .with_type(TypeDescriptor::new("l", "A").with_base(TypeRef::new("Loop", "l::B")))
                .with_type(TypeDescriptor::new("l", "B").with_base(TypeRef::new("Loop", "l::A")))
                .with_type(TypeDescriptor::new("l", "C"))
                .build(),
        );
        let scope = BinaryScope::new(plugin, None);
        let a = scope.find_type(&TypeRef::new("Loop", "l::A")).unwrap();
        let c = scope.find_type(&TypeRef::new("Loop", "l::C")).unwrap();
        assert!(!is_assignable_to(&a, &c, &scope));
    }
}
