//! Resolution of member references to definitions.
//!
//! References describe types, methods, and fields by name and scope; the
//! [`MemberResolver`] turns them into the definitions they denote. Assembly
//! lookup is injected through the [`AssemblyResolver`] trait so that hosts
//! control where modules come from, and failure behavior is uniform: depending
//! on the `throw_on_not_found` flag a miss is either an error naming the member
//! or `Ok(None)`.

use dashmap::DashMap;
use std::sync::Arc;

use crate::{
    metadata::typesystem::{
        AssemblyDescriptor, CilModuleRc, FieldDef, FieldDefRc, FieldRef, MethodDef, MethodDefRc,
        MethodRef, ResolutionScope, TypeDef, TypeDefRc, TypeRef, TypeReference,
    },
    Error::{InvalidArgument, MemberNotFound},
    Result,
};

/// Maps assembly identities to loaded modules.
///
/// Injected into the [`MemberResolver`]; implementations decide how assemblies
/// are located, loaded, and cached.
pub trait AssemblyResolver: Send + Sync {
    /// Returns the manifest module of the assembly, or `None` if it is not
    /// available.
    fn resolve(&self, assembly: &AssemblyDescriptor) -> Option<CilModuleRc>;
}

/// An [`AssemblyResolver`] over a fixed set of preloaded modules, keyed by
/// simple assembly name.
#[derive(Default)]
pub struct AssemblyMap {
    modules: DashMap<String, CilModuleRc>,
}

impl AssemblyMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        AssemblyMap {
            modules: DashMap::new(),
        }
    }

    /// Registers a module under its assembly name. Modules without an assembly
    /// manifest are registered under their module name.
    pub fn register(&self, module: CilModuleRc) {
        let key = module
            .assembly_descriptor()
            .map_or_else(|| module.name.clone(), |descriptor| descriptor.name.clone());
        self.modules.insert(key, module);
    }
}

impl AssemblyResolver for AssemblyMap {
    fn resolve(&self, assembly: &AssemblyDescriptor) -> Option<CilModuleRc> {
        self.modules.get(&assembly.name).map(|module| module.clone())
    }
}

/// Structural comparison of references against definitions.
///
/// Matching is by name: namespace, simple name, and the enclosing chain for
/// types; name, calling convention, and parameter and return types for methods;
/// name and field type for fields. Token identity never participates, so
/// definitions from different loads of the same module still match.
#[derive(Default)]
pub struct SignatureComparer;

impl SignatureComparer {
    /// True if two type occurrences denote the same type.
    #[must_use]
    pub fn match_types(&self, left: &TypeReference, right: &TypeReference) -> bool {
        match (left, right) {
            (TypeReference::None, TypeReference::None) => true,
            (TypeReference::Array(a), TypeReference::Array(b))
            | (TypeReference::Pointer(a), TypeReference::Pointer(b))
            | (TypeReference::ByRef(a), TypeReference::ByRef(b)) => self.match_types(a, b),
            (
                TypeReference::GenericInstance {
                    base: left_base,
                    args: left_args,
                },
                TypeReference::GenericInstance {
                    base: right_base,
                    args: right_args,
                },
            ) => {
                self.match_types(left_base, right_base)
                    && left_args.len() == right_args.len()
                    && left_args
                        .iter()
                        .zip(right_args)
                        .all(|(a, b)| self.match_types(a, b))
            }
            (
                TypeReference::Definition(_) | TypeReference::Reference(_),
                TypeReference::Definition(_) | TypeReference::Reference(_),
            ) => left.full_name() == right.full_name(),
            _ => false,
        }
    }

    /// True if `reference` names `definition`, including the enclosing chain.
    #[must_use]
    pub fn match_type_ref_def(&self, reference: &TypeRef, definition: &TypeDef) -> bool {
        match (&reference.scope, &definition.enclosing) {
            (ResolutionScope::Type(ref_enclosing), Some(def_enclosing)) => {
                reference.name == definition.name
                    && self.match_type_ref_def(ref_enclosing, def_enclosing)
            }
            (ResolutionScope::Type(_), None) => false,
            (_, Some(_)) => false,
            (_, None) => {
                reference.name == definition.name && reference.namespace == definition.namespace
            }
        }
    }

    /// True if `reference` names `definition` with a matching signature.
    #[must_use]
    pub fn match_methods(&self, reference: &MethodRef, definition: &MethodDef) -> bool {
        reference.name == definition.name
            && reference.calling_convention == definition.calling_convention
            && reference.params.len() == definition.params.len()
            && self.match_types(&reference.return_type, &definition.return_type)
            && reference
                .params
                .iter()
                .zip(&definition.params)
                .all(|(a, b)| self.match_types(a, b))
    }

    /// True if `reference` names `definition` with a matching field type.
    #[must_use]
    pub fn match_fields(&self, reference: &FieldRef, definition: &FieldDef) -> bool {
        reference.name == definition.name
            && self.match_types(&reference.field_type, &definition.field_type)
    }
}

/// Resolves type, method, and field references to their definitions.
pub struct MemberResolver {
    assembly_resolver: Arc<dyn AssemblyResolver>,
    comparer: SignatureComparer,
    throw_on_not_found: bool,
}

impl MemberResolver {
    /// Creates a resolver over the given assembly lookup. Misses are reported as
    /// errors; use [`MemberResolver::with_throw_on_not_found`] to get `Ok(None)`
    /// instead.
    #[must_use]
    pub fn new(assembly_resolver: Arc<dyn AssemblyResolver>) -> Self {
        MemberResolver {
            assembly_resolver,
            comparer: SignatureComparer,
            throw_on_not_found: true,
        }
    }

    /// Controls whether an unresolvable member is an error or `Ok(None)`.
    #[must_use]
    pub fn with_throw_on_not_found(mut self, throw_on_not_found: bool) -> Self {
        self.throw_on_not_found = throw_on_not_found;
        self
    }

    /// Resolves a type occurrence to its definition.
    ///
    /// Array, pointer, by-ref, and generic instantiation wrappers are reduced to
    /// their element type first. Candidates are scanned in type table order and
    /// the first match wins.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`] for a missing reference, and
    /// [`MemberNotFound`] on a miss when configured to throw.
    pub fn resolve_type(&self, reference: Option<&TypeReference>) -> Result<Option<TypeDefRc>> {
        let Some(reference) = reference else {
            return Err(InvalidArgument("type reference must not be null"));
        };

        match reference.element_type() {
            TypeReference::Definition(definition) => Ok(Some(definition.clone())),
            TypeReference::Reference(typeref) => {
                if let Some(module) = self.scope_module(typeref) {
                    for definition in module.type_def_table() {
                        if self.comparer.match_type_ref_def(typeref, &definition) {
                            return Ok(Some(definition));
                        }
                    }
                }

                self.not_found(typeref.full_name())
            }
            other => self.not_found(other.full_name()),
        }
    }

    /// Resolves a method reference to its definition.
    ///
    /// The declaring type is resolved first, then its methods are scanned in
    /// declaration order for a structural signature match.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`] for a missing reference, and
    /// [`MemberNotFound`] on a miss when configured to throw.
    pub fn resolve_method(&self, reference: Option<&MethodRef>) -> Result<Option<MethodDefRc>> {
        let Some(reference) = reference else {
            return Err(InvalidArgument("method reference must not be null"));
        };

        let Some(declaring) = self.resolve_declaring_type(reference.full_name(), &reference.declaring_type)? else {
            return Ok(None);
        };

        for (_, method) in declaring.methods.iter() {
            if self.comparer.match_methods(reference, method) {
                return Ok(Some(method.clone()));
            }
        }

        self.not_found(reference.full_name())
    }

    /// Resolves a field reference to its definition.
    ///
    /// The declaring type is resolved first, then its fields are scanned in
    /// declaration order.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`] for a missing reference, and
    /// [`MemberNotFound`] on a miss when configured to throw.
    pub fn resolve_field(&self, reference: Option<&FieldRef>) -> Result<Option<FieldDefRc>> {
        let Some(reference) = reference else {
            return Err(InvalidArgument("field reference must not be null"));
        };

        let Some(declaring) = self.resolve_declaring_type(reference.full_name(), &reference.declaring_type)? else {
            return Ok(None);
        };

        for (_, field) in declaring.fields.iter() {
            if self.comparer.match_fields(reference, field) {
                return Ok(Some(field.clone()));
            }
        }

        self.not_found(reference.full_name())
    }

    /// Resolves the declaring type of a member, renaming a miss after the member
    /// itself.
    fn resolve_declaring_type(
        &self,
        member_name: String,
        declaring: &TypeReference,
    ) -> Result<Option<TypeDefRc>> {
        match self.resolve_type(Some(declaring)) {
            Ok(found) => Ok(found),
            Err(MemberNotFound(_)) => Err(MemberNotFound(member_name)),
            Err(other) => Err(other),
        }
    }

    /// Walks a reference's scope chain to the module it resolves in.
    fn scope_module(&self, typeref: &TypeRef) -> Option<CilModuleRc> {
        match &typeref.scope {
            ResolutionScope::Module(module) => Some(module.clone()),
            ResolutionScope::Assembly(descriptor) => self.assembly_resolver.resolve(descriptor),
            ResolutionScope::Type(enclosing) => self.scope_module(enclosing),
            ResolutionScope::None => None,
        }
    }

    fn not_found<T>(&self, name: String) -> Result<Option<T>> {
        if self.throw_on_not_found {
            Err(MemberNotFound(name))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::typesystem::{Assembly, CallingConvention, CilModule};
    use crate::Error;

    fn corlib_descriptor() -> AssemblyDescriptor {
        AssemblyDescriptor::new("testlib", (1, 0, 0, 0))
    }

    fn string_type(module: &CilModule) -> TypeReference {
        TypeReference::Definition(
            module
                .type_def_table()
                .find(|t| t.name == "String")
                .unwrap(),
        )
    }

    /// One module: `System.String` with `Concat` overloads and a `Length` field,
    /// plus `Outer` with nested `Inner`.
    fn test_module() -> CilModuleRc {
        let assembly = Arc::new(Assembly::new(corlib_descriptor()));
        let module = Arc::new(CilModule::new("testlib.dll", Some(assembly)));

        let string = Arc::new(TypeDef::new("System", "String"));
        module.push_type(string.clone()).unwrap();

        let string_ty = TypeReference::Definition(string.clone());
        string.methods.push(Arc::new(MethodDef::new(
            "Concat",
            CallingConvention::Default,
            vec![string_ty.clone()],
            string_ty.clone(),
        )));
        string.methods.push(Arc::new(MethodDef::new(
            "Concat",
            CallingConvention::Default,
            vec![string_ty.clone(), string_ty.clone()],
            string_ty.clone(),
        )));
        string
            .fields
            .push(Arc::new(FieldDef::new("Length", TypeReference::None)));

        let outer = Arc::new(TypeDef::new("System", "Outer"));
        module.push_type(outer.clone()).unwrap();
        let inner = Arc::new(TypeDef::nested("Inner", outer));
        module.push_type(inner).unwrap();

        module
    }

    fn test_resolver(module: &CilModuleRc) -> MemberResolver {
        let map = AssemblyMap::new();
        map.register(module.clone());
        MemberResolver::new(Arc::new(map))
    }

    fn string_ref() -> TypeReference {
        TypeReference::Reference(Arc::new(TypeRef::new(
            "System",
            "String",
            ResolutionScope::Assembly(corlib_descriptor()),
        )))
    }

    #[test]
    fn null_input_is_argument_error() {
        let module = test_module();
        for throw in [true, false] {
            let resolver = test_resolver(&module).with_throw_on_not_found(throw);
            assert!(matches!(
                resolver.resolve_type(None),
                Err(Error::InvalidArgument(_))
            ));
            assert!(matches!(
                resolver.resolve_method(None),
                Err(Error::InvalidArgument(_))
            ));
            assert!(matches!(
                resolver.resolve_field(None),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn definition_passes_through() {
        let module = test_module();
        let resolver = test_resolver(&module);
        let reference = string_type(&module);

        let resolved = resolver.resolve_type(Some(&reference)).unwrap().unwrap();
        assert_eq!(resolved.full_name(), "System.String");
    }

    #[test]
    fn reference_resolves_through_assembly_scope() {
        let module = test_module();
        let resolver = test_resolver(&module);

        let resolved = resolver.resolve_type(Some(&string_ref())).unwrap().unwrap();
        assert_eq!(resolved.full_name(), "System.String");
        assert!(Arc::ptr_eq(
            &resolved,
            &module.type_by_token(resolved.token().unwrap()).unwrap()
        ));
    }

    #[test]
    fn wrappers_reduce_to_element_type() {
        let module = test_module();
        let resolver = test_resolver(&module);

        let wrapped = TypeReference::ByRef(Box::new(TypeReference::Array(Box::new(string_ref()))));
        let resolved = resolver.resolve_type(Some(&wrapped)).unwrap().unwrap();
        assert_eq!(resolved.full_name(), "System.String");
    }

    /// Stands in for an assembly lookup that must never run.
    struct NoAssemblies;

    impl AssemblyResolver for NoAssemblies {
        fn resolve(&self, _: &AssemblyDescriptor) -> Option<CilModuleRc> {
            panic!("assembly lookup ran for an already-resolved definition")
        }
    }

    #[test]
    fn definitions_never_consult_assembly_lookup() {
        let module = test_module();
        let resolver = MemberResolver::new(Arc::new(NoAssemblies));
        let definition = string_type(&module);

        let direct = resolver.resolve_type(Some(&definition)).unwrap().unwrap();
        assert_eq!(direct.full_name(), "System.String");

        let wrapped = TypeReference::Pointer(Box::new(TypeReference::Array(Box::new(
            definition.clone(),
        ))));
        let via_wrapper = resolver.resolve_type(Some(&wrapped)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&direct, &via_wrapper));
    }

    #[test]
    fn repeated_resolution_is_deterministic() {
        let module = test_module();
        let resolver = test_resolver(&module);

        let first = resolver.resolve_type(Some(&string_ref())).unwrap().unwrap();
        let second = resolver.resolve_type(Some(&string_ref())).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn empty_type_reference_is_a_miss() {
        let module = test_module();

        let throwing = test_resolver(&module);
        assert!(matches!(
            throwing.resolve_type(Some(&TypeReference::None)),
            Err(Error::MemberNotFound(_))
        ));

        let quiet = test_resolver(&module).with_throw_on_not_found(false);
        assert!(quiet
            .resolve_type(Some(&TypeReference::None))
            .unwrap()
            .is_none());
    }

    #[test]
    fn nested_reference_resolves() {
        let module = test_module();
        let resolver = test_resolver(&module);

        let outer = Arc::new(TypeRef::new(
            "System",
            "Outer",
            ResolutionScope::Assembly(corlib_descriptor()),
        ));
        let nested = TypeReference::Reference(Arc::new(TypeRef::new(
            "",
            "Inner",
            ResolutionScope::Type(outer),
        )));

        let resolved = resolver.resolve_type(Some(&nested)).unwrap().unwrap();
        assert_eq!(resolved.full_name(), "System.Outer+Inner");
    }

    #[test]
    fn method_overloads_match_by_signature() {
        let module = test_module();
        let resolver = test_resolver(&module);
        let string_ty = string_type(&module);

        let reference = MethodRef {
            name: "Concat".to_string(),
            declaring_type: string_ref(),
            calling_convention: CallingConvention::Default,
            params: vec![string_ty.clone(), string_ty.clone()],
            return_type: string_ty,
        };

        let resolved = resolver.resolve_method(Some(&reference)).unwrap().unwrap();
        assert_eq!(resolved.params.len(), 2);
    }

    #[test]
    fn field_resolves_by_name_and_type() {
        let module = test_module();
        let resolver = test_resolver(&module);

        let reference = FieldRef {
            name: "Length".to_string(),
            declaring_type: string_ref(),
            field_type: TypeReference::None,
        };

        let resolved = resolver.resolve_field(Some(&reference)).unwrap().unwrap();
        assert_eq!(resolved.name, "Length");
    }

    #[test]
    fn miss_behavior_follows_flag() {
        let module = test_module();

        let missing = TypeReference::Reference(Arc::new(TypeRef::new(
            "System",
            "Missing",
            ResolutionScope::Assembly(corlib_descriptor()),
        )));

        let throwing = test_resolver(&module);
        match throwing.resolve_type(Some(&missing)) {
            Err(Error::MemberNotFound(name)) => assert_eq!(name, "System.Missing"),
            other => panic!("expected MemberNotFound, got {:?}", other.map(|_| ())),
        }

        let quiet = test_resolver(&module).with_throw_on_not_found(false);
        assert!(quiet.resolve_type(Some(&missing)).unwrap().is_none());
    }

    #[test]
    fn method_miss_names_the_method() {
        let module = test_module();
        let resolver = test_resolver(&module);
        let string_ty = string_type(&module);

        let reference = MethodRef {
            name: "Missing".to_string(),
            declaring_type: string_ref(),
            calling_convention: CallingConvention::Default,
            params: vec![],
            return_type: string_ty,
        };

        match resolver.resolve_method(Some(&reference)) {
            Err(Error::MemberNotFound(name)) => assert_eq!(name, "System.String::Missing"),
            other => panic!("expected MemberNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unknown_assembly_is_a_miss() {
        let module = test_module();
        let resolver = test_resolver(&module).with_throw_on_not_found(false);

        let foreign = TypeReference::Reference(Arc::new(TypeRef::new(
            "System",
            "String",
            ResolutionScope::Assembly(AssemblyDescriptor::new("otherlib", (1, 0, 0, 0))),
        )));

        assert!(resolver.resolve_type(Some(&foreign)).unwrap().is_none());
    }

    #[test]
    fn first_match_in_table_order_wins() {
        let assembly = Arc::new(Assembly::new(corlib_descriptor()));
        let module = Arc::new(CilModule::new("testlib.dll", Some(assembly)));
        module
            .push_type(Arc::new(TypeDef::new("System", "Dup")))
            .unwrap();
        module
            .push_type(Arc::new(TypeDef::new("System", "Dup")))
            .unwrap();

        let resolver = test_resolver(&module);
        let reference = TypeReference::Reference(Arc::new(TypeRef::new(
            "System",
            "Dup",
            ResolutionScope::Assembly(corlib_descriptor()),
        )));

        let resolved = resolver.resolve_type(Some(&reference)).unwrap().unwrap();
        assert_eq!(resolved.token().unwrap().value(), 0x0200_0001);
    }
}
