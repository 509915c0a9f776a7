//! In-memory model of the CLI type system.
//!
//! Definitions ([`TypeDef`], [`MethodDef`], [`FieldDef`], [`Assembly`]) own their
//! metadata and live inside a [`CilModule`]. References ([`TypeRef`],
//! [`MethodRef`], [`FieldRef`]) describe members by name and scope and are turned
//! into definitions by the member resolver.
//!
//! Collections use `boxcar::Vec` so that loading can append concurrently while
//! readers iterate, and tokens are assigned once through `OnceLock` when a
//! definition is placed into its final table slot.

use dashmap::DashMap;
use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{metadata::security::Security, metadata::token::Token, Result};

/// Reference-counted [`CilModule`]
pub type CilModuleRc = Arc<CilModule>;
/// Reference-counted [`Assembly`]
pub type AssemblyRc = Arc<Assembly>;
/// Reference-counted [`TypeDef`]
pub type TypeDefRc = Arc<TypeDef>;
/// Reference-counted [`MethodDef`]
pub type MethodDefRc = Arc<MethodDef>;
/// Reference-counted [`FieldDef`]
pub type FieldDefRc = Arc<FieldDef>;
/// Reference-counted [`TypeRef`]
pub type TypeRefRc = Arc<TypeRef>;

/// Identity of an assembly: the name plus the version and key that pin a
/// specific build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyDescriptor {
    /// Simple name of the assembly, e.g. `mscorlib`
    pub name: String,
    /// Major, minor, build, revision
    pub version: (u16, u16, u16, u16),
    /// Public key token, if the assembly is strong-named
    pub public_key_token: Option<Vec<u8>>,
}

impl AssemblyDescriptor {
    /// Creates a descriptor with the given name and version and no key.
    #[must_use]
    pub fn new(name: &str, version: (u16, u16, u16, u16)) -> Self {
        AssemblyDescriptor {
            name: name.to_string(),
            version,
            public_key_token: None,
        }
    }
}

impl fmt::Display for AssemblyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, Version={}.{}.{}.{}",
            self.name, self.version.0, self.version.1, self.version.2, self.version.3
        )
    }
}

/// The assembly manifest of a module.
pub struct Assembly {
    token: OnceLock<Token>,
    /// Identity of this assembly
    pub descriptor: AssemblyDescriptor,
    /// Declarative security attached to the assembly manifest
    pub security: OnceLock<Security>,
}

impl Assembly {
    /// Creates an assembly with no token assigned yet.
    #[must_use]
    pub fn new(descriptor: AssemblyDescriptor) -> Self {
        Assembly {
            token: OnceLock::new(),
            descriptor,
            security: OnceLock::new(),
        }
    }

    /// The metadata token, if this assembly has been placed into a table.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.token.get().copied()
    }

    /// Assigns the metadata token. Later assignments are ignored.
    pub fn set_token(&self, token: Token) {
        let _ = self.token.set(token);
    }
}

/// A type definition owned by a module.
pub struct TypeDef {
    token: OnceLock<Token>,
    /// Simple name of the type
    pub name: String,
    /// Namespace, empty for nested and global types
    pub namespace: String,
    /// The enclosing type if this definition is nested
    pub enclosing: Option<TypeDefRc>,
    /// Methods in declaration order
    pub methods: boxcar::Vec<MethodDefRc>,
    /// Fields in declaration order
    pub fields: boxcar::Vec<FieldDefRc>,
    /// Declarative security attached to this type
    pub security: OnceLock<Security>,
}

impl TypeDef {
    /// Creates a top-level type definition.
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeDef {
            token: OnceLock::new(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            enclosing: None,
            methods: boxcar::Vec::new(),
            fields: boxcar::Vec::new(),
            security: OnceLock::new(),
        }
    }

    /// Creates a type definition nested inside `enclosing`.
    #[must_use]
    pub fn nested(name: &str, enclosing: TypeDefRc) -> Self {
        TypeDef {
            token: OnceLock::new(),
            name: name.to_string(),
            namespace: String::new(),
            enclosing: Some(enclosing),
            methods: boxcar::Vec::new(),
            fields: boxcar::Vec::new(),
            security: OnceLock::new(),
        }
    }

    /// The metadata token, if this type has been placed into a table.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.token.get().copied()
    }

    /// Assigns the metadata token. Later assignments are ignored.
    pub fn set_token(&self, token: Token) {
        let _ = self.token.set(token);
    }

    /// Fully qualified name: `Namespace.Name`, with nesting rendered as
    /// `Enclosing+Nested`.
    #[must_use]
    pub fn full_name(&self) -> String {
        if let Some(enclosing) = &self.enclosing {
            return format!("{}+{}", enclosing.full_name(), self.name);
        }

        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// Calling convention of a method signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallingConvention {
    /// Standard managed call
    Default,
    /// Variable argument list
    VarArg,
    /// Generic method with the given generic parameter count
    Generic(u32),
}

/// A method definition owned by a type.
pub struct MethodDef {
    token: OnceLock<Token>,
    /// Name of the method
    pub name: String,
    /// Calling convention of the signature
    pub calling_convention: CallingConvention,
    /// Parameter types in order, excluding the `this` pointer
    pub params: Vec<TypeReference>,
    /// Return type
    pub return_type: TypeReference,
    /// Declarative security attached to this method
    pub security: OnceLock<Security>,
}

impl MethodDef {
    /// Creates a method definition with no token assigned yet.
    #[must_use]
    pub fn new(
        name: &str,
        calling_convention: CallingConvention,
        params: Vec<TypeReference>,
        return_type: TypeReference,
    ) -> Self {
        MethodDef {
            token: OnceLock::new(),
            name: name.to_string(),
            calling_convention,
            params,
            return_type,
            security: OnceLock::new(),
        }
    }

    /// The metadata token, if this method has been placed into a table.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.token.get().copied()
    }

    /// Assigns the metadata token. Later assignments are ignored.
    pub fn set_token(&self, token: Token) {
        let _ = self.token.set(token);
    }
}

/// A field definition owned by a type.
pub struct FieldDef {
    token: OnceLock<Token>,
    /// Name of the field
    pub name: String,
    /// Declared type of the field
    pub field_type: TypeReference,
}

impl FieldDef {
    /// Creates a field definition with no token assigned yet.
    #[must_use]
    pub fn new(name: &str, field_type: TypeReference) -> Self {
        FieldDef {
            token: OnceLock::new(),
            name: name.to_string(),
            field_type,
        }
    }

    /// The metadata token, if this field has been placed into a table.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.token.get().copied()
    }

    /// Assigns the metadata token. Later assignments are ignored.
    pub fn set_token(&self, token: Token) {
        let _ = self.token.set(token);
    }
}

/// Where a type reference points to.
#[derive(Clone)]
pub enum ResolutionScope {
    /// No scope recorded; the type is looked up in the current module
    None,
    /// The type lives in another module of the same assembly
    Module(CilModuleRc),
    /// The type lives in another assembly
    Assembly(AssemblyDescriptor),
    /// The reference names a type nested inside another referenced type
    Type(TypeRefRc),
}

/// A by-name reference to a type in some scope.
pub struct TypeRef {
    /// Simple name of the type
    pub name: String,
    /// Namespace, empty for nested types
    pub namespace: String,
    /// The scope the type is defined in
    pub scope: ResolutionScope,
}

impl TypeRef {
    /// Creates a reference to `namespace.name` in `scope`.
    #[must_use]
    pub fn new(namespace: &str, name: &str, scope: ResolutionScope) -> Self {
        TypeRef {
            name: name.to_string(),
            namespace: namespace.to_string(),
            scope,
        }
    }

    /// Fully qualified name, with nesting rendered as `Enclosing+Nested`.
    #[must_use]
    pub fn full_name(&self) -> String {
        if let ResolutionScope::Type(enclosing) = &self.scope {
            return format!("{}+{}", enclosing.full_name(), self.name);
        }

        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// A type occurrence: either a resolved definition, a by-name reference, or a
/// constructed type wrapping an element type.
#[derive(Clone, Default)]
pub enum TypeReference {
    /// No type, e.g. a `void` return
    #[default]
    None,
    /// A resolved definition in a loaded module
    Definition(TypeDefRc),
    /// A by-name reference to be resolved
    Reference(TypeRefRc),
    /// Single-dimensional array of the element type
    Array(Box<TypeReference>),
    /// Unmanaged pointer to the element type
    Pointer(Box<TypeReference>),
    /// Managed by-reference to the element type
    ByRef(Box<TypeReference>),
    /// Instantiation of a generic type
    GenericInstance {
        /// The open generic type being instantiated
        base: Box<TypeReference>,
        /// The type arguments
        args: Vec<TypeReference>,
    },
}

impl TypeReference {
    /// Strips array, pointer, by-ref, and generic instantiation wrappers down to
    /// the underlying type.
    #[must_use]
    pub fn element_type(&self) -> &TypeReference {
        match self {
            TypeReference::Array(inner)
            | TypeReference::Pointer(inner)
            | TypeReference::ByRef(inner) => inner.element_type(),
            TypeReference::GenericInstance { base, .. } => base.element_type(),
            other => other,
        }
    }

    /// Fully qualified name of the underlying type, for diagnostics.
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            TypeReference::None => "<none>".to_string(),
            TypeReference::Definition(def) => def.full_name(),
            TypeReference::Reference(typeref) => typeref.full_name(),
            TypeReference::Array(inner) => format!("{}[]", inner.full_name()),
            TypeReference::Pointer(inner) => format!("{}*", inner.full_name()),
            TypeReference::ByRef(inner) => format!("{}&", inner.full_name()),
            TypeReference::GenericInstance { base, args } => {
                let args = args
                    .iter()
                    .map(TypeReference::full_name)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}<{}>", base.full_name(), args)
            }
        }
    }
}

/// A by-name reference to a method on some type.
pub struct MethodRef {
    /// Name of the method
    pub name: String,
    /// The type the method is declared on
    pub declaring_type: TypeReference,
    /// Calling convention of the signature
    pub calling_convention: CallingConvention,
    /// Parameter types in order
    pub params: Vec<TypeReference>,
    /// Return type
    pub return_type: TypeReference,
}

impl MethodRef {
    /// `DeclaringType::Name` for diagnostics.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.declaring_type.full_name(), self.name)
    }
}

/// A by-name reference to a field on some type.
pub struct FieldRef {
    /// Name of the field
    pub name: String,
    /// The type the field is declared on
    pub declaring_type: TypeReference,
    /// Declared type of the field
    pub field_type: TypeReference,
}

impl FieldRef {
    /// `DeclaringType::Name` for diagnostics.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.declaring_type.full_name(), self.name)
    }
}

/// A loaded module: the unit the resolver works over.
///
/// Types are kept in table order; token lookup goes through a concurrent map
/// filled as tokens are assigned.
pub struct CilModule {
    /// Name of the module file
    pub name: String,
    /// The assembly manifest, if this is the manifest module
    pub assembly: Option<AssemblyRc>,
    types: boxcar::Vec<TypeDefRc>,
    types_by_token: DashMap<Token, TypeDefRc>,
}

impl CilModule {
    /// Creates an empty module.
    #[must_use]
    pub fn new(name: &str, assembly: Option<AssemblyRc>) -> Self {
        CilModule {
            name: name.to_string(),
            assembly,
            types: boxcar::Vec::new(),
            types_by_token: DashMap::new(),
        }
    }

    /// Appends a type to the definition table, assigning its token from the row
    /// position.
    pub fn push_type(&self, type_def: TypeDefRc) -> Result<()> {
        let index = self.types.push(type_def.clone());
        let rid = u32::try_from(index + 1)
            .map_err(|_| malformed_error!("Type definition table overflow"))?;

        let token = Token::new(0x0200_0000 + rid);
        type_def.set_token(token);
        self.types_by_token.insert(token, type_def);
        Ok(())
    }

    /// The type definitions in table order.
    pub fn type_def_table(&self) -> impl Iterator<Item = TypeDefRc> + '_ {
        self.types.iter().map(|(_, t)| t.clone())
    }

    /// Looks up a type definition by token.
    #[must_use]
    pub fn type_by_token(&self, token: Token) -> Option<TypeDefRc> {
        self.types_by_token.get(&token).map(|t| t.clone())
    }

    /// The descriptor of the assembly this module belongs to.
    #[must_use]
    pub fn assembly_descriptor(&self) -> Option<&AssemblyDescriptor> {
        self.assembly.as_ref().map(|a| &a.descriptor)
    }
}
