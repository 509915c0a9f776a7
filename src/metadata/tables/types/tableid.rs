use strum::{EnumCount, EnumIter};

/// Identifiers of the metadata tables defined in ECMA-335 Partition II, Section 22.
///
/// The numeric values are the table IDs used in token high bytes and in the valid
/// bitvector of the tables stream.
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash)]
pub enum TableId {
    /// `Module` (0x00) - the current module
    Module = 0x00,
    /// `TypeRef` (0x01) - references to types in external scopes
    TypeRef = 0x01,
    /// `TypeDef` (0x02) - type definitions in this module
    TypeDef = 0x02,
    /// `Field` (0x04) - field definitions
    Field = 0x04,
    /// `MethodDef` (0x06) - method definitions
    MethodDef = 0x06,
    /// `Param` (0x08) - method parameter definitions
    Param = 0x08,
    /// `InterfaceImpl` (0x09) - interface implementations
    InterfaceImpl = 0x09,
    /// `MemberRef` (0x0A) - references to external members
    MemberRef = 0x0A,
    /// `Constant` (0x0B) - compile-time constant values
    Constant = 0x0B,
    /// `CustomAttribute` (0x0C) - custom attribute applications
    CustomAttribute = 0x0C,
    /// `FieldMarshal` (0x0D) - interop marshalling information
    FieldMarshal = 0x0D,
    /// `DeclSecurity` (0x0E) - declarative security records
    DeclSecurity = 0x0E,
    /// `ClassLayout` (0x0F) - explicit type layout
    ClassLayout = 0x0F,
    /// `FieldLayout` (0x10) - explicit field offsets
    FieldLayout = 0x10,
    /// `StandAloneSig` (0x11) - standalone signatures
    StandAloneSig = 0x11,
    /// `EventMap` (0x12) - type-to-event ranges
    EventMap = 0x12,
    /// `Event` (0x14) - event definitions
    Event = 0x14,
    /// `PropertyMap` (0x15) - type-to-property ranges
    PropertyMap = 0x15,
    /// `Property` (0x17) - property definitions
    Property = 0x17,
    /// `MethodSemantics` (0x18) - accessor associations
    MethodSemantics = 0x18,
    /// `MethodImpl` (0x19) - method implementation mappings
    MethodImpl = 0x19,
    /// `ModuleRef` (0x1A) - references to external modules
    ModuleRef = 0x1A,
    /// `TypeSpec` (0x1B) - constructed type specifications
    TypeSpec = 0x1B,
    /// `ImplMap` (0x1C) - unmanaged implementation mappings
    ImplMap = 0x1C,
    /// `FieldRVA` (0x1D) - field initial data addresses
    FieldRVA = 0x1D,
    /// `Assembly` (0x20) - the current assembly
    Assembly = 0x20,
    /// `AssemblyProcessor` (0x21) - rarely used processor info
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` (0x22) - rarely used OS info
    AssemblyOS = 0x22,
    /// `AssemblyRef` (0x23) - references to external assemblies
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` (0x24) - rarely used processor info
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` (0x25) - rarely used OS info
    AssemblyRefOS = 0x25,
    /// `File` (0x26) - files belonging to the assembly
    File = 0x26,
    /// `ExportedType` (0x27) - forwarded and exported types
    ExportedType = 0x27,
    /// `ManifestResource` (0x28) - embedded or linked resources
    ManifestResource = 0x28,
    /// `NestedClass` (0x29) - nesting relationships between types
    NestedClass = 0x29,
    /// `GenericParam` (0x2A) - generic parameter definitions
    GenericParam = 0x2A,
    /// `MethodSpec` (0x2B) - instantiated generic methods
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` (0x2C) - generic parameter constraints
    GenericParamConstraint = 0x2C,
}
