use bitflags::bitflags;
use std::{fmt, sync::Arc};

use crate::metadata::security::PermissionSet;

/// Security information attached to a type, method, or assembly definition.
pub struct Security {
    /// The action describing how the permission set is enforced
    pub action: SecurityAction,
    /// The permissions being declared
    pub permission_set: Arc<PermissionSet>,
}

/// Security actions as defined in ECMA-335 II.22.11 and the .NET Framework.
///
/// The action controls how the runtime enforces the attached permission set.
/// Values outside the defined range are preserved as [`SecurityAction::Unknown`]
/// so that records round-trip without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SecurityAction {
    /// Refuse Demand for the specified permission without further checks
    Deny = 0x0001,
    /// All callers in the chain must have the permission
    Demand = 0x0002,
    /// Satisfy Demand for the specified permission without further checks
    Assert = 0x0003,
    /// The current assembly must have been granted the permission
    NonCasDemand = 0x0004,
    /// The immediate caller must have the permission, checked at link time
    LinkDemand = 0x0005,
    /// The permission is required to inherit or override
    InheritanceDemand = 0x0006,
    /// Minimum permissions required to run (obsolete)
    RequestMinimum = 0x0007,
    /// Optional permissions to grant (obsolete)
    RequestOptional = 0x0008,
    /// Permissions not to be granted (obsolete)
    RequestRefuse = 0x0009,
    /// Reserved for prejitting
    PrejitGrant = 0x000A,
    /// Reserved for prejitting
    PrejitDeny = 0x000B,
    /// Non-CAS version of `LinkDemand`
    NonCasLinkDemand = 0x000C,
    /// Non-CAS version of `InheritanceDemand`
    NonCasInheritance = 0x000D,
    /// Link demand choice of the .NET 4.0 transparency model
    LinkDemandChoice = 0x000E,
    /// Inheritance demand choice of the .NET 4.0 transparency model
    InheritanceDemandChoice = 0x000F,
    /// Demand choice of the .NET 4.0 transparency model
    DemandChoice = 0x0010,
    /// Refuse Demand for all permissions other than those specified
    PermitOnly = 0x0011,
    /// Action outside the defined range
    Unknown(u16),
}

impl From<u16> for SecurityAction {
    fn from(value: u16) -> Self {
        match value {
            0x0001 => SecurityAction::Deny,
            0x0002 => SecurityAction::Demand,
            0x0003 => SecurityAction::Assert,
            0x0004 => SecurityAction::NonCasDemand,
            0x0005 => SecurityAction::LinkDemand,
            0x0006 => SecurityAction::InheritanceDemand,
            0x0007 => SecurityAction::RequestMinimum,
            0x0008 => SecurityAction::RequestOptional,
            0x0009 => SecurityAction::RequestRefuse,
            0x000A => SecurityAction::PrejitGrant,
            0x000B => SecurityAction::PrejitDeny,
            0x000C => SecurityAction::NonCasLinkDemand,
            0x000D => SecurityAction::NonCasInheritance,
            0x000E => SecurityAction::LinkDemandChoice,
            0x000F => SecurityAction::InheritanceDemandChoice,
            0x0010 => SecurityAction::DemandChoice,
            0x0011 => SecurityAction::PermitOnly,
            _ => SecurityAction::Unknown(value),
        }
    }
}

impl From<SecurityAction> for u16 {
    fn from(action: SecurityAction) -> Self {
        match action {
            SecurityAction::Deny => 0x0001,
            SecurityAction::Demand => 0x0002,
            SecurityAction::Assert => 0x0003,
            SecurityAction::NonCasDemand => 0x0004,
            SecurityAction::LinkDemand => 0x0005,
            SecurityAction::InheritanceDemand => 0x0006,
            SecurityAction::RequestMinimum => 0x0007,
            SecurityAction::RequestOptional => 0x0008,
            SecurityAction::RequestRefuse => 0x0009,
            SecurityAction::PrejitGrant => 0x000A,
            SecurityAction::PrejitDeny => 0x000B,
            SecurityAction::NonCasLinkDemand => 0x000C,
            SecurityAction::NonCasInheritance => 0x000D,
            SecurityAction::LinkDemandChoice => 0x000E,
            SecurityAction::InheritanceDemandChoice => 0x000F,
            SecurityAction::DemandChoice => 0x0010,
            SecurityAction::PermitOnly => 0x0011,
            SecurityAction::Unknown(value) => value,
        }
    }
}

/// The type of a named argument in a permission.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentType {
    /// Boolean
    Boolean,
    /// 32-bit integer
    Int32,
    /// 64-bit integer
    Int64,
    /// String value
    String,
    /// CLR type reference
    Type,
    /// Enumeration value; the string is the enum type name
    Enum(String),
    /// Array of another type
    Array(Box<ArgumentType>),
    /// Unknown type code
    Unknown(u8),
}

/// The deserialized value of a named argument in a permission.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    /// Boolean value
    Boolean(bool),
    /// 32-bit integer
    Int32(i32),
    /// 64-bit integer
    Int64(i64),
    /// String value
    String(String),
    /// Full name of a referenced type
    Type(String),
    /// Enum type name and integer value
    Enum(String, i32),
    /// Array of values
    Array(Vec<ArgumentValue>),
    /// Null value
    Null,
}

impl fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentValue::Boolean(v) => write!(f, "{}", v),
            ArgumentValue::Int32(v) => write!(f, "{}", v),
            ArgumentValue::Int64(v) => write!(f, "{}", v),
            ArgumentValue::String(v) => write!(f, "\"{}\"", v),
            ArgumentValue::Type(v) => write!(f, "typeof({})", v),
            ArgumentValue::Enum(t, v) => write!(f, "{}({})", t, v),
            ArgumentValue::Array(v) => {
                write!(f, "[")?;
                for (i, val) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, "]")
            }
            ArgumentValue::Null => write!(f, "null"),
        }
    }
}

/// Full type names of common .NET permission classes.
pub mod security_classes {
    /// Controls access to files and directories
    pub const FILE_IO_PERMISSION: &str = "System.Security.Permissions.FileIOPermission";

    /// Controls access to security-sensitive operations
    pub const SECURITY_PERMISSION: &str = "System.Security.Permissions.SecurityPermission";

    /// Controls access to registry keys
    pub const REGISTRY_PERMISSION: &str = "System.Security.Permissions.RegistryPermission";

    /// Controls access to environment variables
    pub const ENVIRONMENT_PERMISSION: &str = "System.Security.Permissions.EnvironmentPermission";

    /// Controls use of reflection
    pub const REFLECTION_PERMISSION: &str = "System.Security.Permissions.ReflectionPermission";

    /// Controls UI operations
    pub const UI_PERMISSION: &str = "System.Security.Permissions.UIPermission";
}

/// The serialization formats a permission set can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionSetFormat {
    /// Permission set serialized as XML
    Xml,
    /// Older .NET Framework binary format
    BinaryLegacy,
    /// Format that could not be identified
    Unknown,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Flags of the .NET `SecurityPermission` class, controlling access to
    /// security-sensitive operations.
    pub struct SecurityPermissionFlags: i32 {
        /// Enables code execution
        const SECURITY_FLAG_EXECUTION = 0x0000_0008;
        /// Enables bypassing of code verification
        const SECURITY_FLAG_SKIP_VERIFICATION = 0x0000_0004;
        /// Enables permission assertion, bypassing stack walks
        const SECURITY_FLAG_ASSERTION = 0x0000_0001;
        /// Enables execution of unsafe or unverified code
        const SECURITY_FLAG_UNSAFE_CODE = 0x0000_0020;
        /// Enables creation and control of application domains
        const SECURITY_FLAG_CONTROL_APPDOMAINS = 0x0000_1000;
        /// Enables modification of security policy
        const SECURITY_FLAG_CONTROL_POLICY = 0x0000_0800;
        /// Enables serialization and deserialization
        const SECURITY_FLAG_SERIALIZATION = 0x0000_0080;
        /// Enables control over threads
        const SECURITY_FLAG_CONTROL_THREAD = 0x0000_0200;
        /// Enables manipulation of security evidence
        const SECURITY_FLAG_CONTROL_EVIDENCE = 0x0000_0040;
        /// Enables control over security principal objects
        const SECURITY_FLAG_CONTROL_PRINCIPAL = 0x0000_0400;
        /// Enables access to security infrastructure
        const SECURITY_FLAG_INFRASTRUCTURE = 0x0000_2000;
        /// Enables assembly binding redirects
        const SECURITY_FLAG_BINDING = 0x0000_0100;
        /// Enables .NET remoting configuration
        const SECURITY_FLAG_REMOTING = 0x0000_4000;
        /// Enables control over application domain behavior
        const SECURITY_FLAG_CONTROL_DOMAIN = 0x0000_8000;
        /// Enables reflection over non-public members
        const SECURITY_FLAG_REFLECTION = 0x0001_0000;
    }
}
