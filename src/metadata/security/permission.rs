use std::fmt;

use crate::metadata::security::{
    security_classes, ArgumentType, ArgumentValue, SecurityPermissionFlags,
};

/// A property assignment inside a serialized permission, e.g. `Unrestricted = true`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
    /// Name of the property being set
    pub name: String,
    /// Declared type of the property
    pub arg_type: ArgumentType,
    /// The assigned value
    pub value: ArgumentValue,
}

impl NamedArgument {
    /// Creates a new named argument.
    #[must_use]
    pub fn new(name: String, arg_type: ArgumentType, value: ArgumentValue) -> Self {
        NamedArgument {
            name,
            arg_type,
            value,
        }
    }
}

impl fmt::Display for NamedArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

/// A single permission within a permission set.
///
/// Identifies the .NET permission class being applied and carries the property
/// assignments that configure it.
#[derive(Debug, Clone, PartialEq)]
pub struct Permission {
    /// Full name of the permission class, e.g.
    /// `System.Security.Permissions.SecurityPermission`
    pub class_name: String,
    /// Name of the assembly defining the permission class
    pub assembly_name: String,
    /// The property assignments configuring this permission
    pub named_arguments: Vec<NamedArgument>,
}

impl Permission {
    /// Creates a new permission.
    #[must_use]
    pub fn new(
        class_name: String,
        assembly_name: String,
        named_arguments: Vec<NamedArgument>,
    ) -> Self {
        Permission {
            class_name,
            assembly_name,
            named_arguments,
        }
    }

    /// Looks up a named argument by property name.
    #[must_use]
    pub fn get_argument(&self, name: &str) -> Option<&NamedArgument> {
        self.named_arguments.iter().find(|arg| arg.name == name)
    }

    /// True if this permission has `Unrestricted = true` set.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        matches!(
            self.get_argument("Unrestricted"),
            Some(NamedArgument {
                value: ArgumentValue::Boolean(true),
                ..
            })
        )
    }

    /// True if this is an instance of the `SecurityPermission` class.
    #[must_use]
    pub fn is_security(&self) -> bool {
        self.class_name.starts_with(security_classes::SECURITY_PERMISSION)
    }

    /// True if this is an instance of the `FileIOPermission` class.
    #[must_use]
    pub fn is_file_io(&self) -> bool {
        self.class_name.starts_with(security_classes::FILE_IO_PERMISSION)
    }

    /// Extracts the `SecurityPermission` flags configured on this permission.
    ///
    /// Returns an empty flag set if this is not a `SecurityPermission` or no flags
    /// are set. The `Flags` property appears as an integer in binary format and as
    /// a comma-separated name list in XML.
    #[must_use]
    pub fn get_security_flags(&self) -> SecurityPermissionFlags {
        if !self.is_security() {
            return SecurityPermissionFlags::empty();
        }

        match self.get_argument("Flags").map(|arg| &arg.value) {
            Some(ArgumentValue::Int32(bits)) => SecurityPermissionFlags::from_bits_retain(*bits),
            Some(ArgumentValue::String(names)) => Self::parse_flags_from_string(names),
            _ => SecurityPermissionFlags::empty(),
        }
    }

    /// Parses a comma-separated list of `SecurityPermissionFlag` member names, as
    /// found in XML permission sets.
    #[must_use]
    pub fn parse_flags_from_string(names: &str) -> SecurityPermissionFlags {
        let mut flags = SecurityPermissionFlags::empty();

        for name in names.split(',') {
            match name.trim() {
                "AllFlags" => flags |= SecurityPermissionFlags::all(),
                "Execution" => flags |= SecurityPermissionFlags::SECURITY_FLAG_EXECUTION,
                "SkipVerification" => {
                    flags |= SecurityPermissionFlags::SECURITY_FLAG_SKIP_VERIFICATION;
                }
                "Assertion" => flags |= SecurityPermissionFlags::SECURITY_FLAG_ASSERTION,
                "UnmanagedCode" => flags |= SecurityPermissionFlags::SECURITY_FLAG_UNSAFE_CODE,
                "ControlAppDomain" => {
                    flags |= SecurityPermissionFlags::SECURITY_FLAG_CONTROL_APPDOMAINS;
                }
                "ControlPolicy" => flags |= SecurityPermissionFlags::SECURITY_FLAG_CONTROL_POLICY,
                "SerializationFormatter" => {
                    flags |= SecurityPermissionFlags::SECURITY_FLAG_SERIALIZATION;
                }
                "ControlThread" => flags |= SecurityPermissionFlags::SECURITY_FLAG_CONTROL_THREAD,
                "ControlEvidence" => {
                    flags |= SecurityPermissionFlags::SECURITY_FLAG_CONTROL_EVIDENCE;
                }
                "ControlPrincipal" => {
                    flags |= SecurityPermissionFlags::SECURITY_FLAG_CONTROL_PRINCIPAL;
                }
                "Infrastructure" => flags |= SecurityPermissionFlags::SECURITY_FLAG_INFRASTRUCTURE,
                "BindingRedirects" => flags |= SecurityPermissionFlags::SECURITY_FLAG_BINDING,
                "RemotingConfiguration" => {
                    flags |= SecurityPermissionFlags::SECURITY_FLAG_REMOTING;
                }
                _ => {}
            }
        }

        flags
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_name)?;
        if !self.named_arguments.is_empty() {
            write!(f, "(")?;
            for (i, arg) in self.named_arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn security_permission(args: Vec<NamedArgument>) -> Permission {
        Permission::new(
            security_classes::SECURITY_PERMISSION.to_string(),
            "mscorlib".to_string(),
            args,
        )
    }

    #[test]
    fn argument_lookup() {
        let permission = security_permission(vec![NamedArgument::new(
            "Flags".to_string(),
            ArgumentType::Int32,
            ArgumentValue::Int32(8),
        )]);

        assert!(permission.get_argument("Flags").is_some());
        assert!(permission.get_argument("Missing").is_none());
    }

    #[test]
    fn unrestricted_detection() {
        let unrestricted = security_permission(vec![NamedArgument::new(
            "Unrestricted".to_string(),
            ArgumentType::Boolean,
            ArgumentValue::Boolean(true),
        )]);
        assert!(unrestricted.is_unrestricted());

        let restricted = security_permission(vec![NamedArgument::new(
            "Unrestricted".to_string(),
            ArgumentType::Boolean,
            ArgumentValue::Boolean(false),
        )]);
        assert!(!restricted.is_unrestricted());
    }

    #[test]
    fn security_flags_from_int() {
        let permission = security_permission(vec![NamedArgument::new(
            "Flags".to_string(),
            ArgumentType::Int32,
            ArgumentValue::Int32(0x0000_0024),
        )]);

        let flags = permission.get_security_flags();
        assert!(flags.contains(SecurityPermissionFlags::SECURITY_FLAG_UNSAFE_CODE));
        assert!(flags.contains(SecurityPermissionFlags::SECURITY_FLAG_SKIP_VERIFICATION));
        assert!(!flags.contains(SecurityPermissionFlags::SECURITY_FLAG_EXECUTION));
    }

    #[test]
    fn security_flags_from_string() {
        let flags = Permission::parse_flags_from_string("Execution, UnmanagedCode");
        assert!(flags.contains(SecurityPermissionFlags::SECURITY_FLAG_EXECUTION));
        assert!(flags.contains(SecurityPermissionFlags::SECURITY_FLAG_UNSAFE_CODE));
    }

    #[test]
    fn flags_on_other_class_are_empty() {
        let permission = Permission::new(
            security_classes::FILE_IO_PERMISSION.to_string(),
            "mscorlib".to_string(),
            vec![NamedArgument::new(
                "Flags".to_string(),
                ArgumentType::Int32,
                ArgumentValue::Int32(0xFF),
            )],
        );
        assert!(permission.get_security_flags().is_empty());
    }

    #[test]
    fn display_format() {
        let permission = security_permission(vec![NamedArgument::new(
            "Unrestricted".to_string(),
            ArgumentType::Boolean,
            ArgumentValue::Boolean(true),
        )]);
        assert_eq!(
            permission.to_string(),
            "System.Security.Permissions.SecurityPermission(Unrestricted = true)"
        );
    }
}
