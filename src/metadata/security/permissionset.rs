use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt;

use crate::{
    file::parser::Parser,
    metadata::security::{
        security_classes, ArgumentType, ArgumentValue, NamedArgument, Permission,
        PermissionSetFormat, SecurityPermissionFlags,
    },
    Error::OutOfBounds,
    Result,
};

/// A parsed permission set, the payload of one declarative security record.
///
/// Two serializations occur in the wild: the legacy .NET Framework binary format
/// (starting with a `.` marker) and an XML document (starting with `<`). Both are
/// decoded into a uniform list of [`Permission`] entries; payloads in neither
/// format are kept raw with an [`PermissionSetFormat::Unknown`] tag rather than
/// rejected, so unusual modules still load.
#[derive(Debug, Clone)]
pub struct PermissionSet {
    /// The detected serialization format
    format: PermissionSetFormat,
    /// The decoded permissions
    permissions: Vec<Permission>,
    /// The raw payload bytes as stored in the blob heap
    data: Vec<u8>,
}

impl PermissionSet {
    /// Parses a permission set payload.
    ///
    /// # Arguments
    /// * `data` - The raw payload bytes
    ///
    /// # Errors
    /// Returns an error if the payload is empty or a recognized format fails to
    /// parse.
    pub fn new(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(malformed_error!("Permission set payload is empty"));
        }

        let (format, permissions) = match data[0] {
            // '.' - binary format marker
            0x2E => Self::parse_binary_format(data)?,
            // '<' - XML document
            0x3C => Self::parse_xml_format(data)?,
            _ => (PermissionSetFormat::Unknown, Vec::new()),
        };

        Ok(PermissionSet {
            format,
            permissions,
            data: data.to_vec(),
        })
    }

    /// Parses the legacy binary format.
    ///
    /// Layout after the `.` marker:
    /// - permission count (compressed integer)
    /// - per permission:
    ///   - class name length (compressed integer) and UTF-8 class name
    ///   - property blob length (compressed integer)
    ///   - property count (compressed integer)
    ///   - per property: a `0x54` field marker, the type code, the name as a
    ///     length-prefixed string, and the value in type-specific encoding
    fn parse_binary_format(data: &[u8]) -> Result<(PermissionSetFormat, Vec<Permission>)> {
        let mut parser = Parser::new(data);
        parser.advance()?;

        let permission_count = parser.read_compressed_uint()? as usize;
        let mut permissions = Vec::with_capacity(permission_count);
        for _ in 0..permission_count {
            let class_name = Self::read_counted_string(&mut parser, data)?;
            let assembly_name = Self::assembly_for_class(&class_name);

            let blob_length = parser.read_compressed_uint()? as usize;
            let mut named_arguments = Vec::new();
            if blob_length > 0 {
                let Some(blob_end) = blob_length.checked_add(parser.pos()) else {
                    return Err(malformed_error!(
                        "Property blob end overflow - {} + {}",
                        blob_length,
                        parser.pos()
                    ));
                };

                if blob_end > data.len() {
                    return Err(malformed_error!(
                        "Property blob end {} exceeds payload length {}",
                        blob_end,
                        data.len()
                    ));
                }

                let property_count = parser.read_compressed_uint()? as usize;
                for _ in 0..property_count {
                    // 0x54 field/property marker
                    let _ = parser.read_le::<u8>()?;

                    let prop_type = parser.read_le::<u8>()?;
                    let name = Self::read_counted_string(&mut parser, data)?;
                    let (arg_type, value) = Self::parse_argument_value(&mut parser, prop_type)?;

                    named_arguments.push(NamedArgument {
                        name,
                        arg_type,
                        value,
                    });
                }

                // Skip unconsumed blob bytes; blob_end may coincide with the payload end
                if parser.pos() < blob_end {
                    parser.advance_by(blob_end - parser.pos())?;
                }
            }

            permissions.push(Permission {
                class_name,
                assembly_name,
                named_arguments,
            });
        }

        Ok((PermissionSetFormat::BinaryLegacy, permissions))
    }

    /// Parses the XML format: a `PermissionSet` document whose `IPermission`
    /// elements carry the class in a `class` attribute and the property
    /// assignments as further attributes.
    fn parse_xml_format(data: &[u8]) -> Result<(PermissionSetFormat, Vec<Permission>)> {
        let mut reader = Reader::from_reader(data);
        let mut buf = Vec::new();
        let mut permissions = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(element) | Event::Empty(element))
                    if element.name().as_ref() == b"IPermission" =>
                {
                    let mut class_name = String::new();
                    let mut assembly_name = "Unknown".to_string();
                    let mut named_arguments = Vec::new();

                    for attribute in element.attributes() {
                        let attribute = attribute.map_err(|e| {
                            malformed_error!("Invalid XML permission attribute - {}", e)
                        })?;
                        let value = attribute.unescape_value().map_err(|e| {
                            malformed_error!("Invalid XML attribute value - {}", e)
                        })?;

                        match attribute.key.as_ref() {
                            b"class" => {
                                // "Full.Class.Name, Assembly, Version=..., ..."
                                let mut parts = value.splitn(2, ',');
                                class_name = parts.next().unwrap_or_default().trim().to_string();
                                if let Some(rest) = parts.next() {
                                    if let Some(assembly) = rest.split(',').next() {
                                        assembly_name = assembly.trim().to_string();
                                    }
                                }
                            }
                            b"version" => {}
                            key => {
                                let name = String::from_utf8_lossy(key).to_string();
                                let (arg_type, arg_value) = match value.as_ref() {
                                    "true" => (ArgumentType::Boolean, ArgumentValue::Boolean(true)),
                                    "false" => {
                                        (ArgumentType::Boolean, ArgumentValue::Boolean(false))
                                    }
                                    other => (
                                        ArgumentType::String,
                                        ArgumentValue::String(other.to_string()),
                                    ),
                                };
                                named_arguments.push(NamedArgument {
                                    name,
                                    arg_type,
                                    value: arg_value,
                                });
                            }
                        }
                    }

                    permissions.push(Permission {
                        class_name,
                        assembly_name,
                        named_arguments,
                    });
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(malformed_error!("Invalid XML permission set - {}", e)),
            }

            buf.clear();
        }

        Ok((PermissionSetFormat::Xml, permissions))
    }

    /// Reads a string stored as a compressed length followed by UTF-8 bytes.
    fn read_counted_string(parser: &mut Parser, data: &[u8]) -> Result<String> {
        let length = parser.read_compressed_uint()? as usize;
        if length == 0 {
            return Ok(String::new());
        }

        let start = parser.pos();
        let Some(end) = start.checked_add(length) else {
            return Err(OutOfBounds);
        };
        if end > data.len() {
            return Err(OutOfBounds);
        }

        parser.advance_by(length)?;
        Ok(String::from_utf8_lossy(&data[start..end]).to_string())
    }

    /// Maps a permission class name to the assembly that defines it. The binary
    /// format stores only the class name, so this is a heuristic over the
    /// well-known framework namespaces.
    fn assembly_for_class(class_name: &str) -> String {
        if class_name.starts_with("System.Security.") || class_name.starts_with("System.Net.") {
            "mscorlib".to_string()
        } else if class_name.starts_with("System.Data.") {
            "System.Data".to_string()
        } else if class_name.starts_with("System.Xml.") {
            "System.Xml".to_string()
        } else {
            "Unknown".to_string()
        }
    }

    /// Decodes one property value according to its serialization type code.
    fn parse_argument_value(
        parser: &mut Parser,
        arg_type: u8,
    ) -> Result<(ArgumentType, ArgumentValue)> {
        match arg_type {
            // ELEMENT_TYPE_BOOLEAN
            0x02 => {
                let value = parser.read_le::<u8>()? != 0;
                Ok((ArgumentType::Boolean, ArgumentValue::Boolean(value)))
            }
            // ELEMENT_TYPE_I4
            0x04 => {
                let value = parser.read_compressed_int()?;
                Ok((ArgumentType::Int32, ArgumentValue::Int32(value)))
            }
            // ELEMENT_TYPE_STRING
            0x0E => {
                let value = parser.read_prefixed_string_utf8()?;
                Ok((ArgumentType::String, ArgumentValue::String(value)))
            }
            _ => Err(malformed_error!("Unknown argument type: {}", arg_type)),
        }
    }

    /// The detected serialization format.
    #[must_use]
    pub fn format(&self) -> &PermissionSetFormat {
        &self.format
    }

    /// All decoded permissions in declaration order.
    #[must_use]
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// The raw payload bytes this set was decoded from.
    #[must_use]
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// True if the set contains a permission of the given class.
    #[must_use]
    pub fn contains_permission(&self, class_name: &str) -> bool {
        self.permissions.iter().any(|p| p.class_name == class_name)
    }

    /// Looks up a permission by its class name.
    #[must_use]
    pub fn get_permission(&self, class_name: &str) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.class_name == class_name)
    }

    /// True if any permission in the set is unrestricted.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.permissions.iter().any(Permission::is_unrestricted)
    }

    /// True if the set contains file IO permissions.
    #[must_use]
    pub fn has_file_io(&self) -> bool {
        self.contains_permission(security_classes::FILE_IO_PERMISSION)
    }

    /// True if the set contains registry permissions.
    #[must_use]
    pub fn has_registry(&self) -> bool {
        self.contains_permission(security_classes::REGISTRY_PERMISSION)
    }

    /// True if the set contains reflection permissions.
    #[must_use]
    pub fn has_reflection(&self) -> bool {
        self.contains_permission(security_classes::REFLECTION_PERMISSION)
    }

    /// True if the set contains environment variable permissions.
    #[must_use]
    pub fn has_environment(&self) -> bool {
        self.contains_permission(security_classes::ENVIRONMENT_PERMISSION)
    }

    /// Heuristic for an effectively full-trust grant: an unrestricted
    /// `SecurityPermission`, a flag combination that subverts verification and
    /// policy, or several unrestricted critical permissions at once.
    #[must_use]
    pub fn is_full_trust(&self) -> bool {
        if let Some(permission) = self.get_permission(security_classes::SECURITY_PERMISSION) {
            if permission.is_unrestricted() {
                return true;
            }

            let flags = permission.get_security_flags();
            if flags.is_all() {
                return true;
            }

            if flags.contains(
                SecurityPermissionFlags::SECURITY_FLAG_SKIP_VERIFICATION
                    | SecurityPermissionFlags::SECURITY_FLAG_CONTROL_POLICY
                    | SecurityPermissionFlags::SECURITY_FLAG_CONTROL_EVIDENCE,
            ) {
                return true;
            }
        }

        let critical_unrestricted = [
            security_classes::SECURITY_PERMISSION,
            security_classes::FILE_IO_PERMISSION,
            security_classes::REFLECTION_PERMISSION,
            security_classes::REGISTRY_PERMISSION,
        ]
        .iter()
        .filter(|class| {
            self.get_permission(class)
                .is_some_and(Permission::is_unrestricted)
        })
        .count();

        critical_unrestricted >= 3
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.format == PermissionSetFormat::Xml {
            write!(f, "{}", String::from_utf8_lossy(&self.data))
        } else {
            writeln!(f, "Permission Set ({:?}):", self.format)?;

            for permission in &self.permissions {
                writeln!(
                    f,
                    "\t - {}, Assembly: {}",
                    permission.class_name, permission.assembly_name
                )?;

                for arg in &permission.named_arguments {
                    writeln!(f, "\t  * {} = {}", arg.name, arg.value)?;
                }
            }

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_with_class(class_name: &[u8]) -> Vec<u8> {
        let mut data = vec![b'.', 0x01];
        data.push(class_name.len() as u8);
        data.extend_from_slice(class_name);
        data
    }

    #[test]
    fn empty_payload_rejected() {
        assert!(PermissionSet::new(&[]).is_err());
    }

    #[test]
    fn unknown_format_kept_raw() {
        let permission_set = PermissionSet::new(b"\xFF\x00\x01\x02").unwrap();
        assert!(matches!(
            permission_set.format(),
            PermissionSetFormat::Unknown
        ));
        assert!(permission_set.permissions().is_empty());
        assert_eq!(permission_set.raw_data(), b"\xFF\x00\x01\x02");
    }

    #[test]
    fn binary_empty_set() {
        let permission_set = PermissionSet::new(b".\x00").unwrap();
        assert!(matches!(
            permission_set.format(),
            PermissionSetFormat::BinaryLegacy
        ));
        assert!(permission_set.permissions().is_empty());
    }

    #[test]
    fn binary_assembly_heuristic() {
        let mut data = vec![b'.', 0x03];
        for class_name in [
            b"System.Data.SqlClient.SqlPermission".as_slice(),
            b"System.Xml.XmlPermission".as_slice(),
            b"System.Net.NetworkInformation.NetworkInformationPermission".as_slice(),
        ] {
            data.push(class_name.len() as u8);
            data.extend_from_slice(class_name);
            data.push(0x00);
        }

        let permission_set = PermissionSet::new(&data).unwrap();
        assert_eq!(permission_set.permissions().len(), 3);
        assert_eq!(permission_set.permissions()[0].assembly_name, "System.Data");
        assert_eq!(permission_set.permissions()[1].assembly_name, "System.Xml");
        assert_eq!(permission_set.permissions()[2].assembly_name, "mscorlib");
    }

    #[test]
    fn binary_with_properties() {
        let mut data = binary_with_class(b"System.Security.Permissions.SecurityPermission");

        let blob_start = data.len() + 1;
        data.push(0x00); // blob length placeholder

        data.push(0x02); // 2 properties

        data.push(0x54); // field marker
        data.push(0x02); // boolean
        data.push(12);
        data.extend_from_slice(b"Unrestricted");
        data.push(0x01); // true

        data.push(0x54);
        data.push(0x04); // int32
        data.push(5);
        data.extend_from_slice(b"Flags");
        data.push(0x0E); // 7 as compressed signed int

        let blob_length = data.len() - blob_start;
        data[blob_start - 1] = blob_length as u8;

        let permission_set = PermissionSet::new(&data).unwrap();
        let permission = &permission_set.permissions()[0];
        assert_eq!(permission.named_arguments.len(), 2);
        assert_eq!(permission.named_arguments[0].name, "Unrestricted");
        assert!(matches!(
            permission.named_arguments[0].value,
            ArgumentValue::Boolean(true)
        ));
        assert_eq!(permission.named_arguments[1].name, "Flags");
        assert!(matches!(
            permission.named_arguments[1].value,
            ArgumentValue::Int32(7)
        ));

        assert!(permission_set.is_unrestricted());
        assert!(permission_set.is_full_trust());
    }

    #[test]
    fn binary_string_property() {
        let mut data = binary_with_class(b"System.Security.Permissions.FileIOPermission");

        let blob_start = data.len() + 1;
        data.push(0x00);

        data.push(0x01);
        data.push(0x54);
        data.push(0x0E); // string
        data.push(4);
        data.extend_from_slice(b"Read");
        data.push(7);
        data.extend_from_slice(b"C:\\temp");

        let blob_length = data.len() - blob_start;
        data[blob_start - 1] = blob_length as u8;

        let permission_set = PermissionSet::new(&data).unwrap();
        assert!(permission_set.has_file_io());
        let argument = &permission_set.permissions()[0].named_arguments[0];
        assert_eq!(argument.name, "Read");
        assert!(matches!(argument.value, ArgumentValue::String(ref s) if s == "C:\\temp"));
    }

    #[test]
    fn binary_unknown_property_type_rejected() {
        let mut data = binary_with_class(b"TestPermission");

        let blob_start = data.len() + 1;
        data.push(0x00);

        data.push(0x01);
        data.push(0x54);
        data.push(0xFF); // unknown type code
        data.push(0x04);
        data.extend_from_slice(b"Test");

        let blob_length = data.len() - blob_start;
        data[blob_start - 1] = blob_length as u8;

        assert!(PermissionSet::new(&data).is_err());
    }

    #[test]
    fn binary_blob_with_trailing_padding() {
        let mut data = vec![b'.', 0x02];

        let class_name = b"System.Security.Permissions.SecurityPermission";
        data.push(class_name.len() as u8);
        data.extend_from_slice(class_name);
        // Property blob declares 3 bytes but holds no properties; the two
        // padding bytes after the count must be skipped to reach the next entry
        data.push(0x03);
        data.push(0x00);
        data.extend_from_slice(&[0xCC, 0xCC]);

        let second = b"System.Security.Permissions.RegistryPermission";
        data.push(second.len() as u8);
        data.extend_from_slice(second);
        data.push(0x00);

        let permission_set = PermissionSet::new(&data).unwrap();
        assert_eq!(permission_set.permissions().len(), 2);
        assert!(permission_set.has_registry());
    }

    #[test]
    fn binary_blob_exceeding_payload_rejected() {
        let mut data = binary_with_class(b"TestPermission");
        data.push(0x20); // blob length far past the payload end
        data.push(0x00);

        assert!(PermissionSet::new(&data).is_err());
    }

    #[test]
    fn binary_truncated_class_name_rejected() {
        assert!(PermissionSet::new(b".\x01\xFF").is_err());
    }

    #[test]
    fn xml_permissions_parsed() {
        let xml = br#"<PermissionSet class="System.Security.PermissionSet" version="1">
            <IPermission class="System.Security.Permissions.SecurityPermission, mscorlib, Version=2.0.0.0" version="1" Unrestricted="true"/>
            <IPermission class="System.Security.Permissions.FileIOPermission, mscorlib" version="1" Read="C:\data"/>
        </PermissionSet>"#;

        let permission_set = PermissionSet::new(xml).unwrap();
        assert!(matches!(permission_set.format(), PermissionSetFormat::Xml));
        assert_eq!(permission_set.permissions().len(), 2);

        let security = &permission_set.permissions()[0];
        assert_eq!(
            security.class_name,
            "System.Security.Permissions.SecurityPermission"
        );
        assert_eq!(security.assembly_name, "mscorlib");
        assert!(security.is_unrestricted());

        let file_io = &permission_set.permissions()[1];
        assert_eq!(
            file_io.class_name,
            "System.Security.Permissions.FileIOPermission"
        );
        let read = file_io.get_argument("Read").unwrap();
        assert!(matches!(read.value, ArgumentValue::String(ref s) if s == "C:\\data"));

        assert!(permission_set.is_unrestricted());
        assert!(permission_set.has_file_io());
    }

    #[test]
    fn xml_malformed_rejected() {
        // Opening tag never closed
        assert!(PermissionSet::new(b"<PermissionSet <bad").is_err());
    }

    #[test]
    fn full_trust_flag_combination() {
        let mut data = binary_with_class(b"System.Security.Permissions.SecurityPermission");

        let blob_start = data.len() + 1;
        data.push(0x00);

        data.push(0x01);
        data.push(0x54);
        data.push(0x0E);
        data.push(5);
        data.extend_from_slice(b"Flags");
        let value = b"SkipVerification, ControlPolicy, ControlEvidence";
        data.push(value.len() as u8);
        data.extend_from_slice(value);

        let blob_length = data.len() - blob_start;
        data[blob_start - 1] = blob_length as u8;

        let permission_set = PermissionSet::new(&data).unwrap();
        assert!(permission_set.is_full_trust());
        assert!(!permission_set.is_unrestricted());
    }

    #[test]
    fn restricted_set_is_not_full_trust() {
        let mut data = binary_with_class(b"System.Security.Permissions.FileIOPermission");
        data.push(0x00);

        let permission_set = PermissionSet::new(&data).unwrap();
        assert!(!permission_set.is_full_trust());
        assert!(!permission_set.is_unrestricted());
    }

    #[test]
    fn display_binary() {
        let mut data = binary_with_class(b"System.Security.Permissions.SecurityPermission");
        data.push(0x00);

        let rendered = PermissionSet::new(&data).unwrap().to_string();
        assert!(rendered.contains("Permission Set (BinaryLegacy):"));
        assert!(rendered
            .contains("System.Security.Permissions.SecurityPermission, Assembly: mscorlib"));
    }
}
