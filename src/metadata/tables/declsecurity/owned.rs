use std::sync::{Arc, OnceLock};

use crate::{
    metadata::{
        lazy::LazyValue,
        security::{PermissionSet, Security, SecurityAction},
        streams::{Blob, BlobBuilder},
        tables::declsecurity::DeclSecurityRaw,
        tables::types::{CodedIndex, TableId},
        token::Token,
        typesystem::{AssemblyRc, MethodDefRc, TypeDefRc},
    },
    Error::TokenNotAssigned,
    Result,
};

/// Reference-counted [`DeclSecurity`]
pub type DeclSecurityRc = Arc<DeclSecurity>;

/// The element a security declaration is attached to.
#[derive(Clone)]
pub enum SecurityParent {
    /// Attached to a type definition
    Type(TypeDefRc),
    /// Attached to a method definition
    Method(MethodDefRc),
    /// Attached to the assembly manifest
    Assembly(AssemblyRc),
}

impl SecurityParent {
    /// The metadata token of the parent, if it has been assigned one.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        match self {
            SecurityParent::Type(parent) => parent.token(),
            SecurityParent::Method(parent) => parent.token(),
            SecurityParent::Assembly(parent) => parent.token(),
        }
    }

    /// Name of the parent, for diagnostics.
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            SecurityParent::Type(parent) => parent.full_name(),
            SecurityParent::Method(parent) => parent.name.clone(),
            SecurityParent::Assembly(parent) => parent.descriptor.name.clone(),
        }
    }
}

/// A decoded `DeclSecurity` entry.
///
/// The owner and the permission set payload are resolved lazily: reading the
/// table never touches the blob heap or the type system until one of the two is
/// actually requested, and each resolves at most once.
pub struct DeclSecurity {
    /// The 1-based row identifier, 0 for entries not yet placed in a table
    pub rid: u32,
    token: OnceLock<Token>,
    /// The security action of this declaration
    pub action: SecurityAction,
    parent: LazyValue<Option<SecurityParent>>,
    permission_set: LazyValue<Arc<PermissionSet>>,
}

impl DeclSecurity {
    /// Builds an owned entry from a raw row.
    ///
    /// # Arguments
    /// * `raw` - The decoded row
    /// * `get_parent` - Resolves the parent token to a loaded definition; invoked
    ///   at most once, when the parent is first requested
    /// * `blob` - The blob heap the permission set payload lives in
    #[must_use]
    pub fn from_raw<F>(raw: &DeclSecurityRaw, get_parent: F, blob: Arc<Vec<u8>>) -> DeclSecurityRc
    where
        F: Fn(Token) -> Option<SecurityParent> + Send + 'static,
    {
        let token = OnceLock::new();
        let _ = token.set(raw.token);

        // Row 0 in the coded index is the null reference
        let parent = if raw.parent.row == 0 {
            LazyValue::with_value(None)
        } else {
            let parent_token = raw.parent.token;
            LazyValue::new(move || {
                get_parent(parent_token).map(Some).ok_or_else(|| {
                    malformed_error!(
                        "DeclSecurity parent {} is not a loaded definition",
                        parent_token
                    )
                })
            })
        };

        let payload_index = raw.permission_set as usize;
        let permission_set = LazyValue::new(move || {
            let heap = Blob::from(&blob)?;
            let payload = heap.get(payload_index)?;
            Ok(Arc::new(PermissionSet::new(payload)?))
        });

        Arc::new(DeclSecurity {
            rid: raw.rid,
            token,
            action: SecurityAction::from(raw.action),
            parent,
            permission_set,
        })
    }

    /// Creates an entry not yet placed in a table.
    #[must_use]
    pub fn new(
        action: SecurityAction,
        parent: Option<SecurityParent>,
        permission_set: Arc<PermissionSet>,
    ) -> Self {
        DeclSecurity {
            rid: 0,
            token: OnceLock::new(),
            action,
            parent: LazyValue::with_value(parent),
            permission_set: LazyValue::with_value(permission_set),
        }
    }

    /// The metadata token, if this entry has been placed in a table.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.token.get().copied()
    }

    /// The parent this declaration is attached to, resolving it on first access.
    ///
    /// # Errors
    /// Returns an error if the recorded parent token does not resolve to a loaded
    /// definition.
    pub fn parent(&self) -> Result<Option<SecurityParent>> {
        self.parent.get()
    }

    /// The permission set, decoding the blob payload on first access.
    ///
    /// # Errors
    /// Returns an error if the blob index is invalid or the payload fails to
    /// parse.
    pub fn permission_set(&self) -> Result<Arc<PermissionSet>> {
        self.permission_set.get()
    }

    /// Replaces the parent, discarding a pending resolution.
    ///
    /// # Errors
    /// Returns an error if the internal lock is poisoned.
    pub fn set_parent(&self, parent: Option<SecurityParent>) -> Result<()> {
        self.parent.set(parent)
    }

    /// Replaces the permission set, discarding a pending decode.
    ///
    /// # Errors
    /// Returns an error if the internal lock is poisoned.
    pub fn set_permission_set(&self, permission_set: Arc<PermissionSet>) -> Result<()> {
        self.permission_set.set(permission_set)
    }

    /// Attaches this declaration's [`Security`] to its parent definition. Parents
    /// keep the first security applied to them; a parentless entry is a no-op.
    ///
    /// # Errors
    /// Returns an error if the parent or the permission set fails to resolve.
    pub fn apply(&self) -> Result<()> {
        let Some(parent) = self.parent.get()? else {
            return Ok(());
        };

        let security = Security {
            action: self.action,
            permission_set: self.permission_set.get()?,
        };

        match parent {
            SecurityParent::Type(target) => {
                let _ = target.security.set(security);
            }
            SecurityParent::Method(target) => {
                let _ = target.security.set(security);
            }
            SecurityParent::Assembly(target) => {
                let _ = target.security.set(security);
            }
        }

        Ok(())
    }

    /// Re-derives the raw row for this entry, admitting the payload into `blob`.
    ///
    /// The parent column comes from the parent's current token; an entry whose
    /// parent has not been assigned a token yet cannot be serialized. A
    /// parentless entry encodes the null coded index.
    ///
    /// # Errors
    /// Returns [`TokenNotAssigned`] if the parent has no token, or an error if
    /// the parent or permission set fails to resolve or the payload exceeds the
    /// blob size limit.
    pub fn to_raw(&self, blob: &mut BlobBuilder) -> Result<DeclSecurityRaw> {
        let parent = match self.parent.get()? {
            Some(parent) => {
                let Some(token) = parent.token() else {
                    return Err(TokenNotAssigned(parent.full_name()));
                };
                CodedIndex::from_token(token)?
            }
            None => CodedIndex::new(TableId::TypeDef, 0),
        };

        let permission_set = blob.admit(self.permission_set.get()?.raw_data())?;

        Ok(DeclSecurityRaw {
            rid: self.rid,
            token: Token::new(0x0E00_0000 + self.rid),
            offset: 0,
            action: u16::from(self.action),
            parent,
            permission_set,
        })
    }
}
