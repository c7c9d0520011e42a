//! Bind (authentication) decisions.

use crate::config::AccessConfig;
use crate::credential;
use crate::error::ResultCode;
use crate::snapshot::Snapshot;
use log::debug;

/// Attribute holding the stored password.
pub const PASSWORD_ATTRIBUTE: &str = "userpassword";

/// Decides simple binds against the users of a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindHandler {
    access: AccessConfig,
}

impl BindHandler {
    pub fn new(access: AccessConfig) -> Self {
        Self { access }
    }

    /// Authenticate `dn` with `credential`.
    ///
    /// Only user entries can bind and the DN must match exactly (modulo case
    /// and spacing). On success the protocol engine marks the connection as
    /// bound; nothing else changes.
    pub fn bind(&self, snapshot: &Snapshot, dn: &str, credential: &str) -> Result<(), ResultCode> {
        let Some(user) = snapshot.user(dn) else {
            debug!("Bind rejected: no user '{}'", dn);
            return Err(if self.access.hide_unknown_bind_dn {
                ResultCode::InsufficientAccess
            } else {
                ResultCode::NoSuchObject
            });
        };

        let stored = user.values(PASSWORD_ATTRIBUTE);
        if stored.is_empty() {
            debug!("Bind rejected: '{}' has no {}", user.dn, PASSWORD_ATTRIBUTE);
            return Err(ResultCode::NoSuchAttribute);
        }

        // An empty password would be an unauthenticated bind.
        if credential.is_empty() {
            debug!("Bind rejected: empty credential for '{}'", user.dn);
            return Err(ResultCode::InvalidCredentials);
        }

        if stored
            .iter()
            .any(|value| credential::verify(value, credential))
        {
            debug!("Bind accepted for '{}'", user.dn);
            Ok(())
        } else {
            debug!("Bind rejected: invalid credentials for '{}'", user.dn);
            Err(ResultCode::InvalidCredentials)
        }
    }
}
