//! Admin credential guard.
//!
//! # Design
//! - One operator-configured secret; no built-in default.
//! - The presented value is compared verbatim in constant time.
//! - A successful check yields an [`Authorized`] proof that only this module can mint.

use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};

use subtle::ConstantTimeEq;

/// Proof that a request presented the admin credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorized {
    _private: (),
}

/// Outcome of a credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// The credential matched the configured secret.
    Authorized(Authorized),
    /// The credential was missing or did not match.
    Unauthorized,
}

/// Errors raised while constructing a [`CredentialGuard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// The configured secret was empty.
    EmptySecret,
}

impl Display for GuardError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySecret => formatter.write_str("admin secret must not be empty"),
        }
    }
}

impl Error for GuardError {}

/// Compares presented credentials against the configured admin secret.
#[derive(Clone)]
pub struct CredentialGuard {
    secret: Box<[u8]>,
}

impl Debug for CredentialGuard {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CredentialGuard")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl CredentialGuard {
    /// Build a guard for `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::EmptySecret`] when `secret` is empty.
    pub fn new(secret: impl Into<String>) -> Result<Self, GuardError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(GuardError::EmptySecret);
        }
        Ok(Self {
            secret: secret.into_bytes().into_boxed_slice(),
        })
    }

    /// Check `provided` against the secret without trimming or normalising it.
    #[must_use]
    pub fn authorize(&self, provided: &str) -> Authorization {
        if bool::from(provided.as_bytes().ct_eq(&self.secret)) {
            Authorization::Authorized(Authorized { _private: () })
        } else {
            Authorization::Unauthorized
        }
    }

    /// Check an optional credential; a missing one is treated like a wrong one.
    #[must_use]
    pub fn authorize_optional(&self, provided: Option<&str>) -> Authorization {
        provided.map_or(Authorization::Unauthorized, |value| self.authorize(value))
    }
}
