//! Value objects of the customer aggregate.
//!
//! Every value object has a validating constructor for raw input (`build`,
//! or `generate` for derived values) and a non-validating `rebuild` for
//! values read back from storage, which were validated when first built.

use accounts_events::{Error, Result};
use sha2::{Digest, Sha256};

pub use accounts_id::CustomerId;

// =============================================================================
// Email Address
// =============================================================================

/// A syntactically valid email address, normalized to lower case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validates and normalizes raw input.
    ///
    /// Requires a non-empty local part, a single `@` and a domain made of at
    /// least two non-empty dot-separated labels. Whitespace is rejected.
    pub fn build(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(Error::input_invalid("email address must not be empty"));
        }
        if !is_well_formed_email(&normalized) {
            return Err(Error::input_invalid(format!(
                "email address '{normalized}' has an invalid format"
            )));
        }
        Ok(Self(normalized))
    }

    pub fn rebuild(stored: impl Into<String>) -> Self {
        Self(stored.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_well_formed_email(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let mut labels = domain.split('.');
    let label_count = labels.clone().count();
    label_count >= 2 && labels.all(|label| !label.is_empty())
}

// =============================================================================
// Confirmation Secret & Hash
// =============================================================================

/// Process-wide secret mixed into every confirmation hash.
#[derive(Clone)]
pub struct ConfirmationSecret(String);

impl ConfirmationSecret {
    pub fn build(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(Error::input_invalid("confirmation secret must not be empty"));
        }
        Ok(Self(raw))
    }
}

impl std::fmt::Debug for ConfirmationSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ConfirmationSecret(<redacted>)")
    }
}

/// Proof of control over an email address.
///
/// Derived deterministically from the address and the process-wide secret,
/// so it can be recomputed instead of being stored as a second secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfirmationHash(String);

impl ConfirmationHash {
    /// Derives the hash for `email_address`.
    pub fn generate(email_address: &EmailAddress, secret: &ConfirmationSecret) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.0.as_bytes());
        hasher.update([0u8]);
        hasher.update(email_address.as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Accepts a hash supplied by a caller.
    pub fn build(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::input_invalid("confirmation hash must not be empty"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn rebuild(stored: impl Into<String>) -> Self {
        Self(stored.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfirmationHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Person Name
// =============================================================================

/// Given and family name of a customer, both trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersonName {
    given_name: String,
    family_name: String,
}

impl PersonName {
    pub fn build(given_name: &str, family_name: &str) -> Result<Self> {
        let given_name = given_name.trim();
        let family_name = family_name.trim();

        match (given_name.is_empty(), family_name.is_empty()) {
            (true, true) => Err(Error::input_invalid(
                "given name and family name must not be empty",
            )),
            (true, false) => Err(Error::input_invalid("given name must not be empty")),
            (false, true) => Err(Error::input_invalid("family name must not be empty")),
            (false, false) => Ok(Self {
                given_name: given_name.to_string(),
                family_name: family_name.to_string(),
            }),
        }
    }

    pub fn rebuild(given_name: impl Into<String>, family_name: impl Into<String>) -> Self {
        Self {
            given_name: given_name.into(),
            family_name: family_name.into(),
        }
    }

    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }
}

impl std::fmt::Display for PersonName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.given_name, self.family_name)
    }
}
