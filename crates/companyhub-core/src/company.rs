//! The company entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Longest accepted company name, in characters.
pub const MAX_COMPANY_NAME_LEN: usize = 255;

/// A company as stored and cached.
///
/// Records are immutable values: an update produces a replacement record
/// with the same `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: Uuid,
    pub name: String,
}

impl CompanyRecord {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Returns a replacement record carrying `name`.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(self.id, name)
    }
}

/// Validates a company name supplied by a client.
pub fn validate_company_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CoreError::invalid_company_name("name must not be empty"));
    }
    if name.chars().count() > MAX_COMPANY_NAME_LEN {
        return Err(CoreError::invalid_company_name(format!(
            "name must be at most {MAX_COMPANY_NAME_LEN} characters"
        )));
    }
    Ok(())
}
