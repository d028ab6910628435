//! Composite schema identity.

use crate::error::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used in the canonical key form.
const KEY_SEPARATOR: char = '@';

/// The (name, vendor, version) triple identifying a loaded schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaIdentity {
    pub name: String,
    pub vendor: String,
    pub version: String,
}

impl SchemaIdentity {
    pub fn new(
        name: impl Into<String>,
        vendor: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vendor: vendor.into(),
            version: version.into(),
        }
    }

    /// Deterministic string form used as the registry map key.
    pub fn key(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.name,
            self.vendor,
            self.version,
            sep = KEY_SEPARATOR
        )
    }

    /// Reject empty components or components containing the key separator,
    /// either of which would make the canonical key ambiguous.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("vendor", &self.vendor),
            ("version", &self.version),
        ] {
            if value.is_empty() {
                return Err(SchemaError::config(format!(
                    "schema {} must not be empty",
                    field
                )));
            }
            if value.contains(KEY_SEPARATOR) {
                return Err(SchemaError::config(format!(
                    "schema {} {:?} must not contain '{}'",
                    field, value, KEY_SEPARATOR
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for SchemaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
