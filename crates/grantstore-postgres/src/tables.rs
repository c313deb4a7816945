//! Prefixed table names.
//!
//! The five grant tables share a configurable prefix so several stores can
//! live in one schema. The prefix is spliced into SQL text, so it is
//! restricted to ASCII letters, digits and underscores.

use std::fmt;

use crate::error::{PostgresError, Result};

/// A validated table prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePrefix(String);

impl TablePrefix {
    /// Validates a prefix.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty prefix or one containing
    /// anything other than `[A-Za-z0-9_]`.
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(PostgresError::config("table prefix must not be empty"));
        }
        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(PostgresError::config(format!(
                "table prefix '{prefix}' may only contain ASCII letters, digits and '_'"
            )));
        }
        Ok(Self(prefix))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TablePrefix {
    fn default() -> Self {
        Self("osin".into())
    }
}

impl fmt::Display for TablePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Names of the five grant tables for one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub client: String,
    pub authorize: String,
    pub access: String,
    pub refresh: String,
    pub expires: String,
}

impl TableNames {
    #[must_use]
    pub fn new(prefix: &TablePrefix) -> Self {
        Self {
            client: format!("{prefix}_client"),
            authorize: format!("{prefix}_authorize"),
            access: format!("{prefix}_access"),
            refresh: format!("{prefix}_refresh"),
            expires: format!("{prefix}_expires"),
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self::new(&TablePrefix::default())
    }
}
