//! SQL for the five grant tables.
//!
//! Statements are rendered once per backend from the validated table names
//! and reused for every call.

pub(crate) mod access;
pub(crate) mod authorize;
pub(crate) mod client;
pub(crate) mod expiry;
pub(crate) mod refresh;

use crate::tables::TableNames;

/// Rendered statements for one table prefix.
#[derive(Debug)]
pub(crate) struct Queries {
    pub client: client::ClientQueries,
    pub authorize: authorize::AuthorizeQueries,
    pub access: access::AccessQueries,
    pub refresh: refresh::RefreshQueries,
    pub expiry: expiry::ExpiryQueries,
}

impl Queries {
    pub fn new(tables: &TableNames) -> Self {
        Self {
            client: client::ClientQueries::new(&tables.client),
            authorize: authorize::AuthorizeQueries::new(&tables.authorize),
            access: access::AccessQueries::new(&tables.access),
            refresh: refresh::RefreshQueries::new(&tables.refresh),
            expiry: expiry::ExpiryQueries::new(&tables.expires),
        }
    }
}
