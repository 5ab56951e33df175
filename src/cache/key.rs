//! Cache keys: tenant id plus a content hash of the report spec.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::spec::ReportSpec;

/// SHA-256 of a value's JSON serialization, as 64 lowercase hex chars.
///
/// Struct fields serialize in declaration order, so the hash is stable for a
/// given value. Array order is significant.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(format!("{:x}", Sha256::digest(&json)))
}

/// Key of a cached result: `{tenant}:{sha256(spec)}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    tenant: String,
    digest: String,
}

impl CacheKey {
    pub fn new(tenant: &str, spec: &ReportSpec) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tenant: tenant.to_string(),
            digest: compute_hash(spec)?,
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tenant, self.digest)
    }
}
