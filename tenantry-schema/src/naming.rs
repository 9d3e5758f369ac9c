//! Deterministic schema names and credentials.
//!
//! Every value here is a pure function of (tenant, module) plus static
//! settings, so repeated provisioning of the same binding reproduces the
//! same schema, user and password.

use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Longest identifier most engines accept.
pub const MAX_IDENTIFIER_LEN: usize = 63;

static INVALID_CHARS: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("[^a-z0-9_]+").expect("static pattern"));

/// Names and credentials for one binding's schema.
#[derive(Clone, PartialEq, Eq)]
pub struct SchemaIdentity {
    pub database: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for SchemaIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaIdentity")
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

fn sanitize(part: &str) -> String {
    let lowered = part.to_lowercase();
    INVALID_CHARS
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Length of the digest suffix carried by every schema name.
const DIGEST_LEN: usize = 8;

/// Schema name for `(tenant, module)`: `[prefix_]tenant_module_<digest>`,
/// lower-case `[a-z0-9_]`, never starting with a digit, at most 63
/// characters.
///
/// Sanitizing is lossy (`acme-shop` and `acme_shop` read the same, as do
/// `a_b`/`c` and `a`/`b_c`), so the suffix is taken from the raw tuple and
/// keeps distinct bindings on distinct schemas.
pub fn schema_name(prefix: Option<&str>, tenant: &str, module: &str) -> String {
    let prefix = prefix.unwrap_or_default();
    let mut parts = Vec::with_capacity(3);
    let cleaned = sanitize(prefix);
    if !cleaned.is_empty() {
        parts.push(cleaned);
    }
    parts.push(sanitize(tenant));
    parts.push(sanitize(module));
    let mut name = parts.join("_");

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 't');
    }

    let keep = MAX_IDENTIFIER_LEN - DIGEST_LEN - 1;
    if name.len() > keep {
        name.truncate(keep);
        name.truncate(name.trim_end_matches('_').len());
    }

    format!("{}_{}", name, tuple_digest(&[prefix, tenant, module]))
}

fn tuple_digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(DIGEST_LEN);
    digest
}

/// Password for `(tenant, module)`: hex SHA-256 of the NUL-separated
/// `tenant, module, salt` tuple, truncated to `length`.
pub fn derive_password(tenant: &str, module: &str, salt: &str, length: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant.as_bytes());
    hasher.update([0u8]);
    hasher.update(module.as_bytes());
    hasher.update([0u8]);
    hasher.update(salt.as_bytes());
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(length.min(hex.len()));
    hex
}

/// Full identity for a binding. The role name matches the schema name.
pub fn identity(
    prefix: Option<&str>,
    tenant: &str,
    module: &str,
    salt: &str,
    password_length: usize,
) -> SchemaIdentity {
    let database = schema_name(prefix, tenant, module);
    SchemaIdentity {
        user: database.clone(),
        password: derive_password(tenant, module, salt, password_length),
        database,
    }
}
