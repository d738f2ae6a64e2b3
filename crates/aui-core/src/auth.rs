//! Login credentials and password verification.
//!
//! Credentials live in a secrets file shaped like:
//!
//! ```toml
//! [credentials.usernames.alice]
//! name = "Alice"
//! password = "$2b$12$..."   # bcrypt hash
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// One login, immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub display_name: String,
    /// bcrypt hash in modular crypt format (salt and cost embedded).
    pub password_hash: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    credentials: CredentialsSection,
}

#[derive(Debug, Deserialize)]
struct CredentialsSection {
    #[serde(default)]
    usernames: BTreeMap<String, RawCredential>,
}

#[derive(Debug, Deserialize)]
struct RawCredential {
    name: String,
    password: String,
}

/// Username-keyed credential lookup.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    records: HashMap<String, Credential>,
}

impl CredentialStore {
    /// Loads credentials from a secrets file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read secrets from {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse secrets from {}", path.display()))
    }

    /// Parses the `credentials.usernames` table of a secrets document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let secrets: SecretsFile = toml::from_str(contents)?;
        let records = secrets
            .credentials
            .usernames
            .into_iter()
            .map(|(username, raw)| {
                let record = Credential {
                    username: username.clone(),
                    display_name: raw.name,
                    password_hash: raw.password.into_bytes(),
                };
                (username, record)
            })
            .collect();
        Ok(Self { records })
    }

    /// Builds a store from already-constructed records.
    pub fn from_records(records: impl IntoIterator<Item = Credential>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.username.clone(), r))
                .collect(),
        }
    }

    pub fn get(&self, username: &str) -> Option<&Credential> {
        self.records.get(username)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Checks `password` against the stored hash for `username`.
///
/// Unknown users, wrong passwords and unreadable hashes all yield `false`.
pub fn authenticate(username: &str, password: &str, store: &CredentialStore) -> bool {
    let Some(record) = store.get(username) else {
        tracing::debug!(username, "login for unknown user");
        return false;
    };

    let Ok(hash) = std::str::from_utf8(&record.password_hash) else {
        tracing::warn!(username, "stored password hash is not valid UTF-8");
        return false;
    };

    match bcrypt::verify(password, hash) {
        Ok(matched) => matched,
        Err(err) => {
            tracing::warn!(username, error = %err, "stored password hash is malformed");
            false
        }
    }
}
