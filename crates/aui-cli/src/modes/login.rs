//! Login gate in front of the chat.

use anyhow::{Result, bail};
use aui_core::auth::{CredentialStore, authenticate};

use super::prompt;

pub const LOGIN_SUCCESS: &str = "Login successful!";
pub const LOGIN_FAILURE: &str = "Failed to authenticate.";

/// Prompts until a login succeeds and returns the user's display name.
/// End of input (or an empty username) aborts.
pub fn interactive(store: &CredentialStore) -> Result<String> {
    loop {
        let Some(username) = prompt::read_line("Username: ")? else {
            bail!("Login aborted");
        };
        let username = username.trim();
        if username.is_empty() {
            bail!("Login aborted");
        }
        let Some(password) = prompt::read_password("Password: ")? else {
            bail!("Login aborted");
        };

        if authenticate(username, &password, store) {
            println!("{LOGIN_SUCCESS}");
            return Ok(display_name(store, username));
        }
        tracing::info!(username, "login failed");
        eprintln!("{LOGIN_FAILURE}");
    }
}

/// Single attempt for a known username (used by `exec`).
pub fn once(store: &CredentialStore, username: &str) -> Result<String> {
    let Some(password) = prompt::read_password("Password: ")? else {
        bail!("Login aborted");
    };
    if !authenticate(username, &password, store) {
        bail!("{LOGIN_FAILURE}");
    }
    Ok(display_name(store, username))
}

fn display_name(store: &CredentialStore, username: &str) -> String {
    store
        .get(username)
        .map_or_else(|| username.to_string(), |c| c.display_name.clone())
}
