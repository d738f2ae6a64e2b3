//! Exec command handler.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use aui_core::auth::CredentialStore;
use aui_core::config::Config;
use aui_core::core::ChatSession;

use crate::modes::{self, PlainView, TurnView, login};

pub struct ExecRunOptions<'a> {
    pub config: &'a Config,
    pub secrets: &'a Path,
    pub prompt: &'a str,
    pub files: &'a [PathBuf],
    pub username: Option<&'a str>,
}

pub async fn run(options: ExecRunOptions<'_>) -> Result<()> {
    if options.config.authentication_required {
        let Some(username) = options.username else {
            bail!("Authentication is required; pass --username");
        };
        let store = CredentialStore::load(options.secrets)?;
        login::once(&store, username)?;
    }

    let mut session = ChatSession::from_config(options.config)?;
    for path in options.files {
        let file = session.attach(path).await?;
        tracing::info!(file_id = %file.file_id, "attached {}", file.file_name);
    }

    // Assistant output → stdout; prompts, downloads and errors → stderr.
    let mut view = PlainView::new(io::stdout());
    let result = session.send(&mut view, options.prompt).await;
    view.finish_turn();

    let outcome = result.context("execute prompt")?;
    modes::report_downloads(&outcome.downloads);
    Ok(())
}
