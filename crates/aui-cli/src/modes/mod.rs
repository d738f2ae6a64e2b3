//! Terminal input and output for the chat shell.
//!
//! - `terminal`: in-place repainting view for interactive terminals
//! - `plain`: buffered view for pipes and `exec`
//! - `prompt`/`login`: line, password and login prompts

pub mod login;
pub mod plain;
pub mod prompt;
pub mod terminal;

use aui_core::core::{ChatView, Download};
pub use plain::PlainView;
pub use terminal::TerminalView;

/// A chat view that is told when the assistant's turn is over.
pub trait TurnView: ChatView {
    fn finish_turn(&mut self);
}

/// Reports saved and failed downloads on stderr.
pub fn report_downloads(downloads: &[Download]) {
    for download in downloads {
        match download {
            Download::Saved { path, .. } => eprintln!("Saved {}", path.display()),
            Download::Failed { file, error } => {
                eprintln!("Could not download {}: {error}", file.file_name);
            }
        }
    }
}
