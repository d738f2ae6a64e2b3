//! Interactive chat handler.

use std::io::{self, IsTerminal};
use std::path::Path;

use anyhow::Result;
use aui_core::auth::CredentialStore;
use aui_core::config::Config;
use aui_core::core::ChatSession;
use crossterm::style::Stylize;

use crate::modes::{self, PlainView, TerminalView, TurnView, login, prompt};

/// One line of chat input.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Empty,
    Quit,
    NewThread,
    Upload(Option<&'a str>),
    Help,
    Message(&'a str),
}

impl<'a> ChatInput<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let (command, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(c, a)| (c, a.trim()));

        match command {
            "" => ChatInput::Empty,
            "/quit" | "/exit" => ChatInput::Quit,
            "/new" => ChatInput::NewThread,
            "/upload" => ChatInput::Upload(Some(arg).filter(|a| !a.is_empty())),
            "/help" => ChatInput::Help,
            _ => ChatInput::Message(line),
        }
    }
}

pub async fn run(config: &Config, secrets: &Path) -> Result<()> {
    println!("{}\n", config.title.as_str().bold());

    if config.authentication_required {
        let store = CredentialStore::load(secrets)?;
        let name = login::interactive(&store)?;
        tracing::info!(user = %name, "logged in");
    }

    let mut session = ChatSession::from_config(config)?;
    let mut view: Box<dyn TurnView> = if io::stdout().is_terminal() {
        Box::new(TerminalView::new(io::stdout()))
    } else {
        Box::new(PlainView::new(io::stdout()))
    };
    print_help(config);

    while let Some(line) = prompt::read_line("> ")? {
        match ChatInput::parse(&line) {
            ChatInput::Empty => {}
            ChatInput::Quit => break,
            ChatInput::Help => print_help(config),
            ChatInput::NewThread => {
                session.new_thread();
                eprintln!("Started a new thread.");
            }
            ChatInput::Upload(None) => {
                eprintln!("{}: /upload <path>", config.file_upload_message);
            }
            ChatInput::Upload(Some(path)) => match session.attach(Path::new(path)).await {
                Ok(file) => eprintln!("Attached {} ({})", file.file_name, file.file_id),
                Err(e) => eprintln!("Error: {e:#}"),
            },
            ChatInput::Message(text) => {
                let result = session.send(view.as_mut(), text).await;
                view.finish_turn();
                match result {
                    Ok(outcome) => modes::report_downloads(&outcome.downloads),
                    // The turn is lost; the session continues.
                    Err(e) => eprintln!("Error: {e:#}"),
                }
            }
        }
    }

    Ok(())
}

fn print_help(config: &Config) {
    eprintln!(
        "Type a message and press Enter. Commands: /upload <path> ({}), /new, /help, /quit",
        config.file_upload_message
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_messages() {
        assert_eq!(ChatInput::parse("   "), ChatInput::Empty);
        assert_eq!(ChatInput::parse("/quit"), ChatInput::Quit);
        assert_eq!(ChatInput::parse("/exit"), ChatInput::Quit);
        assert_eq!(ChatInput::parse("/new"), ChatInput::NewThread);
        assert_eq!(ChatInput::parse("/help"), ChatInput::Help);
        assert_eq!(
            ChatInput::parse("/upload  data/sales.csv "),
            ChatInput::Upload(Some("data/sales.csv"))
        );
        assert_eq!(ChatInput::parse("/upload"), ChatInput::Upload(None));
        assert_eq!(
            ChatInput::parse(" plot the sales "),
            ChatInput::Message("plot the sales")
        );
    }
}
