//! Line and password prompts. Prompts are written to stderr.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

/// Reads one line from stdin. Returns `None` at end of input.
pub fn read_line(prompt: &str) -> Result<Option<String>> {
    show_prompt(prompt)?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Reads a password without echoing it.
///
/// Falls back to [`read_line`] when stdin is not a terminal. Returns `None`
/// at end of input or on Ctrl+C / Ctrl+D.
pub fn read_password(prompt: &str) -> Result<Option<String>> {
    if !io::stdin().is_terminal() {
        return read_line(prompt);
    }
    show_prompt(prompt)?;

    let password = {
        let _raw = RawModeGuard::enable()?;
        read_hidden()?
    };
    eprintln!();
    Ok(password)
}

fn show_prompt(prompt: &str) -> Result<()> {
    let mut err = io::stderr();
    write!(err, "{prompt}").context("Failed to write prompt")?;
    err.flush().context("Failed to write prompt")?;
    Ok(())
}

fn read_hidden() -> Result<Option<String>> {
    let mut password = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event::read().context("Failed to read key")?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => return Ok(Some(password)),
            KeyCode::Char('c' | 'd') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(None);
            }
            KeyCode::Backspace => {
                password.pop();
            }
            KeyCode::Char(c) => password.push(c),
            _ => {}
        }
    }
}

/// Restores cooked mode when dropped, including on error paths.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}
