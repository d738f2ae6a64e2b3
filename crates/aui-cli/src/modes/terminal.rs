//! Interactive terminal view.
//!
//! Assistant messages are printed as blocks below the input line. The most
//! recently printed block is "live": re-rendering its placeholder moves the
//! cursor back over it and repaints it in place.

use std::io::Write;

use aui_core::core::{ChatView, PlaceholderId, Speaker};
use crossterm::cursor::MoveToPreviousLine;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use unicode_width::UnicodeWidthStr;

use super::TurnView;

const FALLBACK_WIDTH: u16 = 80;

#[derive(Debug, Clone, Copy)]
struct LiveBlock {
    placeholder: PlaceholderId,
    rows: u16,
}

pub struct TerminalView<W: Write> {
    out: W,
    /// Fixed width for tests; `None` queries the terminal.
    width: Option<u16>,
    live: Option<LiveBlock>,
    next_id: usize,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            width: None,
            live: None,
            next_id: 0,
        }
    }

    #[cfg(test)]
    fn with_width(out: W, width: u16) -> Self {
        Self {
            width: Some(width),
            ..Self::new(out)
        }
    }

    fn width(&self) -> u16 {
        self.width
            .or_else(|| crossterm::terminal::size().ok().map(|(cols, _)| cols))
            .filter(|&cols| cols > 0)
            .unwrap_or(FALLBACK_WIDTH)
    }

    /// Prints one block (header, content, blank line) and returns its height.
    fn print_block(&mut self, markdown: &str) -> u16 {
        let content = markdown.trim_end();
        let _ = queue!(
            self.out,
            Print(format!("{}\n", Speaker::Assistant.label().cyan().bold())),
            Print(format!("{content}\n\n"))
        );
        let _ = self.out.flush();
        rendered_rows(content, self.width()).saturating_add(2)
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn open_placeholder(&mut self, _speaker: Speaker) -> PlaceholderId {
        let id = PlaceholderId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn render(&mut self, placeholder: PlaceholderId, markdown: &str) {
        if let Some(live) = self.live
            && live.placeholder == placeholder
        {
            let _ = queue!(
                self.out,
                MoveToPreviousLine(live.rows),
                Clear(ClearType::FromCursorDown)
            );
        }
        let rows = self.print_block(markdown);
        self.live = Some(LiveBlock { placeholder, rows });
    }

    fn message(&mut self, speaker: Speaker, markdown: &str) {
        // The user's input line is already on screen.
        if speaker == Speaker::User {
            return;
        }
        self.print_block(markdown);
        self.live = None;
    }
}

impl<W: Write> TurnView for TerminalView<W> {
    fn finish_turn(&mut self) {
        self.live = None;
        let _ = self.out.flush();
    }
}

/// Number of terminal rows `text` occupies at `width` columns.
fn rendered_rows(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = text
        .split('\n')
        .map(|line| UnicodeWidthStr::width(line).div_ceil(width).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}
