//! Plain output for pipes and `exec`.
//!
//! Nothing can be repainted, so placeholders are buffered and written once,
//! when a standalone message follows them or the turn ends. Only assistant
//! output is written; the user's input is already on screen (or is the
//! caller's own argument).

use std::io::Write;

use aui_core::core::{ChatView, PlaceholderId, Speaker};

use super::TurnView;

pub struct PlainView<W: Write> {
    out: W,
    open: Vec<(PlaceholderId, String)>,
    next_id: usize,
    wrote_any: bool,
}

impl<W: Write> PlainView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            open: Vec::new(),
            next_id: 0,
            wrote_any: false,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush_open(&mut self) {
        for (_, content) in std::mem::take(&mut self.open) {
            self.write_block(&content);
        }
    }

    fn write_block(&mut self, content: &str) {
        let content = content.trim_end();
        if content.is_empty() {
            return;
        }
        if self.wrote_any {
            let _ = writeln!(self.out);
        }
        let _ = writeln!(self.out, "{content}");
        let _ = self.out.flush();
        self.wrote_any = true;
    }
}

impl<W: Write> ChatView for PlainView<W> {
    fn open_placeholder(&mut self, _speaker: Speaker) -> PlaceholderId {
        let id = PlaceholderId::new(self.next_id);
        self.next_id += 1;
        self.open.push((id, String::new()));
        id
    }

    fn render(&mut self, placeholder: PlaceholderId, markdown: &str) {
        if let Some((_, content)) = self.open.iter_mut().find(|(id, _)| *id == placeholder) {
            markdown.clone_into(content);
        } else {
            // Already written; a late update becomes its own block.
            self.write_block(markdown);
        }
    }

    fn message(&mut self, speaker: Speaker, markdown: &str) {
        if speaker == Speaker::User {
            return;
        }
        self.flush_open();
        self.write_block(markdown);
    }
}

impl<W: Write> TurnView for PlainView<W> {
    fn finish_turn(&mut self) {
        self.flush_open();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(view: PlainView<Vec<u8>>) -> String {
        String::from_utf8(view.into_inner()).unwrap()
    }

    #[test]
    fn placeholder_is_written_once_with_final_content() {
        let mut view = PlainView::new(Vec::new());
        let id = view.open_placeholder(Speaker::Assistant);
        view.render(id, "Hel");
        view.render(id, "Hello world.");
        view.finish_turn();

        assert_eq!(output(view), "Hello world.\n");
    }

    #[test]
    fn messages_flush_earlier_placeholders_first() {
        let mut view = PlainView::new(Vec::new());
        let code = view.open_placeholder(Speaker::Assistant);
        view.render(code, "input");
        view.message(Speaker::Assistant, "output");
        view.finish_turn();

        assert_eq!(output(view), "input\n\noutput\n");
    }

    #[test]
    fn user_messages_and_empty_placeholders_are_skipped() {
        let mut view = PlainView::new(Vec::new());
        view.message(Speaker::User, "question");
        view.open_placeholder(Speaker::Assistant);
        view.finish_turn();

        assert_eq!(output(view), "");
    }
}
