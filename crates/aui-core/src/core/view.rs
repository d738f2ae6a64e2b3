//! Presentation seam between the relay and whatever draws the chat.

use crate::core::transcript::Speaker;

/// Handle to a chat message whose content can be rewritten in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaceholderId(usize);

impl PlaceholderId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Chat surface driven by the relay.
///
/// Content is markdown. `render` always replaces the whole placeholder
/// content; it never appends.
pub trait ChatView {
    /// Opens an empty chat message for `speaker` and returns its handle.
    fn open_placeholder(&mut self, speaker: Speaker) -> PlaceholderId;

    /// Replaces the content of an open placeholder.
    fn render(&mut self, placeholder: PlaceholderId, markdown: &str);

    /// Shows a complete, standalone chat message.
    fn message(&mut self, speaker: Speaker, markdown: &str);
}
