//! Chat core: events, the relay that renders them, and session state.

pub mod annotations;
pub mod events;
pub mod relay;
pub mod session;
pub mod transcript;
pub mod view;

pub use annotations::{AnnotationFormatter, CitationFormatter, mask_links};
pub use events::{AssistantEvent, GeneratedFile};
pub use relay::{TurnContext, TurnSummary, relay_stream};
pub use session::{ChatSession, Download, TurnOutcome};
pub use transcript::{Speaker, Transcript, TranscriptEntry};
pub use view::{ChatView, PlaceholderId};
