//! Assistant service backends.

pub mod assistants;
pub mod shared;

pub use assistants::{AssistantsClient, AssistantsConfig, Backend, UploadedFile};
pub use shared::{
    EventStream, ProviderError, ProviderErrorKind, ProviderResult, USER_AGENT, validate_url,
};
