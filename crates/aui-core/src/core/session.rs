//! One chat session: a thread on the assistant service plus its transcript.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::Config;
use crate::core::annotations::CitationFormatter;
use crate::core::events::GeneratedFile;
use crate::core::relay::{TurnContext, TurnSummary, relay_stream};
use crate::core::transcript::{Speaker, Transcript};
use crate::core::view::ChatView;
use crate::providers::{AssistantsClient, AssistantsConfig, UploadedFile};

/// Result of saving one generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
    Saved { file: GeneratedFile, path: PathBuf },
    Failed { file: GeneratedFile, error: String },
}

/// What a completed turn produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    pub summary: TurnSummary,
    pub downloads: Vec<Download>,
}

/// Chat session state. Only one turn runs at a time; `send` takes `&mut self`.
pub struct ChatSession {
    client: AssistantsClient,
    assistant_id: String,
    download_dir: PathBuf,
    thread_id: Option<String>,
    transcript: Transcript,
    formatter: CitationFormatter,
    pending_attachments: Vec<UploadedFile>,
}

impl ChatSession {
    pub fn new(
        client: AssistantsClient,
        assistant_id: impl Into<String>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            assistant_id: assistant_id.into(),
            download_dir: download_dir.into(),
            thread_id: None,
            transcript: Transcript::new(),
            formatter: CitationFormatter::new(),
            pending_attachments: Vec::new(),
        }
    }

    /// Builds a session from the effective configuration.
    ///
    /// # Errors
    /// Returns an error when the backend or assistant id is not configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let Some(assistant_id) = config.effective_assistant_id() else {
            bail!("No assistant configured. Set ASSISTANT_ID or assistant_id in config.toml");
        };
        let client = AssistantsClient::new(AssistantsConfig::from_config(config)?);
        Ok(Self::new(client, assistant_id, config.effective_download_dir()))
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Files that will be attached to the next message.
    pub fn pending_attachments(&self) -> &[UploadedFile] {
        &self.pending_attachments
    }

    /// Uploads a local file and queues it for the next message.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the upload fails.
    pub async fn attach(&mut self, path: &Path) -> Result<UploadedFile> {
        let contents = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());

        let uploaded = self
            .client
            .upload_file(&file_name, contents)
            .await
            .with_context(|| format!("Failed to upload {}", path.display()))?;

        self.formatter
            .remember_file(uploaded.file_id.clone(), uploaded.file_name.clone());
        self.pending_attachments.push(uploaded.clone());
        Ok(uploaded)
    }

    /// Drops the current thread and history; the next message starts fresh.
    pub fn new_thread(&mut self) {
        self.thread_id = None;
        self.transcript.reset();
        self.pending_attachments.clear();
    }

    /// Sends one user message and relays the assistant's streamed reply.
    ///
    /// # Errors
    /// Returns an error if any request fails or the stream reports a fault.
    /// Entries relayed before the fault stay in the transcript.
    pub async fn send<V>(&mut self, view: &mut V, text: &str) -> Result<TurnOutcome>
    where
        V: ChatView + ?Sized,
    {
        self.transcript.push(Speaker::User, text);
        view.message(Speaker::User, text);

        let thread_id = self.ensure_thread().await?;
        // Attachments stay queued until the service has accepted the message.
        self.client
            .add_message(&thread_id, text, &self.pending_attachments)
            .await
            .context("Failed to send message")?;
        self.pending_attachments.clear();

        let stream = self
            .client
            .stream_run(&thread_id, &self.assistant_id)
            .await
            .context("Failed to start run")?;

        let ctx = TurnContext::new(view, &mut self.transcript, &self.formatter);
        let summary = relay_stream(ctx, stream)
            .await
            .context("Assistant stream failed")?;

        if summary.dropped_deltas > 0 {
            tracing::warn!(
                dropped = summary.dropped_deltas,
                "text deltas arrived before their message started"
            );
        }
        tracing::debug!(entries = summary.entries_appended, "turn finished");

        let downloads = self.save_generated(&summary.generated_files).await;
        Ok(TurnOutcome { summary, downloads })
    }

    async fn ensure_thread(&mut self) -> Result<String> {
        if let Some(id) = &self.thread_id {
            return Ok(id.clone());
        }
        let id = self
            .client
            .create_thread()
            .await
            .context("Failed to create thread")?;
        self.thread_id = Some(id.clone());
        Ok(id)
    }

    /// Downloads generated files into the download directory.
    /// A failed download does not fail the turn.
    async fn save_generated(&self, files: &[GeneratedFile]) -> Vec<Download> {
        let mut downloads = Vec::with_capacity(files.len());
        for file in files {
            let outcome = match self.save_one(file).await {
                Ok(path) => Download::Saved {
                    file: file.clone(),
                    path,
                },
                Err(err) => {
                    tracing::warn!(file_id = %file.file_id, "download failed: {err:#}");
                    Download::Failed {
                        file: file.clone(),
                        error: format!("{err:#}"),
                    }
                }
            };
            downloads.push(outcome);
        }
        downloads
    }

    async fn save_one(&self, file: &GeneratedFile) -> Result<PathBuf> {
        let bytes = self.client.download_file(&file.file_id).await?;

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.download_dir.display()))?;
        let mut path = self.download_dir.join(safe_file_name(file));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            path = self.download_dir.join(suffixed_file_name(&path, &file.file_id));
        }
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!(path = %path.display(), "saved generated file");
        Ok(path)
    }
}

/// Keeps only the final path component so a name cannot escape the download dir.
fn safe_file_name(file: &GeneratedFile) -> String {
    Path::new(&file.file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "..")
        .unwrap_or_else(|| file.file_id.clone())
}

/// `name.ext` becomes `name-<file_id>.ext` so an earlier download is kept.
fn suffixed_file_name(path: &Path, file_id: &str) -> String {
    let stem = path
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    match path.extension() {
        Some(ext) => format!("{stem}-{file_id}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{file_id}"),
    }
}
