//! Assistants API client (OpenAI and Azure OpenAI deployments).

mod sse;
mod types;

use anyhow::{Result, bail};
use bytes::Bytes;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT as USER_AGENT_HEADER};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use self::sse::AssistantsSseParser;
pub use self::types::Attachment;
use self::types::{CreateMessageRequest, CreateRunRequest, FileObject, ThreadObject};
use crate::config::Config;
use crate::providers::shared::{USER_AGENT, validate_url};
use crate::providers::{EventStream, ProviderError, ProviderErrorKind, ProviderResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ASSISTANTS_BETA: &str = "assistants=v2";

/// Which deployment flavour the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    OpenAI,
    Azure { api_version: String },
}

/// Connection settings for the Assistants API.
#[derive(Debug, Clone)]
pub struct AssistantsConfig {
    pub backend: Backend,
    pub api_key: String,
    /// Base URL all API paths are appended to.
    pub base_url: String,
}

impl AssistantsConfig {
    /// Resolves connection settings. Azure is used when both its endpoint
    /// and key are configured; otherwise an OpenAI key is required.
    ///
    /// # Errors
    /// Returns an error when no usable key is configured or a URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let providers = &config.providers;

        if providers.uses_azure() {
            let azure = &providers.azure;
            let (Some(endpoint), Some(api_key)) =
                (azure.effective_base_url(), azure.effective_api_key())
            else {
                bail!("Azure endpoint and key must both be set");
            };
            validate_url(endpoint, "Azure OpenAI")?;
            return Ok(Self {
                backend: Backend::Azure {
                    api_version: azure.effective_api_version().to_string(),
                },
                api_key: api_key.to_string(),
                base_url: format!("{}/openai", endpoint.trim_end_matches('/')),
            });
        }

        let openai = &providers.openai;
        let Some(api_key) = openai.effective_api_key() else {
            bail!(
                "No API key configured. Set OPENAI_API_KEY (or AZURE_OPENAI_ENDPOINT and \
                 AZURE_OPENAI_KEY), or add it to config.toml"
            );
        };
        let base_url = openai.effective_base_url().unwrap_or(DEFAULT_BASE_URL);
        validate_url(base_url, "OpenAI")?;

        Ok(Self {
            backend: Backend::OpenAI,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// A file uploaded for use by the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_id: String,
    pub file_name: String,
}

/// Assistants API client.
pub struct AssistantsClient {
    config: AssistantsConfig,
    http: reqwest::Client,
}

impl AssistantsClient {
    pub fn new(config: AssistantsConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Creates an empty thread and returns its id.
    pub async fn create_thread(&self) -> ProviderResult<String> {
        let thread: ThreadObject = self.post_json("/threads", &serde_json::json!({})).await?;
        tracing::debug!(thread_id = %thread.id, "created thread");
        Ok(thread.id)
    }

    /// Adds a user message to a thread, attaching previously uploaded files.
    pub async fn add_message(
        &self,
        thread_id: &str,
        text: &str,
        attachments: &[UploadedFile],
    ) -> ProviderResult<()> {
        let body = CreateMessageRequest {
            role: "user",
            content: text,
            attachments: attachments
                .iter()
                .map(|file| Attachment::code_interpreter(&file.file_id))
                .collect(),
        };
        let _: serde_json::Value = self
            .post_json(&format!("/threads/{thread_id}/messages"), &body)
            .await?;
        Ok(())
    }

    /// Starts a streamed run of `assistant_id` on the thread.
    pub async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> ProviderResult<EventStream> {
        let body = CreateRunRequest {
            assistant_id,
            stream: true,
        };
        let mut headers = self.headers();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        tracing::debug!(thread_id, assistant_id, "starting run stream");
        let response = self
            .http
            .post(self.url(&format!("/threads/{thread_id}/runs")))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let response = check_status(response).await?;

        let parser = AssistantsSseParser::new(Box::pin(response.bytes_stream()));
        Ok(Box::pin(parser))
    }

    /// Uploads file contents with `purpose=assistants`.
    pub async fn upload_file(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> ProviderResult<UploadedFile> {
        let part = reqwest::multipart::Part::bytes(contents).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let response = self
            .http
            .post(self.url("/files"))
            .headers(self.headers())
            .multipart(form)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let file: FileObject = decode(check_status(response).await?).await?;
        tracing::debug!(file_id = %file.id, file_name, "uploaded file");

        Ok(UploadedFile {
            file_name: if file.filename.is_empty() {
                file_name.to_string()
            } else {
                file.filename
            },
            file_id: file.id,
        })
    }

    /// Downloads the contents of a file (e.g. one produced by the code interpreter).
    pub async fn download_file(&self, file_id: &str) -> ProviderResult<Bytes> {
        let response = self
            .http
            .get(self.url(&format!("/files/{file_id}/content")))
            .headers(self.headers())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        check_status(response)
            .await?
            .bytes()
            .await
            .map_err(classify_reqwest_error)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> ProviderResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(path))
            .headers(self.headers())
            .json(body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        decode(check_status(response).await?).await
    }

    fn url(&self, path: &str) -> String {
        build_url(&self.config, path)
    }

    fn headers(&self) -> HeaderMap {
        build_headers(&self.config.backend, &self.config.api_key)
    }
}

fn build_url(config: &AssistantsConfig, path: &str) -> String {
    match &config.backend {
        Backend::OpenAI => format!("{}{path}", config.base_url),
        Backend::Azure { api_version } => {
            format!("{}{path}?api-version={api_version}", config.base_url)
        }
    }
}

fn build_headers(backend: &Backend, api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match backend {
        Backend::OpenAI => {
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .unwrap_or_else(|_| HeaderValue::from_static("")),
            );
            headers.insert("OpenAI-Beta", HeaderValue::from_static(ASSISTANTS_BETA));
        }
        Backend::Azure { .. } => {
            headers.insert(
                "api-key",
                HeaderValue::from_str(api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
            );
        }
    }
    headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));
    headers
}

async fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::http_status(status.as_u16(), &body))
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> ProviderResult<R> {
    let body = response.text().await.map_err(classify_reqwest_error)?;
    serde_json::from_str(&body)
        .map_err(|err| ProviderError::parse(format!("Failed to decode response: {err}")))
}

fn classify_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ProviderError::timeout(format!("Connection failed: {e}"))
    } else if e.is_request() {
        ProviderError::new(ProviderErrorKind::HttpStatus, format!("Request error: {e}"))
    } else {
        ProviderError::new(ProviderErrorKind::HttpStatus, format!("Network error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use futures_util::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::core::events::AssistantEvent;

    fn config_with_env(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        let mut config = Config::default();
        config.apply_env(|key| map.get(key).map(ToString::to_string));
        config
    }

    fn openai_client(base_url: &str) -> AssistantsClient {
        AssistantsClient::new(AssistantsConfig {
            backend: Backend::OpenAI,
            api_key: "sk-test".to_string(),
            base_url: base_url.to_string(),
        })
    }

    #[test]
    fn openai_is_the_default_backend() {
        let config = config_with_env(&[("OPENAI_API_KEY", "sk-test")]);
        let resolved = AssistantsConfig::from_config(&config).unwrap();

        assert_eq!(resolved.backend, Backend::OpenAI);
        assert_eq!(resolved.base_url, "https://api.openai.com/v1");
        assert_eq!(build_url(&resolved, "/threads"), "https://api.openai.com/v1/threads");
    }

    #[test]
    fn azure_wins_when_endpoint_and_key_are_set() {
        let config = config_with_env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com/"),
            ("AZURE_OPENAI_KEY", "az-key"),
        ]);
        let resolved = AssistantsConfig::from_config(&config).unwrap();

        assert_eq!(
            resolved.backend,
            Backend::Azure {
                api_version: "2024-02-15-preview".to_string()
            }
        );
        assert_eq!(resolved.api_key, "az-key");
        assert_eq!(
            build_url(&resolved, "/threads"),
            "https://res.openai.azure.com/openai/threads?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = AssistantsConfig::from_config(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn headers_follow_backend() {
        let openai = build_headers(&Backend::OpenAI, "sk-test");
        assert_eq!(openai["Authorization"], "Bearer sk-test");
        assert_eq!(openai["OpenAI-Beta"], "assistants=v2");
        assert!(openai.get("api-key").is_none());

        let azure = build_headers(
            &Backend::Azure {
                api_version: "v".to_string(),
            },
            "az-key",
        );
        assert_eq!(azure["api-key"], "az-key");
        assert!(azure.get("Authorization").is_none());
    }

    #[tokio::test]
    async fn create_thread_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .and(header("OpenAI-Beta", "assistants=v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "thread_abc",
                "object": "thread"
            })))
            .mount(&server)
            .await;

        let client = openai_client(&server.uri());
        assert_eq!(client.create_thread().await.unwrap(), "thread_abc");
    }

    #[tokio::test]
    async fn add_message_sends_attachments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_abc/messages"))
            .and(body_partial_json(serde_json::json!({
                "role": "user",
                "content": "analyze this",
                "attachments": [{"file_id": "file-1", "tools": [{"type": "code_interpreter"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "msg_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = openai_client(&server.uri());
        let files = [UploadedFile {
            file_id: "file-1".to_string(),
            file_name: "data.csv".to_string(),
        }];
        client
            .add_message("thread_abc", "analyze this", &files)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn http_errors_carry_service_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let err = openai_client(&server.uri())
            .create_thread()
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::HttpStatus);
        assert_eq!(err.message, "HTTP 401: Incorrect API key provided");
    }

    #[tokio::test]
    async fn stream_run_yields_relay_events() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: thread.run.created\ndata: {\"id\":\"run_1\"}\n\n",
            "event: thread.message.delta\n",
            "data: {\"id\":\"msg_1\",\"delta\":{\"content\":[{\"index\":0,\"type\":\"text\",\"text\":{\"value\":\"Hi\"}}]}}\n\n",
            "event: thread.message.completed\n",
            "data: {\"id\":\"msg_1\",\"content\":[{\"type\":\"text\",\"text\":{\"value\":\"Hi\",\"annotations\":[]}}]}\n\n",
            "event: done\ndata: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/threads/thread_abc/runs"))
            .and(body_partial_json(serde_json::json!({
                "assistant_id": "asst_1",
                "stream": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let stream = openai_client(&server.uri())
            .stream_run("thread_abc", "asst_1")
            .await
            .unwrap();
        let events: Vec<AssistantEvent> = stream.map(|event| event.unwrap()).collect().await;

        let kinds: Vec<&str> = events.iter().map(AssistantEvent::kind).collect();
        assert_eq!(
            kinds,
            vec!["thread.run.created", "text_created", "text_delta", "text_done"]
        );
    }

    #[tokio::test]
    async fn azure_requests_carry_api_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openai/files/file-9/content"))
            .and(query_param("api-version", "2024-02-15-preview"))
            .and(header("api-key", "az-key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a,b\n1,2\n".to_vec()))
            .mount(&server)
            .await;

        let client = AssistantsClient::new(AssistantsConfig {
            backend: Backend::Azure {
                api_version: "2024-02-15-preview".to_string(),
            },
            api_key: "az-key".to_string(),
            base_url: format!("{}/openai", server.uri()),
        });

        let bytes = client.download_file("file-9").await.unwrap();
        assert_eq!(&bytes[..], b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn upload_file_returns_service_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "file-up",
                "object": "file",
                "filename": "data.csv",
                "purpose": "assistants"
            })))
            .mount(&server)
            .await;

        let uploaded = openai_client(&server.uri())
            .upload_file("data.csv", b"x,y\n".to_vec())
            .await
            .unwrap();
        assert_eq!(
            uploaded,
            UploadedFile {
                file_id: "file-up".to_string(),
                file_name: "data.csv".to_string(),
            }
        );
    }
}
