//! Display formatting for assistant text: link masking and citation footnotes.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, NoExpand, Regex};

use crate::core::events::{Annotation, Text};

/// Literal shown in place of any markdown link while text is streaming.
pub const DOWNLOAD_LINK: &str = "Download Link";

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(.*?)\]\s*\(\s*(.*?)\s*\)").expect("markdown link pattern is valid")
});

/// Replaces every `[label](url)` in `text` with [`DOWNLOAD_LINK`].
pub fn mask_links(text: &str) -> String {
    MARKDOWN_LINK.replace_all(text, DOWNLOAD_LINK).into_owned()
}

/// Resolves annotation markers in finished assistant text into display form.
pub trait AnnotationFormatter {
    fn format(&self, text: &Text) -> String;
}

/// Default formatter: numbered citation footnotes and download labels.
///
/// File names come from files this session uploaded; unknown ids are shown
/// as-is.
#[derive(Debug, Clone, Default)]
pub struct CitationFormatter {
    file_names: HashMap<String, String>,
}

impl CitationFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the display name for an uploaded file id.
    pub fn remember_file(&mut self, file_id: impl Into<String>, file_name: impl Into<String>) {
        self.file_names.insert(file_id.into(), file_name.into());
    }

    pub fn file_name<'a>(&'a self, file_id: &'a str) -> &'a str {
        self.file_names.get(file_id).map_or(file_id, String::as_str)
    }
}

impl AnnotationFormatter for CitationFormatter {
    fn format(&self, text: &Text) -> String {
        let mut value = text.value.clone();
        let mut footnotes = Vec::new();

        for (index, annotation) in text.annotations.iter().enumerate() {
            match annotation {
                Annotation::FileCitation {
                    text: marker,
                    file_citation,
                } => {
                    if !marker.is_empty() {
                        value = value.replace(marker.as_str(), &format!(" [{index}]"));
                    }
                    let name = self.file_name(&file_citation.file_id);
                    let footnote = match file_citation.quote.as_deref().map(str::trim) {
                        Some(quote) if !quote.is_empty() => {
                            format!("[{index}] {quote} from {name}")
                        }
                        _ => format!("[{index}] from {name}"),
                    };
                    footnotes.push(footnote);
                }
                Annotation::FilePath {
                    text: marker,
                    file_path,
                } => {
                    let name = generated_file_name(marker, &file_path.file_id);
                    let label = format!("{DOWNLOAD_LINK}: {name}");
                    value = if marker.is_empty() {
                        MARKDOWN_LINK
                            .replace_all(&value, NoExpand(&label))
                            .into_owned()
                    } else {
                        MARKDOWN_LINK
                            .replace_all(&value, |caps: &Captures<'_>| {
                                if caps[2].contains(marker.as_str()) {
                                    label.clone()
                                } else {
                                    caps[0].to_string()
                                }
                            })
                            .into_owned()
                            .replace(marker.as_str(), &label)
                    };
                }
                Annotation::Unknown => {}
            }
        }

        if !footnotes.is_empty() {
            value.push_str("\n\n");
            value.push_str(&footnotes.join("\n"));
        }
        value
    }
}

/// File name for a generated file: the last path segment of its sandbox
/// marker, or the file id when the marker has none.
pub fn generated_file_name(marker: &str, file_id: &str) -> String {
    marker
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.contains(':'))
        .map_or_else(|| file_id.to_string(), str::to_string)
}
