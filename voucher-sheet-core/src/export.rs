//! Authenticated retrieval of server-produced export files.
//!
//! One GET per call, bearer credential passed explicitly, no retries. On success the
//! filename is recovered from `Content-Disposition` via [`resolve_filename`], which is
//! kept pure so every download path shares it.

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_DISPOSITION};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::contract::ExportResult;
use crate::error::ExportError;

/// Message used when a failed response carries no usable `message` field.
pub const GENERIC_FAILURE_MESSAGE: &str = "Export failed";

static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"filename\*?=(?:UTF-8''|")?([^";]+)"#).expect("filename pattern is valid")
});

/// Bearer credential. `Debug` never prints the secret.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    fn header_value(&self) -> Result<HeaderValue, ExportError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Stages of a single export call, reported in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Requesting,
    Failed,
    FilenameResolution,
    Complete,
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportPhase::Requesting => "requesting",
            ExportPhase::Failed => "failed",
            ExportPhase::FilenameResolution => "filename_resolution",
            ExportPhase::Complete => "complete",
        })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExportDispatcher {
    client: Client,
    base: Url,
}

impl ExportDispatcher {
    pub fn new(base_url: &str) -> Result<Self, ExportError> {
        let client = Client::builder()
            .user_agent(concat!("voucher-sheet/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ExportError> {
        let base = Url::parse(base_url).map_err(|e| ExportError::InvalidPath {
            path: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { client, base })
    }

    /// Paths resolve below the base URL, with or without a leading `/`. Absolute URLs
    /// replace it.
    pub fn url(&self, path: &str) -> Result<Url, ExportError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ExportError::InvalidPath {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn fetch_artifact(
        &self,
        path: &str,
        credential: &BearerToken,
        fallback_filename: &str,
    ) -> Result<ExportResult, ExportError> {
        if fallback_filename.trim().is_empty() {
            return Err(ExportError::MissingFallback);
        }
        let url = self.url(path)?;

        debug!(phase = %ExportPhase::Requesting, url = %url, "Export transition");
        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, credential.header_value()?)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, url = %url, "Export request could not be sent");
                ExportError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = failure_message(&body);
            error!(
                phase = %ExportPhase::Failed,
                status = status.as_u16(),
                url = %url,
                message = %message,
                "Export request rejected"
            );
            return Err(ExportError::TransferFailed {
                status: status.as_u16(),
                message,
            });
        }

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .map(disposition_text);
        let binary = response.bytes().await?.to_vec();

        debug!(
            phase = %ExportPhase::FilenameResolution,
            disposition = disposition.as_deref().unwrap_or(""),
            "Export transition"
        );
        let filename = resolve_filename(disposition.as_deref(), fallback_filename);

        info!(
            phase = %ExportPhase::Complete,
            url = %url,
            filename = %filename,
            size = binary.len(),
            "Export downloaded"
        );
        Ok(ExportResult { binary, filename })
    }
}

/// Header text with any raw non-ASCII bytes read as UTF-8 instead of being rejected.
fn disposition_text(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}

/// Server message from a JSON error body, or [`GENERIC_FAILURE_MESSAGE`].
fn failure_message(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
}

/// Filename from a `Content-Disposition` value, percent-decoded when possible.
/// Falls back to `fallback` when the header is absent or names nothing.
pub fn resolve_filename(content_disposition: Option<&str>, fallback: &str) -> String {
    let raw = content_disposition
        .and_then(|header| FILENAME_PATTERN.captures(header))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str());

    let Some(raw) = raw else {
        debug!(fallback, "No filename in Content-Disposition, using fallback");
        return fallback.to_string();
    };

    let name = percent_decode(raw).unwrap_or_else(|| {
        warn!(raw, "Filename is not valid percent-encoding, keeping it undecoded");
        raw.to_string()
    });
    if name.trim().is_empty() {
        return fallback.to_string();
    }
    name
}

/// Percent-decodes `input`. Malformed escapes pass through unchanged; `None` when the
/// decoded bytes are not UTF-8.
pub fn percent_decode(input: &str) -> Option<String> {
    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_filename_is_percent_decoded() {
        assert_eq!(
            resolve_filename(Some("attachment; filename*=UTF-8''report%20A.csv"), "x.csv"),
            "report A.csv"
        );
    }

    #[test]
    fn quoted_filename_is_taken_verbatim() {
        assert_eq!(
            resolve_filename(Some(r#"attachment; filename="plain.csv""#), "x.csv"),
            "plain.csv"
        );
    }

    #[test]
    fn bare_filename_stops_at_separator() {
        assert_eq!(
            resolve_filename(Some("attachment; filename=bare.pdf; size=10"), "x"),
            "bare.pdf"
        );
    }

    #[test]
    fn missing_or_unmatched_header_uses_fallback() {
        assert_eq!(resolve_filename(None, "fallback.csv"), "fallback.csv");
        assert_eq!(resolve_filename(Some("inline"), "fallback.csv"), "fallback.csv");
    }

    #[test]
    fn malformed_escape_keeps_raw_value() {
        assert_eq!(
            resolve_filename(Some("attachment; filename*=UTF-8''100%.csv"), "x"),
            "100%.csv"
        );
        assert_eq!(
            resolve_filename(Some("attachment; filename*=UTF-8''bad%FF.csv"), "x"),
            "bad%FF.csv"
        );
    }

    #[test]
    fn multibyte_names_decode() {
        assert_eq!(
            resolve_filename(Some("attachment; filename*=UTF-8''caf%C3%A9.csv"), "x"),
            "café.csv"
        );
    }

    #[test]
    fn blank_decoded_name_falls_back() {
        assert_eq!(
            resolve_filename(Some("attachment; filename*=UTF-8''%20"), "fb.csv"),
            "fb.csv"
        );
    }

    #[test]
    fn failure_message_prefers_server_text() {
        assert_eq!(failure_message(br#"{"message":"not found"}"#), "not found");
        assert_eq!(failure_message(b"<html>oops</html>"), GENERIC_FAILURE_MESSAGE);
        assert_eq!(failure_message(br#"{"error":"x"}"#), GENERIC_FAILURE_MESSAGE);
        assert_eq!(failure_message(b""), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn raw_utf8_disposition_keeps_server_name() {
        let value =
            HeaderValue::from_bytes("attachment; filename=\"café.csv\"".as_bytes()).unwrap();
        assert!(value.to_str().is_err());
        let text = disposition_text(&value);
        assert_eq!(resolve_filename(Some(&text), "fallback.csv"), "café.csv");
    }

    #[test]
    fn paths_resolve_below_the_base_path() {
        let dispatcher = ExportDispatcher::new("https://shop.example.com/api/").unwrap();
        assert_eq!(
            dispatcher.url("/exports/x").unwrap().as_str(),
            "https://shop.example.com/api/exports/x"
        );
        assert_eq!(
            dispatcher.url("exports/x").unwrap().as_str(),
            "https://shop.example.com/api/exports/x"
        );
        assert_eq!(
            dispatcher.url("https://cdn.example.com/f.csv").unwrap().as_str(),
            "https://cdn.example.com/f.csv"
        );
    }

    #[test]
    fn percent_decode_rejects_invalid_utf8_only() {
        assert_eq!(percent_decode("a%20b").as_deref(), Some("a b"));
        assert_eq!(percent_decode("100%").as_deref(), Some("100%"));
        assert_eq!(percent_decode("%zz").as_deref(), Some("%zz"));
        assert_eq!(percent_decode("bad%FF"), None);
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = BearerToken::new("super-secret");
        assert!(!format!("{token:?}").contains("super-secret"));
    }
}
