//! HTTP page fetcher.

use super::FetchOptions;
use crate::domain::{ContentKind, Source, SourceContent};
use crate::error::{Error, Result};
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use tracing::debug;

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#).expect("valid regex")
});

/// Bytes scanned for a `<meta charset>` declaration.
const META_SNIFF_BYTES: usize = 4096;

/// GET `url` and decode the body to text. No retries.
pub fn fetch_url(url: &str, options: &FetchOptions) -> Result<SourceContent> {
    let network = |message: String| Error::Network { url: url.to_string(), message };

    let parsed = reqwest::Url::parse(url).map_err(|e| network(format!("invalid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(network(format!("unsupported URL scheme '{}'", parsed.scheme())));
    }

    let client = Client::builder()
        .timeout(options.timeout)
        .user_agent(options.user_agent.as_str())
        .redirect(Policy::limited(10))
        .build()
        .map_err(|e| network(format!("failed to create HTTP client: {e}")))?;

    debug!(%url, timeout_secs = options.timeout.as_secs(), "GET");
    let response = client.get(parsed).send().map_err(|e| {
        if e.is_timeout() {
            network(format!("timed out after {}s", options.timeout.as_secs()))
        } else if e.is_connect() {
            network(format!("connection failed: {e}"))
        } else {
            network(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(network(format!("server responded with HTTP {status}")));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().map_err(|e| network(format!("failed to read body: {e}")))?;
    debug!(bytes = body.len(), content_type = ?content_type, "page downloaded");

    let kind = match content_type.as_deref() {
        Some(ct) if ct.trim_start().to_ascii_lowercase().starts_with("text/plain") => {
            ContentKind::PlainText
        }
        _ => ContentKind::Html,
    };

    Ok(SourceContent {
        origin: Source::Url(url.to_string()),
        kind,
        text: decode_body(&body, content_type.as_deref()),
        retrieved_at: chrono::Utc::now(),
    })
}

/// Decode a response body using, in order: the `Content-Type` charset, an HTML
/// `<meta charset>` declaration, then a statistical guess.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_meta(bytes))
        .unwrap_or_else(|| {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        });
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Encoding::for_label(value.trim().trim_matches('"').as_bytes())
        } else {
            None
        }
    })
}

fn charset_from_meta(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(META_SNIFF_BYTES)]);
    let caps = META_CHARSET.captures(&head)?;
    Encoding::for_label(caps[1].as_bytes())
}

#[cfg(test)]
mod tests {
    use super::{decode_body, fetch_url};
    use crate::error::Error;
    use crate::fetch::FetchOptions;
    use std::time::Duration;

    #[test]
    fn decodes_latin1_from_header_charset() {
        let bytes = b"caf\xe9";
        assert_eq!(decode_body(bytes, Some("text/html; charset=ISO-8859-1")), "café");
    }

    #[test]
    fn decodes_from_meta_charset_when_header_has_none() {
        let mut bytes = b"<html><head><meta charset=\"windows-1252\"></head><body>na\xefve".to_vec();
        bytes.extend_from_slice(b"</body></html>");
        let text = decode_body(&bytes, Some("text/html"));
        assert!(text.contains("naïve"));
    }

    #[test]
    fn utf8_passes_through() {
        assert_eq!(decode_body("żółw".as_bytes(), None), "żółw");
    }

    #[test]
    fn rejects_non_http_schemes() {
        let err = fetch_url("file:///etc/passwd", &FetchOptions::default()).expect_err("scheme");
        assert!(matches!(err, Error::Network { .. }));
        assert!(err.to_string().contains("unsupported URL scheme"));
    }

    #[test]
    fn unreachable_host_is_a_network_error() {
        let options = FetchOptions { timeout: Duration::from_secs(5), ..FetchOptions::default() };
        let err = fetch_url("http://127.0.0.1:1/", &options).expect_err("closed port");
        assert!(matches!(err, Error::Network { .. }), "got {err:?}");
    }
}
