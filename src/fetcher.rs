//! Content source access.
//!
//! `ContentFetcher` is the lowest-level leaf of the engine: one call, one
//! request, no caching. De-duplication and stale-response handling live in
//! the guard and the session controller, never here.

use crate::chapter::{Chapter, ChapterKey, TocEntry};
use crate::error::{FetchError, FetchFailure};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Fetches chapters and chapter indexes from the content source.
///
/// Implementations must be safe to call repeatedly with the same arguments.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, key: &ChapterKey) -> Result<Chapter, FetchFailure>;

    /// Load the full chapter index of a novel, `locked` flags included.
    async fn fetch_index(&self, novel_id: &str) -> Result<Vec<TocEntry>, FetchError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterResponse {
    chapter: ChapterPayload,
    #[serde(default)]
    has_next: bool,
}

#[derive(Debug, Deserialize)]
struct ChapterPayload {
    title: String,
    #[serde(default)]
    content: String,
}

/// Decode a chapter payload. The requested key is the identity of the result.
pub fn chapter_from_response(key: &ChapterKey, body: &[u8]) -> Result<Chapter, FetchError> {
    let response: ChapterResponse =
        serde_json::from_slice(body).map_err(|err| FetchError::Decode(err.to_string()))?;
    Ok(Chapter {
        key: key.clone(),
        title: response.chapter.title,
        content: response.chapter.content,
        has_next: response.has_next,
    })
}

/// Decode a chapter index and put it in chapter order.
pub fn index_from_response(body: &[u8]) -> Result<Vec<TocEntry>, FetchError> {
    let mut entries: Vec<TocEntry> =
        serde_json::from_slice(body).map_err(|err| FetchError::Decode(err.to_string()))?;
    let before = entries.len();
    entries.sort_by_key(|entry| entry.chapter_number);
    entries.dedup_by_key(|entry| entry.chapter_number);
    if entries.len() != before {
        warn!(
            dropped = before - entries.len(),
            "Chapter index contained duplicate chapter numbers"
        );
    }
    Ok(entries)
}

/// `ContentFetcher` backed by the HTTP content API.
#[derive(Clone, Debug)]
pub struct HttpContentSource {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpContentSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid content base url {base_url}"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("content base url {base_url} cannot carry a path"));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| transport_error(&err))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16()));
        }
        let body = resp.bytes().await.map_err(|err| transport_error(&err))?;
        Ok(body.to_vec())
    }
}

fn transport_error(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Transport(format!("timed out: {err}"))
    } else {
        FetchError::Transport(err.to_string())
    }
}

#[async_trait]
impl ContentFetcher for HttpContentSource {
    async fn fetch(&self, key: &ChapterKey) -> Result<Chapter, FetchFailure> {
        let number = key.chapter_number.to_string();
        let url = self.endpoint(&["novels", &key.novel_id, "chapters", &number]);
        debug!(%url, chapter = %key, "Requesting chapter");
        let body = self
            .get_bytes(url)
            .await
            .map_err(|cause| FetchFailure::new(key.clone(), cause))?;
        chapter_from_response(key, &body).map_err(|cause| FetchFailure::new(key.clone(), cause))
    }

    async fn fetch_index(&self, novel_id: &str) -> Result<Vec<TocEntry>, FetchError> {
        let url = self.endpoint(&["novels", novel_id, "chapters"]);
        debug!(%url, novel_id, "Requesting chapter index");
        let body = self.get_bytes(url).await?;
        index_from_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_payload_uses_requested_key() {
        let key = ChapterKey::new("novel-42", 5);
        let chapter = chapter_from_response(
            &key,
            br#"{"chapter":{"title":"Ashes","content":"<p>...</p>"},"hasNext":true}"#,
        )
        .unwrap();
        assert_eq!(chapter.key, key);
        assert_eq!(chapter.title, "Ashes");
        assert!(chapter.has_next);
    }

    #[test]
    fn missing_has_next_means_end_of_archive() {
        let key = ChapterKey::new("novel-42", 9);
        let chapter =
            chapter_from_response(&key, br#"{"chapter":{"title":"Last","content":""}}"#).unwrap();
        assert!(!chapter.has_next);
    }

    #[test]
    fn malformed_chapter_is_a_decode_error() {
        let key = ChapterKey::new("novel-42", 5);
        let err = chapter_from_response(&key, br#"{"title":"flat"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn index_is_sorted_and_deduplicated() {
        let entries = index_from_response(
            br#"[
                {"chapterNumber":2,"title":"Two","locked":true},
                {"chapterNumber":1,"title":"One"},
                {"chapterNumber":2,"title":"Two again"}
            ]"#,
        )
        .unwrap();
        let numbers: Vec<u32> = entries.iter().map(|e| e.chapter_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(entries[1].locked);
    }

    #[test]
    fn endpoints_escape_novel_ids() {
        let source =
            HttpContentSource::new("http://127.0.0.1:8080/api", Duration::from_secs(5)).unwrap();
        let url = source.endpoint(&["novels", "a b/c", "chapters", "3"]);
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/api/novels/a%20b%2Fc/chapters/3"
        );
    }

    #[test]
    fn trailing_slash_in_base_url_is_tolerated() {
        let source =
            HttpContentSource::new("http://127.0.0.1:8080/api/", Duration::from_secs(5)).unwrap();
        let url = source.endpoint(&["novels", "n", "chapters"]);
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/api/novels/n/chapters");
    }

    #[test]
    fn relative_base_url_is_rejected() {
        assert!(HttpContentSource::new("not a url", Duration::from_secs(5)).is_err());
    }
}
