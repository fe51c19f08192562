//! Digitalt Museum API client.
//!
//! One GET per call against the configured base URL, no retries and no caching.
//! Callers fetch fresh records for every flow.

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::artifact::{ArtifactRecord, MediaRecord};
use crate::config::{with_trailing_slash, BridgeConfig};
use crate::contract::ArtifactSource;
use crate::error::UpstreamError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hosts that serve Digitalt Museum artifact pages.
const SOURCE_HOSTS: &[&str] = &["digitaltmuseum.se", "digitaltmuseum.no", "digitaltmuseum.org"];

pub struct DigitaltMuseumClient {
    http: reqwest::Client,
    base_url: String,
}

impl DigitaltMuseumClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self, reqwest::Error> {
        Self::new(&config.source_api_base)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
        debug!(url = %url, "Requesting source resource");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| UpstreamError::Unreachable {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            error!(url = %url, status = %status, "Source API returned error status");
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp
            .bytes()
            .await
            .map_err(|source| UpstreamError::Unreachable {
                url: url.to_string(),
                source,
            })?;
        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        let body = self.get_bytes(url).await?;
        serde_json::from_slice(&body).map_err(|source| {
            error!(url = %url, error = ?source, "Source API returned malformed JSON");
            UpstreamError::Malformed {
                url: url.to_string(),
                source,
            }
        })
    }
}

#[async_trait]
impl ArtifactSource for DigitaltMuseumClient {
    async fn fetch_artifact(&self, id: &str) -> Result<ArtifactRecord, UpstreamError> {
        let url = format!("{}object/{}", self.base_url, id);
        let artifact: ArtifactRecord = self.get_json(&url).await?;
        info!(
            artifact_id = %artifact.id,
            media_count = artifact.media.len(),
            "Fetched artifact"
        );
        Ok(artifact)
    }

    async fn fetch_media(&self, id: &str) -> Result<MediaRecord, UpstreamError> {
        let url = format!("{}media/{}", self.base_url, id);
        let media: MediaRecord = self.get_json(&url).await?;
        info!(media_id = %id, variants = media.variants.len(), "Fetched media record");
        Ok(media)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
        let bytes = self.get_bytes(url).await?;
        info!(url = %url, size = bytes.len(), "Downloaded image");
        Ok(bytes)
    }
}

/// Extracts the artifact identifier from a Digitalt Museum page URL.
///
/// Accepts `https://digitaltmuseum.se/{id}/{slug}` and `.../object/{id}`. Ids always
/// contain a digit, so site pages like `/search/` are rejected.
pub fn artifact_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.trim_start_matches("www.");
    if !SOURCE_HOSTS.contains(&host) {
        return None;
    }
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .find(|s| *s != "object")
        .filter(|s| {
            s.chars().all(|c| c.is_ascii_alphanumeric()) && s.chars().any(|c| c.is_ascii_digit())
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Starts a one-shot HTTP server that answers with the given status and body.
    async fn mock_server(status: u16, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/api/1/");
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            let mut request = String::new();
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                request = String::from_utf8_lossy(&buf[..n]).to_string();

                let resp = format!(
                    "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
            request
        });

        (url, handle)
    }

    #[tokio::test]
    async fn fetch_artifact_parses_record() {
        let json = r#"{"id":"123","title":{"sv":"Vas"},"owner":"Nordiska museet","media":[{"mediaId":"m1"}]}"#;
        let (url, handle) = mock_server(200, json).await;

        let client = DigitaltMuseumClient::new(&url).unwrap();
        let artifact = client.fetch_artifact("123").await.unwrap();

        assert_eq!(artifact.id, "123");
        assert_eq!(artifact.title.best(), Some("Vas"));
        assert_eq!(artifact.owner, "Nordiska museet");

        let request = handle.await.unwrap();
        assert!(request.starts_with("GET /api/1/object/123 "), "got: {request}");
    }

    #[tokio::test]
    async fn fetch_media_hits_media_path() {
        let json = r#"{"variants":[{"contentType":"image/jpeg","url":"http://x/i.jpg"}]}"#;
        let (url, handle) = mock_server(200, json).await;

        let client = DigitaltMuseumClient::new(&url).unwrap();
        let media = client.fetch_media("m1").await.unwrap();

        assert_eq!(media.image_url(), Some("http://x/i.jpg"));
        let request = handle.await.unwrap();
        assert!(request.starts_with("GET /api/1/media/m1 "), "got: {request}");
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let (url, handle) = mock_server(404, r#"{"error":"not found"}"#).await;

        let client = DigitaltMuseumClient::new(&url).unwrap();
        let err = client.fetch_artifact("missing").await.unwrap_err();

        assert!(matches!(err, UpstreamError::Status { status: 404, .. }));
        handle.abort();
    }

    #[tokio::test]
    async fn malformed_body_is_upstream_error() {
        let (url, handle) = mock_server(200, "<html>not json</html>").await;

        let client = DigitaltMuseumClient::new(&url).unwrap();
        let err = client.fetch_artifact("123").await.unwrap_err();

        assert!(matches!(err, UpstreamError::Malformed { .. }));
        handle.abort();
    }

    #[tokio::test]
    async fn unreachable_host_is_upstream_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = DigitaltMuseumClient::new(&format!("http://127.0.0.1:{port}/")).unwrap();
        let err = client.fetch_media("m1").await.unwrap_err();

        assert!(matches!(err, UpstreamError::Unreachable { .. }));
    }

    #[test]
    fn artifact_id_from_page_urls() {
        assert_eq!(
            artifact_id_from_url("https://digitaltmuseum.se/021016343404/vas"),
            Some("021016343404".to_string())
        );
        assert_eq!(
            artifact_id_from_url("https://www.digitaltmuseum.no/object/0115ABC"),
            Some("0115ABC".to_string())
        );
        assert_eq!(artifact_id_from_url("https://example.com/021016343404"), None);
        assert_eq!(artifact_id_from_url("https://digitaltmuseum.se/"), None);
        assert_eq!(artifact_id_from_url("not a url"), None);
    }

    #[test]
    fn site_pages_are_not_artifacts() {
        assert_eq!(artifact_id_from_url("https://digitaltmuseum.se/search/?q=vas"), None);
        assert_eq!(artifact_id_from_url("https://digitaltmuseum.no/owners"), None);
        assert_eq!(artifact_id_from_url("https://digitaltmuseum.se/object/about"), None);
    }
}
