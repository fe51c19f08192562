//! # contract: async interfaces at the I/O seams
//!
//! Two traits separate the bridge logic from the network:
//!
//! - [`ArtifactSource`] fetches records and image bytes from the source catalog.
//!   [`crate::source::DigitaltMuseumClient`] is the production implementation.
//! - [`CommonsTransport`] sends one OAuth1-signed request to Wikimedia Commons and
//!   returns the raw response body. The CLI crate provides the reqwest
//!   implementation; signing happens inside it through [`crate::oauth`].
//!
//! Both traits are annotated for `mockall`, so the handshake, the upload
//! orchestrator and the flow can be tested without a network. The mocks are
//! exported under the `test-export-mocks` feature for use by dependent crates.

use async_trait::async_trait;
use mockall::automock;

use crate::artifact::{ArtifactRecord, MediaRecord};
use crate::error::{TransportError, UpstreamError};
use crate::oauth::OAuthCredential;

/// Read access to the source catalog.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Fetch one artifact record by its catalog identifier.
    async fn fetch_artifact(&self, id: &str) -> Result<ArtifactRecord, UpstreamError>;

    /// Fetch one media record by its identifier.
    async fn fetch_media(&self, id: &str) -> Result<MediaRecord, UpstreamError>;

    /// Download the bytes behind a media variant URL.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, UpstreamError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// The file carried by a multipart upload.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("filename", &self.filename)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    /// `application/x-www-form-urlencoded`; fields are part of the signature.
    Form(Vec<(String, String)>),
    /// `multipart/form-data`; fields are not part of the signature.
    Multipart {
        fields: Vec<(String, String)>,
        file: FilePart,
    },
}

/// One request to Commons, described before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: Method,
    /// Endpoint URL without query string.
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Resource-owner token; `None` for the initiate call.
    pub token: Option<OAuthCredential>,
    pub callback: Option<String>,
    pub verifier: Option<String>,
}

impl SignedRequest {
    pub fn get(url: impl Into<String>, query: Vec<(String, String)>) -> Self {
        SignedRequest {
            method: Method::Get,
            url: url.into(),
            query,
            body: RequestBody::Empty,
            token: None,
            callback: None,
            verifier: None,
        }
    }

    pub fn post(url: impl Into<String>, body: RequestBody) -> Self {
        SignedRequest {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            body,
            token: None,
            callback: None,
            verifier: None,
        }
    }

    pub fn with_token(mut self, token: &OAuthCredential) -> Self {
        self.token = Some(token.clone());
        self
    }

    /// Parameters that take part in the OAuth1 signature: the query plus any form body.
    pub fn signed_params(&self) -> Vec<(String, String)> {
        let mut params = self.query.clone();
        if let RequestBody::Form(fields) = &self.body {
            params.extend(fields.iter().cloned());
        }
        params
    }

    /// Looks up a parameter in the query, form or multipart fields.
    pub fn param(&self, key: &str) -> Option<&str> {
        let body_fields: &[(String, String)] = match &self.body {
            RequestBody::Empty => &[],
            RequestBody::Form(fields) => fields,
            RequestBody::Multipart { fields, .. } => fields,
        };
        self.query
            .iter()
            .chain(body_fields.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Sends OAuth1-signed requests to Commons.
///
/// Implementors sign with the application's consumer credential plus
/// `request.token` (when present) and return the response body as text.
/// Non-2xx responses are reported as [`TransportError::Status`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CommonsTransport: Send + Sync {
    async fn send(&self, request: SignedRequest) -> Result<String, TransportError>;
}
