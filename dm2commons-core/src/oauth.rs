//! OAuth1 (RFC 5849) request signing with HMAC-SHA1.
//!
//! The handshake and every upload call go through [`authorization_header`], so
//! there is exactly one signing routine in the crate. Callers pass the request
//! URL without its query string and list query and form parameters in
//! `params`; multipart bodies are not part of the signature.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;
use uuid::Uuid;

use crate::error::TransportError;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay as-is, everything else is encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The application's registered consumer key and secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ConsumerCredential {
    pub key: String,
    pub secret: String,
}

impl std::fmt::Debug for ConsumerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerCredential")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// Request token: valid between `initiate` and the verifier exchange.
    Temporary,
    /// Access token: valid for the upload step of a single artifact.
    Access,
}

/// A resource-owner token pair.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredential {
    pub token: String,
    pub secret: String,
    pub kind: CredentialKind,
}

impl OAuthCredential {
    pub fn temporary(token: impl Into<String>, secret: impl Into<String>) -> Self {
        OAuthCredential {
            token: token.into(),
            secret: secret.into(),
            kind: CredentialKind::Temporary,
        }
    }

    pub fn access(token: impl Into<String>, secret: impl Into<String>) -> Self {
        OAuthCredential {
            token: token.into(),
            secret: secret.into(),
            kind: CredentialKind::Access,
        }
    }
}

impl std::fmt::Debug for OAuthCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredential")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .field("kind", &self.kind)
            .finish()
    }
}

/// Everything that goes into one request signature.
pub struct SigningInput<'a> {
    pub method: &'a str,
    /// Request URL without query string.
    pub url: &'a str,
    /// Query and form parameters that travel with the request.
    pub params: &'a [(String, String)],
    pub consumer: &'a ConsumerCredential,
    pub token: Option<&'a OAuthCredential>,
    pub callback: Option<&'a str>,
    pub verifier: Option<&'a str>,
}

pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Builds the `Authorization: OAuth ...` header value with a fresh nonce and timestamp.
pub fn authorization_header(input: &SigningInput<'_>) -> Result<String, TransportError> {
    let nonce = Uuid::new_v4().simple().to_string();
    let timestamp = chrono::Utc::now().timestamp().to_string();
    authorization_header_with(input, &nonce, &timestamp)
}

/// Same as [`authorization_header`] with caller-chosen nonce and timestamp.
pub fn authorization_header_with(
    input: &SigningInput<'_>,
    nonce: &str,
    timestamp: &str,
) -> Result<String, TransportError> {
    let mut oauth_params: Vec<(String, String)> = vec![
        ("oauth_consumer_key".into(), input.consumer.key.clone()),
        ("oauth_nonce".into(), nonce.to_string()),
        ("oauth_signature_method".into(), "HMAC-SHA1".into()),
        ("oauth_timestamp".into(), timestamp.to_string()),
        ("oauth_version".into(), "1.0".into()),
    ];
    if let Some(token) = input.token {
        oauth_params.push(("oauth_token".into(), token.token.clone()));
    }
    if let Some(callback) = input.callback {
        oauth_params.push(("oauth_callback".into(), callback.to_string()));
    }
    if let Some(verifier) = input.verifier {
        oauth_params.push(("oauth_verifier".into(), verifier.to_string()));
    }

    let all_params: Vec<(String, String)> = input
        .params
        .iter()
        .cloned()
        .chain(oauth_params.iter().cloned())
        .collect();
    let base = signature_base_string(input.method, input.url, &all_params);
    let token_secret = input.token.map(|t| t.secret.as_str()).unwrap_or("");
    let signature = sign(&base, &input.consumer.secret, token_secret)?;
    oauth_params.push(("oauth_signature".into(), signature));

    let header = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {header}"))
}

/// `METHOD&encoded-url&encoded-normalized-params`.
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

/// HMAC-SHA1 over the base string, keyed by `consumer_secret&token_secret`, base64 encoded.
pub fn sign(
    base_string: &str,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String, TransportError> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| TransportError::Signing(format!("failed to create HMAC: {e}")))?;
    mac.update(base_string.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}
