//! # Commons transport (CLI <-> Core)
//!
//! [`CommonsClient`] is the reqwest implementation of
//! [`dm2commons_core::contract::CommonsTransport`]. Every request is signed with the
//! application's consumer credential plus the request's token through
//! [`dm2commons_core::oauth::authorization_header`]; the handshake and the upload
//! protocol share this one path.
//!
//! - Query and form parameters take part in the signature, multipart fields do not.
//! - Non-2xx answers come back as [`TransportError::Status`] with the body attached,
//!   so callers can log what Commons said.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use std::time::Duration;

use dm2commons_core::config::BridgeConfig;
use dm2commons_core::contract::{CommonsTransport, Method, RequestBody, SignedRequest};
use dm2commons_core::error::TransportError;
use dm2commons_core::oauth::{authorization_header, ConsumerCredential, SigningInput};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const USER_AGENT: &str = concat!("dm2commons/", env!("CARGO_PKG_VERSION"));

pub struct CommonsClient {
    http: reqwest::Client,
    consumer: Option<ConsumerCredential>,
}

impl CommonsClient {
    /// Builds a client from config. A missing consumer credential is not an error
    /// here; the handshake reports it when it runs.
    pub fn new(config: &BridgeConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        let consumer = config.consumer().ok();
        tracing::info!(
            commons_base = %config.commons_base,
            consumer_set = consumer.is_some(),
            "Initialized CommonsClient"
        );
        Ok(CommonsClient { http, consumer })
    }
}

#[async_trait]
impl CommonsTransport for CommonsClient {
    async fn send(&self, request: SignedRequest) -> Result<String, TransportError> {
        let consumer = self.consumer.as_ref().ok_or_else(|| {
            tracing::error!(url = %request.url, "Cannot sign request without consumer credential");
            TransportError::Signing("consumer credential not configured".into())
        })?;

        let params = request.signed_params();
        let header = authorization_header(&SigningInput {
            method: request.method.as_str(),
            url: &request.url,
            params: &params,
            consumer,
            token: request.token.as_ref(),
            callback: request.callback.as_deref(),
            verifier: request.verifier.as_deref(),
        })?;

        tracing::debug!(
            method = request.method.as_str(),
            url = %request.url,
            action = request.param("action").unwrap_or_default(),
            "Sending signed request to Commons"
        );
        let builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
        }
        .header(AUTHORIZATION, header)
        .query(&request.query);

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart { fields, file } => {
                let form = fields
                    .into_iter()
                    .fold(Form::new(), |form, (name, value)| form.text(name, value));
                let part = Part::bytes(file.bytes)
                    .file_name(file.filename)
                    .mime_str(&file.mime)?;
                builder.multipart(form.part("file", part))
            }
        };

        let resp = builder.send().await.map_err(|e| {
            tracing::error!(url = %request.url, error = ?e, "Commons request failed");
            TransportError::Http(e)
        })?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            tracing::error!(url = %request.url, status = %status, "Commons returned error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
