//! Three-legged OAuth1 handshake against the Commons authorization server.
//!
//! ```text
//! Unauthenticated --initiate--> RequestTokenIssued --(user approves on Commons)-->
//!     UserAuthorizing --exchange(verifier)--> AccessTokenIssued
//! ```
//!
//! Both legs are signed GETs through the same [`CommonsTransport`], so they share
//! one signing routine. The temporary pair lives in [`SessionState`] between the
//! legs and is removed as soon as the exchange succeeds.

use tracing::{error, info, warn};

use crate::config::BridgeConfig;
use crate::contract::{CommonsTransport, SignedRequest};
use crate::error::AuthError;
use crate::oauth::{percent_encode, CredentialKind, OAuthCredential};
use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Unauthenticated,
    /// A temporary pair is stored; the user is (or is about to be) on the
    /// authorization page.
    RequestTokenIssued,
    AccessTokenIssued,
}

impl HandshakeState {
    pub fn of(session: &SessionState) -> Self {
        if session.access_token.is_some() {
            HandshakeState::AccessTokenIssued
        } else if session.request_token.is_some() {
            HandshakeState::RequestTokenIssued
        } else {
            HandshakeState::Unauthenticated
        }
    }
}

pub struct Handshake<'a, T: CommonsTransport + ?Sized> {
    transport: &'a T,
    config: &'a BridgeConfig,
}

impl<'a, T: CommonsTransport + ?Sized> Handshake<'a, T> {
    pub fn new(transport: &'a T, config: &'a BridgeConfig) -> Self {
        Self { transport, config }
    }

    /// Requests a temporary credential pair, stores it in the session and returns
    /// the URL the user must be redirected to.
    pub async fn initiate(&self, session: &mut SessionState) -> Result<String, AuthError> {
        let consumer = self.config.consumer()?;
        let mut request = SignedRequest::get(
            self.config.index_url(),
            vec![("title".into(), "Special:OAuth/initiate".into())],
        );
        request.callback = Some(self.config.callback_url.clone());

        info!(callback = %self.config.callback_url, "Requesting OAuth request token");
        let body = self.transport.send(request).await.map_err(|e| {
            error!(error = %e, "OAuth initiate request failed");
            AuthError::Transport(e)
        })?;

        let temporary = parse_token_pair(&body, CredentialKind::Temporary)?;
        let redirect = format!(
            "{}?title=Special:OAuth/authorize&oauth_token={}&oauth_consumer_key={}",
            self.config.index_url(),
            percent_encode(&temporary.token),
            percent_encode(&consumer.key)
        );
        session.request_token = Some(temporary);
        info!("OAuth request token issued, redirecting user to authorize");
        Ok(redirect)
    }

    /// Exchanges the stored temporary pair plus `verifier` for an access pair.
    ///
    /// Fails with [`AuthError::State`] before any network call when the session
    /// holds no temporary pair. On success the temporary pair is removed from the
    /// session; the access pair is returned for the caller to store.
    pub async fn exchange(
        &self,
        session: &mut SessionState,
        verifier: &str,
    ) -> Result<OAuthCredential, AuthError> {
        let temporary = session.request_token.clone().ok_or_else(|| {
            warn!("OAuth exchange attempted without a request token");
            AuthError::State("no request token in session")
        })?;
        let verifier = verifier.trim();
        if verifier.is_empty() {
            warn!("OAuth exchange attempted without a verifier");
            return Err(AuthError::State("missing oauth_verifier"));
        }

        let mut request = SignedRequest::get(
            self.config.index_url(),
            vec![("title".into(), "Special:OAuth/token".into())],
        )
        .with_token(&temporary);
        request.verifier = Some(verifier.to_string());

        info!("Exchanging OAuth verifier for access token");
        let body = self.transport.send(request).await.map_err(|e| {
            error!(error = %e, "OAuth token exchange failed");
            AuthError::Transport(e)
        })?;

        let access = parse_token_pair(&body, CredentialKind::Access)?;
        session.take_request_token();
        info!("OAuth access token issued");
        Ok(access)
    }
}

/// Reads `oauth_token` and `oauth_token_secret` from a form-encoded response body.
fn parse_token_pair(body: &str, kind: CredentialKind) -> Result<OAuthCredential, AuthError> {
    let fields: Vec<(String, String)> = serde_urlencoded::from_str(body.trim()).map_err(|e| {
        error!(error = %e, ?kind, "OAuth token response was not form-encoded");
        AuthError::Init(format!("unreadable token response: {e}"))
    })?;
    let field = |name: &str| {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    match (field("oauth_token"), field("oauth_token_secret")) {
        (Some(token), Some(secret)) => Ok(OAuthCredential {
            token,
            secret,
            kind,
        }),
        (token, secret) => {
            error!(
                ?kind,
                token_present = token.is_some(),
                secret_present = secret.is_some(),
                "OAuth token response missing fields"
            );
            Err(AuthError::Init(format!(
                "{kind:?} token response lacks oauth_token or oauth_token_secret"
            )))
        }
    }
}
