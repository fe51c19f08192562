//! Step coordinator: carries one artifact from the source catalog to Commons.
//!
//! This module ties the components together around a session. A user walks through
//! five steps, each a separate call:
//!   - [`Flow::start`]: resolve a Digitalt Museum page URL, fetch the artifact and its
//!     first image, store both in the session
//!   - [`Flow::preview`]: render filename, description and categories for review
//!   - [`Flow::authorize`]: begin the OAuth handshake, returning the Commons URL the
//!     user must visit
//!   - [`Flow::callback`]: exchange the verifier the user brings back for an access pair
//!   - [`Flow::upload`]: download the image and run the upload protocol
//!
//! # Session fields
//! Every step loads the session, checks that the fields it needs were stored by an
//! earlier step, and saves what it changed. A missing field fails with
//! [`FlowError::MissingStep`] naming the step that would repopulate it; an expired
//! session fails with [`FlowError::SessionExpired`] and the user starts over.
//!
//! # Error Handling
//! Component errors are logged where they happen and wrapped in [`FlowError`].
//! [`FlowError::user_message`] is the only text meant for end users and never
//! includes transport detail.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::artifact::{ArtifactRecord, LicenseInfo};
use crate::config::BridgeConfig;
use crate::contract::{ArtifactSource, CommonsTransport};
use crate::error::{AuthError, SessionError, UploadError, UpstreamError};
use crate::handshake::Handshake;
use crate::metadata;
use crate::session::{SessionId, SessionState, SessionStore};
use crate::source::artifact_id_from_url;
use crate::upload::{UploadOrchestrator, UploadRequest, UploadResult};

/// A step the user can safely be sent back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Start,
    Preview,
    Authorize,
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("not a Digitalt Museum artifact URL: {0}")]
    InvalidUrl(String),

    #[error("artifact {artifact_id} has no downloadable image")]
    NoImage { artifact_id: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("session expired")]
    SessionExpired,

    #[error("session has no data for this step; redo {0:?}")]
    MissingStep(Step),
}

impl From<SessionError> for FlowError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Expired => FlowError::SessionExpired,
            // Unknown ids are sessions the store already forgot.
            SessionError::Unknown => FlowError::SessionExpired,
        }
    }
}

impl FlowError {
    /// Generic text safe to show to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            FlowError::InvalidUrl(_) => "That does not look like a Digitalt Museum artifact link.",
            FlowError::NoImage { .. } => "This artifact has no image that can be uploaded.",
            FlowError::Upstream(_) => "Could not fetch the artifact from Digitalt Museum. Please try again later.",
            FlowError::Auth(AuthError::Config(_)) => "Uploading is not configured on this server.",
            FlowError::Auth(_) => "Authorization with Wikimedia Commons failed. Please authorize again.",
            FlowError::Upload(_) => "The upload to Wikimedia Commons failed. Please try again.",
            FlowError::SessionExpired => "Your session has expired. Please start over.",
            FlowError::MissingStep(Step::Authorize) => "Please authorize with Wikimedia Commons first.",
            FlowError::MissingStep(_) => "Please choose an artifact first.",
        }
    }

    /// The step the user should be sent back to.
    pub fn redirect(&self) -> Step {
        match self {
            FlowError::InvalidUrl(_)
            | FlowError::NoImage { .. }
            | FlowError::Upstream(_)
            | FlowError::SessionExpired => Step::Start,
            FlowError::Auth(AuthError::Config(_)) => Step::Preview,
            FlowError::Auth(_) => Step::Authorize,
            FlowError::Upload(_) => Step::Preview,
            FlowError::MissingStep(step) => *step,
        }
    }
}

/// What the user reviews before authorizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub artifact_id: String,
    pub title: String,
    pub creator: String,
    pub image_url: String,
    pub filename: String,
    pub description: String,
    pub categories: Vec<String>,
}

impl Preview {
    fn from_session(state: &SessionState) -> Result<Self, FlowError> {
        let (artifact, image_url, filename, license) = artifact_fields(state)?;
        Ok(Preview {
            artifact_id: artifact.id.clone(),
            title: artifact.title.or(metadata::UNTITLED).to_string(),
            creator: artifact.creator.or(metadata::UNKNOWN).to_string(),
            image_url: image_url.to_string(),
            filename: filename.to_string(),
            description: metadata::description(artifact, license),
            categories: metadata::categories(artifact),
        })
    }
}

pub struct Flow<'a, S, T, St>
where
    S: ArtifactSource + ?Sized,
    T: CommonsTransport + ?Sized,
    St: SessionStore + ?Sized,
{
    source: &'a S,
    transport: &'a T,
    store: &'a St,
    config: &'a BridgeConfig,
}

impl<'a, S, T, St> Flow<'a, S, T, St>
where
    S: ArtifactSource + ?Sized,
    T: CommonsTransport + ?Sized,
    St: SessionStore + ?Sized,
{
    pub fn new(source: &'a S, transport: &'a T, store: &'a St, config: &'a BridgeConfig) -> Self {
        Self {
            source,
            transport,
            store,
            config,
        }
    }

    /// Opens a fresh, empty session.
    pub fn open_session(&self) -> SessionId {
        self.store.create()
    }

    /// Fetches the artifact behind `source_url` and stores it in the session.
    ///
    /// Starting a new artifact drops any OAuth pair from an earlier one.
    pub async fn start(&self, id: &SessionId, source_url: &str) -> Result<Preview, FlowError> {
        let artifact_id = artifact_id_from_url(source_url).ok_or_else(|| {
            warn!(url = %source_url, "Rejected source URL");
            FlowError::InvalidUrl(source_url.to_string())
        })?;
        let mut state = self.store.load(id)?;
        info!(session_id = %id, artifact_id = %artifact_id, step = "start", "Starting flow");

        let artifact = self.source.fetch_artifact(&artifact_id).await.map_err(|e| {
            error!(artifact_id = %artifact_id, error = ?e, "Artifact fetch failed");
            FlowError::Upstream(e)
        })?;
        let image_url = self.first_image_url(&artifact).await?;
        let filename = metadata::upload_filename(&artifact);
        let license = LicenseInfo::for_artifact(&artifact);

        state.begin_flow(artifact, image_url, filename, license);
        let preview = Preview::from_session(&state)?;
        self.store.save(id, state)?;
        info!(
            session_id = %id,
            artifact_id = %preview.artifact_id,
            filename = %preview.filename,
            "Artifact stored in session"
        );
        Ok(preview)
    }

    pub async fn preview(&self, id: &SessionId) -> Result<Preview, FlowError> {
        let state = self.store.load(id)?;
        Preview::from_session(&state)
    }

    /// Starts the handshake and returns the authorization URL for the user.
    pub async fn authorize(&self, id: &SessionId) -> Result<String, FlowError> {
        let mut state = self.store.load(id)?;
        artifact_fields(&state)?;
        info!(session_id = %id, step = "authorize", "Starting authorization");

        let redirect = Handshake::new(self.transport, self.config)
            .initiate(&mut state)
            .await?;
        self.store.save(id, state)?;
        Ok(redirect)
    }

    /// Completes the handshake with the verifier returned by Commons.
    pub async fn callback(&self, id: &SessionId, verifier: &str) -> Result<(), FlowError> {
        let mut state = self.store.load(id)?;
        artifact_fields(&state)?;
        if state.request_token.is_none() {
            warn!(session_id = %id, "Callback without a pending authorization");
            return Err(FlowError::MissingStep(Step::Authorize));
        }
        info!(session_id = %id, step = "callback", "Completing authorization");

        let access = Handshake::new(self.transport, self.config)
            .exchange(&mut state, verifier)
            .await?;
        state.access_token = Some(access);
        self.store.save(id, state)?;
        Ok(())
    }

    /// Downloads the stored image and uploads it with its metadata.
    ///
    /// Once the upload protocol has run, the access pair is gone from the session
    /// whatever the outcome; after a definitive result the artifact fields go too.
    /// The upload result is returned even if the session expired while it ran.
    pub async fn upload(&self, id: &SessionId) -> Result<UploadResult, FlowError> {
        let mut state = self.store.load(id)?;
        let request = {
            let (artifact, image_url, filename, license) = artifact_fields(&state)?;
            if state.access_token.is_none() {
                warn!(session_id = %id, "Upload without an access token");
                return Err(FlowError::MissingStep(Step::Authorize));
            }
            info!(session_id = %id, filename = %filename, step = "upload", "Preparing upload");

            let image_bytes = self.source.fetch_image(image_url).await.map_err(|e| {
                error!(url = %image_url, error = ?e, "Image download failed");
                FlowError::Upstream(e)
            })?;
            UploadRequest {
                filename: filename.to_string(),
                image_bytes,
                description: metadata::description(artifact, license),
                categories: metadata::categories(artifact),
                statements: metadata::structured_data(artifact),
            }
        };
        let access = state
            .take_access_token()
            .ok_or(FlowError::MissingStep(Step::Authorize))?;

        let outcome = UploadOrchestrator::new(self.transport, self.config.api_url())
            .upload(request, &access)
            .await;
        if outcome.is_ok() {
            state.finish_flow();
        }
        // The upload already happened; a lost session must not hide its result.
        if let Err(e) = self.store.save(id, state) {
            warn!(
                session_id = %id,
                error = %e,
                "Session not saved after upload; returning upload result anyway"
            );
        }

        match &outcome {
            Ok(UploadResult::Success { filename }) => {
                info!(session_id = %id, filename = %filename, "Flow finished")
            }
            Ok(UploadResult::Failure { code, .. }) => {
                warn!(session_id = %id, code = %code, "Flow finished with rejected upload")
            }
            Err(e) => error!(session_id = %id, error = ?e, "Upload failed"),
        }
        outcome.map_err(FlowError::from)
    }

    async fn first_image_url(&self, artifact: &ArtifactRecord) -> Result<String, FlowError> {
        let no_image = || FlowError::NoImage {
            artifact_id: artifact.id.clone(),
        };
        let media_ref = artifact.media.first().ok_or_else(|| {
            warn!(artifact_id = %artifact.id, "Artifact has no media");
            no_image()
        })?;
        let media = self
            .source
            .fetch_media(&media_ref.media_id)
            .await
            .map_err(|e| {
                error!(media_id = %media_ref.media_id, error = ?e, "Media fetch failed");
                FlowError::Upstream(e)
            })?;
        media.image_url().map(str::to_string).ok_or_else(|| {
            warn!(artifact_id = %artifact.id, media_id = %media.id, "Media has no image variant");
            no_image()
        })
    }
}

fn artifact_fields(
    state: &SessionState,
) -> Result<(&ArtifactRecord, &str, &str, &LicenseInfo), FlowError> {
    match (
        &state.artifact,
        &state.image_url,
        &state.filename,
        &state.license,
    ) {
        (Some(artifact), Some(image_url), Some(filename), Some(license)) => {
            Ok((artifact, image_url, filename, license))
        }
        _ => Err(FlowError::MissingStep(Step::Start)),
    }
}
