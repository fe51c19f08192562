//! Upload orchestration: edit token → multipart file upload → structured data.
//!
//! Each step runs only if the previous one succeeded. A rejected upload (duplicate
//! file, bad name, warnings) comes back as [`UploadResult::Failure`] with the
//! server's code and info untouched. The structured-data step is best effort:
//! once the file is on Commons the result is `Success` no matter what happens to
//! the statements.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::contract::{CommonsTransport, FilePart, RequestBody, SignedRequest};
use crate::error::UploadError;
use crate::metadata::{claims_payload, Statement};
use crate::oauth::OAuthCredential;

/// Change tag recorded on every upload.
pub const UPLOAD_TAG: &str = "dm2commons";
pub const UPLOAD_COMMENT: &str = "Uploaded from Digitalt Museum with dm2commons";
const SDC_COMMENT: &str = "Structured data from Digitalt Museum";
const IMAGE_MIME: &str = "image/jpeg";

/// Everything needed to put one artifact image on Commons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub filename: String,
    pub image_bytes: Vec<u8>,
    /// Wikitext page content.
    pub description: String,
    pub categories: Vec<String>,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResult {
    /// The file exists on Commons under `filename`.
    Success { filename: String },
    /// Commons refused the upload; `code` and `info` are as the server sent them.
    Failure { code: String, info: String },
}

pub struct UploadOrchestrator<'a, T: CommonsTransport + ?Sized> {
    transport: &'a T,
    api_url: String,
}

impl<'a, T: CommonsTransport + ?Sized> UploadOrchestrator<'a, T> {
    pub fn new(transport: &'a T, api_url: impl Into<String>) -> Self {
        Self {
            transport,
            api_url: api_url.into(),
        }
    }

    pub async fn upload(
        &self,
        request: UploadRequest,
        access: &OAuthCredential,
    ) -> Result<UploadResult, UploadError> {
        info!(filename = %request.filename, size = request.image_bytes.len(), "Starting upload");

        let token = self.fetch_edit_token(access).await?;
        let body = self.post_file(&request, &token, access).await?;
        let result = interpret_upload_response(&body, &request.filename)?;

        match &result {
            UploadResult::Success { filename } => {
                info!(filename = %filename, "File uploaded");
                if request.statements.is_empty() {
                    debug!(filename = %filename, "No structured data to attach");
                } else if let Err(e) = self
                    .attach_structured_data(filename, &request.statements, access)
                    .await
                {
                    warn!(
                        filename = %filename,
                        error = %e,
                        "Structured data not attached; file upload stands"
                    );
                }
            }
            UploadResult::Failure { code, info } => {
                warn!(filename = %request.filename, code = %code, info = %info, "Upload rejected");
            }
        }
        Ok(result)
    }

    /// Fetches a CSRF token. Tokens are never reused across state-changing calls.
    async fn fetch_edit_token(&self, access: &OAuthCredential) -> Result<String, UploadError> {
        let request = SignedRequest::get(
            self.api_url.clone(),
            vec![
                ("action".into(), "query".into()),
                ("meta".into(), "tokens".into()),
                ("type".into(), "csrf".into()),
                ("format".into(), "json".into()),
            ],
        )
        .with_token(access);
        let body = self.transport.send(request).await.map_err(|e| {
            error!(error = %e, "Edit token request failed");
            UploadError::Transport(e)
        })?;

        let json: Value = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Edit token response was not JSON");
            UploadError::Token(format!("unreadable token response: {e}"))
        })?;
        json.pointer("/query/tokens/csrftoken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                error!("Edit token response lacks csrftoken");
                UploadError::Token("response lacks query.tokens.csrftoken".into())
            })
    }

    async fn post_file(
        &self,
        request: &UploadRequest,
        token: &str,
        access: &OAuthCredential,
    ) -> Result<String, UploadError> {
        let mut fields: Vec<(String, String)> = vec![
            ("action".into(), "upload".into()),
            ("filename".into(), request.filename.clone()),
            ("comment".into(), UPLOAD_COMMENT.into()),
            ("text".into(), request.description.clone()),
            ("tags".into(), UPLOAD_TAG.into()),
            ("token".into(), token.to_string()),
            ("ignorewarnings".into(), "1".into()),
            ("format".into(), "json".into()),
        ];
        fields.extend(
            request
                .categories
                .iter()
                .enumerate()
                .map(|(i, category)| (format!("categories[{i}]"), category.clone())),
        );
        let body = RequestBody::Multipart {
            fields,
            file: FilePart {
                filename: request.filename.clone(),
                mime: IMAGE_MIME.into(),
                bytes: request.image_bytes.clone(),
            },
        };

        self.transport
            .send(SignedRequest::post(self.api_url.clone(), body).with_token(access))
            .await
            .map_err(|e| {
                error!(filename = %request.filename, error = %e, "File upload request failed");
                UploadError::Transport(e)
            })
    }

    async fn attach_structured_data(
        &self,
        filename: &str,
        statements: &[Statement],
        access: &OAuthCredential,
    ) -> Result<(), UploadError> {
        let token = self.fetch_edit_token(access).await?;
        let data = claims_payload(statements).to_string();
        debug!(filename = %filename, data = %data, "Attaching structured data");

        let form = RequestBody::Form(vec![
            ("action".into(), "wbeditentity".into()),
            ("site".into(), "commonswiki".into()),
            ("title".into(), format!("File:{filename}")),
            ("data".into(), data),
            ("summary".into(), SDC_COMMENT.into()),
            ("tags".into(), UPLOAD_TAG.into()),
            ("token".into(), token),
            ("format".into(), "json".into()),
        ]);
        let body = self
            .transport
            .send(SignedRequest::post(self.api_url.clone(), form).with_token(access))
            .await?;

        let json: Value = serde_json::from_str(&body)?;
        if let Some((code, info)) = api_error(&json) {
            return Err(UploadError::StructuredData { code, info });
        }
        info!(filename = %filename, statements = statements.len(), "Structured data attached");
        Ok(())
    }
}

/// Reads the `upload` action response. Anything other than `result == "Success"` is
/// a [`UploadResult::Failure`].
fn interpret_upload_response(body: &str, requested: &str) -> Result<UploadResult, UploadError> {
    let json: Value = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "Upload response was not JSON");
        UploadError::Malformed(e)
    })?;

    if let Some((code, info)) = api_error(&json) {
        return Ok(UploadResult::Failure { code, info });
    }

    let upload = &json["upload"];
    match upload["result"].as_str() {
        Some("Success") => Ok(UploadResult::Success {
            filename: upload["filename"]
                .as_str()
                .filter(|f| !f.is_empty())
                .unwrap_or(requested)
                .to_string(),
        }),
        Some(other) => Ok(UploadResult::Failure {
            code: other.to_string(),
            info: upload
                .get("warnings")
                .map(Value::to_string)
                .unwrap_or_default(),
        }),
        None => Ok(UploadResult::Failure {
            code: "unknown".into(),
            info: body.to_string(),
        }),
    }
}

/// `error.code` and `error.info` from a MediaWiki API response, verbatim.
fn api_error(json: &Value) -> Option<(String, String)> {
    let error = json.get("error")?;
    Some((
        error["code"].as_str().unwrap_or_default().to_string(),
        error["info"].as_str().unwrap_or_default().to_string(),
    ))
}
