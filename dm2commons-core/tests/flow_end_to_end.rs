// End-to-end runs of the flow against mocked Digitalt Museum and Commons endpoints.
// Every request the flow sends to Commons is recorded so the tests can assert on
// which protocol steps ran.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dm2commons_core::artifact::{ArtifactRecord, MediaRecord, MediaRef, MediaVariant};
use dm2commons_core::config::BridgeConfig;
use dm2commons_core::contract::{MockArtifactSource, MockCommonsTransport, SignedRequest};
use dm2commons_core::error::TransportError;
use dm2commons_core::flow::Flow;
use dm2commons_core::session::InMemorySessionStore;
use dm2commons_core::upload::UploadResult;

fn config() -> BridgeConfig {
    BridgeConfig {
        commons_base: "https://commons.example.org/w/".into(),
        consumer_key: Some("consumer-key".into()),
        consumer_secret: Some("consumer-secret".into()),
        ..BridgeConfig::default()
    }
}

fn source() -> MockArtifactSource {
    let mut source = MockArtifactSource::new();
    source.expect_fetch_artifact().returning(|id| {
        Ok(ArtifactRecord {
            id: id.to_string(),
            title: [("sv", "Vas")].into_iter().collect(),
            material: [("sv", "Glas")].into_iter().collect(),
            owner: "Nordiska museet".into(),
            media: vec![MediaRef {
                media_id: "m1".into(),
            }],
            ..ArtifactRecord::default()
        })
    });
    source.expect_fetch_media().returning(|id| {
        Ok(MediaRecord {
            id: id.to_string(),
            variants: vec![MediaVariant {
                content_type: "image/jpeg".into(),
                url: format!("https://images.example.org/{id}.jpg"),
            }],
        })
    });
    source
        .expect_fetch_image()
        .returning(|_| Ok(b"jpeg bytes".to_vec()));
    source
}

/// Commons double: answers the handshake, hands out tokens, and replies to the
/// upload and structured-data calls with the given results.
fn commons(
    upload_reply: &'static str,
    sdc_reply: Result<&'static str, &'static str>,
) -> (MockCommonsTransport, Arc<Mutex<Vec<SignedRequest>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();
    let mut transport = MockCommonsTransport::new();
    transport.expect_send().returning(move |req: SignedRequest| {
        recorded.lock().unwrap().push(req.clone());
        if let Some(title) = req.param("title") {
            if title == "Special:OAuth/initiate" {
                return Ok("oauth_token=rt&oauth_token_secret=rs".into());
            }
            if title == "Special:OAuth/token" {
                return Ok("oauth_token=at&oauth_token_secret=as".into());
            }
        }
        match (req.param("meta"), req.param("action")) {
            (Some("tokens"), _) => Ok(r#"{"query":{"tokens":{"csrftoken":"abc+\\"}}}"#.into()),
            (_, Some("upload")) => Ok(upload_reply.into()),
            (_, Some("wbeditentity")) => sdc_reply
                .map(str::to_string)
                .map_err(|e| TransportError::Connection(e.into())),
            other => panic!("unexpected Commons request {other:?}"),
        }
    });
    (transport, calls)
}

fn actions(calls: &Arc<Mutex<Vec<SignedRequest>>>) -> Vec<String> {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter_map(|r| r.param("action").map(str::to_string))
        .collect()
}

#[tokio::test]
async fn vase_is_uploaded_with_generated_metadata() {
    let source = source();
    let (transport, calls) = commons(
        r#"{"upload":{"result":"Success","filename":"Digitalt_Museum_123_Vas.jpg"}}"#,
        Ok(r#"{"success":1}"#),
    );
    let store = InMemorySessionStore::new(Duration::from_secs(60));
    let config = config();
    let flow = Flow::new(&source, &transport, &store, &config);
    let session = flow.open_session();

    let preview = flow
        .start(&session, "https://digitaltmuseum.se/123/vas")
        .await
        .expect("start should succeed");
    assert_eq!(preview.filename, "Digitalt_Museum_123_Vas.jpg");
    assert!(preview.description.contains("accession number = 123"));
    assert!(preview
        .categories
        .contains(&"Objects made of glas".to_string()));

    let authorize_url = flow.authorize(&session).await.expect("initiate should succeed");
    assert!(authorize_url.starts_with(
        "https://commons.example.org/w/index.php?title=Special:OAuth/authorize&oauth_token=rt"
    ));
    flow.callback(&session, "verifier-from-commons")
        .await
        .expect("exchange should succeed");

    let result = flow.upload(&session).await.expect("upload should run");
    assert_eq!(
        result,
        UploadResult::Success {
            filename: "Digitalt_Museum_123_Vas.jpg".into()
        }
    );
    assert_eq!(actions(&calls), vec!["query", "upload", "query", "wbeditentity"]);

    let calls = calls.lock().unwrap();
    let upload = calls
        .iter()
        .find(|r| r.param("action") == Some("upload"))
        .unwrap();
    assert_eq!(upload.param("filename"), Some("Digitalt_Museum_123_Vas.jpg"));
    assert!(upload
        .param("text")
        .unwrap()
        .contains("accession number = 123"));
}

#[tokio::test]
async fn warning_response_is_a_failure_without_structured_data() {
    let source = source();
    let (transport, calls) = commons(r#"{"upload":{"result":"Warning"}}"#, Ok("{}"));
    let store = InMemorySessionStore::new(Duration::from_secs(60));
    let config = config();
    let flow = Flow::new(&source, &transport, &store, &config);
    let session = flow.open_session();

    flow.start(&session, "https://digitaltmuseum.se/123/vas")
        .await
        .unwrap();
    flow.authorize(&session).await.unwrap();
    flow.callback(&session, "v").await.unwrap();
    let result = flow.upload(&session).await.unwrap();

    assert!(matches!(result, UploadResult::Failure { ref code, .. } if code == "Warning"));
    assert!(!actions(&calls).contains(&"wbeditentity".to_string()));
}

#[tokio::test]
async fn structured_data_failure_does_not_undo_success() {
    let source = source();
    let (transport, calls) = commons(
        r#"{"upload":{"result":"Success","filename":"F.jpg"}}"#,
        Err("connection reset by peer"),
    );
    let store = InMemorySessionStore::new(Duration::from_secs(60));
    let config = config();
    let flow = Flow::new(&source, &transport, &store, &config);
    let session = flow.open_session();

    flow.start(&session, "https://digitaltmuseum.se/123/vas")
        .await
        .unwrap();
    flow.authorize(&session).await.unwrap();
    flow.callback(&session, "v").await.unwrap();
    let result = flow.upload(&session).await.unwrap();

    assert_eq!(
        result,
        UploadResult::Success {
            filename: "F.jpg".into()
        }
    );
    assert!(actions(&calls).contains(&"wbeditentity".to_string()));
}
