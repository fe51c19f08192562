use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

/// Creates a minimal config file for the CLI to read.
fn create_minimal_config() -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        b"source_api_base: \"http://127.0.0.1:9/api/1/\"\ncommons_base: \"http://127.0.0.1:9/w/\"\n",
    )
    .expect("Writing temp config failed");
    config
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("dm2commons").expect("Binary exists");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("preview").and(predicate::str::contains("upload")));
}

#[test]
fn preview_rejects_foreign_url_with_generic_message() {
    let config = create_minimal_config();
    let mut cmd = Command::cargo_bin("dm2commons").expect("Binary exists");
    cmd.arg("preview")
        .arg("--url")
        .arg("https://example.org/123/vas")
        .arg("--config")
        .arg(config.path());

    cmd.assert().failure().stderr(predicate::str::contains(
        "That does not look like a Digitalt Museum artifact link.",
    ));
}

#[test]
fn preview_reports_unreachable_source_without_detail() {
    let config = create_minimal_config();
    let mut cmd = Command::cargo_bin("dm2commons").expect("Binary exists");
    cmd.arg("preview")
        .arg("--url")
        .arg("https://digitaltmuseum.se/123/vas")
        .arg("--config")
        .arg(config.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains(
            "Could not fetch the artifact from Digitalt Museum.",
        ))
        .stdout(predicate::str::contains("127.0.0.1").not());
}

#[test]
fn upload_without_url_is_a_usage_error() {
    let mut cmd = Command::cargo_bin("dm2commons").expect("Binary exists");
    cmd.arg("upload");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--url"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use dm2commons::cli::{run, Cli, Commands};

    // Defaults from the environment; the invalid URL is rejected before any network access.
    let cli = Cli {
        command: Commands::Preview {
            url: "not a url".into(),
            config: None,
            json: false,
        },
    };

    let err = run(cli).await.expect_err("an invalid artifact URL must fail the preview");
    assert!(err.to_string().contains("Digitalt Museum artifact link"));

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
