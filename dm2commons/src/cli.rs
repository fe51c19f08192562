/// # dm2commons CLI Interface (Module)
///
/// Command parsing and the terminal side of the bridge. All domain logic lives in
/// [`dm2commons_core`]; this module builds the concrete clients, drives the
/// [`Flow`] steps in order, and turns step failures into the generic messages from
/// [`FlowError::user_message`].
///
/// ## Commands
/// - `preview --url <page>`: fetch an artifact and print what would be uploaded.
///   Needs no credentials.
/// - `upload --url <page>`: the full flow with the out-of-band OAuth callback. The
///   authorization URL is printed, the user approves on Commons and pastes the
///   verification code back into the terminal.
///
/// ## How To Use
/// - For command-line users: run the `dm2commons` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
use crate::commons::CommonsClient;
use crate::load_config::{load_config, load_from_env};
use anyhow::Result;
use clap::{Parser, Subcommand};
use dm2commons_core::config::BridgeConfig;
use dm2commons_core::flow::{Flow, FlowError, Preview};
use dm2commons_core::session::InMemorySessionStore;
use dm2commons_core::source::DigitaltMuseumClient;
use dm2commons_core::upload::UploadResult;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// CLI for dm2commons: upload Digitalt Museum artifacts to Wikimedia Commons.
#[derive(Parser)]
#[clap(
    name = "dm2commons",
    version,
    about = "Upload Digitalt Museum artifact images to Wikimedia Commons with generated metadata"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch an artifact and show the file name, description and categories
    Preview {
        /// Digitalt Museum artifact page, e.g. https://digitaltmuseum.se/021026479583/vas
        #[clap(long)]
        url: String,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Print the preview as JSON
        #[clap(long)]
        json: bool,
    },
    /// Authorize with Commons and upload the artifact image
    Upload {
        /// Digitalt Museum artifact page
        #[clap(long)]
        url: String,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Preview { url, config, json } => {
            let config = resolve_config(config.as_deref())?;
            tracing::info!(command = "preview", url = %url, "Previewing artifact");
            let source = DigitaltMuseumClient::from_config(&config)?;
            let transport = CommonsClient::new(&config)?;
            let store = InMemorySessionStore::new(config.session_timeout);
            let flow = Flow::new(&source, &transport, &store, &config);

            let session = flow.open_session();
            let preview = flow.start(&session, &url).await.map_err(step_failed)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
            } else {
                print_preview(&preview);
            }
            Ok(())
        }
        Commands::Upload { url, config } => {
            let config = resolve_config(config.as_deref())?;
            tracing::info!(command = "upload", url = %url, "Uploading artifact");
            let source = DigitaltMuseumClient::from_config(&config)?;
            let transport = CommonsClient::new(&config)?;
            let store = InMemorySessionStore::new(config.session_timeout);
            let flow = Flow::new(&source, &transport, &store, &config);

            let session = flow.open_session();
            let preview = flow.start(&session, &url).await.map_err(step_failed)?;
            print_preview(&preview);

            let authorize_url = flow.authorize(&session).await.map_err(step_failed)?;
            println!("\nOpen this URL, approve the request, then paste the verification code:");
            println!("{authorize_url}");
            let verifier = prompt("Verification code: ").await?;
            flow.callback(&session, &verifier)
                .await
                .map_err(step_failed)?;

            match flow.upload(&session).await.map_err(step_failed)? {
                UploadResult::Success { filename } => {
                    tracing::info!(command = "upload", filename = %filename, "Upload complete");
                    println!("Uploaded: {}", file_page_url(&config, &filename));
                    Ok(())
                }
                UploadResult::Failure { code, info } => {
                    tracing::error!(command = "upload", code = %code, info = %info, "Upload rejected");
                    Err(anyhow::anyhow!("Commons rejected the upload ({code}): {info}"))
                }
            }
        }
    }
}

fn resolve_config(path: Option<&Path>) -> Result<BridgeConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(load_from_env()),
    }
}

/// Logs the detailed failure and keeps only the user-facing text.
fn step_failed(e: FlowError) -> anyhow::Error {
    tracing::error!(error = %e, redirect = ?e.redirect(), "Flow step failed");
    anyhow::anyhow!(e.user_message())
}

fn print_preview(preview: &Preview) {
    println!("Artifact:  {}", preview.artifact_id);
    println!("Title:     {}", preview.title);
    println!("Creator:   {}", preview.creator);
    println!("Image:     {}", preview.image_url);
    println!("File name: {}", preview.filename);
    println!("Categories:");
    for category in &preview.categories {
        println!("  - {category}");
    }
    println!("Description:\n{}", preview.description);
}

fn file_page_url(config: &BridgeConfig, filename: &str) -> String {
    format!(
        "{}/index.php?title=File:{filename}",
        config.commons_base.trim_end_matches('/')
    )
}

async fn prompt(label: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow::anyhow!("No verification code entered"))?;
    Ok(line.trim().to_string())
}
