use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    AnalysisBoundary, CandidateFile, HttpAnalysisBoundary, PreviewRegistry, RequestState,
    SelectionController, SubmissionController, SubmitDisposition, WorkflowEvent,
};
use shared::domain;

mod config;

#[derive(Parser, Debug)]
#[command(about = "Submit an image and a prompt to the analysis service")]
struct Args {
    /// Analysis service base URL; overrides configuration.
    #[arg(long)]
    endpoint: Option<String>,

    /// Print the raw response body as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one image with a natural-language prompt
    Analyze {
        /// Path to the image (png, jpg, jpeg or gif, at most 10 MiB)
        #[arg(long, short = 'i')]
        image: PathBuf,

        /// Question to ask about the image (3 to 500 characters)
        #[arg(long, short = 'p')]
        prompt: String,

        /// Response length cap forwarded to the service
        #[arg(long)]
        max_new_tokens: Option<u32>,
    },
    /// Probe the service's health endpoint
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let settings = config::load_settings();
    let endpoint = config::normalize_endpoint_url(
        args.endpoint.as_deref().unwrap_or(&settings.endpoint_url),
    )?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_seconds))
        .build()
        .context("failed to build http client")?;
    let boundary = Arc::new(HttpAnalysisBoundary::with_client(http, endpoint));

    match args.command {
        Command::Analyze {
            image,
            prompt,
            max_new_tokens,
        } => {
            run_analyze(
                boundary,
                image,
                prompt,
                max_new_tokens.or(settings.max_new_tokens),
                args.json,
            )
            .await
        }
        Command::Health => run_health(boundary, args.json).await,
    }
}

async fn run_analyze(
    boundary: Arc<HttpAnalysisBoundary>,
    image: PathBuf,
    prompt: String,
    max_new_tokens: Option<u32>,
    json: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(&image)
        .await
        .with_context(|| format!("failed to read image '{}'", image.display()))?;
    let filename = image
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();
    let media_type = filename
        .rsplit_once('.')
        .and_then(|(_, extension)| domain::media_type_for_extension(extension))
        .unwrap_or("application/octet-stream");

    let selection = Arc::new(SelectionController::new(PreviewRegistry::new()));
    if let Err(rejection) = selection.select(vec![CandidateFile::new(filename, media_type, bytes)])
    {
        bail!("{rejection}");
    }

    let controller = SubmissionController::with_max_new_tokens(boundary, selection, max_new_tokens);
    let mut events = controller.subscribe_events();
    match controller.submit(&prompt).await {
        SubmitDisposition::Accepted => {}
        SubmitDisposition::IneligiblePrompt => bail!(
            "prompt must be between {} and {} characters",
            domain::PROMPT_MIN_CHARS,
            domain::PROMPT_MAX_CHARS
        ),
        other => bail!("submission was not accepted: {other:?}"),
    }

    loop {
        let WorkflowEvent::StateChanged(state) = events
            .recv()
            .await
            .context("workflow event stream closed")?;
        match state {
            RequestState::Succeeded(response) => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                } else {
                    println!("{}", response.response);
                    if let Some(seconds) = response.processing_time {
                        println!("Processed in {seconds:.2}s");
                    }
                    if let Some(model) = response.model_info {
                        println!("Model: {} ({})", model.name, model.device);
                    }
                }
                return Ok(());
            }
            RequestState::Failed(failure) => bail!("{}", failure.message),
            RequestState::Idle | RequestState::Submitting => {}
        }
    }
}

async fn run_health(boundary: Arc<HttpAnalysisBoundary>, json: bool) -> Result<()> {
    let health = boundary
        .health()
        .await
        .map_err(|failure| anyhow::anyhow!("{}", failure.message))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&health)?);
    } else {
        println!("Status: {}", health.status);
        if let Some(model_loaded) = health.model_loaded {
            println!("Model loaded: {model_loaded}");
        }
        if let Some(device) = health.device {
            println!("Device: {device}");
        }
    }
    Ok(())
}
