use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use stream_interceptor::scripted::{ScriptedEventSourceClass, ScriptedFetch};
use stream_interceptor::NativeFetch;
use streamscope_cli::Pipeline;
use tokio::fs;

use crate::cli::context::CliContext;
use crate::cli::observe::{observe, ObserveRequest};
use crate::cli::output::OutputFormat;

const REPLAY_ORIGIN: &str = "https://replay.local";

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Recorded response body
    pub file: PathBuf,

    /// Content type to serve the body with
    #[arg(long, default_value = "text/event-stream")]
    pub content_type: String,

    /// Bytes per body chunk
    #[arg(long, default_value_t = 4096)]
    pub chunk_size: usize,

    /// Pause between chunks, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Print router metrics to stderr when done
    #[arg(long)]
    pub metrics: bool,
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    if args.chunk_size == 0 {
        bail!("--chunk-size must be at least 1");
    }
    let content = fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let chunks: Vec<Vec<u8>> = content
        .chunks(args.chunk_size)
        .map(|chunk| chunk.to_vec())
        .collect();

    let name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stream".to_string());
    let url = format!("{REPLAY_ORIGIN}/{name}");

    let scripted = ScriptedFetch::new();
    if args.delay_ms == 0 {
        scripted.respond(&url, &args.content_type, chunks);
    } else {
        scripted.respond_slowly(
            &url,
            &args.content_type,
            chunks,
            Duration::from_millis(args.delay_ms),
        );
    }
    let fetch: Arc<dyn NativeFetch> = scripted;

    let pipeline = Pipeline::start(ctx.config().clone());
    let observation = observe(
        &pipeline,
        ScriptedEventSourceClass::new(),
        fetch,
        ObserveRequest {
            url,
            method: "GET".to_string(),
        },
        &output,
        tokio::time::sleep(Duration::from_secs(args.timeout_secs)),
    )
    .await;
    if args.metrics {
        eprint!("{}", pipeline.render_metrics());
    }
    pipeline.shutdown().await?;

    let observation = observation?;
    if observation.events > 0 && !observation.completed {
        bail!("replay timed out before the stream completed");
    }
    Ok(())
}
