use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use stream_interceptor::scripted::ScriptedEventSourceClass;
use streamscope_cli::{Pipeline, ReqwestFetch};
use tracing::{info, warn};
use url::Url;

use crate::cli::context::CliContext;
use crate::cli::observe::{observe, ObserveRequest};
use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct WatchArgs {
    /// Streaming endpoint to observe
    pub url: String,

    /// HTTP method
    #[arg(short, long, default_value = "GET")]
    pub method: String,
}

pub async fn cmd_watch(args: WatchArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let url = Url::parse(&args.url).with_context(|| format!("Invalid URL: {}", args.url))?;
    info!(%url, method = %args.method, "watching endpoint (ctrl-c to stop)");

    let pipeline = Pipeline::start(ctx.config().clone());
    let observation = observe(
        &pipeline,
        // only fetch traffic is issued by this command
        ScriptedEventSourceClass::new(),
        Arc::new(ReqwestFetch::default()),
        ObserveRequest {
            url: url.to_string(),
            method: args.method.to_ascii_uppercase(),
        },
        &output,
        async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        },
    )
    .await;
    pipeline.shutdown().await?;
    observation.map(|_| ())
}
