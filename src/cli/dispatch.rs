use super::config::cmd_config;
use super::env::CliArgs;
use super::parse::cmd_parse;
use super::replay::cmd_replay;
use super::watch::cmd_watch;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    let output = cli.output.clone();
    match cli.command.clone() {
        Commands::Parse(args) => cmd_parse(args, output).await,
        Commands::Replay(args) => cmd_replay(args, ctx, output).await,
        Commands::Watch(args) => cmd_watch(args, ctx, output).await,
        Commands::Config => cmd_config(ctx, output),
    }
}
