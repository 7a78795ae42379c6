use clap::Subcommand;

use super::parse::ParseArgs;
use super::replay::ReplayArgs;
use super::watch::WatchArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Decode an event-stream file into frames
    Parse(ParseArgs),

    /// Push a recorded stream through the full capture pipeline
    Replay(ReplayArgs),

    /// Observe a live streaming endpoint
    Watch(WatchArgs),

    /// Show the effective configuration
    Config,
}
