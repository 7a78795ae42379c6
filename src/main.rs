//! StreamScope - observe server-sent event and streaming fetch traffic
//!
//! Drives the interception pipeline from the command line: decode recorded streams, replay
//! them through every context, or watch a live endpoint.

mod cli;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
