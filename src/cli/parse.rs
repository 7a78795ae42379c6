use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use frame_parser::{Frame, FrameParser, Utf8StreamDecoder};
use tokio::fs;
use tracing::{info, warn};

use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct ParseArgs {
    /// Event-stream file to decode
    pub file: PathBuf,

    /// Feed the parser this many bytes at a time
    #[arg(long, default_value_t = 4096)]
    pub chunk_size: usize,
}

pub async fn cmd_parse(args: ParseArgs, output: OutputFormat) -> Result<()> {
    if args.chunk_size == 0 {
        bail!("--chunk-size must be at least 1");
    }
    let content = fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut decoder = Utf8StreamDecoder::new();
    let mut parser = FrameParser::new();
    let mut frames = 0usize;

    for chunk in content.chunks(args.chunk_size) {
        let text = decoder.decode(chunk);
        for frame in parser.push(&text) {
            print_frame(&frame, &output)?;
            frames += 1;
        }
    }
    let tail = decoder.finish();
    for frame in parser.push(&tail) {
        print_frame(&frame, &output)?;
        frames += 1;
    }

    if let Some(residue) = parser.finish() {
        warn!(
            pending_lines = residue.pending_lines,
            partial = %residue.partial_line,
            "unterminated record at end of file was discarded"
        );
    }
    info!(frames, file = %args.file.display(), "parse finished");
    Ok(())
}

fn print_frame(frame: &Frame, output: &OutputFormat) -> Result<()> {
    output.emit(frame, || format!("[{}] {}", frame.event_type, frame.data))
}
