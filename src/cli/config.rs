use anyhow::Result;

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

pub fn cmd_config(ctx: &CliContext, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(ctx.config())?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(ctx.config())?),
        OutputFormat::Human => {
            match ctx.config_path() {
                Some(path) => println!("Effective configuration ({}):", path.display()),
                None => println!("Effective configuration (defaults):"),
            }
            print!("{}", serde_yaml::to_string(ctx.config())?);
        }
    }
    Ok(())
}
