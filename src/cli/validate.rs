use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use formfill_cli::Mapping;
use serde_json::json;

use super::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Mapping file (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub mapping: PathBuf,
}

pub async fn cmd_validate(args: ValidateArgs, output: OutputFormat) -> Result<()> {
    let mapping = Mapping::load(&args.mapping)?;
    mapping.validate()?;

    let trigger = mapping.success.as_ref().map(|s| s.trigger.name());
    match output {
        OutputFormat::Human => {
            println!(
                "Mapping '{}' is valid: {} steps against {}",
                mapping.name,
                mapping.steps.len(),
                mapping.target_url
            );
            if let Some(trigger) = trigger {
                println!("Success signal: {}", trigger);
            }
        }
        OutputFormat::Json => println!(
            "{}",
            json!({
                "valid": true,
                "name": mapping.name,
                "steps": mapping.steps.len(),
                "targetUrl": mapping.target_url,
                "successTrigger": trigger,
            })
        ),
    }
    Ok(())
}
