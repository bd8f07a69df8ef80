pub mod compare;
pub mod describe;

use crate::cli::CommonArgs;
use crate::config::{AppConfig, CommandOverrides, PartialDescriptorConfig};
use crate::error::Result;
use tracing::info;

fn load_config(args: &CommonArgs, overrides: CommandOverrides<'_>) -> Result<AppConfig> {
    let partial = match &args.config {
        Some(path) => PartialDescriptorConfig::from_file(path)?,
        None => PartialDescriptorConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial.merge_with_cli(args, overrides)?;
    if let Some(profile) = &config.profile {
        info!("Using protein profile '{}'.", profile);
    }
    Ok(config)
}
