use anyhow::Result;

use super::output::OutputFormat;
use super::runtime::LoadedConfig;

pub fn cmd_info(loaded: &LoadedConfig, output: OutputFormat) -> Result<()> {
    let config = &loaded.config;
    match output {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "build_date": env!("BUILD_DATE"),
                "git_hash": env!("GIT_HASH"),
                "config_path": loaded.path.as_ref().map(|path| path.display().to_string()),
                "config": config,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(config)?),
        OutputFormat::Human => {
            println!("Geolocation Permission Broker");
            println!("=============================");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Build Date: {}", env!("BUILD_DATE"));
            println!("Git Commit: {}", env!("GIT_HASH"));
            println!();

            println!("Configuration:");
            match &loaded.path {
                Some(path) => println!("- Source: {}", path.display()),
                None => println!("- Source: (defaults)"),
            }
            println!("- Event Capacity: {}", config.event_capacity);
            match config.max_queue_len {
                Some(limit) => println!("- Max Queue Length: {}", limit),
                None => println!("- Max Queue Length: unbounded"),
            }
        }
    }
    Ok(())
}
