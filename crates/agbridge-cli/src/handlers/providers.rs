use crate::args::OutputFormat;
use crate::handlers::print_json;
use agbridge_providers::get_provider_metadata;
use agbridge_runtime::Config;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderRow {
    agent_type: String,
    description: &'static str,
    storage_root: String,
    present: bool,
}

fn rows(config: &Config) -> Vec<ProviderRow> {
    config
        .enabled_providers()
        .into_iter()
        .map(|(agent, root)| ProviderRow {
            agent_type: agent.to_string(),
            description: get_provider_metadata(agent).description,
            present: root.exists(),
            storage_root: root.display().to_string(),
        })
        .collect()
}

fn print_rows(rows: &[ProviderRow]) {
    if rows.is_empty() {
        println!("No providers enabled.");
        return;
    }
    for row in rows {
        let marker = if row.present { "" } else { "  (missing)" };
        println!(
            "{:<15} {}{}\n{:<15} {}",
            row.agent_type, row.storage_root, marker, "", row.description
        );
    }
}

pub fn list(config: &Config, format: OutputFormat) -> Result<()> {
    let rows = rows(config);
    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Plain => {
            print_rows(&rows);
            Ok(())
        }
    }
}

/// Replace the `[providers]` section with what exists on this host, keeping
/// the rest of the config.
pub fn detect(config_path: &Path, format: OutputFormat) -> Result<()> {
    let mut config = Config::load_from(config_path)?;
    config.providers = Config::detect().providers;
    config.save_to(config_path)?;
    tracing::info!(path = %config_path.display(), "wrote config");

    let rows = rows(&config);
    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Plain => {
            if config.providers.is_empty() {
                println!("No backend storage found; every family stays enabled at its default root.");
            } else {
                print_rows(&rows);
            }
            println!("Config written to {}", config_path.display());
            Ok(())
        }
    }
}
