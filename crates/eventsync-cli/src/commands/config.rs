//! `eventsync config`: inspect the effective configuration.

use eventsync_importers::ImporterRegistry;

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// Prints the configuration after environment overrides. Secret references
/// are printed as written, never resolved.
pub fn dump(config: &AppConfig) -> CliResult<()> {
    println!("# config.toml ({})", AppConfig::default_path().display());
    println!("{}", config.to_toml()?);
    Ok(())
}

pub fn validate(config: &AppConfig, registry: &ImporterRegistry) -> CliResult<()> {
    let problems = config.validate(registry);
    if !problems.is_empty() {
        return Err(CliError::Config(format!(
            "{} problem(s):\n  {}",
            problems.len(),
            problems.join("\n  ")
        )));
    }

    println!(
        "Configuration is valid ({} organization(s)).",
        config.organizations.len()
    );
    Ok(())
}

pub fn path() -> CliResult<()> {
    println!("config: {}", AppConfig::default_path().display());
    println!("database: {}", AppConfig::default_database_path().display());
    Ok(())
}
