use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use formsession_core::FormSessionConfig;

/// Loads `path` strictly: unlike `FormSessionConfig::load`, a missing file
/// is an error here.
pub async fn check(path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = FormSessionConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid config in {}", path.display()))?;

    println!("{}", format!("{} is valid", path.display()).green());
    println!("{}", config.to_toml_string()?);
    Ok(())
}

pub fn print_default() -> Result<()> {
    print!("{}", FormSessionConfig::default().to_toml_string()?);
    Ok(())
}
