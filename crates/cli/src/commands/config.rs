//! `holdwatch config`

use std::path::Path;

use anyhow::{Context, Result, bail};
use holdwatch_core::Config;

/// Print the effective configuration and where it came from
pub fn cmd_config_show(cwd: &Path, config: &Config) -> Result<()> {
  let project_config = Config::project_config_path(cwd);
  let user_config = Config::user_config_path();

  println!("Effective configuration for: {}", cwd.display());
  println!();
  if project_config.exists() {
    println!("Using project config: {}", project_config.display());
  } else if let Some(user_path) = user_config.filter(|p| p.exists()) {
    println!("Using user config: {}", user_path.display());
  } else {
    println!("Using default configuration (no config file found)");
  }
  println!();

  let toml_str = toml::to_string_pretty(config).context("Failed to render config")?;
  println!("{}", toml_str);
  Ok(())
}

/// Write a commented template to `./holdwatch.toml`
pub fn cmd_config_init(cwd: &Path, force: bool) -> Result<()> {
  let config_path = Config::project_config_path(cwd);
  if config_path.exists() && !force {
    bail!(
      "Config file already exists: {} (use --force to overwrite)",
      config_path.display()
    );
  }

  std::fs::write(&config_path, Config::generate_template())
    .with_context(|| format!("Failed to write {}", config_path.display()))?;

  println!("Created config: {}", config_path.display());
  println!("Edit the file to tune thresholds, keywords and the analysis command.");
  Ok(())
}
