use std::path::Path;

use anyhow::{bail, Result};
use colored::Colorize;

use txnorm::settings::{load_settings, save_settings, settings_path, Settings};

pub fn show(config: Option<&Path>) -> Result<()> {
    let path = config.map(Path::to_path_buf).unwrap_or_else(settings_path);
    let settings = load_settings(Some(&path))?;
    let origin = if path.exists() { "" } else { " (not found, showing defaults)" };
    eprintln!("{}{origin}", path.display().to_string().bold());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

pub fn init(config: Option<&Path>, force: bool) -> Result<()> {
    let path = config.map(Path::to_path_buf).unwrap_or_else(settings_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let written = save_settings(&Settings::default(), Some(&path))?;
    println!("{} {}", "Wrote".green(), written.display());
    Ok(())
}
