use anyhow::Result;
use calnotify_core::Settings;
use owo_colors::OwoColorize;
use std::path::Path;

pub fn path(explicit: Option<&Path>, settings: &Settings) -> Result<()> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Settings::config_path()?,
    };

    println!("{}", "Paths".bold());
    println!("  Config:     {}", config_path.display());
    println!("  Database:   {}", settings.database.resolved_path().display());

    Ok(())
}

pub fn init(explicit: Option<&Path>, force: bool) -> Result<()> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Settings::config_path()?,
    };

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            config_path.display()
        );
    }

    Settings::create_default_config(&config_path)?;
    println!("{} {}", "Wrote".green(), config_path.display());
    Ok(())
}
