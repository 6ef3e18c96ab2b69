//! `parcel config` – show, locate or create the config file.

use anyhow::{bail, Result};
use parcel_core::config::{self, Settings};
use std::path::Path;

use crate::cli::ConfigAction;

pub fn run_config(action: ConfigAction, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => print!("{}", config::load_from_or_default(&path).to_toml()?),
        ConfigAction::Init { force } => init(&path, force)?,
    }
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Settings::default().save_to(path)?;
    println!("wrote default config to {}", path.display());
    Ok(())
}
