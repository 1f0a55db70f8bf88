//! The `settings` subcommands, for inspecting the program settings file
use crate::settings::{Settings, get_settings_file_path};
use anyhow::{Context, Result};
use clap::Subcommand;

/// Subcommands for settings
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Print the path from which the settings file is read
    Path,
    /// Print the settings currently in effect, including defaults for anything not set
    Show,
    /// Print the contents of a placeholder `settings.toml`
    DumpDefault,
}

impl SettingsSubcommands {
    /// Execute the supplied settings subcommand
    pub fn execute(self) -> Result<()> {
        let output = match self {
            Self::Path => get_settings_file_path().display().to_string(),
            Self::Show => effective_settings()?,
            Self::DumpDefault => Settings::default_file_contents(),
        };
        println!("{}", output.trim_end());

        Ok(())
    }
}

/// The loaded settings, formatted as TOML
fn effective_settings() -> Result<String> {
    let settings = Settings::load().context("Failed to load settings.")?;
    toml::to_string(&settings).context("Could not format settings")
}
