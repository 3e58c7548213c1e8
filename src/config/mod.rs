pub mod cli;
pub mod session_config;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_file_extension, validate_path, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "plan-enroll")]
#[command(about = "Check prerequisites and run enrollment sessions against a curriculum plan")]
pub struct CliConfig {
    /// Path to the TOML session file
    #[arg(short, long, default_value = "session.toml")]
    pub config: String,

    /// Directory that input and output paths are resolved against
    /// (defaults to the session file's directory)
    #[arg(long)]
    pub base_dir: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Load and validate everything without writing exports")]
    pub dry_run: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn resolved_base_dir(&self) -> String {
        if let Some(base_dir) = &self.base_dir {
            return base_dir.clone();
        }
        std::path::Path::new(&self.config)
            .parent()
            .map(|parent| parent.to_string_lossy().into_owned())
            .filter(|parent| !parent.is_empty())
            .unwrap_or_else(|| ".".to_string())
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("config", &self.config)?;
        validate_file_extension("config", &self.config, &["toml"])?;
        if let Some(base_dir) = &self.base_dir {
            validate_path("base_dir", base_dir)?;
        }
        Ok(())
    }
}
