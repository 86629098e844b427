//! Shared setup for commands that run the engine.

use std::future::Future;

use tokio::runtime::Runtime;
use tracing::info;
use wayrelay::config::{config_file_path, ConfigFile};
use wayrelay::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Loads configuration, installs logging and owns the Tokio runtime.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _logging: LoggingGuard,
}

impl CliRunner {
    pub fn new() -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let logging = init_logging(&config.logging)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("wayrelay")
            .build()?;

        Ok(Self {
            config,
            runtime,
            _logging: logging,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = wayrelay::VERSION,
            command,
            config = %config_file_path().display(),
            "wayrelay starting"
        );
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
