//! Layered configuration for `rq`.
//!
//! Values come from, in increasing order of precedence: a global config
//! file, `RQ_CONFIG_*` environment variables, and `rqrc` files in the
//! project root. Command-line flags given explicitly override all of them.

use std::path::{Path, PathBuf};

pub use clap::ArgMatches;
use clap::parser::ValueSource;
pub use config::Config as RqConfig;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File};
use miette::{Diagnostic, Result};
use thiserror::Error;

const PROJECT_FILES: &[&str] = &["rqrc", ".rqrc", "rqrc.toml", ".rqrc.toml"];

/// Implemented by commands that pick up defaults from [`RqConfig`].
pub trait RqConfigLayer {
    fn layer_config(&mut self, _matches: &ArgMatches, _config: &RqConfig) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum RqConfigError {
    #[error(transparent)]
    #[diagnostic(code(rq::config))]
    ConfigError(#[from] ConfigError),

    #[error("Invalid value for `{key}` in config: {source}")]
    #[diagnostic(
        code(rq::config::value),
        help("Boolean settings accept true/false, yes/no, on/off or 1/0.")
    )]
    InvalidValue {
        key: String,
        #[source]
        source: ConfigError,
    },
}

/// Sets `*value` from `config[key]`, unless `arg` was given on the command
/// line. Missing keys leave `*value` alone.
pub fn layer_bool(
    matches: &ArgMatches,
    config: &RqConfig,
    arg: &str,
    key: &str,
    value: &mut bool,
) -> Result<()> {
    if matches.value_source(arg) == Some(ValueSource::CommandLine) {
        return Ok(());
    }
    match config.get_bool(key) {
        Ok(found) => {
            *value = found;
            Ok(())
        }
        Err(ConfigError::NotFound(_)) => Ok(()),
        Err(source) => Err(RqConfigError::InvalidValue {
            key: key.into(),
            source,
        }
        .into()),
    }
}

pub struct RqConfigOptions {
    global: bool,
    env: bool,
    pkg_root: Option<PathBuf>,
    global_config_file: Option<PathBuf>,
}

impl Default for RqConfigOptions {
    fn default() -> Self {
        RqConfigOptions {
            global: true,
            env: true,
            pkg_root: None,
            global_config_file: None,
        }
    }
}

impl RqConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn env(mut self, env: bool) -> Self {
        self.env = env;
        self
    }

    pub fn pkg_root(mut self, root: Option<PathBuf>) -> Self {
        self.pkg_root = root;
        self
    }

    pub fn global_config_file(mut self, file: Option<PathBuf>) -> Self {
        self.global_config_file = file;
        self
    }

    pub fn load(self) -> Result<RqConfig> {
        let mut builder = RqConfig::builder();
        if self.global {
            if let Some(config_file) = &self.global_config_file {
                builder = optional_file(builder, config_file);
            }
        }
        if self.env {
            builder = builder.add_source(Environment::with_prefix("rq_config"));
        }
        if let Some(root) = &self.pkg_root {
            for name in PROJECT_FILES {
                builder = optional_file(builder, &root.join(name));
            }
        }
        Ok(builder.build().map_err(RqConfigError::ConfigError)?)
    }
}

fn optional_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> ConfigBuilder<DefaultState> {
    let path = path.display().to_string();
    builder.add_source(File::with_name(&path).required(false))
}
