//! `rq` reads, checks and formats Python requirements manifests.

use std::path::PathBuf;

use async_trait::async_trait;
use clap::{ArgMatches, CommandFactory, FromArgMatches as _, Parser, Subcommand};
use directories::ProjectDirs;
use miette::{IntoDiagnostic, Result};
use rq_config::{RqConfig, RqConfigLayer, RqConfigOptions};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use commands::{check::CheckCmd, fmt::FmtCmd, list::ListCmd, RqCommand};
pub use error::RqError;

mod commands;
mod error;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Requisite {
    /// Project directory to operate on. Defaults to the current directory.
    #[arg(global = true, long = "root")]
    root: Option<PathBuf>,

    /// File to read configuration values from.
    #[arg(global = true, long)]
    config: Option<PathBuf>,

    /// Log output level/directive. Supports plain loglevels (off, error,
    /// warn, info, debug, trace) as well as more advanced directives in the
    /// format `target[span{field=value}]=level`.
    #[clap(global = true, long, default_value = "warn")]
    loglevel: String,

    /// Disable all output
    #[arg(global = true, long, short)]
    quiet: bool,

    /// Format output as JSON.
    #[arg(global = true, long)]
    json: bool,

    #[command(subcommand)]
    subcommand: RqCmd,
}

impl Requisite {
    fn setup_logging(&self) -> Result<()> {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(
                EnvFilter::builder()
                    .with_default_directive(if self.quiet {
                        LevelFilter::OFF.into()
                    } else {
                        self.loglevel.parse().into_diagnostic()?
                    })
                    .from_env_lossy(),
            )
            .init();
        Ok(())
    }

    pub async fn load() -> Result<()> {
        let start = std::time::Instant::now();
        let matches = Requisite::command().get_matches();
        let mut rq = Requisite::from_arg_matches(&matches).into_diagnostic()?;
        let root = rq.root.clone().unwrap_or_else(|| PathBuf::from("."));
        let global_config_file = rq.config.clone().or_else(|| {
            ProjectDirs::from("", "", "requisite")
                .map(|d| d.config_dir().to_owned().join("rqrc.toml"))
        });
        let cfg = RqConfigOptions::new()
            .global_config_file(global_config_file)
            .pkg_root(Some(root))
            .load()?;
        rq.layer_config(&matches, &cfg)?;
        rq.setup_logging()?;
        rq.execute().await?;
        tracing::info!("Ran in {}s", start.elapsed().as_millis() as f32 / 1000.0);
        Ok(())
    }
}

#[derive(Debug, Subcommand)]
pub enum RqCmd {
    /// Check manifests for duplicate, invalid or unpinned declarations.
    Check(CheckCmd),

    /// List the declarations in a manifest.
    List(ListCmd),

    /// Print a manifest in canonical form.
    Fmt(FmtCmd),
}

#[async_trait]
impl RqCommand for Requisite {
    async fn execute(self) -> Result<()> {
        tracing::info!("Running command: {:#?}", self.subcommand);
        match self.subcommand {
            RqCmd::Check(check) => check.execute().await,
            RqCmd::List(list) => list.execute().await,
            RqCmd::Fmt(fmt) => fmt.execute().await,
        }
    }
}

impl RqConfigLayer for Requisite {
    fn layer_config(&mut self, args: &ArgMatches, conf: &RqConfig) -> Result<()> {
        let Some((_, sub_args)) = args.subcommand() else {
            return Ok(());
        };
        match self.subcommand {
            RqCmd::Check(ref mut check) => check.layer_config(sub_args, conf),
            RqCmd::List(ref mut list) => list.layer_config(sub_args, conf),
            RqCmd::Fmt(ref mut fmt) => fmt.layer_config(sub_args, conf),
        }
    }
}
