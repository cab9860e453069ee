use std::path::PathBuf;

use async_trait::async_trait;
use clap::Args;
use colored::*;
use miette::{IntoDiagnostic, Result, WrapErr};
use rq_config::{layer_bool, ArgMatches, RqConfig, RqConfigLayer};
use rq_manifest::Manifest;

use crate::commands::RqCommand;

/// Print a manifest in canonical form: one declaration per line, with
/// comments and blank lines removed and option lines kept.
#[derive(Debug, Args)]
pub struct FmtCmd {
    /// Manifest to format. Defaults to `requirements.txt` in the project
    /// directory.
    #[arg()]
    file: Option<PathBuf>,

    /// Sort declarations by normalized package name.
    #[arg(long)]
    sort: bool,

    /// Rewrite the file in place instead of printing it.
    #[arg(long, short)]
    write: bool,

    #[arg(from_global)]
    root: Option<PathBuf>,

    #[arg(from_global)]
    quiet: bool,
}

#[async_trait]
impl RqCommand for FmtCmd {
    async fn execute(self) -> Result<()> {
        let file = self.file.clone().unwrap_or_else(|| {
            self.root
                .clone()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("requirements.txt")
        });
        let manifest = Manifest::from_path(&file).await?;
        let formatted = manifest.to_canonical_string(self.sort);

        if !self.write {
            print!("{formatted}");
            return Ok(());
        }
        if formatted == manifest.source() {
            tracing::debug!("{} is already formatted", file.display());
            return Ok(());
        }
        async_std::fs::write(&file, formatted)
            .await
            .into_diagnostic()
            .wrap_err("fmt::write")?;
        if !self.quiet {
            println!("{} Formatted {}", "✓".green(), file.display().to_string().bold());
        }
        Ok(())
    }
}

impl RqConfigLayer for FmtCmd {
    fn layer_config(&mut self, matches: &ArgMatches, config: &RqConfig) -> Result<()> {
        layer_bool(matches, config, "sort", "sort", &mut self.sort)
    }
}
