use std::path::{Path, PathBuf};

use async_trait::async_trait;
use clap::Args;
use colored::*;
use miette::{IntoDiagnostic, Report, Result, WrapErr};
use rq_config::{layer_bool, ArgMatches, RqConfig, RqConfigLayer};
use rq_manifest::{CheckOptions, Checker, Finding, Manifest, ManifestError, Severity};

use crate::commands::RqCommand;
use crate::error::RqError;

/// Check manifests for duplicate, invalid or unpinned declarations.
#[derive(Debug, Args)]
pub struct CheckCmd {
    /// Manifests to check. Defaults to `requirements.txt` in the project
    /// directory.
    #[arg()]
    files: Vec<PathBuf>,

    /// Warn about declarations that aren't pinned to an exact version.
    #[arg(long)]
    require_pins: bool,

    /// Treat `name @ url` declarations as errors.
    #[arg(long)]
    no_urls: bool,

    /// Don't follow `-r` and `-c` lines into other files.
    #[arg(long)]
    no_includes: bool,

    #[arg(from_global)]
    root: Option<PathBuf>,

    #[arg(from_global)]
    quiet: bool,

    #[arg(from_global)]
    json: bool,
}

#[async_trait]
impl RqCommand for CheckCmd {
    async fn execute(self) -> Result<()> {
        let options = CheckOptions {
            require_pins: self.require_pins,
            allow_urls: !self.no_urls,
        };
        let files = if self.files.is_empty() {
            vec![self
                .root
                .clone()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("requirements.txt")]
        } else {
            self.files.clone()
        };

        let mut findings = Vec::new();
        for file in &files {
            tracing::info!("checking {}", file.display());
            let mut checker = Checker::new(options.clone());
            for manifest in self.load(file).await? {
                match manifest {
                    Ok(manifest) => {
                        for finding in checker.check(&manifest) {
                            self.report(&manifest, &finding);
                            findings.push(finding);
                        }
                    }
                    Err(err) => {
                        findings.extend(parse_findings(&err));
                        if !self.quiet && !self.json {
                            eprintln!("{:?}", Report::new(err));
                        }
                    }
                }
            }
        }

        let errors = findings.iter().filter(|f| f.is_error()).count();
        let warnings = findings.len() - errors;
        if self.json {
            let output = serde_json::to_string_pretty(&findings)
                .into_diagnostic()
                .wrap_err("check::serialize")?;
            println!("{output}");
        } else if !self.quiet && findings.is_empty() {
            println!(
                "{} {} looks good.",
                "✓".green(),
                files
                    .iter()
                    .map(|f| f.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
                    .bold()
            );
        }

        if errors > 0 {
            Err(RqError::CheckFailed { errors, warnings }.into())
        } else {
            if warnings > 0 && !self.quiet && !self.json {
                println!("{} {warnings} warning(s).", "!".yellow());
            }
            Ok(())
        }
    }
}

impl CheckCmd {
    /// Loads `file` and, unless told otherwise, everything it includes.
    /// Manifests that fail to parse come back as `Err` so their problems
    /// can be reported alongside everyone else's.
    async fn load(&self, file: &Path) -> Result<Vec<Result<Manifest, ManifestError>>> {
        if self.no_includes {
            return match Manifest::from_path(file).await {
                Err(err @ ManifestError::ParseError { .. }) => Ok(vec![Err(err)]),
                other => Ok(vec![Ok(other?)]),
            };
        }
        Ok(Manifest::load_with_includes(file).await?)
    }

    fn report(&self, manifest: &Manifest, finding: &Finding) {
        if self.quiet || self.json {
            return;
        }
        eprintln!("{:?}", Report::new(finding.report(manifest)));
    }
}

fn parse_findings(err: &ManifestError) -> Vec<Finding> {
    let ManifestError::ParseError { name, errors, .. } = err else {
        return Vec::new();
    };
    errors
        .iter()
        .map(|e| Finding {
            severity: Severity::Error,
            code: "manifest::parse",
            message: e.kind.to_string(),
            file: name.clone(),
            line: e.line,
            offset: e.span.offset(),
            len: e.span.len(),
        })
        .collect()
}

impl RqConfigLayer for CheckCmd {
    fn layer_config(&mut self, matches: &ArgMatches, config: &RqConfig) -> Result<()> {
        layer_bool(matches, config, "require_pins", "require_pins", &mut self.require_pins)?;

        let mut allow_urls = !self.no_urls;
        layer_bool(matches, config, "no_urls", "allow_urls", &mut allow_urls)?;
        self.no_urls = !allow_urls;

        let mut follow_includes = !self.no_includes;
        layer_bool(matches, config, "no_includes", "follow_includes", &mut follow_includes)?;
        self.no_includes = !follow_includes;
        Ok(())
    }
}
