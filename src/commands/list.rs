use std::path::PathBuf;

use async_trait::async_trait;
use clap::Args;
use miette::{IntoDiagnostic, Result, WrapErr};
use rq_config::RqConfigLayer;
use rq_manifest::Manifest;
use rq_requirement::Requirement;
use serde::Serialize;
use term_grid::{Cell, Direction, Filling, Grid, GridOptions};

use crate::commands::RqCommand;

/// List the declarations in a manifest.
#[derive(Debug, Args)]
#[clap(visible_aliases(["ls"]))]
pub struct ListCmd {
    /// Manifest to read. Defaults to `requirements.txt` in the project
    /// directory.
    #[arg()]
    file: Option<PathBuf>,

    #[arg(from_global)]
    root: Option<PathBuf>,

    #[arg(from_global)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Listed<'a> {
    name: &'a str,
    normalized: &'a str,
    extras: &'a [String],
    constraint: Option<String>,
    /// `"index"`, or the download URL.
    source: String,
    marker: Option<&'a str>,
    line: usize,
}

impl<'a> Listed<'a> {
    fn new(req: &'a Requirement, line: usize) -> Self {
        Listed {
            name: req.name.as_str(),
            normalized: req.name.normalized(),
            extras: &req.extras,
            constraint: req.constraint(),
            source: req
                .url()
                .map(|url| url.to_string())
                .unwrap_or_else(|| "index".into()),
            marker: req.marker.as_deref(),
            line,
        }
    }
}

#[async_trait]
impl RqCommand for ListCmd {
    async fn execute(self) -> Result<()> {
        let file = self.file.clone().unwrap_or_else(|| {
            self.root
                .clone()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("requirements.txt")
        });
        let manifest = Manifest::from_path(&file).await?;
        let listed = manifest
            .requirements()
            .map(|(entry, req)| Listed::new(req, entry.line))
            .collect::<Vec<_>>();

        if self.json {
            let output = serde_json::to_string_pretty(&listed)
                .into_diagnostic()
                .wrap_err("list::serialize")?;
            println!("{output}");
            return Ok(());
        }

        let mut grid = Grid::new(GridOptions {
            filling: Filling::Spaces(2),
            direction: Direction::LeftToRight,
        });
        for item in &listed {
            let name = if item.extras.is_empty() {
                item.name.to_string()
            } else {
                format!("{}[{}]", item.name, item.extras.join(","))
            };
            let constraint = match (&item.constraint, item.source.as_str()) {
                (Some(constraint), _) => constraint.clone(),
                (None, "index") => "*".into(),
                (None, url) => format!("@ {url}"),
            };
            grid.add(Cell::from(name));
            grid.add(Cell::from(constraint));
            grid.add(Cell::from(format!("line {}", item.line)));
        }
        print!("{}", grid.fit_into_columns(3));
        Ok(())
    }
}

impl RqConfigLayer for ListCmd {}
