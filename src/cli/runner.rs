//! CLI runner - executes commands

use super::app::App;
use super::commands::{Cli, Commands};
use crate::config::Settings;
use crate::error::Result;
use crate::orchestrator::WorkUnit;
use crate::pipeline::PipelineRegistry;
use crate::types::DateRange;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Pipelines => self.pipelines(),
            Commands::Serve { port } => {
                let app = self.app()?;
                let port = port.unwrap_or(app.settings().server.port);
                super::serve(Arc::new(app), port).await
            }
            Commands::Dispatch { start, end } => {
                let app = self.app()?;
                let range = app.dispatch_range(start.as_deref(), end.as_deref())?;
                let report = app.dispatch(range).await?;
                emit(&report)
            }
            Commands::Run {
                pipeline,
                account,
                start,
                end,
            } => {
                let app = self.app()?;
                let unit = WorkUnit::new(
                    pipeline.as_str(),
                    account.as_str(),
                    DateRange::parse(start, end)?,
                );
                let summary = app.run(&unit).await?;
                emit(&summary)
            }
            Commands::AuthUrl => {
                let url = self.app()?.oauth()?.authorize_url()?;
                println!("{url}");
                Ok(())
            }
        }
    }

    fn app(&self) -> Result<App> {
        let settings = Settings::load(self.cli.config.as_deref())?;
        App::from_settings(settings)
    }

    /// One JSON line per pipeline
    fn pipelines(&self) -> Result<()> {
        for pipeline in PipelineRegistry::builtin().iter() {
            let line = json!({
                "name": pipeline.name,
                "level": pipeline.level,
                "breakdowns": pipeline.breakdowns,
                "table": pipeline.table_name("{account_id}"),
                "schema": pipeline.sink_schema(),
            });
            if self.cli.verbose {
                println!("{}", serde_json::to_string_pretty(&line)?);
            } else {
                println!("{line}");
            }
        }
        Ok(())
    }
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
