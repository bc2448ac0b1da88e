// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

mod args;
mod config;

use anyhow::{Context, Result};
use args::{Cli, Command};
use catalog_client::CatalogClient;
use chartwise::{interpret, ChartSpec, Pipeline};
use clap::Parser;
use config::{AppConfig, Secrets};
use llm_contracts::LanguageModel;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("debug,reqwest=info,hyper=info"))
    } else {
        EnvFilter::new("info,reqwest=warn,hyper=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;
    let secrets = Secrets::for_provider(&config.model.provider());

    let model = llm_providers::build_model(&config.model, secrets.api_key.clone())
        .context("building language model")?;
    // One client per invocation; it owns the catalog token.
    let catalog = CatalogClient::new(
        config.catalog_config(|key| std::env::var(key).ok())?,
        secrets.credentials()?,
    )?;
    let pipeline = Pipeline::new(model.as_ref(), &catalog).with_config(&config.pipeline);

    match cli.command {
        Command::Ask {
            question,
            answer,
            json,
        } => {
            info!(model = model.model_name(), "Answering question");
            let run = pipeline.run(&question).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&run.charts)?);
            } else {
                for chart in &run.charts {
                    println!("{}", summarise(chart));
                }
            }
            if answer {
                let text = interpret(model.as_ref(), &question, &run.charts).await?;
                println!("\n{text}");
            }
            println!("\n{}", run.trace);
        }
        Command::Datasets { question } => {
            let (datasets, trace) = pipeline.discover_datasets(&question).await?;
            for dataset in &datasets {
                println!("{}\t{}", dataset.id, dataset.name);
            }
            println!("\n{trace}");
        }
    }

    Ok(())
}

fn summarise(chart: &ChartSpec) -> String {
    let names = |columns: Vec<&str>| {
        if columns.is_empty() {
            "-".to_string()
        } else {
            columns.join(", ")
        }
    };
    let rows = match &chart.data {
        Some(serde_json::Value::Array(rows)) => rows.len().to_string(),
        Some(_) => "1".to_string(),
        None => "0".to_string(),
    };
    format!(
        "[{}] {}\n  x: {}\n  y: {}\n  filter: {}\n  rows: {}",
        chart.id,
        chart.name,
        names(chart.x.iter().map(|f| f.column.display_name.as_str()).collect()),
        names(chart.y.iter().map(|f| f.column.display_name.as_str()).collect()),
        names(
            chart
                .filter
                .iter()
                .map(|f| f.column.display_name.as_str())
                .collect()
        ),
        rows
    )
}
