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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chartwise")]
#[command(about = "Answer analytical questions with charts built from a dataset catalog")]
pub struct Cli {
    /// TOML file with catalog, model and pipeline sections.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full pipeline and print the executed charts.
    Ask {
        question: String,

        /// Also ask the model to interpret the chart data.
        #[arg(long, default_value_t = false)]
        answer: bool,

        /// Print chart specs as JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Search the catalog and list the datasets the model picks.
    Datasets { question: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_accepts_flags_after_question() {
        let cli = Cli::parse_from(["chartwise", "ask", "Malaysia GDP 2019", "--answer", "--debug"]);
        assert!(cli.debug);
        match cli.command {
            Command::Ask {
                question,
                answer,
                json,
            } => {
                assert_eq!(question, "Malaysia GDP 2019");
                assert!(answer);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn datasets_takes_config_path() {
        let cli = Cli::parse_from(["chartwise", "--config", "cw.toml", "datasets", "rain"]);
        assert_eq!(cli.config, Some(PathBuf::from("cw.toml")));
        assert!(matches!(cli.command, Command::Datasets { question } if question == "rain"));
    }
}
