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

//! CLI configuration: a TOML file for everything except secrets, which only
//! come from the environment.

use anyhow::{anyhow, Context, Result};
use catalog_client::{CatalogConfig, Credentials};
use chartwise::PipelineConfig;
use llm_contracts::{ModelSettings, Provider};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSection {
    pub search_url: Option<String>,
    pub login_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Values read from the environment.
pub struct Secrets {
    pub catalog_username: Option<String>,
    pub catalog_password: Option<String>,
    pub api_key: Option<String>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Self::from_toml_str(&source)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => Self::default(),
        };
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Environment variables override the file for catalog URLs.
    pub fn catalog_config(&self, env: impl Fn(&str) -> Option<String>) -> Result<CatalogConfig> {
        let search_url = env("CATALOG_SEARCH_URL")
            .or_else(|| self.catalog.search_url.clone())
            .ok_or_else(|| anyhow!("catalog search_url is not configured"))?;
        let login_url = env("CATALOG_LOGIN_URL")
            .or_else(|| self.catalog.login_url.clone())
            .ok_or_else(|| anyhow!("catalog login_url is not configured"))?;

        let mut config = CatalogConfig::new(search_url, login_url);
        if let Some(timeout) = self.catalog.timeout_seconds {
            config.timeout_seconds = timeout;
        }
        config.paging = self.pipeline.paging;
        Ok(config)
    }
}

impl Secrets {
    pub fn for_provider(provider: &Provider) -> Self {
        Self::lookup(|key| std::env::var(key).ok(), provider)
    }

    pub fn lookup(env: impl Fn(&str) -> Option<String>, provider: &Provider) -> Self {
        let key_var = match provider {
            Provider::OpenAI => Some("OPENAI_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::Ollama => None,
            Provider::Custom(_) => Some("LLM_API_KEY"),
        };
        Self {
            catalog_username: env("CATALOG_USERNAME"),
            catalog_password: env("CATALOG_PASSWORD"),
            api_key: key_var.and_then(&env),
        }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        match (&self.catalog_username, &self.catalog_password) {
            (Some(user), Some(pass)) => Ok(Credentials::new(user, pass)),
            _ => Err(anyhow!(
                "CATALOG_USERNAME and CATALOG_PASSWORD must be set"
            )),
        }
    }
}
