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

use chartwise::Paging;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the catalog lives. Credentials are kept separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base of the dataset search API, e.g. `https://catalog.example/api`.
    pub search_url: String,
    pub login_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Taken from the pipeline configuration rather than this section.
    #[serde(skip)]
    pub paging: Paging,
}

fn default_timeout_seconds() -> u64 {
    60
}

impl CatalogConfig {
    pub fn new(search_url: impl Into<String>, login_url: impl Into<String>) -> Self {
        Self {
            search_url: search_url.into(),
            login_url: login_url.into(),
            timeout_seconds: default_timeout_seconds(),
            paging: Paging::default(),
        }
    }
}

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
