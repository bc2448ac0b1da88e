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

//! Prompt text for each model call.

use crate::model::{ChartSpec, Dataset, TemporalFormat};
use indexmap::IndexMap;
use serde_json::{json, Value};

pub const ANALYST_SYSTEM_PROMPT: &str = "You are a senior data analyst. You are skilled at \
exploring statistical data, finding relationships between datasets and designing charts \
that answer a question directly.";

const DISCOVERY_TEMPLATE: &str = r#"Task: strict dataset filtering.
Keep only the candidate datasets that are directly relevant to the question. Remove every
dataset that is only indirectly related or redundant with a better one.

Question: {question}

Candidate datasets (keyed by dataset key):
{datasets}

Return the keys of the datasets to keep in `dataset_key` and their names, in the same
order, in `dataset_name`."#;

const PLANNING_TEMPLATE: &str = r#"Based on the question, analyse each dataset below and propose exactly one chart for
every dataset that helps answer it. Write down your reasoning for each phase.

Question: {question}

Datasets (with column metadata):
{datasets}

Administrative levels by country:
{admin_levels}

Phase 1. Break the question down into the entities, metrics and dimensions it asks about.
Phase 2. Drop datasets that cannot answer the question or are clearly worse than another.
Phase 3. For each remaining dataset choose the smallest set of columns that answers it.
Phase 4. Put date, datetime, space, point, line, polygon, nominal and ordinal columns in
         `x` when they are needed as dimensions. Put integer and float columns in `y`.
Phase 5. Put every column that must restrict the scope (time range, place, category) in
         `filter`. A column may appear in `x` or `y` and in `filter` at the same time.
Phase 6. Formats and calculations:
         - date and datetime columns: `format` is one of {temporal_formats}.
         - space, point, line and polygon columns: `format` is the most general
           admin_level_N (lowest N) that the question needs.
         - every other column: `format` is "".
         - integer and float columns in `y`: `calculation` is one of
           count, sum, avg, min, max, distinct_count.

Finish with the answer in a single ```json block of this shape:
```json
{
  "charts": [
    {
      "id": "dataset id",
      "name": "dataset name",
      "x": [{"columnID": "", "displayName": "", "type": "", "format": ""}],
      "y": [{"columnID": "", "displayName": "", "type": "", "calculation": ""}],
      "filter": [{"columnID": "", "displayName": "", "type": "", "format": "", "operator": "", "value": []}]
    }
  ]
}
```"#;

const REFINEMENT_TEMPLATE: &str = r#"You are given chart queries prepared for a question. Each filter lists the values the
catalog can filter on. Rewrite the queries for the question under these rules.

Question: {question}

Queries:
{charts}

1. Return one query per input query, with the same `id`, in the same order. Copy `x`
   and `y` unchanged.
2. Each `filter` list must keep exactly the same entries: same number, same `columnID`,
   same order. Do not add, remove or reorder entries. Change nothing except `operator`
   and `value`.
3. Set `operator` from the column type:
   - date, datetime, nominal and space: "in"
   - integer and float: one of "range", "lt", "gt", "lte", "gte"
4. Set `value` strictly from what the question asks, choosing from the listed values.
   For nominal columns reason step by step about names and places: an institution named
   after one city may be located in another.
5. If the question says nothing about a filter, leave its `value` empty and its
   `operator` empty."#;

const INTERPRETATION_TEMPLATE: &str = r#"Question: ***{question}***
Information: {charts}

The charts above were gathered for the question. Analyse them in detail, then answer the
question and give a conclusion in no more than 300 words. Answer in the language of the
question."#;

pub fn discovery_prompt(question: &str, candidates: &IndexMap<String, Dataset>) -> String {
    fill(
        DISCOVERY_TEMPLATE,
        &[("question", question), ("datasets", &pretty(candidates))],
    )
}

pub fn planning_prompt(question: &str, datasets: &[Dataset]) -> String {
    let formats = TemporalFormat::ALL
        .iter()
        .map(|f| format!("\"{}\"", crate::model::Granularity::Temporal(*f)))
        .collect::<Vec<_>>()
        .join(", ");

    fill(
        PLANNING_TEMPLATE,
        &[
            ("question", question),
            ("datasets", &pretty(datasets)),
            ("admin_levels", &pretty(&admin_levels())),
            ("temporal_formats", &formats),
        ],
    )
}

pub fn refinement_prompt(question: &str, charts: &[ChartSpec]) -> String {
    fill(
        REFINEMENT_TEMPLATE,
        &[("question", question), ("charts", &pretty(charts))],
    )
}

pub fn interpretation_prompt(question: &str, charts: &[ChartSpec]) -> String {
    fill(
        INTERPRETATION_TEMPLATE,
        &[("question", question), ("charts", &pretty(charts))],
    )
}

/// Replaces `{name}` placeholders in one pass over the template, so inserted
/// text is never scanned for placeholders again.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let hit = values.iter().find_map(|(name, value)| {
            let inner = tail.strip_prefix('{')?.strip_prefix(name)?;
            inner.strip_prefix('}').map(|after| (*value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Meaning of each admin level in the countries the catalog covers.
pub fn admin_levels() -> Value {
    json!({
        "Taiwan": {
            "admin_level_2": "國家",
            "admin_level_4": "直轄市/縣市/六都",
            "admin_level_7": "直轄市的區",
            "admin_level_8": "縣轄市/鄉鎮",
            "admin_level_9": "村/里",
            "admin_level_10": "鄰"
        },
        "Japan": {
            "admin_level_2": "Country",
            "admin_level_4": "Prefecture (To/Dō/Fu/Ken)",
            "admin_level_5": "Subprefecture (Hokkaido only)",
            "admin_level_6": "County (Gun) / City subprefecture (Tokyo)",
            "admin_level_7": "City / Town / Village",
            "admin_level_8": "Ward (Ku, in designated cities)",
            "admin_level_9": "District / Town block (Chō/Machi/Chōme)",
            "admin_level_10": "Area (Ōaza/Aza) / Block number (Banchi)"
        },
        "Malaysia": {
            "admin_level_2": "Country",
            "admin_level_4": "State (Negeri) / Federal Territory (Wilayah Persekutuan)",
            "admin_level_5": "Division (Bahagian, Sabah and Sarawak only)",
            "admin_level_6": "District (Daerah)",
            "admin_level_7": "Subdistrict (Daerah Kecil / Mukim)",
            "admin_level_8": "Mukim / Town (Bandar) / Village (Kampung)"
        },
        "Singapore": {
            "admin_level_2": "Country",
            "admin_level_6": "District (Community Development Council)"
        }
    })
}

fn pretty<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
