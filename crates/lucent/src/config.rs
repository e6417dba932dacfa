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

use crate::error::{ConfigError, ConfigResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Views kept per recommendation after ranking.
    pub top_k: usize,
    /// Columns at or above this cardinality are neither enumerated by the
    /// Filter action nor scored on filtered shapes.
    pub filter_cardinality_limit: usize,
    pub default_bin_size: usize,
    /// Bar charts over more categories than this are sorted ascending.
    pub bar_sort_cardinality: usize,
    pub heatmap_row_threshold: usize,
    pub heatmap_bins: usize,
    pub max_enhance_attributes: usize,
    pub parallel: bool,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            top_k: 15,
            filter_cardinality_limit: 40,
            default_bin_size: 10,
            bar_sort_cardinality: 5,
            heatmap_row_threshold: 5000,
            heatmap_bins: 40,
            max_enhance_attributes: 3,
            parallel: true,
        }
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        let out_of_range = |field: &str, value: usize| ConfigError::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
        };
        if self.top_k == 0 {
            return Err(out_of_range("top_k", self.top_k));
        }
        if self.default_bin_size == 0 {
            return Err(out_of_range("default_bin_size", self.default_bin_size));
        }
        if self.heatmap_bins == 0 {
            return Err(out_of_range("heatmap_bins", self.heatmap_bins));
        }
        Ok(())
    }
    pub fn for_exploration() -> Self {
        Self {
            top_k: 30,
            max_enhance_attributes: 4,
            ..Default::default()
        }
    }
    pub fn for_performance() -> Self {
        Self {
            top_k: 5,
            filter_cardinality_limit: 20,
            heatmap_row_threshold: 1000,
            ..Default::default()
        }
    }
    /// Single-threaded variant, handy when comparing runs step by step.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .context("Failed to parse recommendation config")?;
        config.validate()?;
        Ok(config)
    }
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml_str(&content)
    }
}
