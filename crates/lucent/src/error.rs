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

use crate::clause::Channel;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecommendationError {
    #[error("Compilation error: {0}")]
    Compile(#[from] CompileError),
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
    #[error("Action error: {0}")]
    Action(#[from] ActionError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] SerialisationError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Attribute '{attribute}' not found in dataset metadata")]
    AttributeNotFound { attribute: String },
    #[error("Ambiguous channel specification: {attributes:?} all claim channel '{channel}'")]
    AmbiguousChannel {
        channel: Channel,
        attributes: Vec<String>,
    },
    #[error("Invalid clause '{description}': {reason}")]
    InvalidClause { description: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Column '{column}' not found in frame")]
    ColumnNotFound { column: String },
    #[error("Unsupported aggregation '{aggregation}' for column '{column}'")]
    UnsupportedAggregation { column: String, aggregation: String },
    #[error("View '{title}' has no attribute on channel '{channel}'")]
    MissingChannel { title: String, channel: Channel },
    #[error("Columns have mismatched lengths: '{column}' has {found} rows, expected {expected}")]
    RaggedFrame {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Column '{column}' holds a missing value")]
    MissingValue { column: String },
    #[error("Frame operation failed: {reason}")]
    Polars { reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Action '{name}' has not been registered")]
    NotRegistered { name: String },
    #[error("Action '{name}' is already registered")]
    AlreadyRegistered { name: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {field} is out of range ({value})")]
    OutOfRange { field: String, value: String },
    #[error("Failed to load configuration: {reason}")]
    LoadFailed { reason: String },
}

#[derive(Error, Debug)]
pub enum SerialisationError {
    #[error("JSON serialisation failed: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("YAML serialisation failed: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
}

pub type Result<T> = std::result::Result<T, RecommendationError>;
pub type CompileResult<T> = std::result::Result<T, CompileError>;
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;
pub type ActionResult<T> = std::result::Result<T, ActionError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl From<anyhow::Error> for ConfigError {
    fn from(err: anyhow::Error) -> Self {
        ConfigError::LoadFailed {
            reason: format!("{err:#}"),
        }
    }
}

impl From<polars::error::PolarsError> for ExecutionError {
    fn from(err: polars::error::PolarsError) -> Self {
        ExecutionError::Polars {
            reason: err.to_string(),
        }
    }
}

impl RecommendationError {
    /// Errors the caller can route around (by editing the intent or picking
    /// another action) rather than a broken dataset or configuration.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RecommendationError::Compile(CompileError::AmbiguousChannel { .. })
                | RecommendationError::Compile(CompileError::InvalidClause { .. })
                | RecommendationError::Action(_)
        )
    }
    pub fn category(&self) -> &'static str {
        match self {
            RecommendationError::Compile(_) => "Compile",
            RecommendationError::Execution(_) => "Execution",
            RecommendationError::Action(_) => "Action",
            RecommendationError::Config(_) => "Configuration",
            RecommendationError::Serialisation(_) => "Serialisation",
        }
    }
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            RecommendationError::Compile(CompileError::AmbiguousChannel { channel, .. }) => vec![
                format!("Assign at most one clause to channel '{channel}'"),
                "Drop the explicit channel and let the encoder place the attribute".to_string(),
            ],
            RecommendationError::Compile(CompileError::AttributeNotFound { .. }) => vec![
                "Check the attribute spelling against the dataset columns".to_string(),
                "Recompute metadata after changing the dataset".to_string(),
            ],
            RecommendationError::Action(ActionError::NotRegistered { .. }) => {
                vec!["List the registered actions to see valid names".to_string()]
            }
            _ => vec!["Check the error message for specific guidance".to_string()],
        }
    }
}
