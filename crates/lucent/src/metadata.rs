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

use crate::clause::{DataModel, DataType};
use crate::error::{CompileError, CompileResult, ExecutionResult};
use crate::frame::Frame;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub unique_values: Vec<Value>,
    pub cardinality: usize,
    pub data_type: DataType,
    pub data_model: DataModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_max: Option<(f64, f64)>,
}

impl ColumnMeta {
    /// Builds column metadata from its unique values; cardinality and the
    /// quantitative range are derived.
    pub fn new(mut unique_values: Vec<Value>, data_type: DataType) -> Self {
        unique_values.sort();
        unique_values.dedup();
        let min_max = if data_type == DataType::Quantitative {
            let mut numeric = unique_values.iter().filter_map(Value::as_f64);
            numeric.next().map(|first| {
                numeric.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x)))
            })
        } else {
            None
        };
        Self {
            cardinality: unique_values.len(),
            unique_values,
            data_type,
            data_model: default_model(data_type),
            min_max,
        }
    }
}

fn default_model(data_type: DataType) -> DataModel {
    match data_type {
        DataType::Quantitative => DataModel::Measure,
        _ => DataModel::Dimension,
    }
}

fn infer_type(dtype: &polars::prelude::DataType) -> DataType {
    use polars::prelude::DataType as FrameType;
    match dtype {
        FrameType::Date | FrameType::Datetime(_, _) => DataType::Temporal,
        d if d.is_integer() || d.is_float() => DataType::Quantitative,
        _ => DataType::Nominal,
    }
}

/// Read-only description of a dataset's columns, consumed by the compiler
/// and the encoder. Column order is the dataset's column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    columns: IndexMap<String, ColumnMeta>,
}

impl DatasetMetadata {
    pub fn new() -> Self {
        Self::default()
    }
    /// Profiles every frame column: type from the column dtype, distinct
    /// values and cardinality from the frame, range from its extremes.
    pub fn from_frame(frame: &Frame) -> ExecutionResult<Self> {
        let mut columns = IndexMap::new();
        for name in frame.column_names() {
            let data_type = infer_type(frame.dtype(name)?);
            let unique_values = frame.unique(name)?;
            let min_max = match data_type {
                DataType::Quantitative => frame.min_max(name)?,
                _ => None,
            };
            let meta = ColumnMeta {
                cardinality: frame.n_unique(name)?,
                unique_values,
                data_type,
                data_model: default_model(data_type),
                min_max,
            };
            columns.insert(name.to_string(), meta);
        }
        Ok(Self { columns })
    }
    pub fn with_column(mut self, name: impl Into<String>, meta: ColumnMeta) -> Self {
        self.columns.insert(name.into(), meta);
        self
    }
    /// Overrides an inferred data type; the data model follows the new type.
    /// Unknown columns are left untouched.
    pub fn with_data_type(mut self, name: &str, data_type: DataType) -> Self {
        if let Some(meta) = self.columns.get_mut(name) {
            let unique = std::mem::take(&mut meta.unique_values);
            *meta = ColumnMeta::new(unique, data_type);
        }
        self
    }
    pub fn with_data_model(mut self, name: &str, data_model: DataModel) -> Self {
        if let Some(meta) = self.columns.get_mut(name) {
            meta.data_model = data_model;
        }
        self
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.columns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
    pub fn get(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.get(name)
    }
    pub fn lookup(&self, name: &str) -> CompileResult<&ColumnMeta> {
        self.get(name).ok_or_else(|| CompileError::AttributeNotFound {
            attribute: name.to_string(),
        })
    }
    pub fn cardinality(&self, name: &str) -> CompileResult<usize> {
        self.lookup(name).map(|m| m.cardinality)
    }
    pub fn min_max(&self, name: &str) -> Option<(f64, f64)> {
        self.get(name).and_then(|m| m.min_max)
    }
    pub fn columns_of_type(&self, data_type: DataType) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, m)| m.data_type == data_type)
            .map(|(name, _)| name.as_str())
            .collect()
    }
    pub fn columns_of_model(&self, data_model: DataModel) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, m)| m.data_model == data_model)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
