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

use crate::clause::{Channel, Clause, DataModel, RECORD};
use crate::config::RecommendationConfig;
use crate::error::{ExecutionError, ExecutionResult};
use crate::frame::Frame;
use crate::stats;
use crate::value::Value;
use crate::view::{Mark, View, ViewCollection};
use std::collections::BTreeMap;
use tracing::debug;

pub const X_BIN_START: &str = "xBinStart";
pub const Y_BIN_START: &str = "yBinStart";
pub const BIN_COUNT: &str = "count";

/// Materialises the data behind encoded views.
pub trait Executor: Send + Sync {
    fn execute(&self, views: &mut ViewCollection, frame: &Frame) -> ExecutionResult<()>;
}

/// Executes views against a [`Frame`] held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryExecutor {
    heatmap_row_threshold: usize,
    heatmap_bins: usize,
    parallel: bool,
}

impl Default for InMemoryExecutor {
    fn default() -> Self {
        Self::new(&RecommendationConfig::default())
    }
}

impl Executor for InMemoryExecutor {
    fn execute(&self, views: &mut ViewCollection, frame: &Frame) -> ExecutionResult<()> {
        views.try_for_each(self.parallel, |view| self.execute_view(view, frame))
    }
}

impl InMemoryExecutor {
    pub fn new(config: &RecommendationConfig) -> Self {
        Self {
            heatmap_row_threshold: config.heatmap_row_threshold,
            heatmap_bins: config.heatmap_bins,
            parallel: config.parallel,
        }
    }

    /// Applies the view's filters, then shapes the rows for its mark.
    /// Unencoded views are skipped.
    pub fn execute_view(&self, view: &mut View, frame: &Frame) -> ExecutionResult<()> {
        let Some(mark) = view.mark else {
            return Ok(());
        };
        let filtered = frame.apply_filters(view.filter_clauses())?;
        let data = match mark {
            Mark::Bar | Mark::Line => aggregate(view, &filtered)?,
            Mark::Histogram => bin(view, &filtered)?,
            Mark::Scatter | Mark::Heatmap => {
                if filtered.len() > self.heatmap_row_threshold {
                    debug!(
                        "{} rows exceed {}; drawing '{}' as a heatmap",
                        filtered.len(),
                        self.heatmap_row_threshold,
                        view
                    );
                    view.mark = Some(Mark::Heatmap);
                    bin_2d(view, &filtered, self.heatmap_bins)?
                } else {
                    view.mark = Some(Mark::Scatter);
                    project(view, &filtered)?
                }
            }
        };
        view.data = Some(data);
        Ok(())
    }
}

fn channel_attribute(view: &View, channel: Channel) -> ExecutionResult<String> {
    view.attribute_on(channel)
        .map(str::to_string)
        .ok_or_else(|| ExecutionError::MissingChannel {
            title: view.to_string(),
            channel,
        })
}

/// Groups by every dimension channel and aggregates the measure.
fn aggregate(view: &View, frame: &Frame) -> ExecutionResult<Frame> {
    let display = view.display_clauses();
    let measure: &Clause = display
        .iter()
        .copied()
        .find(|c| c.data_model == Some(DataModel::Measure))
        .ok_or_else(|| ExecutionError::MissingChannel {
            title: view.to_string(),
            channel: if view.mark == Some(Mark::Bar) { Channel::X } else { Channel::Y },
        })?;
    let group_by: Vec<&str> = display
        .iter()
        .filter(|c| c.data_model != Some(DataModel::Measure))
        .filter_map(|c| c.attribute_name())
        .collect();
    let measure_name = measure.attribute_name().unwrap_or(RECORD);
    let aggregation = measure.aggregation.as_deref().unwrap_or("mean");
    frame.group_aggregate(&group_by, measure_name, aggregation)
}

/// Equal-width bins over the column's global range: bin start and row count.
/// The binned measure may sit on either axis.
fn bin(view: &View, frame: &Frame) -> ExecutionResult<Frame> {
    let measure = view
        .histogram_measure()
        .ok_or_else(|| ExecutionError::MissingChannel {
            title: view.to_string(),
            channel: Channel::X,
        })?;
    let attribute = measure.attribute_name().unwrap_or(RECORD).to_string();
    let bins = measure.bin_size.max(1);
    let global = if measure.channel == Some(Channel::Y) {
        view.y_min_max
    } else {
        view.x_min_max
    };
    let values = frame.numeric(&attribute)?;
    let range = match global {
        Some(range) => Some(range),
        None => frame.min_max(&attribute)?,
    };
    let Some(range) = range else {
        return Frame::from_columns([(attribute, Vec::new()), (RECORD.to_string(), Vec::new())]);
    };
    let width = (range.1 - range.0) / bins as f64;
    let starts = (0..bins).map(|i| Value::Float(range.0 + i as f64 * width)).collect();
    let counts = stats::histogram(&values, bins, range)
        .into_iter()
        .map(|n| Value::Int(n as i64))
        .collect();
    Frame::from_columns([(attribute, starts), (RECORD.to_string(), counts)])
}

fn project(view: &View, frame: &Frame) -> ExecutionResult<Frame> {
    let mut columns = vec![
        channel_attribute(view, Channel::X)?,
        channel_attribute(view, Channel::Y)?,
    ];
    if let Some(color) = view.attribute_on(Channel::Color) {
        columns.push(color.to_string());
    }
    let mut projected = Frame::new();
    for name in columns {
        let values = frame.column(&name)?;
        projected.push_column(name, values)?;
    }
    Ok(projected)
}

/// `bins` x `bins` grid of row counts; only occupied cells are emitted.
fn bin_2d(view: &View, frame: &Frame, bins: usize) -> ExecutionResult<Frame> {
    let x = channel_attribute(view, Channel::X)?;
    let y = channel_attribute(view, Channel::Y)?;
    let pairs: Vec<(f64, f64)> = frame
        .column(&x)?
        .iter()
        .zip(frame.column(&y)?)
        .filter_map(|(a, b)| Some((a.as_f64()?, b.as_f64()?)))
        .collect();
    let x_range = match view.x_min_max {
        Some(range) => range,
        None => frame.min_max(&x)?.unwrap_or((0.0, 0.0)),
    };
    let y_range = match view.y_min_max {
        Some(range) => range,
        None => frame.min_max(&y)?.unwrap_or((0.0, 0.0)),
    };

    let mut cells: BTreeMap<(usize, usize), i64> = BTreeMap::new();
    for (a, b) in pairs {
        if let (Some(i), Some(j)) = (
            stats::bin_index(a, bins, x_range),
            stats::bin_index(b, bins, y_range),
        ) {
            *cells.entry((i, j)).or_default() += 1;
        }
    }
    let start = |range: (f64, f64), i: usize| range.0 + i as f64 * (range.1 - range.0) / bins as f64;
    let mut x_starts = Vec::with_capacity(cells.len());
    let mut y_starts = Vec::with_capacity(cells.len());
    let mut counts = Vec::with_capacity(cells.len());
    for ((i, j), n) in cells {
        x_starts.push(Value::Float(start(x_range, i)));
        y_starts.push(Value::Float(start(y_range, j)));
        counts.push(Value::Int(n));
    }
    Frame::from_columns([
        (X_BIN_START, x_starts),
        (Y_BIN_START, y_starts),
        (BIN_COUNT, counts),
    ])
}
