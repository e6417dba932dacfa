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

//! Statistical interestingness of a view, measured against the source frame.
//!
//! The formula is picked by the view's shape: dimensions, measures (the
//! `Record` count excluded) and filters.
//!
//! | shape     | score                                                   |
//! |-----------|---------------------------------------------------------|
//! | (1, 0, 0) | `0.5^C * skew(value counts)`                            |
//! | (1, 0, 1) | `0.1 * ‖f‖/‖u‖ * dist(u, f)` over value counts          |
//! | (0, 1, 0) | sum of the measure                                      |
//! | (0, 1, 1) | `‖f‖/‖u‖ * dist(hist u, hist f)`, 0 when `C` is large   |
//! | (1, 1, 0) | `0.5^C * dist(aggregate share, uniform)`                |
//! | (1, 1, 1) | `‖f‖/‖u‖ * dist(u, f)` over aggregates, 0 when `C` large|
//! | (0, 2, *) | squared Spearman correlation                            |
//! | otherwise | 0.5                                                     |

use crate::clause::{Clause, DataModel};
use crate::config::RecommendationConfig;
use crate::error::ExecutionResult;
use crate::frame::Frame;
use crate::stats;
use crate::value::Value;
use crate::view::{View, ViewCollection};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::warn;

pub const NEUTRAL_SCORE: f64 = 0.5;

/// Scores one view. Degenerate inputs (zero norms, constant columns, NaN)
/// score 0 rather than failing.
pub fn interestingness(
    view: &View,
    frame: &Frame,
    config: &RecommendationConfig,
) -> ExecutionResult<f64> {
    let attributes: Vec<&Clause> = view
        .clauses
        .iter()
        .filter(|c| c.is_display() && !c.is_record() && c.attribute_name().is_some())
        .collect();
    let dimensions: Vec<&str> = names(&attributes, DataModel::Dimension);
    let measures: Vec<&str> = names(&attributes, DataModel::Measure);
    let filters = view.filter_clauses();
    let limit = config.filter_cardinality_limit;

    let score = match (dimensions.as_slice(), measures.as_slice(), filters.len()) {
        ([dim], [], 0) => {
            let counts: Vec<f64> = frame.value_counts(dim)?.into_iter().map(|(_, n)| n as f64).collect();
            0.5f64.powi(counts.len() as i32) * stats::skewness(&counts)
        }
        ([dim], [], 1) => {
            let filtered = frame.apply_filters(filters.iter().copied())?;
            let (unfiltered, filtered) = aligned_counts(frame, &filtered, dim)?;
            0.1 * shape_difference(&unfiltered, &filtered, &unfiltered, &filtered)
        }
        ([], [msr], 0) => frame.sum(msr)?,
        ([], [msr], 1) => {
            if frame.n_unique(msr)? >= limit {
                0.0
            } else {
                let unfiltered = frame.numeric(msr)?;
                let filtered = frame.apply_filters(filters.iter().copied())?.numeric(msr)?;
                let bins = attributes
                    .iter()
                    .find(|c| c.attribute_name() == Some(*msr))
                    .map_or(0, |c| c.bin_size);
                match (bins, frame.min_max(msr)?) {
                    (bins, Some(range)) if bins > 0 => {
                        let as_f64 = |h: Vec<usize>| h.into_iter().map(|n| n as f64).collect::<Vec<_>>();
                        let hist_u = as_f64(stats::histogram(&unfiltered, bins, range));
                        let hist_f = as_f64(stats::histogram(&filtered, bins, range));
                        shape_difference(&unfiltered, &filtered, &hist_u, &hist_f)
                    }
                    _ => shape_difference(&unfiltered, &filtered, &unfiltered, &filtered),
                }
            }
        }
        ([dim], [msr], 0) => {
            let aggregated = aggregate(frame, view, dim, msr)?;
            let values: Vec<f64> = aggregated.values().copied().collect();
            let total: f64 = values.iter().sum();
            let cardinality = values.len();
            if cardinality == 0 || total == 0.0 {
                0.0
            } else {
                let share: Vec<f64> = values.iter().map(|v| v / total).collect();
                let uniform = vec![1.0 / cardinality as f64; cardinality];
                0.5f64.powi(cardinality as i32) * stats::euclidean(&share, &uniform)
            }
        }
        ([dim], [msr], 1) => {
            if frame.n_unique(dim)? >= limit {
                0.0
            } else {
                let filtered_frame = frame.apply_filters(filters.iter().copied())?;
                let unfiltered = aggregate(frame, view, dim, msr)?;
                let filtered = aggregate(&filtered_frame, view, dim, msr)?;
                let u: Vec<f64> = unfiltered.values().copied().collect();
                let f: Vec<f64> = unfiltered
                    .keys()
                    .map(|k| filtered.get(k).copied().unwrap_or(0.0))
                    .collect();
                shape_difference(&u, &f, &u, &f)
            }
        }
        ([], [x, y], 0 | 1) => {
            let data = frame.apply_filters(filters.iter().copied())?;
            let (xs, ys) = paired(&data, x, y)?;
            stats::spearman(&xs, &ys).map_or(0.0, |rho| rho * rho)
        }
        _ => NEUTRAL_SCORE,
    };
    if score.is_finite() {
        Ok(score)
    } else {
        warn!("Non-finite interestingness for '{}'; scoring 0", view);
        Ok(0.0)
    }
}

/// Scores every encoded view in place. Unencoded views stay unscored.
pub fn score_collection(
    collection: &mut ViewCollection,
    frame: &Frame,
    config: &RecommendationConfig,
) -> ExecutionResult<()> {
    collection.try_for_each(config.parallel, |view| {
        if view.is_encoded() {
            view.score = Some(interestingness(view, frame, config)?);
        }
        Ok(())
    })
}

fn names<'a>(clauses: &[&'a Clause], model: DataModel) -> Vec<&'a str> {
    clauses
        .iter()
        .copied()
        .filter(|c| c.data_model == Some(model))
        .filter_map(Clause::attribute_name)
        .collect()
}

/// `‖f‖/‖u‖ * dist(a, b)`, or 0 when either norm vanishes.
fn shape_difference(u: &[f64], f: &[f64], a: &[f64], b: &[f64]) -> f64 {
    let (norm_u, norm_f) = (stats::norm(u), stats::norm(f));
    if norm_u <= f64::EPSILON || norm_f <= f64::EPSILON {
        return 0.0;
    }
    (norm_f / norm_u) * stats::euclidean(a, b)
}

/// Value counts before and after filtering, both in the unfiltered order.
/// Values the filter removed count as zero.
fn aligned_counts(frame: &Frame, filtered: &Frame, column: &str) -> ExecutionResult<(Vec<f64>, Vec<f64>)> {
    let unfiltered = frame.value_counts(column)?;
    let after: HashMap<Value, usize> = filtered.value_counts(column)?.into_iter().collect();
    let f = unfiltered
        .iter()
        .map(|(value, _)| after.get(value).copied().unwrap_or(0) as f64)
        .collect();
    let u = unfiltered.into_iter().map(|(_, n)| n as f64).collect();
    Ok((u, f))
}

fn aggregate(
    frame: &Frame,
    view: &View,
    dimension: &str,
    measure: &str,
) -> ExecutionResult<IndexMap<Value, f64>> {
    let aggregation = view
        .find_by_attribute(measure)
        .iter()
        .find_map(|c| c.aggregation.clone())
        .unwrap_or_else(|| "mean".to_string());
    let grouped = frame.group_aggregate(&[dimension], measure, &aggregation)?;
    let keys = grouped.column(dimension)?;
    let values = grouped.column(measure)?;
    Ok(keys
        .iter()
        .cloned()
        .zip(values.iter().map(|v| v.as_f64().unwrap_or(0.0)))
        .collect())
}

/// Rows where both columns are numeric.
fn paired(frame: &Frame, x: &str, y: &str) -> ExecutionResult<(Vec<f64>, Vec<f64>)> {
    Ok(frame
        .column(x)?
        .iter()
        .zip(frame.column(y)?)
        .filter_map(|(a, b)| Some((a.as_f64()?, b.as_f64()?)))
        .unzip())
}
