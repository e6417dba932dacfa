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

//! Numeric helpers shared by the executor and the interestingness scorer,
//! for the shape comparisons a frame cannot express as column expressions.

use itertools::Itertools;

pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Euclidean distance; the shorter vector is treated as zero-padded.
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    let (a, b) = pad_to_same_length(a, b);
    a.iter()
        .zip(&b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

pub fn pad_to_same_length(a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let len = a.len().max(b.len());
    let pad = |v: &[f64]| {
        let mut out = v.to_vec();
        out.resize(len, 0.0);
        out
    };
    (pad(a), pad(b))
}

fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        None
    } else {
        Some(v.iter().sum::<f64>() / v.len() as f64)
    }
}

/// Biased sample skewness `m3 / m2^1.5`. Constant or empty input has no
/// skew and yields 0.
pub fn skewness(v: &[f64]) -> f64 {
    let Some(mu) = mean(v) else {
        return 0.0;
    };
    let n = v.len() as f64;
    let m2 = v.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / n;
    let m3 = v.iter().map(|x| (x - mu).powi(3)).sum::<f64>() / n;
    if m2 <= f64::EPSILON {
        return 0.0;
    }
    m3 / m2.powf(1.5)
}

/// Ranks starting at 1, ties sharing their average rank.
pub fn average_ranks(v: &[f64]) -> Vec<f64> {
    let order: Vec<usize> = (0..v.len())
        .sorted_by(|&i, &j| v[i].total_cmp(&v[j]))
        .collect();
    let mut ranks = vec![0.0; v.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && v[order[end + 1]] == v[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = rank;
        }
        start = end + 1;
    }
    ranks
}

pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let (mx, my) = (mean(x)?, mean(y)?);
    let cov: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let vx: f64 = x.iter().map(|a| (a - mx).powi(2)).sum();
    let vy: f64 = y.iter().map(|b| (b - my).powi(2)).sum();
    let denom = (vx * vy).sqrt();
    if denom <= f64::EPSILON {
        None
    } else {
        Some(cov / denom)
    }
}

/// Spearman rank correlation; `None` when either side is constant or there
/// are fewer than two paired observations.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Equal-width bin counts over `range`. The last bin is closed on the right
/// and values outside the range are dropped.
pub fn histogram(values: &[f64], bins: usize, range: (f64, f64)) -> Vec<usize> {
    let mut counts = vec![0; bins];
    for idx in values.iter().filter_map(|&v| bin_index(v, bins, range)) {
        counts[idx] += 1;
    }
    counts
}

/// Bin holding `v` among `bins` equal-width bins over `range`, if any.
pub fn bin_index(v: f64, bins: usize, range: (f64, f64)) -> Option<usize> {
    let (lo, hi) = range;
    if bins == 0 || v.is_nan() || v < lo || v > hi {
        return None;
    }
    let width = (hi - lo) / bins as f64;
    if width <= 0.0 {
        return Some(0);
    }
    Some((((v - lo) / width) as usize).min(bins - 1))
}
