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

use crate::clause::{Channel, Clause, DataModel};
use crate::error::SerialisationError;
use crate::frame::Frame;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Histogram,
    Bar,
    Line,
    Scatter,
    Heatmap,
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mark::Histogram => "histogram",
            Mark::Bar => "bar",
            Mark::Line => "line",
            Mark::Scatter => "scatter",
            Mark::Heatmap => "heatmap",
        })
    }
}

/// One candidate visualisation: an ordered clause list plus the encoding
/// decisions and, once executed and scored, its data and score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub clauses: Vec<Clause>,
    pub mark: Option<Mark>,
    pub title: String,
    pub score: Option<f64>,
    pub x_min_max: Option<(f64, f64)>,
    pub y_min_max: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Frame>,
}

impl View {
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self {
            clauses,
            mark: None,
            title: String::new(),
            score: None,
            x_min_max: None,
            y_min_max: None,
            data: None,
        }
    }
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn display_clauses(&self) -> Vec<&Clause> {
        self.clauses.iter().filter(|c| c.is_display()).collect()
    }
    pub fn filter_clauses(&self) -> Vec<&Clause> {
        self.clauses.iter().filter(|c| c.is_filter()).collect()
    }
    /// Display clauses placed on `channel`, in clause order.
    pub fn find_by_channel(&self, channel: Channel) -> Vec<&Clause> {
        self.clauses
            .iter()
            .filter(|c| c.is_display() && c.channel == Some(channel))
            .collect()
    }
    /// Display clauses with the given data model, in clause order.
    pub fn find_by_data_model(&self, data_model: DataModel, exclude_record: bool) -> Vec<&Clause> {
        self.clauses
            .iter()
            .filter(|c| c.is_display() && c.data_model == Some(data_model))
            .filter(|c| !(exclude_record && c.is_record()))
            .collect()
    }
    pub fn find_by_attribute(&self, attribute: &str) -> Vec<&Clause> {
        self.clauses
            .iter()
            .filter(|c| c.attribute_name() == Some(attribute))
            .collect()
    }
    /// The binned measure of a histogram, on whichever channel it was placed.
    pub fn histogram_measure(&self) -> Option<&Clause> {
        self.find_by_data_model(DataModel::Measure, true)
            .into_iter()
            .find(|c| c.bin_size > 0)
    }
    /// Attribute name on `channel`, if exactly one clause occupies it.
    pub fn attribute_on(&self, channel: Channel) -> Option<&str> {
        match self.find_by_channel(channel).as_slice() {
            [only] => only.attribute_name(),
            _ => None,
        }
    }
    pub fn is_encoded(&self) -> bool {
        self.mark.is_some()
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = self.mark.map_or_else(|| "unencoded".to_string(), |m| m.to_string());
        let channels: Vec<String> = self
            .clauses
            .iter()
            .map(|c| match c.channel {
                Some(ch) if c.is_display() => format!("{ch}: {}", c.attribute),
                _ if c.is_filter() => format!("{} {} {}", c.attribute, c.filter_op, c.value()),
                _ => c.attribute.to_string(),
            })
            .collect();
        write!(f, "<View ({}) mark: {mark}", channels.join(", "))?;
        if let Some(score) = self.score {
            write!(f, ", score: {score:.4}")?;
        }
        write!(f, ">")
    }
}

/// Ordered views from one enumeration pass. Order is enumeration order until
/// the collection is ranked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewCollection {
    views: Vec<View>,
}

impl ViewCollection {
    pub fn new(views: Vec<View>) -> Self {
        Self { views }
    }
    pub fn len(&self) -> usize {
        self.views.len()
    }
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, View> {
        self.views.iter()
    }
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, View> {
        self.views.iter_mut()
    }
    pub fn views(&self) -> &[View] {
        &self.views
    }
    pub fn views_mut(&mut self) -> &mut [View] {
        &mut self.views
    }
    pub fn push(&mut self, view: View) {
        self.views.push(view);
    }
    pub fn get(&self, index: usize) -> Option<&View> {
        self.views.get(index)
    }
    /// Keeps views satisfying `keep`, preserving order.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&View) -> bool,
    {
        self.views.retain(keep);
    }
    /// Stable sort by score, highest first. Unscored views sort last and
    /// ties keep their current relative order.
    pub fn sort_by_score(&mut self) {
        self.views.sort_by(|a, b| match (a.score, b.score) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
    /// Runs `f` over every view, on the rayon pool when `parallel` is set.
    /// Views keep their order and the first failure in collection order is
    /// the one returned.
    pub fn try_for_each<E, F>(&mut self, parallel: bool, f: F) -> Result<(), E>
    where
        E: Send,
        F: Fn(&mut View) -> Result<(), E> + Sync + Send,
    {
        let results: Vec<Result<(), E>> = if parallel {
            self.views.par_iter_mut().map(|v| f(v)).collect()
        } else {
            self.views.iter_mut().map(|v| f(v)).collect()
        };
        results.into_iter().collect()
    }
    pub fn truncate(&mut self, k: usize) {
        self.views.truncate(k);
    }
    pub fn into_views(self) -> Vec<View> {
        self.views
    }
    pub fn to_json(&self) -> Result<String, SerialisationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<Vec<View>> for ViewCollection {
    fn from(views: Vec<View>) -> Self {
        Self::new(views)
    }
}

impl FromIterator<View> for ViewCollection {
    fn from_iter<I: IntoIterator<Item = View>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for ViewCollection {
    type Item = View;
    type IntoIter = std::vec::IntoIter<View>;
    fn into_iter(self) -> Self::IntoIter {
        self.views.into_iter()
    }
}

impl<'a> IntoIterator for &'a ViewCollection {
    type Item = &'a View;
    type IntoIter = std::slice::Iter<'a, View>;
    fn into_iter(self) -> Self::IntoIter {
        self.views.iter()
    }
}

impl std::ops::Index<usize> for ViewCollection {
    type Output = View;
    fn index(&self, index: usize) -> &View {
        &self.views[index]
    }
}
