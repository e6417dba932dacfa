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

use super::wildcard::Expansion;
use crate::clause::Clause;
use crate::view::{View, ViewCollection};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Enumeration {
    Views(ViewCollection),
    /// No display slots but some filters: nothing to draw yet, the filters
    /// are handed back for the data layer to apply.
    PendingFilters(Vec<Clause>),
}

/// Cartesian product of the attribute slots, first slot varying slowest,
/// crossed with each filter when there are any.
pub fn enumerate(expansion: &Expansion) -> Enumeration {
    if expansion.attributes.is_empty() && !expansion.filters.is_empty() {
        debug!(
            "No display attributes; deferring {} filters",
            expansion.filters.len()
        );
        return Enumeration::PendingFilters(expansion.filters.clone());
    }
    let mut views = Vec::new();
    let mut accum: Vec<&Clause> = Vec::with_capacity(expansion.attributes.len());
    combine(&expansion.attributes, &expansion.filters, &mut accum, &mut views);
    debug!("Enumerated {} views", views.len());
    Enumeration::Views(ViewCollection::new(views))
}

fn combine<'a>(
    slots: &'a [Vec<Clause>],
    filters: &[Clause],
    accum: &mut Vec<&'a Clause>,
    out: &mut Vec<View>,
) {
    let Some((slot, rest)) = slots.split_first() else {
        emit(accum, filters, out);
        return;
    };
    for candidate in slot {
        accum.push(candidate);
        combine(rest, filters, accum, out);
        accum.pop();
    }
}

// Clauses are cloned only here, once per finished view.
fn emit(accum: &[&Clause], filters: &[Clause], out: &mut Vec<View>) {
    let attributes = accum.iter().map(|c| (*c).clone());
    if filters.is_empty() {
        out.push(View::new(attributes.collect()));
        return;
    }
    for filter in filters {
        let mut clauses: Vec<Clause> = attributes.clone().collect();
        clauses.push(filter.clone());
        let title = format!("{} {} {}", filter.attribute, filter.filter_op, filter.value());
        out.push(View::new(clauses).with_title(title));
    }
}
