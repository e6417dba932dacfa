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

use crate::clause::{Attribute, Clause, ClauseValue};
use crate::error::{CompileError, CompileResult};
use crate::metadata::DatasetMetadata;
use crate::value::Value;
use tracing::debug;

/// Candidates produced from an intent.
///
/// `attributes` holds one slot per display clause, in clause order; the
/// enumerator picks one candidate per slot. `filters` is flat: any filter can
/// pair with any attribute combination. `resolved` is the intent with every
/// value wildcard replaced by the column's unique values, for the caller to
/// adopt in place of its own list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub attributes: Vec<Vec<Clause>>,
    pub filters: Vec<Clause>,
    pub resolved: Vec<Clause>,
}

pub fn expand(intent: &[Clause], metadata: &DatasetMetadata) -> CompileResult<Expansion> {
    let mut expansion = Expansion::default();
    for clause in intent {
        if clause.is_display() {
            expansion.attributes.push(display_candidates(clause, metadata));
            expansion.resolved.push(clause.clone());
        } else {
            expand_filter(clause, metadata, &mut expansion)?;
        }
    }
    debug!(
        "Expanded {} clauses into {} attribute slots and {} filters",
        intent.len(),
        expansion.attributes.len(),
        expansion.filters.len()
    );
    Ok(expansion)
}

fn display_candidates(clause: &Clause, metadata: &DatasetMetadata) -> Vec<Clause> {
    let options: Vec<&str> = match &clause.attribute {
        Attribute::Wildcard => metadata
            .column_names()
            .filter(|name| {
                let meta = metadata.get(name);
                let type_ok = clause
                    .data_type
                    .map_or(true, |dt| meta.is_some_and(|m| m.data_type == dt));
                let model_ok = clause
                    .data_model
                    .map_or(true, |dm| meta.is_some_and(|m| m.data_model == dm));
                type_ok && model_ok
            })
            .collect(),
        attribute => attribute.candidates(),
    };
    options
        .into_iter()
        .filter(|name| !clause.is_excluded(name))
        .map(|name| clause.clone().with_attribute(Attribute::Named(name.to_string())))
        .collect()
}

fn expand_filter(
    clause: &Clause,
    metadata: &DatasetMetadata,
    expansion: &mut Expansion,
) -> CompileResult<()> {
    if clause.attribute == Attribute::Wildcard {
        return Err(CompileError::InvalidClause {
            description: clause.description.clone().unwrap_or_else(|| {
                format!("{}{}{}", clause.attribute, clause.filter_op, clause.value())
            }),
            reason: "a filter needs a concrete attribute".to_string(),
        });
    }
    let mut resolved_in_place = false;
    for attribute in clause.attribute.candidates() {
        let options: Vec<Value> = match clause.value() {
            ClauseValue::Wildcard => {
                let unique = metadata.lookup(attribute)?.unique_values.clone();
                expansion.resolved.push(
                    clause
                        .clone()
                        .with_attribute(Attribute::Named(attribute.to_string()))
                        .with_value_list(unique.clone()),
                );
                resolved_in_place = true;
                unique
            }
            ClauseValue::One(value) => vec![value.clone()],
            ClauseValue::AnyOf(values) => values.clone(),
            ClauseValue::Display => Vec::new(),
        };
        expansion.filters.extend(
            options
                .into_iter()
                .filter(|value| !clause.is_excluded(&value.to_string()))
                .map(|value| {
                    clause
                        .clone()
                        .with_attribute(Attribute::Named(attribute.to_string()))
                        .with_concrete_value(value)
                }),
        );
    }
    if !resolved_in_place {
        expansion.resolved.push(clause.clone());
    }
    Ok(())
}
