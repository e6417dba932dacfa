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

use crate::clause::{Clause, WILDCARD};
use crate::dates;
use crate::error::CompileResult;
use crate::metadata::DatasetMetadata;
use crate::view::{View, ViewCollection};

/// Fills in data types and models from the metadata and titles filtered
/// views. Works on a copy; the caller's collection is left as it was.
pub fn resolve(
    collection: &ViewCollection,
    metadata: &DatasetMetadata,
    parallel: bool,
) -> CompileResult<ViewCollection> {
    let mut resolved = collection.clone();
    resolved.try_for_each(parallel, |view| resolve_view(view, metadata))?;
    Ok(resolved)
}

fn resolve_view(view: &mut View, metadata: &DatasetMetadata) -> CompileResult<()> {
    let mut title = None;
    for clause in view.clauses.iter_mut() {
        if clause.description.as_deref() == Some(WILDCARD) {
            clause.description = None;
        }
        if let Some(attribute) = clause.attribute_name() {
            if clause.data_type.is_none() || clause.data_model.is_none() {
                let meta = metadata.lookup(attribute)?;
                clause.data_type.get_or_insert(meta.data_type);
                clause.data_model.get_or_insert(meta.data_model);
            }
        }
        if clause.is_filter() {
            title = Some(filter_title(clause, metadata));
        }
    }
    if let Some(title) = title {
        view.title = title;
    }
    Ok(())
}

fn filter_title(clause: &Clause, metadata: &DatasetMetadata) -> String {
    let value = match (clause.filter_value().and_then(|v| v.as_date()), clause.attribute_name()) {
        (Some(date), Some(attribute)) => {
            let column = metadata
                .get(attribute)
                .map(|m| m.unique_values.as_slice())
                .unwrap_or_default();
            dates::format_temporal(date, column)
        }
        _ => clause.value().to_string(),
    };
    format!("{} {} {}", clause.attribute, clause.filter_op, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{DataModel, DataType, FilterOp};
    use crate::error::CompileError;
    use crate::metadata::ColumnMeta;
    use crate::value::Value;

    fn metadata() -> DatasetMetadata {
        DatasetMetadata::new()
            .with_column(
                "Origin",
                ColumnMeta::new(vec!["USA".into(), "Japan".into()], DataType::Nominal),
            )
            .with_column(
                "Year",
                ColumnMeta::new(
                    vec![Value::parse("1970-01-01"), Value::parse("1971-01-01")],
                    DataType::Temporal,
                ),
            )
    }

    #[test]
    fn types_are_backfilled_without_touching_input() {
        let collection = ViewCollection::new(vec![View::new(vec![Clause::attribute("Origin")])]);
        let resolved = resolve(&collection, &metadata(), false).unwrap();
        assert_eq!(collection[0].clauses[0].data_type, None);
        assert_eq!(resolved[0].clauses[0].data_type, Some(DataType::Nominal));
        assert_eq!(resolved[0].clauses[0].data_model, Some(DataModel::Dimension));
    }

    #[test]
    fn user_types_win_over_metadata() {
        let clause = Clause::attribute("Origin").with_data_type(DataType::Ordinal);
        let collection = ViewCollection::new(vec![View::new(vec![clause])]);
        let resolved = resolve(&collection, &metadata(), true).unwrap();
        assert_eq!(resolved[0].clauses[0].data_type, Some(DataType::Ordinal));
    }

    #[test]
    fn temporal_filter_title_uses_granularity() {
        let clause = Clause::filter("Year", FilterOp::Eq, Value::parse("1971-01-01"));
        let collection = ViewCollection::new(vec![View::new(vec![clause])]);
        let resolved = resolve(&collection, &metadata(), false).unwrap();
        assert_eq!(resolved[0].title, "Year = 1971");
    }

    #[test]
    fn unknown_attribute_is_fatal() {
        let collection = ViewCollection::new(vec![View::new(vec![Clause::attribute("Colour")])]);
        assert!(matches!(
            resolve(&collection, &metadata(), false),
            Err(CompileError::AttributeNotFound { attribute }) if attribute == "Colour"
        ));
    }
}
