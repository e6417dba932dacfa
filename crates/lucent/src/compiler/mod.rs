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

//! Turns an intent into encoded, unexecuted views:
//! expand wildcards, enumerate, resolve types, drop invalid views, encode.

pub mod encoding;
pub mod enumerate;
pub mod resolve;
pub mod validity;
pub mod wildcard;

pub use encoding::Encoder;
pub use enumerate::{enumerate, Enumeration};
pub use validity::{is_valid, remove_invalid};
pub use wildcard::{expand, Expansion};

use crate::clause::{Clause, Intent};
use crate::config::RecommendationConfig;
use crate::error::CompileResult;
use crate::metadata::DatasetMetadata;
use crate::view::ViewCollection;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    pub collection: ViewCollection,
    /// The intent with value wildcards replaced by the values they stood
    /// for. Callers adopt it in place of their own intent.
    pub resolved_intent: Intent,
    /// Filters left over when the intent names no display attribute.
    pub pending_filters: Vec<Clause>,
}

impl Compilation {
    pub fn is_pending(&self) -> bool {
        !self.pending_filters.is_empty()
    }
}

pub fn compile(
    intent: &Intent,
    metadata: &DatasetMetadata,
    config: &RecommendationConfig,
) -> CompileResult<Compilation> {
    let expansion = expand(intent.clauses(), metadata)?;
    let resolved_intent = Intent::new(expansion.resolved.clone());
    match enumerate(&expansion) {
        Enumeration::PendingFilters(pending_filters) => Ok(Compilation {
            collection: ViewCollection::default(),
            resolved_intent,
            pending_filters,
        }),
        Enumeration::Views(views) => Ok(Compilation {
            collection: compile_views(&views, metadata, config)?,
            resolved_intent,
            pending_filters: Vec::new(),
        }),
    }
}

/// Resolves, validates and encodes views that were enumerated elsewhere.
pub fn compile_views(
    collection: &ViewCollection,
    metadata: &DatasetMetadata,
    config: &RecommendationConfig,
) -> CompileResult<ViewCollection> {
    let mut views = resolve::resolve(collection, metadata, config.parallel)?;
    if views.len() > 1 {
        remove_invalid(&mut views);
    }
    let encoder = Encoder::new(metadata, config);
    views.try_for_each(config.parallel, |view| encoder.encode(view))?;
    let unencoded = views.iter().filter(|v| !v.is_encoded()).count();
    if unencoded > 0 {
        debug!("{} of {} views have no encoding", unencoded, views.len());
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{Channel, DataType};
    use crate::metadata::ColumnMeta;
    use crate::view::Mark;

    fn metadata() -> DatasetMetadata {
        DatasetMetadata::new()
            .with_column(
                "Origin",
                ColumnMeta::new(vec!["USA".into(), "Japan".into(), "Europe".into()], DataType::Nominal),
            )
            .with_column(
                "Horsepower",
                ColumnMeta::new(vec![88i64.into(), 130i64.into()], DataType::Quantitative),
            )
            .with_column(
                "Weight",
                ColumnMeta::new(vec![2000i64.into(), 3500i64.into()], DataType::Quantitative),
            )
    }

    #[test]
    fn value_wildcard_alone_is_pending() {
        let intent = Intent::parse(&["Origin=?"]).unwrap();
        let compiled = compile(&intent, &metadata(), &RecommendationConfig::default()).unwrap();
        assert!(compiled.collection.is_empty());
        assert!(compiled.is_pending());
        assert_eq!(compiled.pending_filters.len(), 3);
    }

    #[test]
    fn wildcard_pairs_with_fixed_attribute() {
        let intent = Intent::parse(&["Horsepower", "?"]).unwrap();
        let compiled = compile(&intent, &metadata(), &RecommendationConfig::default()).unwrap();
        // Horsepower twice is dropped by the validity check.
        assert_eq!(compiled.collection.len(), 2);
        let first = &compiled.collection[0];
        assert_eq!(first.mark, Some(Mark::Bar));
        assert_eq!(first.attribute_on(Channel::Y), Some("Origin"));
        let second = &compiled.collection[1];
        assert_eq!(second.mark, Some(Mark::Scatter));
    }

    #[test]
    fn single_view_skips_validity() {
        let intent = Intent::new(vec![
            Clause::attribute("Horsepower"),
            Clause::attribute("Horsepower"),
        ]);
        let compiled = compile(&intent, &metadata(), &RecommendationConfig::default()).unwrap();
        assert_eq!(compiled.collection.len(), 1);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let intent = Intent::parse(&["?", "?"]).unwrap();
        let meta = metadata();
        let parallel = compile(&intent, &meta, &RecommendationConfig::default()).unwrap();
        let sequential =
            compile(&intent, &meta, &RecommendationConfig::default().sequential()).unwrap();
        assert_eq!(parallel, sequential);
    }
}
