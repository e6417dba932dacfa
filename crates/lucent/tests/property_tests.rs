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

use lucent::compiler::resolve::resolve;
use lucent::compiler::{enumerate, expand, is_valid, remove_invalid, Enumeration};
use lucent::{
    compile, Channel, Clause, ColumnMeta, DataType, DatasetMetadata, Intent, RecommendationConfig,
    Value, View, ViewCollection,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const COLUMNS: [&str; 6] = ["Horsepower", "Weight", "Origin", "Brand", "Year", "Cylinders"];

fn metadata(cardinalities: &[usize]) -> DatasetMetadata {
    let mut metadata = DatasetMetadata::new();
    for (name, &card) in COLUMNS.iter().zip(cardinalities) {
        let meta = match *name {
            "Horsepower" | "Weight" => ColumnMeta::new(
                (0..card).map(|i| Value::Int(i as i64 * 10)).collect(),
                DataType::Quantitative,
            ),
            "Year" => ColumnMeta::new(
                (0..card)
                    .map(|i| Value::parse(&format!("{}-01-01", 1970 + i)))
                    .collect(),
                DataType::Temporal,
            ),
            "Cylinders" => ColumnMeta::new(
                (0..card).map(|i| Value::Int(i as i64 + 3)).collect(),
                DataType::Ordinal,
            ),
            _ => ColumnMeta::new(
                (0..card).map(|i| Value::Str(format!("{name}-{i}"))).collect(),
                DataType::Nominal,
            ),
        };
        metadata = metadata.with_column(*name, meta);
    }
    metadata
}

fn cardinalities() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..12, COLUMNS.len())
}

/// One to three display shorthands, each a column name or a wildcard.
fn intent() -> impl Strategy<Value = Vec<String>> {
    let shorthand = prop_oneof![
        Just("?".to_string()),
        prop::sample::select(COLUMNS.to_vec()).prop_map(|s| s.to_string()),
    ];
    prop::collection::vec(shorthand, 1..=3)
}

fn parse(shorthands: &[String]) -> Intent {
    let refs: Vec<&str> = shorthands.iter().map(String::as_str).collect();
    Intent::parse(&refs).unwrap()
}

fn sequential() -> RecommendationConfig {
    RecommendationConfig::default().sequential()
}

proptest! {
    #[test]
    fn test_validity_filter_is_idempotent(
        attrs in prop::collection::vec(prop::collection::vec(prop::sample::select(COLUMNS.to_vec()), 1..4), 0..12),
        temporal in prop::collection::vec(any::<bool>(), 12),
    ) {
        let views: ViewCollection = attrs
            .iter()
            .zip(&temporal)
            .map(|(names, &t)| {
                View::new(
                    names
                        .iter()
                        .map(|n| {
                            let clause = Clause::attribute(*n);
                            if t { clause.with_data_type(DataType::Temporal) } else { clause }
                        })
                        .collect(),
                )
            })
            .collect();
        let mut once = views.clone();
        remove_invalid(&mut once);
        let mut twice = once.clone();
        remove_invalid(&mut twice);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_compilation_is_deterministic(cards in cardinalities(), shorthands in intent()) {
        let metadata = metadata(&cards);
        let intent = parse(&shorthands);
        let config = RecommendationConfig::default();
        let first = compile(&intent, &metadata, &config);
        let second = compile(&intent, &metadata, &config);
        let sequential = compile(&intent, &metadata, &sequential());
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, &sequential);
    }

    #[test]
    fn test_surviving_views_have_distinct_attributes(cards in cardinalities(), shorthands in intent()) {
        let metadata = metadata(&cards);
        let intent = parse(&shorthands);
        let expansion = expand(intent.clauses(), &metadata).unwrap();
        let Enumeration::Views(views) = enumerate(&expansion) else {
            return Ok(());
        };
        let mut views = resolve(&views, &metadata, false).unwrap();
        remove_invalid(&mut views);
        for view in views.iter() {
            let distinct: BTreeSet<String> = view.clauses.iter().map(|c| c.attribute.to_string()).collect();
            prop_assert_eq!(distinct.len(), view.clauses.len());
            prop_assert!(is_valid(view));
        }
    }

    #[test]
    fn test_encoded_views_use_each_channel_once(cards in cardinalities(), shorthands in intent()) {
        let metadata = metadata(&cards);
        let intent = parse(&shorthands);
        if let Ok(compiled) = compile(&intent, &metadata, &sequential()) {
            for view in compiled.collection.iter().filter(|v| v.is_encoded()) {
                for channel in [Channel::X, Channel::Y, Channel::Color] {
                    prop_assert!(view.find_by_channel(channel).len() <= 1, "{} reuses {}", view, channel);
                }
                prop_assert_eq!(view.find_by_channel(Channel::X).len(), 1);
                prop_assert_eq!(view.find_by_channel(Channel::Y).len(), 1);
            }
        }
    }

    #[test]
    fn test_value_wildcard_reproduces_unique_values(
        cards in cardinalities(),
        column in prop::sample::select(COLUMNS.to_vec()),
        skip in 0usize..3,
    ) {
        let metadata = metadata(&cards);
        let unique = metadata.get(column).unwrap().unique_values.clone();
        let excluded: Vec<String> = unique.iter().take(skip).map(ToString::to_string).collect();
        let clause = Clause::filter_wildcard(column).with_exclude(excluded.clone());
        let expansion = expand(&[clause], &metadata).unwrap();
        let produced: BTreeSet<Value> = expansion
            .filters
            .iter()
            .filter_map(|c| c.filter_value().cloned())
            .collect();
        let expected: BTreeSet<Value> = unique
            .into_iter()
            .filter(|v| !excluded.contains(&v.to_string()))
            .collect();
        prop_assert_eq!(produced, expected);
    }
}
