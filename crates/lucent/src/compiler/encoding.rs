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

//! Mark and channel selection after Mackinlay et al., "Show Me: Automatic
//! Presentation for Visual Analysis" (2007).
//!
//! A view is classified by its count of dimensions and (non-`Record`)
//! measures. The rule table below proposes a mark and an automatic channel
//! assignment, then channels the user fixed on a clause take precedence.

use crate::clause::{Channel, Clause, DataModel, SortOrder};
use crate::config::RecommendationConfig;
use crate::error::{CompileError, CompileResult};
use crate::metadata::DatasetMetadata;
use crate::view::{Mark, View};
use tracing::{debug, warn};

type Assignment = Vec<(Channel, Clause)>;

pub struct Encoder<'a> {
    metadata: &'a DatasetMetadata,
    default_bin_size: usize,
    bar_sort_cardinality: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(metadata: &'a DatasetMetadata, config: &RecommendationConfig) -> Self {
        Self {
            metadata,
            default_bin_size: config.default_bin_size,
            bar_sort_cardinality: config.bar_sort_cardinality,
        }
    }

    /// Assigns a mark and channels to `view`. Shapes outside the rule table
    /// leave the view untouched with no mark.
    pub fn encode(&self, view: &mut View) -> CompileResult<()> {
        let n_dim = view.find_by_data_model(DataModel::Dimension, false).len();
        let n_msr = view.find_by_data_model(DataModel::Measure, true).len();
        if !matches!(
            (n_dim, n_msr),
            (0, 1) | (1, 0) | (1, 1) | (2, 0) | (2, 1) | (0, 2) | (1, 2) | (0, 3)
        ) {
            warn!(
                "No encoding for {} dimensions and {} measures; leaving '{}' unencoded",
                n_dim, n_msr, view
            );
            return Ok(());
        }

        let (filters, mut display): (Vec<Clause>, Vec<Clause>) =
            std::mem::take(&mut view.clauses)
                .into_iter()
                .partition(Clause::is_filter);

        let (mark, auto) = match (n_dim, n_msr) {
            (0, 1) => {
                let m = positions(&display, DataModel::Measure, true)[0];
                if display[m].bin_size == 0 {
                    display[m].bin_size = self.default_bin_size;
                }
                (
                    Mark::Histogram,
                    vec![(Channel::X, display[m].clone()), (Channel::Y, Clause::record())],
                )
            }
            (1, _) if n_msr <= 1 => {
                if n_msr == 0 {
                    display.push(Clause::record());
                }
                let d = positions(&display, DataModel::Dimension, false)[0];
                let m = positions(&display, DataModel::Measure, false)[0];
                self.line_or_bar(&mut display, d, m)?
            }
            (2, _) => {
                let dims = positions(&display, DataModel::Dimension, false);
                let (d1, d2) = (dims[0], dims[1]);
                let (d, color) = if self.cardinality(&display[d1])? < self.cardinality(&display[d2])? {
                    (d2, d1)
                } else {
                    (d1, d2)
                };
                if n_msr == 0 {
                    display.push(Clause::record());
                }
                let m = positions(&display, DataModel::Measure, false)[0];
                let (mark, mut auto) = self.line_or_bar(&mut display, d, m)?;
                auto.push((Channel::Color, display[color].clone()));
                (mark, auto)
            }
            (0, 2) => {
                let ms = positions(&display, DataModel::Measure, true);
                (
                    Mark::Scatter,
                    vec![
                        (Channel::X, display[ms[0]].clone()),
                        (Channel::Y, display[ms[1]].clone()),
                    ],
                )
            }
            (1, 2) => {
                let ms = positions(&display, DataModel::Measure, true);
                let d = positions(&display, DataModel::Dimension, false)[0];
                (
                    Mark::Scatter,
                    vec![
                        (Channel::X, display[ms[0]].clone()),
                        (Channel::Y, display[ms[1]].clone()),
                        (Channel::Color, display[d].clone()),
                    ],
                )
            }
            _ => {
                let ms = positions(&display, DataModel::Measure, true);
                (
                    Mark::Scatter,
                    vec![
                        (Channel::X, display[ms[0]].clone()),
                        (Channel::Y, display[ms[1]].clone()),
                        (Channel::Color, display[ms[2]].clone()),
                    ],
                )
            }
        };

        let mut clauses = enforce_channels(&display, auto)?;
        clauses.extend(filters);
        view.clauses = clauses;
        view.mark = Some(mark);
        match mark {
            Mark::Histogram => {
                if let Some(measure) = view.histogram_measure() {
                    let range = measure.attribute_name().and_then(|a| self.metadata.min_max(a));
                    if measure.channel == Some(Channel::Y) {
                        view.y_min_max = range;
                    } else {
                        view.x_min_max = range;
                    }
                }
            }
            Mark::Scatter => {
                view.x_min_max = self.axis_range(view, Channel::X);
                view.y_min_max = self.axis_range(view, Channel::Y);
            }
            _ => {}
        }
        debug!("Encoded {}", view);
        Ok(())
    }

    /// Ordered dimensions draw as lines, anything else as bars with the
    /// measure on x. The measure's aggregation defaults to mean.
    fn line_or_bar(
        &self,
        display: &mut [Clause],
        dimension: usize,
        measure: usize,
    ) -> CompileResult<(Mark, Assignment)> {
        if display[measure].aggregation.is_none() {
            display[measure].aggregation = Some("mean".to_string());
        }
        let ordered = display[dimension].data_type.is_some_and(|dt| dt.is_ordered());
        if ordered {
            return Ok((
                Mark::Line,
                vec![
                    (Channel::X, display[dimension].clone()),
                    (Channel::Y, display[measure].clone()),
                ],
            ));
        }
        if self.cardinality(&display[dimension])? > self.bar_sort_cardinality {
            display[dimension].sort = Some(SortOrder::Ascending);
        }
        Ok((
            Mark::Bar,
            vec![
                (Channel::X, display[measure].clone()),
                (Channel::Y, display[dimension].clone()),
            ],
        ))
    }

    fn cardinality(&self, clause: &Clause) -> CompileResult<usize> {
        match clause.attribute_name() {
            Some(name) => self.metadata.cardinality(name),
            None => Ok(0),
        }
    }

    fn axis_range(&self, view: &View, channel: Channel) -> Option<(f64, f64)> {
        view.attribute_on(channel)
            .and_then(|name| self.metadata.min_max(name))
    }
}

fn positions(display: &[Clause], model: DataModel, exclude_record: bool) -> Vec<usize> {
    display
        .iter()
        .enumerate()
        .filter(|(_, c)| c.data_model == Some(model))
        .filter(|(_, c)| !(exclude_record && c.is_record()))
        .map(|(i, _)| i)
        .collect()
}

/// Merges the automatic assignment with channels fixed by the user. A channel
/// claimed by exactly one clause keeps that clause, and the automatic entry
/// for the same attribute on the same channel is withdrawn. The remaining
/// automatic entries fill the remaining channels in order.
fn enforce_channels(display: &[Clause], mut auto: Assignment) -> CompileResult<Vec<Clause>> {
    let mut resolved: Vec<(Channel, Option<Clause>)> =
        auto.iter().map(|(channel, _)| (*channel, None)).collect();
    for (channel, slot) in resolved.iter_mut() {
        let claimed: Vec<&Clause> = display
            .iter()
            .filter(|c| c.channel == Some(*channel))
            .collect();
        match claimed.as_slice() {
            [] => {}
            [user] => {
                if let Some(pos) = auto
                    .iter()
                    .position(|(_, c)| c.attribute == user.attribute && c.channel == Some(*channel))
                {
                    auto.remove(pos);
                }
                *slot = Some((*user).clone());
            }
            many => {
                return Err(CompileError::AmbiguousChannel {
                    channel: *channel,
                    attributes: many.iter().map(|c| c.attribute.to_string()).collect(),
                });
            }
        }
    }
    let mut leftovers = auto.into_iter().map(|(_, clause)| clause);
    for (channel, slot) in resolved.iter_mut().filter(|(_, slot)| slot.is_none()) {
        *slot = leftovers.next().map(|clause| clause.with_channel(*channel));
    }
    Ok(resolved.into_iter().filter_map(|(_, clause)| clause).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{DataType, FilterOp};
    use crate::metadata::ColumnMeta;
    use crate::value::Value;

    fn categories(n: usize) -> Vec<Value> {
        (0..n).map(|i| Value::Str(format!("c{i}"))).collect()
    }

    fn metadata(origin_cardinality: usize) -> DatasetMetadata {
        DatasetMetadata::new()
            .with_column(
                "Horsepower",
                ColumnMeta::new(vec![46i64.into(), 230i64.into()], DataType::Quantitative),
            )
            .with_column(
                "Weight",
                ColumnMeta::new(vec![1613i64.into(), 5140i64.into()], DataType::Quantitative),
            )
            .with_column(
                "Acceleration",
                ColumnMeta::new(vec![8i64.into(), 24i64.into()], DataType::Quantitative),
            )
            .with_column("Origin", ColumnMeta::new(categories(origin_cardinality), DataType::Nominal))
            .with_column("Brand", ColumnMeta::new(categories(30), DataType::Nominal))
            .with_column(
                "Year",
                ColumnMeta::new(vec![Value::parse("1970-01-01")], DataType::Temporal),
            )
    }

    fn resolved(attr: &str, meta: &DatasetMetadata) -> Clause {
        let m = meta.get(attr).unwrap();
        Clause::attribute(attr)
            .with_data_type(m.data_type)
            .with_data_model(m.data_model)
    }

    fn encode(meta: &DatasetMetadata, clauses: Vec<Clause>) -> CompileResult<View> {
        let encoder = Encoder::new(meta, &RecommendationConfig::default());
        let mut view = View::new(clauses);
        encoder.encode(&mut view)?;
        Ok(view)
    }

    #[test]
    fn measure_and_small_dimension_is_unsorted_bar() {
        let meta = metadata(3);
        let view = encode(&meta, vec![resolved("Horsepower", &meta), resolved("Origin", &meta)]).unwrap();
        assert_eq!(view.mark, Some(Mark::Bar));
        assert_eq!(view.attribute_on(Channel::X), Some("Horsepower"));
        assert_eq!(view.attribute_on(Channel::Y), Some("Origin"));
        let x = view.find_by_channel(Channel::X)[0];
        assert_eq!(x.aggregation.as_deref(), Some("mean"));
        assert_eq!(view.find_by_channel(Channel::Y)[0].sort, None);
    }

    #[test]
    fn wide_dimension_is_sorted_ascending() {
        let meta = metadata(8);
        let view = encode(&meta, vec![resolved("Horsepower", &meta), resolved("Origin", &meta)]).unwrap();
        assert_eq!(view.find_by_channel(Channel::Y)[0].sort, Some(SortOrder::Ascending));
    }

    #[test]
    fn two_measures_scatter_with_ranges() {
        let meta = metadata(3);
        let view = encode(&meta, vec![resolved("Horsepower", &meta), resolved("Weight", &meta)]).unwrap();
        assert_eq!(view.mark, Some(Mark::Scatter));
        assert_eq!(view.attribute_on(Channel::X), Some("Horsepower"));
        assert_eq!(view.attribute_on(Channel::Y), Some("Weight"));
        assert_eq!(view.x_min_max, Some((46.0, 230.0)));
        assert_eq!(view.y_min_max, Some((1613.0, 5140.0)));
    }

    #[test]
    fn single_measure_is_binned_histogram() {
        let meta = metadata(3);
        let view = encode(&meta, vec![resolved("Horsepower", &meta)]).unwrap();
        assert_eq!(view.mark, Some(Mark::Histogram));
        assert_eq!(view.find_by_channel(Channel::X)[0].bin_size, 10);
        assert!(view.find_by_channel(Channel::Y)[0].is_record());
        assert_eq!(view.x_min_max, Some((46.0, 230.0)));
    }

    #[test]
    fn histogram_measure_pinned_to_y_keeps_its_range() {
        let meta = metadata(3);
        let pinned = resolved("Horsepower", &meta).with_channel(Channel::Y);
        let view = encode(&meta, vec![pinned]).unwrap();
        assert_eq!(view.mark, Some(Mark::Histogram));
        assert!(view.find_by_channel(Channel::X)[0].is_record());
        let measure = view.histogram_measure().unwrap();
        assert_eq!(measure.attribute_name(), Some("Horsepower"));
        assert_eq!(measure.bin_size, 10);
        assert_eq!(view.y_min_max, Some((46.0, 230.0)));
        assert_eq!(view.x_min_max, None);
    }

    #[test]
    fn lone_dimension_counts_records() {
        let meta = metadata(3);
        let view = encode(&meta, vec![resolved("Year", &meta)]).unwrap();
        assert_eq!(view.mark, Some(Mark::Line));
        assert_eq!(view.attribute_on(Channel::X), Some("Year"));
        let y = view.find_by_channel(Channel::Y)[0];
        assert!(y.is_record());
        assert_eq!(y.aggregation.as_deref(), Some("count"));
    }

    #[test]
    fn lower_cardinality_dimension_goes_to_color() {
        let meta = metadata(3);
        let view = encode(
            &meta,
            vec![resolved("Brand", &meta), resolved("Origin", &meta), resolved("Horsepower", &meta)],
        )
        .unwrap();
        assert_eq!(view.mark, Some(Mark::Bar));
        assert_eq!(view.attribute_on(Channel::Color), Some("Origin"));
        assert_eq!(view.attribute_on(Channel::Y), Some("Brand"));
    }

    #[test]
    fn three_measures_use_color() {
        let meta = metadata(3);
        let view = encode(
            &meta,
            vec![
                resolved("Horsepower", &meta),
                resolved("Weight", &meta),
                resolved("Acceleration", &meta),
            ],
        )
        .unwrap();
        assert_eq!(view.attribute_on(Channel::Color), Some("Acceleration"));
    }

    #[test]
    fn user_channel_overrides_automatic_one() {
        let meta = metadata(3);
        let view = encode(
            &meta,
            vec![
                resolved("Horsepower", &meta),
                resolved("Origin", &meta).with_channel(Channel::X),
            ],
        )
        .unwrap();
        assert_eq!(view.attribute_on(Channel::X), Some("Origin"));
        assert_eq!(view.attribute_on(Channel::Y), Some("Horsepower"));
    }

    #[test]
    fn two_clauses_on_one_channel_is_an_error() {
        let meta = metadata(3);
        let err = encode(
            &meta,
            vec![
                resolved("Horsepower", &meta).with_channel(Channel::X),
                resolved("Weight", &meta).with_channel(Channel::X),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::AmbiguousChannel { channel: Channel::X, .. }));
    }

    #[test]
    fn filters_are_appended_after_channels() {
        let meta = metadata(3);
        let view = encode(
            &meta,
            vec![
                Clause::filter("Origin", FilterOp::Eq, "c1"),
                resolved("Horsepower", &meta),
                resolved("Weight", &meta),
            ],
        )
        .unwrap();
        assert_eq!(view.clauses.len(), 3);
        assert!(view.clauses[2].is_filter());
    }

    #[test]
    fn unsupported_shape_is_left_alone() {
        let meta = metadata(3);
        let clauses = vec![
            resolved("Origin", &meta),
            resolved("Brand", &meta),
            resolved("Year", &meta),
        ];
        let view = encode(&meta, clauses.clone()).unwrap();
        assert_eq!(view.mark, None);
        assert_eq!(view.clauses, clauses);
    }
}
