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

//! The materialised-data carrier between execution and scoring, backed by a
//! polars [`DataFrame`].

use crate::clause::{Clause, ClauseValue, FilterOp, RECORD};
use crate::error::{ExecutionError, ExecutionResult};
use crate::value::Value;
use chrono::{DateTime, NaiveDateTime};
use indexmap::IndexMap;
use polars::prelude::*;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

const COUNT_ALIAS: &str = "__lucent_count";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Mean,
    Sum,
    Count,
    Min,
    Max,
    Median,
}

impl FromStr for Aggregation {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" | "avg" | "average" => Ok(Aggregation::Mean),
            "sum" => Ok(Aggregation::Sum),
            "count" => Ok(Aggregation::Count),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "median" => Ok(Aggregation::Median),
            other => Err(other.to_string()),
        }
    }
}

impl Aggregation {
    fn expr(self, measure: &str) -> Expr {
        let values = col(measure).cast(DataType::Float64);
        let aggregated = match self {
            Aggregation::Mean => values.mean(),
            Aggregation::Sum => values.sum(),
            Aggregation::Count => col(measure).count().cast(DataType::Float64),
            Aggregation::Min => values.min(),
            Aggregation::Max => values.max(),
            Aggregation::Median => values.median(),
        };
        aggregated.fill_null(lit(0.0)).alias(measure)
    }
}

/// Column table over a polars [`DataFrame`]. Column order is insertion
/// order and cells are never null.
#[derive(Debug, Clone)]
pub struct Frame {
    df: DataFrame,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            df: DataFrame::empty(),
        }
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.df.equals_missing(&other.df)
    }
}

/// Adopts an existing polars frame. Rows holding a null in any column are
/// dropped.
impl TryFrom<DataFrame> for Frame {
    type Error = ExecutionError;
    fn try_from(df: DataFrame) -> ExecutionResult<Self> {
        let df = df.lazy().drop_nulls(None).collect()?;
        Ok(Self { df })
    }
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns<I, S>(columns: I) -> ExecutionResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut frame = Self::new();
        for (name, values) in columns {
            frame.push_column(name, values)?;
        }
        Ok(frame)
    }

    /// Appends a column, replacing any column of the same name.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> ExecutionResult<()> {
        let name = name.into();
        if self.df.width() > 0 && self.df.height() != values.len() {
            return Err(ExecutionError::RaggedFrame {
                column: name,
                expected: self.df.height(),
                found: values.len(),
            });
        }
        let series = to_series(&name, &values)?;
        let mut columns: Vec<Column> = self
            .df
            .get_columns()
            .iter()
            .filter(|c| c.name().as_str() != name)
            .cloned()
            .collect();
        columns.push(Column::from(series));
        self.df = DataFrame::new(columns)?;
        Ok(())
    }

    pub fn as_dataframe(&self) -> &DataFrame {
        &self.df
    }
    pub fn into_dataframe(self) -> DataFrame {
        self.df
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.df.get_columns().iter().map(|c| c.name().as_str())
    }

    fn series(&self, name: &str) -> ExecutionResult<&Series> {
        self.df
            .column(name)
            .map(Column::as_materialized_series)
            .map_err(|_| ExecutionError::ColumnNotFound {
                column: name.to_string(),
            })
    }

    pub fn dtype(&self, name: &str) -> ExecutionResult<&DataType> {
        self.series(name).map(|s| s.dtype())
    }

    /// The column's cells in row order.
    pub fn column(&self, name: &str) -> ExecutionResult<Vec<Value>> {
        values_of(self.series(name)?)
    }

    /// Numeric view of a column in row order. Dates are seconds since the
    /// epoch; cells without a numeric reading are skipped.
    pub fn numeric(&self, name: &str) -> ExecutionResult<Vec<f64>> {
        let series = self.series(name)?;
        if is_temporal(series.dtype()) {
            return Ok(values_of(series)?.iter().filter_map(Value::as_f64).collect());
        }
        let floats = series.cast(&DataType::Float64)?;
        let numeric = floats.f64()?.into_iter().flatten().collect();
        Ok(numeric)
    }

    pub fn sum(&self, name: &str) -> ExecutionResult<f64> {
        let floats = self.series(name)?.cast(&DataType::Float64)?;
        let total = floats.f64()?.sum().unwrap_or(0.0);
        Ok(total)
    }

    /// Smallest and largest numeric reading, `None` for empty or
    /// non-numeric columns.
    pub fn min_max(&self, name: &str) -> ExecutionResult<Option<(f64, f64)>> {
        let series = self.series(name)?;
        if is_temporal(series.dtype()) {
            let seconds = self.numeric(name)?;
            let first = seconds.iter().copied().reduce(f64::min);
            let last = seconds.iter().copied().reduce(f64::max);
            return Ok(first.zip(last));
        }
        if matches!(series.dtype(), DataType::String | DataType::Boolean) {
            return Ok(None);
        }
        let floats = series.cast(&DataType::Float64)?;
        let ca = floats.f64()?;
        Ok(ca.min().zip(ca.max()))
    }

    /// Distinct cells in value order.
    pub fn unique(&self, name: &str) -> ExecutionResult<Vec<Value>> {
        let distinct = self.series(name)?.unique()?;
        let mut values = values_of(&distinct)?;
        values.sort();
        Ok(values)
    }

    pub fn n_unique(&self, name: &str) -> ExecutionResult<usize> {
        Ok(self.series(name)?.n_unique()?)
    }

    pub fn filter(&self, attribute: &str, op: FilterOp, value: &Value) -> ExecutionResult<Frame> {
        let predicate = self.predicate(attribute, op, std::slice::from_ref(value))?;
        self.keep(predicate)
    }

    /// Applies every filter clause (AND). A clause listing several values
    /// keeps rows matching any of them.
    pub fn apply_filters<'a, I>(&self, clauses: I) -> ExecutionResult<Frame>
    where
        I: IntoIterator<Item = &'a Clause>,
    {
        let mut predicates = Vec::new();
        for clause in clauses {
            let Some(attribute) = clause.attribute_name() else {
                continue;
            };
            let targets: &[Value] = match clause.value() {
                ClauseValue::One(v) => std::slice::from_ref(v),
                ClauseValue::AnyOf(vs) => vs,
                ClauseValue::Display | ClauseValue::Wildcard => continue,
            };
            predicates.push(self.predicate(attribute, clause.filter_op, targets)?);
        }
        match predicates.into_iter().reduce(Expr::and) {
            Some(predicate) => self.keep(predicate),
            None => Ok(self.clone()),
        }
    }

    fn keep(&self, predicate: Expr) -> ExecutionResult<Frame> {
        let df = self.df.clone().lazy().filter(predicate).collect()?;
        Ok(Frame { df })
    }

    /// `attribute <op> target` for any of `targets`. A target whose type
    /// cannot be compared with the column only satisfies `!=`.
    fn predicate(&self, attribute: &str, op: FilterOp, targets: &[Value]) -> ExecutionResult<Expr> {
        let dtype = self.dtype(attribute)?.clone();
        let column = if is_temporal(&dtype) {
            col(attribute).cast(DataType::Datetime(TimeUnit::Milliseconds, None))
        } else {
            col(attribute)
        };
        let comparisons = targets.iter().map(|target| match literal(target, &dtype) {
            Some(target) => compare(column.clone(), op, target),
            None => lit(op == FilterOp::Ne),
        });
        Ok(comparisons.reduce(Expr::or).unwrap_or_else(|| lit(false)))
    }

    /// Value frequencies, most frequent first, ties in value order.
    pub fn value_counts(&self, name: &str) -> ExecutionResult<Vec<(Value, usize)>> {
        self.series(name)?;
        let counted = self
            .df
            .clone()
            .lazy()
            .group_by([col(name)])
            .agg([len().alias(COUNT_ALIAS)])
            .collect()?;
        let frame = Frame { df: counted };
        let keys = frame.column(name)?;
        let counts = frame.column(COUNT_ALIAS)?;
        let mut pairs: Vec<(Value, usize)> = keys
            .into_iter()
            .zip(counts.iter().map(|n| n.as_f64().map_or(0, |n| n as usize)))
            .collect();
        pairs.sort_by(|(va, ca), (vb, cb)| cb.cmp(ca).then_with(|| va.cmp(vb)));
        Ok(pairs)
    }

    /// Groups rows by `group_by` and aggregates `measure`, producing the group
    /// columns (sorted) followed by the measure column. The `Record` measure
    /// counts rows.
    pub fn group_aggregate(
        &self,
        group_by: &[&str],
        measure: &str,
        aggregation: &str,
    ) -> ExecutionResult<Frame> {
        for name in group_by {
            self.series(name)?;
        }
        let aggregated = if measure == RECORD {
            len().cast(DataType::Float64).alias(RECORD)
        } else {
            self.series(measure)?;
            Aggregation::from_str(aggregation)
                .map_err(|agg| ExecutionError::UnsupportedAggregation {
                    column: measure.to_string(),
                    aggregation: agg,
                })?
                .expr(measure)
        };
        let lazy = self.df.clone().lazy();
        let df = if group_by.is_empty() {
            lazy.select([aggregated]).collect()?
        } else {
            let keys: Vec<Expr> = group_by.iter().map(|g| col(*g)).collect();
            lazy.group_by(keys.clone())
                .agg([aggregated])
                .sort_by_exprs(keys, SortMultipleOptions::default())
                .collect()?
        };
        Ok(Frame { df })
    }
}

impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.df.width()))?;
        for name in self.column_names() {
            let values = self.column(name).map_err(serde::ser::Error::custom)?;
            map.serialize_entry(name, &values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Frame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let columns = IndexMap::<String, Vec<Value>>::deserialize(deserializer)?;
        Frame::from_columns(columns).map_err(serde::de::Error::custom)
    }
}

fn is_temporal(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Date | DataType::Datetime(_, _))
}

fn to_millis(date: &NaiveDateTime) -> i64 {
    date.and_utc().timestamp_millis()
}

fn from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|d| d.naive_utc())
}

/// Builds a typed series: booleans, integers, floats (any mix of numbers),
/// datetimes, or text for everything else.
fn to_series(name: &str, values: &[Value]) -> ExecutionResult<Series> {
    let name: PlSmallStr = name.into();
    let all = |pred: fn(&Value) -> bool| !values.is_empty() && values.iter().all(pred);
    let series = if all(|v| matches!(v, Value::Bool(_))) {
        let flags: Vec<bool> = values.iter().map(|v| matches!(v, Value::Bool(true))).collect();
        Series::new(name, flags)
    } else if all(|v| matches!(v, Value::Int(_))) {
        let ints: Vec<i64> = values
            .iter()
            .filter_map(|v| match v {
                Value::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        Series::new(name, ints)
    } else if all(Value::is_numeric) {
        let floats: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
        Series::new(name, floats)
    } else if all(Value::is_temporal) {
        let millis: Vec<i64> = values.iter().filter_map(Value::as_date).map(to_millis).collect();
        Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
    } else {
        let text: Vec<String> = values.iter().map(ToString::to_string).collect();
        Series::new(name, text)
    };
    Ok(series)
}

fn values_of(series: &Series) -> ExecutionResult<Vec<Value>> {
    let cells: Vec<Option<Value>> = match series.dtype() {
        DataType::Boolean => series.bool()?.into_iter().map(|v| v.map(Value::Bool)).collect(),
        DataType::String => series.str()?.into_iter().map(|v| v.map(Value::from)).collect(),
        dtype if is_temporal(dtype) => {
            let millis = series
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .cast(&DataType::Int64)?;
            let cells = millis
                .i64()?
                .into_iter()
                .map(|v| v.and_then(from_millis).map(Value::Date))
                .collect();
            cells
        }
        dtype if dtype.is_integer() => {
            let ints = series.cast(&DataType::Int64)?;
            let cells = ints.i64()?.into_iter().map(|v| v.map(Value::Int)).collect();
            cells
        }
        dtype if dtype.is_float() => {
            let floats = series.cast(&DataType::Float64)?;
            let cells = floats.f64()?.into_iter().map(|v| v.map(Value::Float)).collect();
            cells
        }
        _ => {
            let text = series.cast(&DataType::String)?;
            let cells = text.str()?.into_iter().map(|v| v.map(Value::from)).collect();
            cells
        }
    };
    cells
        .into_iter()
        .map(|cell| {
            cell.ok_or_else(|| ExecutionError::MissingValue {
                column: series.name().to_string(),
            })
        })
        .collect()
}

/// A literal comparable with a column of `dtype`, if the types line up.
fn literal(value: &Value, dtype: &DataType) -> Option<Expr> {
    match (value, dtype) {
        (_, DataType::String) => Some(lit(value.to_string())),
        (Value::Bool(b), DataType::Boolean) => Some(lit(*b)),
        (Value::Date(d), dtype) if is_temporal(dtype) => {
            Some(lit(to_millis(d)).cast(DataType::Datetime(TimeUnit::Milliseconds, None)))
        }
        (Value::Int(i), dtype) if dtype.is_integer() || dtype.is_float() => Some(lit(*i)),
        (Value::Float(f), dtype) if dtype.is_integer() || dtype.is_float() => Some(lit(*f)),
        _ => None,
    }
}

fn compare(column: Expr, op: FilterOp, target: Expr) -> Expr {
    match op {
        FilterOp::Eq => column.eq(target),
        FilterOp::Ne => column.neq(target),
        FilterOp::Lt => column.lt(target),
        FilterOp::Gt => column.gt(target),
        FilterOp::Le => column.lt_eq(target),
        FilterOp::Ge => column.gt_eq(target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cars() -> Frame {
        Frame::from_columns([
            (
                "Origin",
                vec!["USA".into(), "Japan".into(), "USA".into(), "Europe".into()],
            ),
            (
                "Horsepower",
                vec![130i64.into(), 95i64.into(), 150i64.into(), 88i64.into()],
            ),
            (
                "Year",
                vec![
                    Value::parse("1970-01-01"),
                    Value::parse("1972-01-01"),
                    Value::parse("1970-01-01"),
                    Value::parse("1975-01-01"),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = Frame::from_columns([
            ("a", vec![Value::Int(1)]),
            ("b", vec![Value::Int(1), Value::Int(2)]),
        ])
        .unwrap_err();
        assert!(matches!(err, ExecutionError::RaggedFrame { found: 2, .. }));
    }

    #[test]
    fn columns_round_trip_through_polars() {
        let frame = cars();
        assert_eq!(frame.dtype("Horsepower").unwrap(), &DataType::Int64);
        assert_eq!(frame.column("Year").unwrap()[3], Value::parse("1975-01-01"));
        assert_eq!(frame.column("Origin").unwrap()[1], Value::from("Japan"));
        assert_eq!(
            frame.column_names().collect::<Vec<_>>(),
            vec!["Origin", "Horsepower", "Year"]
        );
    }

    #[test]
    fn value_counts_orders_by_frequency() {
        let counts = cars().value_counts("Origin").unwrap();
        assert_eq!(counts[0], (Value::from("USA"), 2));
        assert_eq!(counts[1], (Value::from("Europe"), 1));
    }

    #[test]
    fn unique_and_range_use_column_values() {
        let frame = cars();
        assert_eq!(frame.n_unique("Origin").unwrap(), 3);
        assert_eq!(
            frame.unique("Origin").unwrap(),
            vec![Value::from("Europe"), Value::from("Japan"), Value::from("USA")]
        );
        assert_eq!(frame.min_max("Horsepower").unwrap(), Some((88.0, 150.0)));
        assert_eq!(frame.min_max("Origin").unwrap(), None);
        assert_eq!(frame.sum("Horsepower").unwrap(), 463.0);
    }

    #[test]
    fn group_mean_and_record_count() {
        let frame = cars();
        let mean = frame.group_aggregate(&["Origin"], "Horsepower", "mean").unwrap();
        assert_eq!(mean.column("Origin").unwrap()[2], Value::from("USA"));
        assert_eq!(mean.column("Horsepower").unwrap()[2], Value::Float(140.0));
        let count = frame.group_aggregate(&["Origin"], RECORD, "").unwrap();
        assert_eq!(count.column(RECORD).unwrap()[2], Value::Float(2.0));
    }

    #[test]
    fn unknown_aggregation_is_an_error() {
        let err = cars().group_aggregate(&["Origin"], "Horsepower", "mode").unwrap_err();
        assert!(matches!(err, ExecutionError::UnsupportedAggregation { .. }));
    }

    #[test]
    fn filters_combine_with_and() {
        let frame = cars();
        let filtered = frame
            .apply_filters(&[
                Clause::filter("Origin", FilterOp::Eq, "USA"),
                Clause::filter("Horsepower", FilterOp::Gt, 140i64),
            ])
            .unwrap();
        assert_eq!(filtered.len(), 1);
        let early = frame
            .filter("Year", FilterOp::Lt, &Value::parse("1972-01-01"))
            .unwrap();
        assert_eq!(early.len(), 2);
    }

    #[test]
    fn mismatched_filter_types_only_satisfy_not_equal() {
        let frame = cars();
        assert_eq!(frame.filter("Horsepower", FilterOp::Eq, &Value::from("fast")).unwrap().len(), 0);
        assert_eq!(frame.filter("Horsepower", FilterOp::Ne, &Value::from("fast")).unwrap().len(), 4);
        assert_eq!(frame.filter("Horsepower", FilterOp::Ge, &Value::Float(130.0)).unwrap().len(), 2);
    }

    #[test]
    fn any_of_filter_keeps_each_listed_value() {
        let frame = cars();
        let filtered = frame
            .apply_filters(&[Clause::filter_any_of("Origin", ["Japan", "Europe"])])
            .unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn null_rows_are_dropped_on_adoption() {
        let df = DataFrame::new(vec![Column::from(Series::new(
            "Horsepower".into(),
            vec![Some(1i64), None, Some(3)],
        ))])
        .unwrap();
        let frame = Frame::try_from(df).unwrap();
        assert_eq!(frame.column("Horsepower").unwrap(), vec![Value::Int(1), Value::Int(3)]);
    }

    #[test]
    fn frames_serialise_as_column_maps() {
        let frame = cars();
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(back.column("Origin").unwrap(), frame.column("Origin").unwrap());
        assert!(json.starts_with("{\"Origin\":[\"USA\""));
    }
}
