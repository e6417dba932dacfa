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

use crate::value::Value;
use chrono::{Datelike, NaiveDateTime};
use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Year,
    Month,
    Day,
}

/// Coarsest granularity that still tells the column's dates apart: a column
/// whose dates share month and day varies by year only, one sharing only the
/// day varies by month.
pub fn granularity(column: &[Value]) -> Granularity {
    let dates: Vec<&NaiveDateTime> = column.iter().filter_map(Value::as_date).collect();
    let months = dates.iter().map(|d| d.month()).unique().count();
    let days = dates.iter().map(|d| d.day()).unique().count();
    match (months <= 1, days <= 1) {
        (true, true) => Granularity::Year,
        (_, true) => Granularity::Month,
        _ => Granularity::Day,
    }
}

/// Formats `date` at the granularity of its column, without zero padding.
pub fn format_temporal(date: &NaiveDateTime, column: &[Value]) -> String {
    match granularity(column) {
        Granularity::Year => date.year().to_string(),
        Granularity::Month => format!("{}-{}", date.year(), date.month()),
        Granularity::Day => format!("{}-{}-{}", date.year(), date.month(), date.day()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn years() -> Vec<Value> {
        ["1970-01-01", "1971-01-01", "1972-01-01"]
            .iter()
            .map(|d| Value::parse(d))
            .collect()
    }

    #[test]
    fn yearly_column_formats_year_only() {
        let stamp = Value::parse("2019-08-26");
        let date = stamp.as_date().unwrap();
        assert_eq!(format_temporal(date, &years()), "2019");
    }

    #[test]
    fn varying_month_adds_month() {
        let mut column = years();
        column[0] = Value::parse("1970-03-01");
        let stamp = Value::parse("2019-08-26");
        assert_eq!(format_temporal(stamp.as_date().unwrap(), &column), "2019-8");
    }

    #[test]
    fn varying_day_adds_day() {
        let mut column = years();
        column[0] = Value::parse("1970-03-03");
        let stamp = Value::parse("2019-08-26");
        assert_eq!(format_temporal(stamp.as_date().unwrap(), &column), "2019-8-26");
    }
}
