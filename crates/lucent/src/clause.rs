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

use crate::error::{CompileError, CompileResult};
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Name of the synthetic count-of-rows measure added by the encoder.
pub const RECORD: &str = "Record";
pub const WILDCARD: &str = "?";

static SHORTHAND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<attr>[^=<>!]+?)\s*(?P<op><=|>=|!=|=|<|>)\s*(?P<val>.*?)\s*$")
        .expect("shorthand pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Nominal,
    Quantitative,
    Ordinal,
    Temporal,
}

impl DataType {
    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Temporal)
    }
    /// Types with a natural order along an axis, drawn as lines.
    pub fn is_ordered(&self) -> bool {
        matches!(self, DataType::Temporal | DataType::Ordinal)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataType::Nominal => "nominal",
            DataType::Quantitative => "quantitative",
            DataType::Ordinal => "ordinal",
            DataType::Temporal => "temporal",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataModel {
    Dimension,
    Measure,
}

impl fmt::Display for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataModel::Dimension => "dimension",
            DataModel::Measure => "measure",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    X,
    Y,
    Color,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::X => "x",
            Channel::Y => "y",
            Channel::Color => "color",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterOp {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "!=")]
    Ne,
}

impl FilterOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Lt => "<",
            FilterOp::Gt => ">",
            FilterOp::Le => "<=",
            FilterOp::Ge => ">=",
            FilterOp::Ne => "!=",
        }
    }
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "=" | "==" => FilterOp::Eq,
            "<" => FilterOp::Lt,
            ">" => FilterOp::Gt,
            "<=" => FilterOp::Le,
            ">=" => FilterOp::Ge,
            "!=" => FilterOp::Ne,
            _ => return None,
        })
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// The attribute slot of a clause: a concrete column, a set of candidate
/// columns, or a wildcard over every column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Wildcard,
    Named(String),
    AnyOf(Vec<String>),
}

impl Attribute {
    pub fn name(&self) -> Option<&str> {
        match self {
            Attribute::Named(name) => Some(name),
            _ => None,
        }
    }
    /// Candidate names listed directly on the clause. Empty for a wildcard.
    pub fn candidates(&self) -> Vec<&str> {
        match self {
            Attribute::Wildcard => Vec::new(),
            Attribute::Named(name) => vec![name.as_str()],
            Attribute::AnyOf(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Wildcard => f.write_str(WILDCARD),
            Attribute::Named(name) => f.write_str(name),
            Attribute::AnyOf(names) => f.write_str(&names.join("|")),
        }
    }
}

/// The value slot of a clause. `Display` marks a display clause, anything
/// else makes the clause a filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseValue {
    #[default]
    Display,
    Wildcard,
    One(Value),
    AnyOf(Vec<Value>),
}

impl fmt::Display for ClauseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClauseValue::Display => Ok(()),
            ClauseValue::Wildcard => f.write_str(WILDCARD),
            ClauseValue::One(value) => write!(f, "{value}"),
            ClauseValue::AnyOf(values) => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub description: Option<String>,
    pub attribute: Attribute,
    value: ClauseValue,
    pub filter_op: FilterOp,
    pub channel: Option<Channel>,
    pub data_type: Option<DataType>,
    pub data_model: Option<DataModel>,
    pub aggregation: Option<String>,
    pub bin_size: usize,
    pub weight: f64,
    pub sort: Option<SortOrder>,
    pub exclude: BTreeSet<String>,
}

impl Clause {
    fn base(attribute: Attribute, value: ClauseValue) -> Self {
        Self {
            description: None,
            attribute,
            value,
            filter_op: FilterOp::Eq,
            channel: None,
            data_type: None,
            data_model: None,
            aggregation: None,
            bin_size: 0,
            weight: 1.0,
            sort: None,
            exclude: BTreeSet::new(),
        }
    }
    /// Display clause over one named column.
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::base(Attribute::Named(name.into()), ClauseValue::Display)
    }
    /// Display clause over any of several columns.
    pub fn any_attribute<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::base(
            Attribute::AnyOf(names.into_iter().map(Into::into).collect()),
            ClauseValue::Display,
        )
    }
    /// Display clause over every column, narrowed later by type/model constraints.
    pub fn wildcard() -> Self {
        Self::base(Attribute::Wildcard, ClauseValue::Display)
    }
    pub fn filter(attribute: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        let mut clause = Self::base(
            Attribute::Named(attribute.into()),
            ClauseValue::One(value.into()),
        );
        clause.filter_op = op;
        clause
    }
    /// Filter clause over every unique value of the column.
    pub fn filter_wildcard(attribute: impl Into<String>) -> Self {
        Self::base(Attribute::Named(attribute.into()), ClauseValue::Wildcard)
    }
    pub fn filter_any_of<I, V>(attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::base(
            Attribute::Named(attribute.into()),
            ClauseValue::AnyOf(values.into_iter().map(Into::into).collect()),
        )
    }
    /// The synthetic count-of-rows measure.
    pub fn record() -> Self {
        let mut clause = Self::attribute(RECORD);
        clause.aggregation = Some("count".to_string());
        clause.data_model = Some(DataModel::Measure);
        clause.data_type = Some(DataType::Quantitative);
        clause
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = attribute;
        self
    }
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }
    pub fn with_data_model(mut self, data_model: DataModel) -> Self {
        self.data_model = Some(data_model);
        self
    }
    pub fn with_aggregation(mut self, aggregation: impl Into<String>) -> Self {
        self.aggregation = Some(aggregation.into());
        self
    }
    pub fn with_bin_size(mut self, bin_size: usize) -> Self {
        self.bin_size = bin_size;
        self
    }
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }
    pub fn with_exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(exclude.into_iter().map(Into::into));
        self
    }
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn value(&self) -> &ClauseValue {
        &self.value
    }
    pub fn is_filter(&self) -> bool {
        !matches!(self.value, ClauseValue::Display)
    }
    pub fn is_display(&self) -> bool {
        !self.is_filter()
    }
    pub fn is_record(&self) -> bool {
        self.attribute.name() == Some(RECORD)
    }
    pub fn attribute_name(&self) -> Option<&str> {
        self.attribute.name()
    }
    /// The single concrete filter value, once wildcards are expanded.
    pub fn filter_value(&self) -> Option<&Value> {
        match &self.value {
            ClauseValue::One(value) => Some(value),
            _ => None,
        }
    }
    pub fn is_excluded(&self, candidate: &str) -> bool {
        self.exclude.contains(candidate)
    }

    /// Copy of this filter clause narrowed to one concrete value. Display
    /// clauses stay display clauses.
    pub(crate) fn with_concrete_value(&self, value: Value) -> Self {
        let mut clause = self.clone();
        if clause.is_filter() {
            clause.value = ClauseValue::One(value);
        }
        clause
    }
    pub(crate) fn with_value_list(&self, values: Vec<Value>) -> Self {
        let mut clause = self.clone();
        if clause.is_filter() {
            clause.value = ClauseValue::AnyOf(values);
        }
        clause
    }

    /// Parses the shorthand accepted in intents: `Attr`, `?`, `A|B`,
    /// `Attr=v`, `Attr<v`, `Attr=?`, `Attr=a|b` and the other comparisons.
    pub fn parse(description: &str) -> CompileResult<Self> {
        let invalid = |reason: &str| CompileError::InvalidClause {
            description: description.to_string(),
            reason: reason.to_string(),
        };
        let mut clause = match SHORTHAND_RE.captures(description) {
            Some(caps) => {
                let attribute = parse_attribute(&caps["attr"]);
                let op = FilterOp::from_symbol(&caps["op"]).ok_or_else(|| invalid("unknown operator"))?;
                let raw = &caps["val"];
                let value = if raw.is_empty() {
                    return Err(invalid("filter value is empty"));
                } else if raw == WILDCARD {
                    ClauseValue::Wildcard
                } else if raw.contains('|') {
                    ClauseValue::AnyOf(raw.split('|').map(Value::parse).collect())
                } else {
                    ClauseValue::One(Value::parse(raw))
                };
                let mut clause = Self::base(attribute, value);
                clause.filter_op = op;
                clause
            }
            None => Self::base(parse_attribute(description), ClauseValue::Display),
        };
        if clause.attribute.candidates().iter().any(|c| c.is_empty())
            && clause.attribute != Attribute::Wildcard
        {
            return Err(invalid("attribute is empty"));
        }
        clause.description = Some(description.to_string());
        Ok(clause)
    }
}

fn parse_attribute(raw: &str) -> Attribute {
    let raw = raw.trim();
    if raw == WILDCARD {
        Attribute::Wildcard
    } else if raw.contains('|') {
        Attribute::AnyOf(raw.split('|').map(|s| s.trim().to_string()).collect())
    } else {
        Attribute::Named(raw.to_string())
    }
}

/// A user-supplied, possibly partial, list of clauses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    clauses: Vec<Clause>,
}

impl Intent {
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }
    pub fn parse(descriptions: &[&str]) -> CompileResult<Self> {
        descriptions
            .iter()
            .map(|d| Clause::parse(d))
            .collect::<CompileResult<Vec<_>>>()
            .map(Self::new)
    }
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
    pub fn into_clauses(self) -> Vec<Clause> {
        self.clauses
    }
    pub fn display_clauses(&self) -> Vec<&Clause> {
        self.clauses.iter().filter(|c| c.is_display()).collect()
    }
    pub fn filter_clauses(&self) -> Vec<&Clause> {
        self.clauses.iter().filter(|c| c.is_filter()).collect()
    }
    /// Names of the concrete display attributes.
    pub fn display_attributes(&self) -> Vec<&str> {
        self.clauses
            .iter()
            .filter(|c| c.is_display())
            .filter_map(Clause::attribute_name)
            .collect()
    }
    pub fn len(&self) -> usize {
        self.clauses.len()
    }
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl From<Vec<Clause>> for Intent {
    fn from(clauses: Vec<Clause>) -> Self {
        Self::new(clauses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_display_and_wildcard() {
        let c = Clause::parse("Horsepower").unwrap();
        assert!(c.is_display());
        assert_eq!(c.attribute_name(), Some("Horsepower"));
        assert_eq!(Clause::parse("?").unwrap().attribute, Attribute::Wildcard);
        assert_eq!(
            Clause::parse("Origin|Brand").unwrap().attribute,
            Attribute::AnyOf(vec!["Origin".into(), "Brand".into()])
        );
    }

    #[test]
    fn shorthand_filters() {
        let c = Clause::parse("SportType=Ball").unwrap();
        assert!(c.is_filter());
        assert_eq!(c.filter_value(), Some(&Value::Str("Ball".into())));
        let c = Clause::parse("Weight >= 3000").unwrap();
        assert_eq!(c.filter_op, FilterOp::Ge);
        assert_eq!(c.filter_value(), Some(&Value::Int(3000)));
        assert_eq!(Clause::parse("Origin=?").unwrap().value(), &ClauseValue::Wildcard);
        assert!(matches!(
            Clause::parse("Origin=USA|Japan").unwrap().value(),
            ClauseValue::AnyOf(v) if v.len() == 2
        ));
    }

    #[test]
    fn shorthand_rejects_empty_parts() {
        assert!(Clause::parse("Origin=").is_err());
        assert!(Clause::parse("").is_err());
    }

    #[test]
    fn concrete_value_keeps_classification() {
        let display = Clause::attribute("Origin");
        assert!(display.with_concrete_value(Value::from("USA")).is_display());
        let filter = Clause::filter_wildcard("Origin");
        assert!(filter.with_concrete_value(Value::from("USA")).is_filter());
    }
}
