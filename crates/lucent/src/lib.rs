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

//! Visualization recommendation for tabular data.
//!
//! An [`Intent`] names the attributes and filters of interest, possibly with
//! wildcards. The [`compiler`] expands it into encoded [`View`]s, an
//! [`Executor`] materialises their data, [`interestingness`] scores them and
//! a [`Ranker`] keeps the best. [`Recommender`] runs the whole loop for every
//! registered [`Action`].

pub mod action;
pub mod clause;
pub mod compiler;
pub mod config;
pub mod dates;
pub mod error;
pub mod executor;
pub mod frame;
pub mod interestingness;
pub mod metadata;
pub mod ranking;
pub mod stats;
pub mod value;
pub mod view;

pub use action::{
    Action, ActionContext, ActionRegistry, CurrentViews, Enhance, FilterAction, Generalize,
    Recommendation, RecommendationSet, Recommender,
};
pub use clause::{
    Attribute, Channel, Clause, ClauseValue, DataModel, DataType, FilterOp, Intent, SortOrder,
    RECORD, WILDCARD,
};
pub use compiler::{compile, compile_views, Compilation, Encoder};
pub use config::RecommendationConfig;
pub use error::{
    ActionError, CompileError, ConfigError, ExecutionError, RecommendationError, Result,
    SerialisationError,
};
pub use executor::{Executor, InMemoryExecutor};
pub use frame::{Aggregation, Frame};
pub use interestingness::{interestingness, score_collection};
pub use metadata::{ColumnMeta, DatasetMetadata};
pub use ranking::Ranker;
pub use value::Value;
pub use view::{Mark, View, ViewCollection};
