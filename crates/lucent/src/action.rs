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

//! Recommendation actions and the session that runs them.
//!
//! An [`Action`] turns the current intent into a ranked collection of
//! related views. Actions live in an [`ActionRegistry`] owned by a
//! [`Recommender`]; each session carries its own registry.

use crate::clause::{Clause, ClauseValue, FilterOp, Intent};
use crate::compiler::{compile, compile_views};
use crate::config::RecommendationConfig;
use crate::error::{ActionError, ActionResult, Result, SerialisationError};
use crate::executor::{Executor, InMemoryExecutor};
use crate::frame::Frame;
use crate::interestingness::score_collection;
use crate::metadata::DatasetMetadata;
use crate::ranking::Ranker;
use crate::value::Value;
use crate::view::{View, ViewCollection};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

/// Everything an action may read while it runs.
pub struct ActionContext<'a> {
    /// The intent with value wildcards resolved.
    pub intent: &'a Intent,
    /// The compiled, unexecuted views of `intent`.
    pub current: &'a ViewCollection,
    pub frame: &'a Frame,
    pub metadata: &'a DatasetMetadata,
    pub config: &'a RecommendationConfig,
    pub executor: &'a dyn Executor,
}

impl ActionContext<'_> {
    /// Executes, scores and ranks compiled views.
    pub fn evaluate(&self, mut views: ViewCollection, ranker: Ranker) -> Result<ViewCollection> {
        self.executor.execute(&mut views, self.frame)?;
        score_collection(&mut views, self.frame, self.config)?;
        Ok(ranker.rank(views))
    }

    pub fn top_k(&self) -> Ranker {
        Ranker::top(self.config.top_k)
    }

    /// Display clauses of the first current view, without the synthetic
    /// count and with only the channels the user fixed in the intent.
    fn base_clauses(&self) -> Vec<Clause> {
        let Some(first) = self.current.get(0) else {
            return self.intent.display_clauses().into_iter().cloned().collect();
        };
        first
            .display_clauses()
            .into_iter()
            .filter(|c| !c.is_record())
            .map(|c| {
                let mut clause = c.clone();
                clause.channel = self
                    .intent
                    .display_clauses()
                    .into_iter()
                    .find(|i| i.attribute == c.attribute)
                    .and_then(|i| i.channel);
                clause
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub action: String,
    pub description: String,
    pub collection: ViewCollection,
}

pub trait Action: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn applies(&self, _ctx: &ActionContext<'_>) -> bool {
        true
    }
    fn run(&self, ctx: &ActionContext<'_>) -> Result<Recommendation>;

    fn recommendation(&self, collection: ViewCollection) -> Recommendation {
        Recommendation {
            action: self.name().to_string(),
            description: self.description().to_string(),
            collection,
        }
    }
}

/// The intent's own views, scored and sorted but not truncated.
pub struct CurrentViews;

impl Action for CurrentViews {
    fn name(&self) -> &str {
        "Current Views"
    }
    fn description(&self) -> &str {
        "Shows the views defined by the current intent"
    }
    fn run(&self, ctx: &ActionContext<'_>) -> Result<Recommendation> {
        let collection = ctx.evaluate(ctx.current.clone(), Ranker::all())?;
        Ok(self.recommendation(collection))
    }
}

/// One view per value of a categorical column, each filtering the data to
/// that value. With filters in the intent, the other values of the filtered
/// columns are tried instead.
pub struct FilterAction;

impl Action for FilterAction {
    fn name(&self) -> &str {
        "Filter"
    }
    fn description(&self) -> &str {
        "Shows possible views when filtered by categorical columns in the dataset"
    }
    fn applies(&self, ctx: &ActionContext<'_>) -> bool {
        !ctx.intent.display_clauses().is_empty()
    }
    fn run(&self, ctx: &ActionContext<'_>) -> Result<Recommendation> {
        let base = ctx.base_clauses();
        let with_filter = |attribute: &str, value: &Value| {
            let mut clauses = base.clone();
            clauses.push(Clause::filter(attribute, FilterOp::Eq, value.clone()));
            View::new(clauses)
        };
        let mut candidates = Vec::new();
        let filters = ctx.intent.filter_clauses();
        if filters.is_empty() {
            let shown: Vec<&str> = base.iter().filter_map(Clause::attribute_name).collect();
            for name in ctx.metadata.column_names() {
                let meta = ctx.metadata.lookup(name)?;
                if meta.cardinality >= ctx.config.filter_cardinality_limit || shown.contains(&name) {
                    continue;
                }
                candidates.extend(meta.unique_values.iter().map(|v| with_filter(name, v)));
            }
        } else {
            let mut taken: Vec<Value> = Vec::new();
            for filter in filters {
                let Some(attribute) = filter.attribute_name() else {
                    continue;
                };
                match filter.value() {
                    ClauseValue::One(v) => taken.push(v.clone()),
                    ClauseValue::AnyOf(vs) => taken.extend(vs.iter().cloned()),
                    ClauseValue::Display | ClauseValue::Wildcard => {}
                }
                let unique = &ctx.metadata.lookup(attribute)?.unique_values;
                candidates.extend(
                    unique
                        .iter()
                        .filter(|v| !taken.contains(v))
                        .map(|v| with_filter(attribute, v)),
                );
            }
        }
        debug!("Filter action built {} candidate views", candidates.len());
        let compiled = compile_views(&ViewCollection::new(candidates), ctx.metadata, ctx.config)?;
        Ok(self.recommendation(ctx.evaluate(compiled, ctx.top_k())?))
    }
}

/// Adds one more attribute to the current ones.
pub struct Enhance;

impl Action for Enhance {
    fn name(&self) -> &str {
        "Enhance"
    }
    fn description(&self) -> &str {
        "Shows possible views when an additional attribute is added to the current intent"
    }
    fn applies(&self, ctx: &ActionContext<'_>) -> bool {
        let shown = ctx.intent.display_clauses().len();
        shown >= 1 && shown < ctx.config.max_enhance_attributes
    }
    fn run(&self, ctx: &ActionContext<'_>) -> Result<Recommendation> {
        let mut clauses = ctx.intent.clauses().to_vec();
        clauses.push(Clause::wildcard().with_exclude(ctx.intent.display_attributes()));
        let compiled = compile(&Intent::new(clauses), ctx.metadata, ctx.config)?;
        Ok(self.recommendation(ctx.evaluate(compiled.collection, ctx.top_k())?))
    }
}

/// Drops one clause at a time: a display attribute while another remains,
/// or a filter.
pub struct Generalize;

impl Action for Generalize {
    fn name(&self) -> &str {
        "Generalize"
    }
    fn description(&self) -> &str {
        "Shows possible views when one attribute or filter is removed from the current intent"
    }
    fn applies(&self, ctx: &ActionContext<'_>) -> bool {
        ctx.intent.len() >= 2
    }
    fn run(&self, ctx: &ActionContext<'_>) -> Result<Recommendation> {
        let clauses = ctx.intent.clauses();
        let shown = ctx.intent.display_clauses().len();
        let mut views = Vec::new();
        for (i, clause) in clauses.iter().enumerate() {
            if clause.is_display() && shown < 2 {
                continue;
            }
            let reduced: Vec<Clause> = clauses
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, c)| c.clone())
                .collect();
            let compiled = compile(&Intent::new(reduced), ctx.metadata, ctx.config)?;
            views.extend(compiled.collection);
        }
        Ok(self.recommendation(ctx.evaluate(ViewCollection::new(views), ctx.top_k())?))
    }
}

/// Actions in registration order, looked up by case-insensitive name.
#[derive(Default)]
pub struct ActionRegistry {
    actions: IndexMap<String, Box<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: [Box<dyn Action>; 4] = [
            Box::new(CurrentViews),
            Box::new(FilterAction),
            Box::new(Enhance),
            Box::new(Generalize),
        ];
        for action in defaults {
            let key = action.name().to_lowercase();
            registry.actions.insert(key, action);
        }
        registry
    }

    pub fn register(&mut self, action: Box<dyn Action>) -> ActionResult<()> {
        let key = action.name().to_lowercase();
        if self.actions.contains_key(&key) {
            return Err(ActionError::AlreadyRegistered {
                name: action.name().to_string(),
            });
        }
        debug!("Registered action '{}'", action.name());
        self.actions.insert(key, action);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> ActionResult<Box<dyn Action>> {
        self.actions
            .shift_remove(&name.to_lowercase())
            .ok_or_else(|| ActionError::NotRegistered {
                name: name.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Option<&dyn Action> {
        self.actions.get(&name.to_lowercase()).map(|a| &**a)
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.values().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Action> {
        self.actions.values().map(|a| &**a)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecommendationSet {
    pub recommendations: Vec<Recommendation>,
    pub resolved_intent: Intent,
    /// Filters the intent carried without any display attribute. Nothing is
    /// recommended until the caller applies them.
    pub pending_filters: Vec<Clause>,
}

impl RecommendationSet {
    pub fn get(&self, action: &str) -> Option<&Recommendation> {
        self.recommendations
            .iter()
            .find(|r| r.action.eq_ignore_ascii_case(action))
    }
    pub fn actions(&self) -> Vec<&str> {
        self.recommendations.iter().map(|r| r.action.as_str()).collect()
    }
    pub fn len(&self) -> usize {
        self.recommendations.len()
    }
    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }
    pub fn to_json(&self) -> std::result::Result<String, SerialisationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One analysis session: configuration, actions and execution backend.
pub struct Recommender {
    config: RecommendationConfig,
    registry: ActionRegistry,
    executor: Box<dyn Executor>,
}

impl Recommender {
    pub fn new(config: RecommendationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            executor: Box::new(InMemoryExecutor::new(&config)),
            registry: ActionRegistry::with_defaults(),
            config,
        })
    }

    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_executor(mut self, executor: Box<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ActionRegistry {
        &mut self.registry
    }

    /// Recommends views for `intent` over `frame`, inferring column types.
    pub fn recommend(&self, intent: &Intent, frame: &Frame) -> Result<RecommendationSet> {
        let metadata = DatasetMetadata::from_frame(frame)?;
        self.recommend_with_metadata(intent, frame, &metadata)
    }

    /// Like [`Recommender::recommend`] with caller-supplied metadata, for
    /// when inferred types have been overridden.
    pub fn recommend_with_metadata(
        &self,
        intent: &Intent,
        frame: &Frame,
        metadata: &DatasetMetadata,
    ) -> Result<RecommendationSet> {
        let compilation = compile(intent, metadata, &self.config)?;
        if compilation.is_pending() {
            info!(
                "Intent has {} filters and no attributes; nothing to recommend yet",
                compilation.pending_filters.len()
            );
            return Ok(RecommendationSet {
                recommendations: Vec::new(),
                resolved_intent: compilation.resolved_intent,
                pending_filters: compilation.pending_filters,
            });
        }
        let ctx = ActionContext {
            intent: &compilation.resolved_intent,
            current: &compilation.collection,
            frame,
            metadata,
            config: &self.config,
            executor: &*self.executor,
        };
        let mut recommendations = Vec::new();
        for action in self.registry.iter() {
            if !action.applies(&ctx) {
                debug!("Action '{}' does not apply", action.name());
                continue;
            }
            let recommendation = action.run(&ctx)?;
            info!(
                "Action '{}' produced {} views",
                recommendation.action,
                recommendation.collection.len()
            );
            recommendations.push(recommendation);
        }
        Ok(RecommendationSet {
            recommendations,
            resolved_intent: compilation.resolved_intent,
            pending_filters: Vec::new(),
        })
    }
}
