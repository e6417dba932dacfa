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

use crate::view::ViewCollection;
use tracing::debug;

/// Orders scored views, highest first. Views without a mark never reach the
/// output; equal scores keep enumeration order.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    top_k: Option<usize>,
}

impl Ranker {
    pub fn top(k: usize) -> Self {
        Self { top_k: Some(k) }
    }
    /// Sorts without truncating.
    pub fn all() -> Self {
        Self { top_k: None }
    }

    pub fn rank(&self, mut collection: ViewCollection) -> ViewCollection {
        let before = collection.len();
        collection.retain(|v| v.is_encoded());
        if collection.len() < before {
            debug!("Ranking skipped {} unencoded views", before - collection.len());
        }
        collection.sort_by_score();
        if let Some(k) = self.top_k {
            collection.truncate(k);
        }
        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Mark, View};

    fn view(title: &str, mark: Option<Mark>, score: f64) -> View {
        let mut v = View::new(Vec::new()).with_title(title);
        v.mark = mark;
        v.score = Some(score);
        v
    }

    #[test]
    fn unencoded_views_are_dropped_before_truncation() {
        let vc = ViewCollection::new(vec![
            view("a", Some(Mark::Bar), 0.2),
            view("b", None, 0.9),
            view("c", Some(Mark::Line), 0.7),
            view("d", Some(Mark::Scatter), 0.7),
        ]);
        let ranked = Ranker::top(2).rank(vc);
        let titles: Vec<&str> = ranked.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "d"]);
    }

    #[test]
    fn all_keeps_every_encoded_view() {
        let vc = ViewCollection::new(vec![
            view("a", Some(Mark::Bar), 0.2),
            view("b", Some(Mark::Bar), 0.4),
        ]);
        assert_eq!(Ranker::all().rank(vc).len(), 2);
    }
}
