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

use crate::clause::DataType;
use crate::view::{View, ViewCollection};
use itertools::Itertools;
use tracing::debug;

/// At most one temporal clause and no attribute used twice, counting
/// display and filter clauses together.
pub fn is_valid(view: &View) -> bool {
    let temporal = view
        .clauses
        .iter()
        .filter(|c| c.data_type == Some(DataType::Temporal))
        .count();
    temporal < 2 && view.clauses.iter().map(|c| &c.attribute).all_unique()
}

pub fn remove_invalid(collection: &mut ViewCollection) {
    let before = collection.len();
    collection.retain(is_valid);
    debug!("Validity check dropped {} of {} views", before - collection.len(), before);
}
