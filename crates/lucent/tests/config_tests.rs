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

use lucent::{ConfigError, RecommendationConfig, RecommendationError, Recommender};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_config_loads_from_yaml_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "top_k: 7").unwrap();
    writeln!(file, "filter_cardinality_limit: 25").unwrap();
    writeln!(file, "parallel: false").unwrap();

    let config = RecommendationConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.top_k, 7);
    assert_eq!(config.filter_cardinality_limit, 25);
    assert!(!config.parallel);
    assert_eq!(config.default_bin_size, 10);

    let recommender = Recommender::new(config).unwrap();
    assert_eq!(recommender.config().top_k, 7);
}

#[test]
fn test_out_of_range_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "default_bin_size: 0").unwrap();
    let err = RecommendationConfig::from_yaml_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { ref field, .. } if field == "default_bin_size"));
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = RecommendationConfig::from_yaml_file(&path).unwrap_err();
    match err {
        ConfigError::LoadFailed { reason } => assert!(reason.contains("absent.yaml")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_invalid_config_surfaces_through_recommender() {
    let config = RecommendationConfig {
        top_k: 0,
        ..Default::default()
    };
    let err = Recommender::new(config).err().unwrap();
    assert!(matches!(err, RecommendationError::Config(_)));
    assert_eq!(err.category(), "Configuration");
}
