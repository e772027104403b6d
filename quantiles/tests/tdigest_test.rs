// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

mod common;

use common::RANKS;
use common::assert_rank_within;
use common::low_cardinality;
use common::shuffled;
use common::sorted;
use googletest::assert_that;
use googletest::prelude::eq;
use googletest::prelude::ge;
use googletest::prelude::le;
use googletest::prelude::near;
use insta::assert_snapshot;
use quantiles::common::Compression;
use quantiles::tdigest::DEFAULT_CLUSTERS;
use quantiles::tdigest::Digest;
use quantiles::tdigest::DigestConfig;

const POLICIES: [Compression; 3] = [
    Compression::Never,
    Compression::Periodic,
    Compression::Aggressive,
];

fn filled(compression: Compression, values: &[f64]) -> Digest {
    let mut digest = Digest::new(DigestConfig {
        compression,
        ..Default::default()
    });
    for &value in values {
        digest.insert(value);
    }
    digest
}

#[test]
fn test_empty() {
    let digest = Digest::default();
    assert!(digest.is_empty());
    assert_eq!(digest.params(), DigestConfig::default());
    assert_eq!(digest.params().clusters, DEFAULT_CLUSTERS);
    assert_eq!(digest.total_weight(), 0);
    assert_eq!(digest.num_centroids(), 0);
    assert_eq!(digest.min_value(), None);
    assert_eq!(digest.max_value(), None);
    assert_eq!(digest.quantile(0.5), None);
    assert_eq!(digest.quantiles(&[0.1, 0.9]), None);
    assert_eq!(digest.rank(0.0), None);
    assert_eq!(digest.cdf(&[0.0]), None);
}

#[test]
fn test_one_value() {
    let mut digest = Digest::default();
    digest.insert(1.0);
    assert_eq!(digest.total_weight(), 1);
    assert_eq!(digest.min_value(), Some(1.0));
    assert_eq!(digest.max_value(), Some(1.0));
    assert_eq!(digest.quantile(0.0), Some(1.0));
    assert_eq!(digest.quantile(0.5), Some(1.0));
    assert_eq!(digest.quantile(1.0), Some(1.0));
    assert_eq!(digest.rank(0.99), Some(0.0));
    assert_eq!(digest.rank(1.0), Some(0.5));
    assert_eq!(digest.rank(1.01), Some(1.0));
}

#[test]
fn test_small_set() {
    let mut digest = Digest::default();
    assert!(digest.is_empty());
    for value in [10.0, 1.0, 2.0, 8.0, 9.0, 5.0, 6.0, 4.0, 7.0, 3.0] {
        digest.insert(value);
    }
    assert!(!digest.is_empty());
    assert_eq!(digest.total_weight(), 10);
    assert_that!(digest.quantile(0.1).unwrap(), near(1.5, 0.5));
    assert_eq!(digest.quantile(0.0), Some(1.0));
    assert_eq!(digest.quantile(1.0), Some(10.0));
}

#[test]
fn test_accuracy_and_bounded_size() {
    let values = shuffled(100_000, 19);
    let sorted = sorted(&values);
    let n = values.len() as f64;

    for compression in POLICIES {
        let digest = filled(compression, &values);
        assert_eq!(digest.total_weight(), 100_000);
        assert_that!(digest.num_centroids(), le(5 * DEFAULT_CLUSTERS as usize));
        assert_eq!(digest.quantile(0.0), Some(0.0));
        assert_eq!(digest.quantile(1.0), Some(99_999.0));
        for rank in RANKS {
            let value = digest.quantile(rank).unwrap();
            assert_rank_within(&sorted, value, rank, 0.03 * n);
        }
    }
}

#[test]
fn test_quantiles_are_monotone() {
    let values = shuffled(20_000, 23);
    for compression in POLICIES {
        let digest = filled(compression, &values);
        let ranks: Vec<f64> = (0..=1000).map(|i| i as f64 / 1000.).collect();
        let quantiles = digest.quantiles(&ranks).unwrap();
        for (rank, value) in ranks.iter().zip(&quantiles) {
            assert_eq!(digest.quantile(*rank), Some(*value));
        }
        for pair in quantiles.windows(2) {
            assert_that!(pair[1], ge(pair[0]));
        }
    }
}

#[test]
fn test_quantiles_are_monotone_with_duplicates() {
    let values = low_cardinality(100_000, 10, 31);
    let ranks: Vec<f64> = (0..=1000).map(|i| i as f64 / 1000.).collect();
    for compression in POLICIES {
        let digest = filled(compression, &values);
        let quantiles = digest.quantiles(&ranks).unwrap();
        assert_that!(quantiles[0], eq(0.0));
        assert_that!(quantiles[1000], eq(9.0));
        for pair in quantiles.windows(2) {
            assert_that!(pair[1], ge(pair[0]));
        }
        let median = digest.quantile(0.5).unwrap();
        assert_that!(median, ge(4.0));
        assert_that!(median, le(5.0));
    }
}

#[test]
fn test_rank_and_cdf() {
    let digest = filled(Compression::Periodic, &shuffled(100_000, 29));
    assert_eq!(digest.rank(-1.0), Some(0.0));
    assert_eq!(digest.rank(100_000.0), Some(1.0));
    assert_that!(digest.rank(50_000.0).unwrap(), near(0.5, 0.02));

    let cdf = digest.cdf(&[25_000.0, 75_000.0]).unwrap();
    assert_that!(cdf.len(), eq(3));
    assert_that!(cdf[0], near(0.25, 0.02));
    assert_that!(cdf[1], near(0.75, 0.02));
    assert_that!(cdf[2], eq(1.0));
}

#[test]
fn test_same_seed_is_deterministic() {
    let values = shuffled(10_000, 31);
    let config = DigestConfig {
        compression: Compression::Periodic,
        seed: 42,
        ..Default::default()
    };
    let mut left = Digest::new(config);
    let mut right = Digest::new(config);
    for &value in &values {
        left.insert(value);
        right.insert(value);
    }
    assert_eq!(left.serialize(), right.serialize());
}

#[test]
fn test_ignores_non_finite() {
    let mut digest = Digest::default();
    digest.insert(f64::NAN);
    digest.insert(f64::INFINITY);
    digest.insert(f64::NEG_INFINITY);
    assert!(digest.is_empty());
    digest.insert(2.0);
    assert_eq!(digest.total_weight(), 1);
    assert_eq!(digest.max_value(), Some(2.0));
}

#[test]
#[should_panic(expected = "rank must be in [0.0, 1.0]")]
fn test_rank_out_of_range() {
    let mut digest = Digest::default();
    digest.insert(1.0);
    digest.quantile(-0.1);
}

#[test]
fn test_invalid_config() {
    let err = Digest::try_new(DigestConfig {
        clusters: 0,
        ..Default::default()
    })
    .unwrap_err();
    assert_snapshot!(err, @"InvalidArgument => invalid clusters: must be at least 1, got 0");

    let err = Digest::try_new(DigestConfig {
        min_eps: 0.0,
        ..Default::default()
    })
    .unwrap_err();
    assert_snapshot!(err, @"InvalidArgument => invalid min_eps: must be finite and positive, got 0");
}
