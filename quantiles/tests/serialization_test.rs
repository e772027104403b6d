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
use common::low_cardinality;
use common::shuffled;
use insta::assert_snapshot;
use quantiles::common::Compression;
use quantiles::error::Error;
use quantiles::error::ErrorKind;
use quantiles::gk::BiasedGkConfig;
use quantiles::gk::BiasedGkSketch;
use quantiles::gk::GkConfig;
use quantiles::gk::GkSketch;
use quantiles::tdigest::BufferedDigest;
use quantiles::tdigest::BufferedDigestConfig;
use quantiles::tdigest::Digest;
use quantiles::tdigest::DigestConfig;
use quantiles::window::CountWindowConfig;
use quantiles::window::CountWindowGk;
use quantiles::window::TimeWindowConfig;
use quantiles::window::TimeWindowGk;

fn assert_truncation_fails<T>(bytes: &[u8], load: impl Fn(&[u8]) -> Result<T, Error>) {
    for len in 0..bytes.len() {
        match load(&bytes[..len]) {
            Ok(_) => panic!("loaded {len} of {} bytes", bytes.len()),
            Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidData, "{len}: {err}"),
        }
    }
}

#[test]
fn test_digest_round_trip() {
    for compression in [
        Compression::Never,
        Compression::Periodic,
        Compression::Aggressive,
    ] {
        let config = DigestConfig {
            clusters: 50,
            compression,
            seed: 3,
            ..Default::default()
        };
        let empty = Digest::new(config);
        let loaded = Digest::deserialize(&empty.serialize()).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.params(), config);

        let mut digest = Digest::new(config);
        for value in shuffled(10_000, 59) {
            digest.insert(value);
        }
        let bytes = digest.serialize();
        let loaded = Digest::deserialize(&bytes).unwrap();
        assert_eq!(loaded.params(), digest.params());
        assert_eq!(loaded.total_weight(), digest.total_weight());
        assert_eq!(loaded.num_centroids(), digest.num_centroids());
        assert_eq!(loaded.min_value(), digest.min_value());
        assert_eq!(loaded.max_value(), digest.max_value());
        assert_eq!(loaded.quantiles(&RANKS), digest.quantiles(&RANKS));
        assert_eq!(loaded.serialize(), bytes);
    }
}

#[test]
fn test_digest_round_trip_with_duplicates() {
    for seed in 0..20 {
        let mut digest = Digest::new(DigestConfig {
            seed,
            ..Default::default()
        });
        for _ in 0..5000 {
            digest.insert(1.0);
        }
        for _ in 0..200 {
            digest.insert(2.0);
        }
        for _ in 0..200 {
            digest.insert(0.0);
        }
        let bytes = digest.serialize();
        let loaded = Digest::deserialize(&bytes).unwrap();
        assert_eq!(loaded.quantiles(&RANKS), digest.quantiles(&RANKS));
        assert_eq!(loaded.serialize(), bytes);
    }

    for compression in [Compression::Never, Compression::Aggressive] {
        let mut digest = Digest::new(DigestConfig {
            compression,
            ..Default::default()
        });
        for value in low_cardinality(50_000, 5, 67) {
            digest.insert(value);
        }
        let bytes = digest.serialize();
        let loaded = Digest::deserialize(&bytes).unwrap();
        assert_eq!(loaded.serialize(), bytes);
    }
}

#[test]
fn test_digest_continues_identically() {
    let values = shuffled(10_000, 61);
    let mut digest = Digest::new(DigestConfig {
        compression: Compression::Periodic,
        seed: 7,
        ..Default::default()
    });
    for &value in &values[..5000] {
        digest.insert(value);
    }

    let mut buf = Vec::new();
    digest.save(&mut buf).unwrap();
    let mut loaded = Digest::load(buf.as_slice()).unwrap();
    for &value in &values[5000..] {
        digest.insert(value);
        loaded.insert(value);
    }
    assert_eq!(loaded.serialize(), digest.serialize());
}

#[test]
fn test_buffered_digest_round_trip() {
    let mut digest = BufferedDigest::new(BufferedDigestConfig {
        buffer_len: 1000,
        digest: DigestConfig {
            seed: 11,
            ..Default::default()
        },
    });
    for value in shuffled(1500, 67) {
        digest.insert(value);
    }
    assert_eq!(digest.buffered_len(), 500);

    let bytes = digest.serialize();
    let mut loaded = BufferedDigest::deserialize(&bytes).unwrap();
    assert_eq!(loaded.params(), digest.params());
    assert_eq!(loaded.buffered_len(), 500);
    assert_eq!(loaded.quantiles(&RANKS), digest.quantiles(&RANKS));
    assert_eq!(loaded.serialize(), bytes);

    digest.flush();
    loaded.flush();
    assert_eq!(loaded.total_weight(), 1500);
    assert_eq!(loaded.quantiles(&RANKS), digest.quantiles(&RANKS));

    let untouched = BufferedDigest::default();
    let loaded = BufferedDigest::deserialize(&untouched.serialize()).unwrap();
    assert!(loaded.is_empty());
    assert_eq!(loaded.quantile(0.5), None);
}

#[test]
fn test_gk_round_trip() {
    for (compression, use_bands) in [
        (Compression::Never, false),
        (Compression::Periodic, true),
        (Compression::Aggressive, true),
    ] {
        let config = GkConfig {
            eps: 0.01,
            compression,
            use_bands,
        };
        let mut sketch = GkSketch::new(config);
        let loaded = GkSketch::deserialize(&sketch.serialize()).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.params(), config);

        let values = shuffled(10_000, 71);
        for &value in &values[..5000] {
            sketch.insert(value);
        }
        let bytes = sketch.serialize();
        let mut loaded = GkSketch::deserialize(&bytes).unwrap();
        assert_eq!(loaded.params(), config);
        assert_eq!(loaded.total_count(), 5000);
        assert_eq!(loaded.num_tuples(), sketch.num_tuples());
        assert_eq!(loaded.quantiles(&RANKS), sketch.quantiles(&RANKS));
        assert_eq!(loaded.serialize(), bytes);

        for &value in &values[5000..] {
            sketch.insert(value);
            loaded.insert(value);
        }
        assert_eq!(loaded.serialize(), sketch.serialize());
    }
}

#[test]
fn test_biased_gk_round_trip() {
    for target_prob in [0.01, 0.5, 0.99] {
        let config = BiasedGkConfig {
            eps: 0.05,
            target_prob,
            ..Default::default()
        };
        let mut sketch = BiasedGkSketch::new(config);
        for value in shuffled(10_000, 73) {
            sketch.insert(value);
        }
        let bytes = sketch.serialize();
        let loaded = BiasedGkSketch::deserialize(&bytes).unwrap();
        assert_eq!(loaded.params(), config);
        assert_eq!(loaded.total_count(), sketch.total_count());
        assert_eq!(loaded.min_value(), sketch.min_value());
        assert_eq!(loaded.max_value(), sketch.max_value());
        assert_eq!(loaded.quantiles(&RANKS), sketch.quantiles(&RANKS));
        assert_eq!(loaded.serialize(), bytes);
    }
}

#[test]
fn test_count_window_round_trip() {
    let config = CountWindowConfig {
        window_size: 2000,
        quantile_eps: 0.01,
        count_eps: 0.01,
    };
    let mut sketch = CountWindowGk::new(config);
    let values = shuffled(10_000, 79);
    for &value in &values[..7000] {
        sketch.insert(value);
    }

    let mut buf = Vec::new();
    sketch.save(&mut buf).unwrap();
    let mut loaded = CountWindowGk::load(buf.as_slice()).unwrap();
    assert_eq!(loaded.params(), config);
    assert_eq!(loaded.total_count(), sketch.total_count());
    assert_eq!(loaded.num_blocks(), sketch.num_blocks());
    assert_eq!(loaded.quantiles(&RANKS), sketch.quantiles(&RANKS));
    assert_eq!(loaded.serialize(), buf);

    for &value in &values[7000..] {
        sketch.insert(value);
        loaded.insert(value);
    }
    assert_eq!(loaded.quantiles(&RANKS), sketch.quantiles(&RANKS));
    assert_eq!(loaded.serialize(), sketch.serialize());
}

#[test]
fn test_time_window_round_trip() {
    let config = TimeWindowConfig {
        window: 500,
        quantile_eps: 0.01,
        count_eps: 0.01,
    };
    let mut sketch = TimeWindowGk::new(config);
    for (t, value) in shuffled(3000, 83).into_iter().enumerate() {
        sketch.insert(t as u64 / 3, value);
    }
    sketch.update_time(1200);

    let bytes = sketch.serialize();
    let mut loaded = TimeWindowGk::deserialize(&bytes).unwrap();
    assert_eq!(loaded.params(), config);
    assert_eq!(loaded.latest_time(), Some(1200));
    assert_eq!(loaded.total_count(), sketch.total_count());
    assert_eq!(loaded.quantiles(&RANKS), sketch.quantiles(&RANKS));
    assert_eq!(loaded.serialize(), bytes);

    let empty = TimeWindowGk::new(config);
    let loaded = TimeWindowGk::deserialize(&empty.serialize()).unwrap();
    assert!(loaded.is_empty());
    assert_eq!(loaded.latest_time(), None);
}

#[test]
fn test_back_to_back_sketches() {
    let mut gk = GkSketch::default();
    let mut digest = Digest::default();
    let mut window = CountWindowGk::default();
    for value in shuffled(3000, 89) {
        gk.insert(value);
        digest.insert(value);
        window.insert(value);
    }

    let mut buf = Vec::new();
    gk.save(&mut buf).unwrap();
    digest.save(&mut buf).unwrap();
    window.save(&mut buf).unwrap();

    let mut stream = buf.as_slice();
    let gk_loaded = GkSketch::load(&mut stream).unwrap();
    let digest_loaded = Digest::load(&mut stream).unwrap();
    let mut window_loaded = CountWindowGk::load(&mut stream).unwrap();
    assert!(stream.is_empty());

    assert_eq!(gk_loaded.quantiles(&RANKS), gk.quantiles(&RANKS));
    assert_eq!(digest_loaded.quantiles(&RANKS), digest.quantiles(&RANKS));
    assert_eq!(window_loaded.quantiles(&RANKS), window.quantiles(&RANKS));
}

#[test]
fn test_truncated_input() {
    let values = shuffled(1000, 97);

    let mut digest = Digest::default();
    let mut buffered = BufferedDigest::new(BufferedDigestConfig {
        buffer_len: 300,
        ..Default::default()
    });
    let mut gk = GkSketch::default();
    let mut biased = BiasedGkSketch::default();
    let mut count_window = CountWindowGk::new(CountWindowConfig {
        window_size: 200,
        quantile_eps: 0.01,
        count_eps: 0.1,
    });
    let mut time_window = TimeWindowGk::new(TimeWindowConfig {
        window: 20,
        quantile_eps: 0.01,
        count_eps: 0.1,
    });
    for (i, &value) in values.iter().enumerate() {
        digest.insert(value);
        buffered.insert(value);
        gk.insert(value);
        biased.insert(value);
        count_window.insert(value);
        time_window.insert(i as u64 / 10, value);
    }

    assert_truncation_fails(&digest.serialize(), Digest::deserialize);
    assert_truncation_fails(&buffered.serialize(), BufferedDigest::deserialize);
    assert_truncation_fails(&gk.serialize(), GkSketch::deserialize);
    assert_truncation_fails(&biased.serialize(), BiasedGkSketch::deserialize);
    assert_truncation_fails(&count_window.serialize(), CountWindowGk::deserialize);
    assert_truncation_fails(&time_window.serialize(), TimeWindowGk::deserialize);
}

#[test]
fn test_invalid_header() {
    let mut digest = Digest::default();
    digest.insert(1.0);
    let bytes = digest.serialize();

    let err = Digest::deserialize(&[]).unwrap_err();
    assert_snapshot!(err, @"InvalidData => insufficient data: family_id");

    let err = GkSketch::deserialize(&bytes).unwrap_err();
    assert_snapshot!(err, @"InvalidData => invalid family: expected 32 (GK), got 30");

    let err = BufferedDigest::deserialize(&bytes).unwrap_err();
    assert_snapshot!(err, @"InvalidData => invalid family: expected 31 (BUFFERED_DIGEST), got 30");

    let mut bad_version = bytes.clone();
    bad_version[1] = 9;
    let err = Digest::deserialize(&bad_version).unwrap_err();
    assert_snapshot!(err, @"InvalidData => unsupported serial version: expected 1, got 9");

    let mut bad_policy = bytes.clone();
    bad_policy[3] = 7;
    let err = Digest::deserialize(&bad_policy).unwrap_err();
    assert_snapshot!(err, @"InvalidData => malformed data: unknown compression policy 7");
}

#[test]
fn test_oversized_centroid_count() {
    let mut digest = Digest::default();
    digest.insert(1.0);
    let mut bytes = digest.serialize();
    // clusters
    bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
    // number of centroids, without any centroid following it
    bytes[72..76].copy_from_slice(&u32::MAX.to_le_bytes());
    bytes.truncate(76);
    let err = Digest::deserialize(&bytes).unwrap_err();
    assert_snapshot!(err, @"InvalidData => insufficient data: mean");
}

#[test]
fn test_inconsistent_summary() {
    let mut gk = GkSketch::default();
    for value in shuffled(1000, 101) {
        gk.insert(value);
    }
    let mut bytes = gk.serialize();
    // count follows the preamble and eps
    bytes[12..20].copy_from_slice(&1001u64.to_le_bytes());
    let err = GkSketch::deserialize(&bytes).unwrap_err();
    assert_snapshot!(err, @"InvalidData => malformed data: tuples cover 1000 values, expected 1001");

    let mut bytes = gk.serialize();
    // eps
    bytes[4..12].copy_from_slice(&0.75f64.to_le_bytes());
    let err = GkSketch::deserialize(&bytes).unwrap_err();
    assert_snapshot!(err, @"InvalidData => malformed data: invalid eps: must be in (0, 0.5), got 0.75");
}
