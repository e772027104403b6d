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

//! T-Digest implementations for estimating quantiles and ranks.
//!
//! A t-digest summarizes a stream as a sorted sequence of centroids (a mean and a weight). The
//! weight a centroid may hold depends on its position in the rank domain: centroids near the
//! median may grow large, while centroids in the tails stay small. Quantiles are interpolated
//! between neighbouring centroids, so t-digest returns values that were not necessarily seen in
//! the input.
//!
//! Two variants are provided:
//!
//! * [`Digest`] inserts every value into its nearest centroid(s). Ties between centroids at the
//!   same distance are broken by a seeded random generator, and the centroid set is periodically
//!   reclustered by reinserting the centroids in random order. The [`Compression`] policy
//!   controls how often that happens; the number of centroids is bounded regardless of policy.
//! * [`BufferedDigest`] collects values in a buffer and inserts them into a [`Digest`] in
//!   batches. Queries only reflect the flushed part of the stream.
//!
//! Like other t-digests, the error is empirical: there is no hard bound, but accuracy in the
//! tails is very good for common distributions.
//!
//! [`Compression`]: crate::common::Compression

mod buffered;
mod digest;
mod serialization;
mod view;

pub use self::buffered::BufferedDigest;
pub use self::buffered::BufferedDigestConfig;
pub use self::buffered::DEFAULT_BUFFER_LEN;
pub use self::digest::DEFAULT_CLUSTERS;
pub use self::digest::DEFAULT_MIN_EPS;
pub use self::digest::Digest;
pub use self::digest::DigestConfig;
