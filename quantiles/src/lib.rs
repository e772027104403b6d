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

//! # Streaming Quantile Sketches
//!
//! This library provides summaries that answer approximate quantile queries over a stream of
//! `f64` values in bounded memory:
//!
//! * [`tdigest`]: T-Digests, accurate in the tails, with an optional insertion buffer.
//! * [`gk`]: Greenwald-Khanna summaries with a uniform rank error, or with an error relative to
//!   the distance from one end of the distribution.
//! * [`window`]: Greenwald-Khanna summaries over the most recent values, bounded by count or by
//!   time.
//!
//! All sketches can be serialized to bytes and loaded back, and ignore NaN and infinite values.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

mod codec;
pub mod common;
pub mod error;
pub mod gk;
pub mod tdigest;
pub mod window;
