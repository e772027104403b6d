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

//! Binary encoding shared by all sketches.

mod decode;
mod encode;
pub mod family;

pub(crate) use self::decode::SketchReader;
pub(crate) use self::decode::check_finite;
pub(crate) use self::decode::check_nonzero;
pub(crate) use self::decode::make_error;
pub(crate) use self::decode::read_len;
pub(crate) use self::decode::read_preamble;
pub(crate) use self::encode::SketchBytes;
