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

use crate::error::Error;

/// Defines the families of quantile sketches.
///
/// The family id is the first byte of every serialized sketch, so a byte stream can be checked
/// against the sketch type it is loaded into.
pub struct Family {
    /// The byte ID for this family.
    pub id: u8,
    /// The name for this family.
    pub name: &'static str,
}

impl Family {
    /// T-Digest with nearest-centroid insertion.
    pub const DIGEST: Family = Family {
        id: 30,
        name: "DIGEST",
    };

    /// T-Digest behind an insertion buffer.
    pub const BUFFERED_DIGEST: Family = Family {
        id: 31,
        name: "BUFFERED_DIGEST",
    };

    /// Uniform-error Greenwald-Khanna summary.
    pub const GK: Family = Family {
        id: 32,
        name: "GK",
    };

    /// Biased-error Greenwald-Khanna summary.
    pub const BIASED_GK: Family = Family {
        id: 33,
        name: "BIASED_GK",
    };

    /// Greenwald-Khanna over a count-based sliding window.
    pub const COUNT_WINDOW_GK: Family = Family {
        id: 34,
        name: "COUNT_WINDOW_GK",
    };

    /// Greenwald-Khanna over a time-based sliding window.
    pub const TIME_WINDOW_GK: Family = Family {
        id: 35,
        name: "TIME_WINDOW_GK",
    };
}

impl Family {
    pub fn validate_id(&self, family_id: u8) -> Result<(), Error> {
        if family_id != self.id {
            Err(Error::invalid_family(self.id, family_id, self.name))
        } else {
            Ok(())
        }
    }
}
