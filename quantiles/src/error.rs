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

//! Errors returned by sketch construction and deserialization.
//!
//! Query methods never fail: querying an empty sketch returns `None`, and out-of-range ranks are
//! caller bugs that panic.

use std::fmt;

/// The category of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A sketch configuration is out of range.
    InvalidArgument,
    /// Serialized bytes are truncated, belong to another sketch family, or describe an
    /// inconsistent summary.
    InvalidData,
}

impl ErrorKind {
    /// Returns the name of this kind.
    pub const fn into_static(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::InvalidData => "InvalidData",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.into_static())
    }
}

/// The error returned by fallible sketch functions.
///
/// Besides its [`ErrorKind`] and message, an error may carry key/value context describing
/// where it happened.
///
/// # Examples
///
/// ```
/// # use quantiles::gk::{GkConfig, GkSketch};
/// # use quantiles::error::ErrorKind;
/// let err = GkSketch::try_new(GkConfig {
///     eps: 0.7,
///     ..Default::default()
/// })
/// .unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::InvalidArgument);
/// assert_eq!(err.message(), "invalid eps: must be in (0, 0.5), got 0.7");
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
}

impl Error {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Attaches a key/value pair to the error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message of this error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the context attached with [`with_context`](Self::with_context).
    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, msg)
    }

    /// A configuration field that failed validation.
    pub(crate) fn invalid_config(field: &'static str, msg: impl fmt::Display) -> Self {
        Error::invalid_argument(format!("invalid {field}: {msg}"))
    }

    /// The input ended before `field` could be read.
    pub(crate) fn insufficient_data(field: &'static str) -> Self {
        Error::new(ErrorKind::InvalidData, format!("insufficient data: {field}"))
    }

    /// The input was read completely but does not describe a valid sketch.
    pub(crate) fn malformed(msg: impl fmt::Display) -> Self {
        Error::new(ErrorKind::InvalidData, format!("malformed data: {msg}"))
    }

    pub(crate) fn invalid_family(expected: u8, actual: u8, name: &'static str) -> Self {
        Error::new(
            ErrorKind::InvalidData,
            format!("invalid family: expected {expected} ({name}), got {actual}"),
        )
    }

    pub(crate) fn unsupported_serial_version(expected: u8, actual: u8) -> Self {
        Error::new(
            ErrorKind::InvalidData,
            format!("unsupported serial version: expected {expected}, got {actual}"),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for (i, (key, value)) in self.context.iter().enumerate() {
            let sep = if i == 0 { ", context: { " } else { ", " };
            write!(f, "{sep}{key}: {value}")?;
        }
        if !self.context.is_empty() {
            f.write_str(" }")?;
        }
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f
                .debug_struct("Error")
                .field("kind", &self.kind)
                .field("message", &self.message)
                .field("context", &self.context)
                .finish();
        }
        fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}
