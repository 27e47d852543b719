// Copyright (c) 2024 The Gimbal developers
// SPDX-License-Identifier: MIT
// Licensed under the MIT License;
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://spdx.org/licenses/MIT
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Time-series samples published on the bus and served by the metrics
//! service.
//!
//! Field values are kind-tagged so a round trip through the wire format
//! preserves the exact kind, including null values of a known kind.

use std::time::SystemTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Int32,
    Uint64,
    Float64,
    String,
    Bool,
    Time,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            FieldKind::Int32 => "int32",
            FieldKind::Uint64 => "uint64",
            FieldKind::Float64 => "float64",
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::Time => "time",
        };
        f.write_str(text)
    }
}

/// A typed, possibly-null field value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Int32(Option<i32>),
    Uint64(Option<u64>),
    Float64(Option<f64>),
    #[serde(rename = "string")]
    Str(Option<String>),
    Bool(Option<bool>),
    Time(Option<SystemTime>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Int32(_) => FieldKind::Int32,
            FieldValue::Uint64(_) => FieldKind::Uint64,
            FieldValue::Float64(_) => FieldKind::Float64,
            FieldValue::Str(_) => FieldKind::String,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Time(_) => FieldKind::Time,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Int32(v) => v.is_none(),
            FieldValue::Uint64(v) => v.is_none(),
            FieldValue::Float64(v) => v.is_none(),
            FieldValue::Str(v) => v.is_none(),
            FieldValue::Bool(v) => v.is_none(),
            FieldValue::Time(v) => v.is_none(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A named sample: identifying tags plus measured metrics, both ordered.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Measurement {
    pub name: String,
    pub timestamp: SystemTime,
    pub tags: Vec<Field>,
    pub metrics: Vec<Field>,
}

impl Measurement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: SystemTime::now(),
            tags: Vec::new(),
            metrics: Vec::new(),
        }
    }

    pub fn at(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn tag(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.tags.push(Field::new(name, value));
        self
    }

    pub fn metric(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.metrics.push(Field::new(name, value));
        self
    }
}
