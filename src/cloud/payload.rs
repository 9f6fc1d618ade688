//! Path-based field extraction from dbt Cloud JSON payloads.
//!
//! API responses wrap the interesting object in a `data` key and put the
//! outcome of the HTTP call under a sibling `status` key:
//!
//! ```json
//! { "data": { "id": 1, "settings": { "threads": 4 } }, "status": { "code": 200 } }
//! ```
//!
//! A [`Payload`] is created with an optional default prefix (`["data"]`).
//! Regular lookups are resolved below that prefix; the `*_raw` lookups start
//! at the document root, which is how the request status is read.

use serde_json::Value;

use super::error::ParseError;

/// Conversion from a JSON leaf to a Rust value.
pub trait FromField: Sized {
    /// Human name of the expected JSON type, used in error messages.
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromField for u64 {
    const EXPECTED: &'static str = "unsigned integer";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64()
    }
}

impl FromField for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromField for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromField for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FromField for Vec<String> {
    const EXPECTED: &'static str = "list of strings";

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_array()?
            .iter()
            .map(|item| item.as_str().map(str::to_owned))
            .collect()
    }
}

impl FromField for Value {
    const EXPECTED: &'static str = "JSON value";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// A borrowed JSON document with a default lookup prefix.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    root: &'a Value,
    default: &'a [&'a str],
}

impl<'a> Payload<'a> {
    /// Wrap a document with no default prefix.
    pub fn new(root: &'a Value) -> Self {
        Self { root, default: &[] }
    }

    /// Wrap a document whose fields live below `default` (usually `["data"]`).
    pub fn with_default(root: &'a Value, default: &'a [&'a str]) -> Self {
        Self { root, default }
    }

    /// Raw value at `path` below the default prefix.
    pub fn value(&self, path: &[&str]) -> Option<&'a Value> {
        self.lookup(self.default, path)
    }

    /// Raw value at `path` from the document root.
    pub fn value_raw(&self, path: &[&str]) -> Option<&'a Value> {
        self.lookup(&[], path)
    }

    pub fn required<T: FromField>(&self, path: &[&str]) -> Result<T, ParseError> {
        self.extract_required(self.default, path)
    }

    pub fn optional<T: FromField>(&self, path: &[&str]) -> Result<Option<T>, ParseError> {
        self.extract_optional(self.default, path)
    }

    pub fn required_raw<T: FromField>(&self, path: &[&str]) -> Result<T, ParseError> {
        self.extract_required(&[], path)
    }

    pub fn optional_raw<T: FromField>(&self, path: &[&str]) -> Result<Option<T>, ParseError> {
        self.extract_optional(&[], path)
    }

    fn lookup(&self, prefix: &[&str], path: &[&str]) -> Option<&'a Value> {
        prefix
            .iter()
            .chain(path)
            .try_fold(self.root, |node, key| node.get(*key))
    }

    fn extract_required<T: FromField>(
        &self,
        prefix: &[&str],
        path: &[&str],
    ) -> Result<T, ParseError> {
        self.extract_optional(prefix, path)?
            .ok_or_else(|| ParseError::MissingField {
                path: dotted(prefix, path),
            })
    }

    // `null` and a missing key are the same thing to callers.
    fn extract_optional<T: FromField>(
        &self,
        prefix: &[&str],
        path: &[&str],
    ) -> Result<Option<T>, ParseError> {
        match self.lookup(prefix, path) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .ok_or_else(|| ParseError::InvalidType {
                    path: dotted(prefix, path),
                    expected: T::EXPECTED,
                }),
        }
    }
}

fn dotted(prefix: &[&str], path: &[&str]) -> String {
    prefix
        .iter()
        .chain(path)
        .copied()
        .collect::<Vec<_>>()
        .join(".")
}
