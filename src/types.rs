use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A single SQL value as exchanged with a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            // NaN and infinities have no JSON form
            Value::Real(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Blob(b) => serde_json::Value::from(b.clone()),
        }
    }

    /// Convert a JSON value into a bindable SQL value.
    ///
    /// Booleans become 0/1, arrays and objects are stored as their JSON text.
    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Integer(b as i64),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(v as i64)
            }
        })*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One result row. Column names are shared with the rest of the result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// The row as a JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    /// Scan the row into `T`.
    ///
    /// Structs and maps are filled by column name. Failing that, a single
    /// column row decodes as a scalar and a wider row as a tuple/sequence.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let by_name = match serde_json::from_value(self.to_json()) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let positional = match self.values.as_slice() {
            [only] => serde_json::from_value(only.to_json()),
            values => serde_json::from_value(serde_json::Value::Array(
                values.iter().map(Value::to_json).collect(),
            )),
        };
        positional.map_err(|_| Error::Decode(by_name))
    }
}

/// A fully materialized result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Rows {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl Rows {
    pub fn new(columns: Arc<[String]>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self { columns: Arc::from(Vec::new()), rows: Vec::new() }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    pub fn decode_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows.iter().map(Row::decode).collect()
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Rows {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Result of a single-row query. Errors surface when the row is scanned.
#[derive(Debug)]
pub struct QueryRow {
    result: Result<Option<Row>>,
}

impl QueryRow {
    pub fn new(result: Result<Option<Row>>) -> Self {
        Self { result }
    }

    /// The deferred query error, if the query itself failed.
    pub fn err(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }

    /// The row, or [`Error::NoRows`] when the query matched nothing.
    pub fn into_row(self) -> Result<Row> {
        self.result?.ok_or(Error::NoRows)
    }

    pub fn scan<T: DeserializeOwned>(self) -> Result<T> {
        self.into_row()?.decode()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// Values bound to named placeholders (`:name`, `@name` or `$name`).
///
/// Names are stored without their sigil.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedArgs {
    args: Vec<(String, Value)>,
}

impl NamedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any struct or map: each field becomes a parameter.
    pub fn from_serialize<T: Serialize + ?Sized>(arg: &T) -> Result<Self> {
        match serde_json::to_value(arg)? {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(name, value)| (name, Value::from_json(value)))
                .collect()),
            other => Err(Error::InvalidArgument(format!(
                "named arguments must serialize to a map or struct, got {other}"
            ))),
        }
    }

    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a parameter, replacing any previous value under the same name.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<Value>) {
        let name = strip_sigil(name.as_ref()).to_string();
        let value = value.into();
        match self.args.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.args.push((name, value)),
        }
    }

    /// Look a parameter up by name, with or without its sigil.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let name = strip_sigil(name);
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.args.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for NamedArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = NamedArgs::new();
        for (name, value) in iter {
            args.insert(name, value);
        }
        args
    }
}

fn strip_sigil(name: &str) -> &str {
    name.strip_prefix([':', '@', '$']).unwrap_or(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TxOptions {
    pub fn read_only() -> Self {
        Self { isolation: None, read_only: true }
    }

    pub fn with_isolation(isolation: IsolationLevel) -> Self {
        Self { isolation: Some(isolation), read_only: false }
    }
}
