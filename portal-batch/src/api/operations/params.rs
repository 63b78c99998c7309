//! Ordered command parameters with deferred result references

use serde_json::Value;
use std::fmt;

/// One step of a path into a previous command's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Points at a value inside the result of an earlier command in the same batch.
///
/// The portal substitutes it server-side while executing the batch; the client
/// never resolves it, it only renders it as `$result[cmd_0][orders][49][id]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultReference {
    pub command_id: String,
    pub path: Vec<PathSegment>,
}

impl ResultReference {
    pub fn new(command_id: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            path: Vec::new(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.path.push(PathSegment::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.path.push(PathSegment::Index(index));
        self
    }

    /// Render the portal's reference expression
    pub fn expression(&self) -> String {
        let mut out = format!("$result[{}]", self.command_id);
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => out.push_str(&format!("[{}]", key)),
                PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
            }
        }
        out
    }
}

impl fmt::Display for ResultReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression())
    }
}

/// A parameter value: plain JSON, a nested map, or a deferred reference
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Value(Value),
    Map(Parameters),
    Reference(ResultReference),
}

impl ParamValue {
    pub fn as_map(&self) -> Option<&Parameters> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// JSON form with references rendered as expression strings
    pub fn to_json(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Map(map) => map.to_json(),
            Self::Reference(reference) => Value::String(reference.expression()),
        }
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a ResultReference>) {
        match self {
            Self::Value(_) => {}
            Self::Map(map) => {
                for (_, value) in map.iter() {
                    value.collect_references(out);
                }
            }
            Self::Reference(reference) => out.push(reference),
        }
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Map(Parameters::from_json_object(map)),
            other => Self::Value(other),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<ResultReference> for ParamValue {
    fn from(reference: ResultReference) -> Self {
        Self::Reference(reference)
    }
}

impl From<Parameters> for ParamValue {
    fn from(map: Parameters) -> Self {
        Self::Map(map)
    }
}

/// Insertion-ordered parameter map. Re-inserting a key replaces it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<(String, ParamValue)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Option<ParamValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(position).1)
    }

    /// Copy every entry of `other` over this map
    pub fn merge(&mut self, other: &Parameters) {
        for (key, value) in other.iter() {
            self.insert(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ParamValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn from_json_object(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter()
            .map(|(k, v)| (k, ParamValue::from(v)))
            .collect()
    }

    /// Build from a JSON object; anything else yields `None`
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_json_object(map)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Value::Object(map)
    }

    /// All deferred references, depth first in insertion order
    pub fn references(&self) -> Vec<&ResultReference> {
        let mut out = Vec::new();
        for (_, value) in &self.entries {
            value.collect_references(&mut out);
        }
        out
    }

    /// PHP-style bracketed form encoding (`filter[>ID]=5&select[0]=ID`), as
    /// the batch endpoint expects inside each `cmd` entry. Nulls are skipped.
    pub fn to_query(&self) -> String {
        let mut pairs = Vec::new();
        for (key, value) in &self.entries {
            encode_param(key, value, &mut pairs);
        }
        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(&k), urlencoding::encode(&v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl FromIterator<(String, ParamValue)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a (String, ParamValue);
    type IntoIter = std::slice::Iter<'a, (String, ParamValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn encode_param(prefix: &str, value: &ParamValue, out: &mut Vec<(String, String)>) {
    match value {
        ParamValue::Value(json) => encode_json(prefix, json, out),
        ParamValue::Map(map) => {
            for (key, nested) in map.iter() {
                encode_param(&format!("{}[{}]", prefix, key), nested, out);
            }
        }
        ParamValue::Reference(reference) => out.push((prefix.to_string(), reference.expression())),
    }
}

fn encode_json(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push((prefix.to_string(), if *b { "1" } else { "0" }.to_string())),
        Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                encode_json(&format!("{}[{}]", prefix, index), item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                encode_json(&format!("{}[{}]", prefix, key), item, out);
            }
        }
    }
}
