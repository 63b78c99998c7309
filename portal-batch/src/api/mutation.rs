//! Batched add / update / delete
//!
//! Every item is validated before anything is registered, so a malformed item
//! fails the whole call without any network traffic. Per-item remote failures
//! come back as ordinary unsuccessful [`CommandResult`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::observer::BatchObserver;
use super::operations::{CommandBatch, CommandResult, ParamValue, Parameters};
use super::transport::BatchTransport;
use crate::error::{BatchError, Result};

/// Caller-side key of a mutation item, echoed back with its result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    /// Position in an input array
    Position(usize),
    /// Integer key of an update map
    Id(i64),
    /// Non-numeric key of an update map
    Code(String),
}

impl ItemKey {
    /// Map keys that look like integers become `Id`
    pub fn from_map_key(key: &str) -> Self {
        match key.parse::<i64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Code(key.to_string()),
        }
    }

    fn to_param(&self) -> Value {
        match self {
            Self::Position(n) => Value::from(*n),
            Self::Id(id) => Value::from(*id),
            Self::Code(code) => Value::from(code.clone()),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(n) => write!(f, "{}", n),
            Self::Id(id) => write!(f, "{}", id),
            Self::Code(code) => write!(f, "{}", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// What to do with more items than one batch can carry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationChunking {
    /// Fail with `CapacityExceeded` before any call; the caller splits the work
    #[default]
    Reject,
    /// Validate everything, then send one physical call per `capacity` items
    Sequential,
}

impl std::str::FromStr for MutationChunking {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!("unknown mutation chunking «{}»", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRule {
    /// Key every record must carry (`FIELDS` / `fields`); `None` accepts any record
    pub payload_key: Option<String>,
}

/// How an update item and its map key become command parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateShape {
    /// Record passes through with the map key set as `target_param`
    InjectKey,
    /// Rebuilt as `{target_param: key, fields: payload}` plus the record's other keys
    IdAndFields,
    /// Record passes through unchanged; it names its own target
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRule {
    pub payload_key: Option<String>,
    /// Parameter naming the record being changed (`IBLOCK_ID`, `id`, `ELEMENT_ID`)
    pub target_param: String,
    pub shape: UpdateShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRule {
    /// Items are bare integer ids, sent as `{param: id}`
    ScalarId { param: String },
    /// Items are records carrying every `required` key, sent unchanged
    Record { required: Vec<String> },
    /// Items are records carrying every `required` key; only the `required`
    /// and present `optional` keys are sent
    Projected {
        required: Vec<String>,
        optional: Vec<String>,
    },
}

/// Per-resource parameter shapes of the mutation methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRules {
    pub add: AddRule,
    pub update: UpdateRule,
    pub delete: DeleteRule,
}

impl MutationRules {
    /// `fields`-style resources: add with `fields`, update as `{id, fields}`,
    /// delete by bare integer id
    pub fn id_and_fields(payload_key: Option<&str>) -> Self {
        Self {
            add: AddRule {
                payload_key: payload_key.map(str::to_string),
            },
            update: UpdateRule {
                payload_key: payload_key.map(str::to_string),
                target_param: "id".to_string(),
                shape: UpdateShape::IdAndFields,
            },
            delete: DeleteRule::ScalarId {
                param: "id".to_string(),
            },
        }
    }
}

pub fn prepare_add(rule: &AddRule, items: Vec<Value>) -> Result<Vec<(ItemKey, Parameters)>> {
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            let key = ItemKey::Position(position);
            let record = record_of(&key, item)?;
            require_payload(&key, &record, rule.payload_key.as_deref())?;
            Ok((key, record))
        })
        .collect()
}

pub fn prepare_update(
    rule: &UpdateRule,
    items: Vec<(ItemKey, Value)>,
) -> Result<Vec<(ItemKey, Parameters)>> {
    items
        .into_iter()
        .map(|(key, item)| {
            let record = record_of(&key, item)?;
            require_payload(&key, &record, rule.payload_key.as_deref())?;
            let params = match rule.shape {
                UpdateShape::PassThrough => record,
                UpdateShape::InjectKey => record.with(rule.target_param.clone(), key.to_param()),
                UpdateShape::IdAndFields => id_and_fields(rule, &key, record)?,
            };
            Ok((key, params))
        })
        .collect()
}

fn id_and_fields(rule: &UpdateRule, key: &ItemKey, mut record: Parameters) -> Result<Parameters> {
    let ItemKey::Id(id) = key else {
        return Err(BatchError::invalid_argument(
            key,
            format!("item key «{}» must be an integer id", key),
        ));
    };

    let fields: ParamValue = match &rule.payload_key {
        Some(payload_key) => record
            .remove(payload_key)
            .unwrap_or_else(|| Parameters::new().into()),
        None => std::mem::take(&mut record).into(),
    };

    let mut params = Parameters::new()
        .with(rule.target_param.clone(), *id)
        .with("fields", fields);
    params.merge(&record);
    Ok(params)
}

pub fn prepare_delete(rule: &DeleteRule, items: Vec<Value>) -> Result<Vec<(ItemKey, Parameters)>> {
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            let key = ItemKey::Position(position);
            let params = match rule {
                DeleteRule::ScalarId { param } => {
                    let id = item.as_i64().ok_or_else(|| {
                        BatchError::invalid_argument(
                            &key,
                            format!("invalid id «{}» at position {}, id must be an integer", item, position),
                        )
                    })?;
                    Parameters::new().with(param.clone(), id)
                }
                DeleteRule::Record { required } => {
                    let record = record_of(&key, item)?;
                    require_keys(&key, &record, required)?;
                    record
                }
                DeleteRule::Projected { required, optional } => {
                    let record = record_of(&key, item)?;
                    require_keys(&key, &record, required)?;
                    required
                        .iter()
                        .chain(optional)
                        .filter_map(|name| Some((name.clone(), record.get(name)?.clone())))
                        .collect()
                }
            };
            Ok((key, params))
        })
        .collect()
}

fn require_keys(key: &ItemKey, record: &Parameters, required: &[String]) -> Result<()> {
    match required.iter().find(|name| !record.contains_key(name)) {
        Some(name) => Err(BatchError::invalid_argument(
            key,
            format!("array key «{}» not found in item {}", name, key),
        )),
        None => Ok(()),
    }
}

fn record_of(key: &ItemKey, item: Value) -> Result<Parameters> {
    Parameters::from_json(item)
        .ok_or_else(|| BatchError::invalid_argument(key, format!("item {} must be a record", key)))
}

fn require_payload(key: &ItemKey, record: &Parameters, payload_key: Option<&str>) -> Result<()> {
    match payload_key {
        Some(name) if !record.contains_key(name) => Err(BatchError::invalid_argument(
            key,
            format!("array key «{}» not found in item {}", name, key),
        )),
        _ => Ok(()),
    }
}

/// `(key, result)` pairs in input order
#[derive(Debug, Default)]
pub struct MutationResults {
    entries: std::vec::IntoIter<(ItemKey, CommandResult)>,
}

impl MutationResults {
    fn new(entries: Vec<(ItemKey, CommandResult)>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl Iterator for MutationResults {
    type Item = (ItemKey, CommandResult);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for MutationResults {}

/// Registers and executes prepared mutation commands
pub struct MutationBatch<'a> {
    transport: &'a dyn BatchTransport,
    observer: &'a dyn BatchObserver,
    capacity: usize,
    chunking: MutationChunking,
}

impl<'a> MutationBatch<'a> {
    pub fn new(
        transport: &'a dyn BatchTransport,
        observer: &'a dyn BatchObserver,
        capacity: usize,
        chunking: MutationChunking,
    ) -> Self {
        Self {
            transport,
            observer,
            capacity,
            chunking,
        }
    }

    pub async fn add_items(
        &self,
        method: &str,
        rule: &AddRule,
        items: Vec<Value>,
    ) -> Result<MutationResults> {
        self.run(MutationKind::Add, method, items.len(), || prepare_add(rule, items))
            .await
    }

    pub async fn update_items(
        &self,
        method: &str,
        rule: &UpdateRule,
        items: Vec<(ItemKey, Value)>,
    ) -> Result<MutationResults> {
        self.run(MutationKind::Update, method, items.len(), || {
            prepare_update(rule, items)
        })
        .await
    }

    pub async fn delete_items(
        &self,
        method: &str,
        rule: &DeleteRule,
        items: Vec<Value>,
    ) -> Result<MutationResults> {
        self.run(MutationKind::Delete, method, items.len(), || {
            prepare_delete(rule, items)
        })
        .await
    }

    async fn run(
        &self,
        kind: MutationKind,
        method: &str,
        count: usize,
        prepare: impl FnOnce() -> Result<Vec<(ItemKey, Parameters)>>,
    ) -> Result<MutationResults> {
        self.observer.mutation_started(kind, method, count);
        let stage = format!("{}EntityItems", kind);

        let outcome = match prepare() {
            Ok(prepared) => self.send(method, prepared).await,
            Err(error) => Err(error),
        };

        match outcome {
            Ok(entries) => {
                self.observer.mutation_finished(kind, method, entries.len());
                Ok(MutationResults::new(entries))
            }
            Err(error) => {
                self.observer.failed(&stage, &error);
                Err(error)
            }
        }
    }

    async fn send(
        &self,
        method: &str,
        prepared: Vec<(ItemKey, Parameters)>,
    ) -> Result<Vec<(ItemKey, CommandResult)>> {
        let mut batch = CommandBatch::with_capacity(self.capacity);
        let chunk_size = match self.chunking {
            MutationChunking::Reject => {
                if prepared.len() > batch.capacity() {
                    return Err(BatchError::CapacityExceeded {
                        capacity: batch.capacity(),
                    });
                }
                batch.capacity()
            }
            MutationChunking::Sequential => batch.capacity(),
        };

        let mut entries = Vec::with_capacity(prepared.len());
        let mut pending = prepared.into_iter().peekable();
        while pending.peek().is_some() {
            batch.clear();
            let mut keys = Vec::with_capacity(chunk_size);
            for (key, params) in pending.by_ref().take(chunk_size) {
                batch.register(method, params)?;
                keys.push(key);
            }

            let results = match batch.execute_observed(self.transport, self.observer).await {
                Ok(results) => results,
                Err(error) if !entries.is_empty() => {
                    return Err(BatchError::PartiallyApplied {
                        applied: entries,
                        source: Box::new(error),
                    });
                }
                Err(error) => return Err(error),
            };
            entries.extend(keys.into_iter().zip(results));
        }
        Ok(entries)
    }
}
