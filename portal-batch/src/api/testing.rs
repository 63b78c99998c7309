//! In-process portal for tests
//!
//! [`FakePortal`] serves one resource from memory. It pages like the real
//! portal (offset or id filter), resolves `$result[...]` references between
//! commands of one batch, applies mutations and records every physical call.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

use super::mutation::DeleteRule;
use super::operations::{BatchResult, Command, CommandResult, ParamValue, Parameters, PathSegment};
use super::pagination::id_based::item_id;
use super::resources::Resource;
use super::strategy::{PaginationMode, PayloadLocation};
use super::transport::{ApiResponse, BatchTransport};

type Outcome = std::result::Result<(Value, Option<usize>), String>;

#[derive(Debug, Default)]
struct State {
    records: Vec<Value>,
    next_id: i64,
    reported_total: Option<usize>,
    physical_calls: usize,
    single_calls: usize,
    batch_sizes: Vec<usize>,
    requested_starts: Vec<usize>,
    boundary_filters: Vec<Option<Value>>,
    /// Calls still allowed to succeed, then the message to fail with
    fail_next: Option<(usize, String)>,
    rejected: HashMap<String, String>,
}

pub struct FakePortal {
    resource: Resource,
    state: Mutex<State>,
}

impl FakePortal {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    /// Seed `count` records with ids `1..=count`; `make` supplies the other fields
    pub fn with_records(self, count: usize, make: impl Fn(usize) -> Value) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for n in 1..=count {
                let fields = make(n);
                let id = state.next_id;
                state.next_id += 1;
                let record = self.new_record(id, fields.as_object().cloned().unwrap_or_default());
                state.records.push(record);
            }
        }
        self
    }

    /// Report a `total` that differs from what is actually stored
    pub fn with_reported_total(self, total: usize) -> Self {
        self.state.lock().unwrap().reported_total = Some(total);
        self
    }

    /// The next physical call fails at transport level
    pub fn fail_next_call(&self, message: &str) {
        self.fail_call_after(0, message);
    }

    /// Let `calls` physical calls through, then fail the next one
    pub fn fail_call_after(&self, calls: usize, message: &str) {
        self.state.lock().unwrap().fail_next = Some((calls, message.to_string()));
    }

    /// Every command for `method` comes back as a per-command error
    pub fn reject_method(&self, method: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected
            .insert(method.to_string(), message.to_string());
    }

    pub fn records(&self) -> Vec<Value> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn physical_calls(&self) -> usize {
        self.state.lock().unwrap().physical_calls
    }

    pub fn single_calls(&self) -> usize {
        self.state.lock().unwrap().single_calls
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().batch_sizes.clone()
    }

    /// `start` of every listing command that carried one
    pub fn requested_starts(&self) -> Vec<usize> {
        self.state.lock().unwrap().requested_starts.clone()
    }

    /// Resolved `>key` / `<key` filter of every listing command
    pub fn boundary_filters(&self) -> Vec<Option<Value>> {
        self.state.lock().unwrap().boundary_filters.clone()
    }

    fn new_record(&self, id: i64, mut fields: Map<String, Value>) -> Value {
        let strategy = &self.resource.strategy;
        // The lists module sends ids as strings
        let id = match strategy.pagination() {
            PaginationMode::Offset => Value::String(id.to_string()),
            PaginationMode::IdBased => Value::from(id),
        };
        fields.insert(strategy.key_id_field().to_string(), id);
        Value::Object(fields)
    }

    fn handle(&self, state: &mut State, method: &str, params: &Value) -> Outcome {
        if let Some(message) = state.rejected.get(method) {
            return Err(message.clone());
        }
        let resource = &self.resource;
        if method == resource.list_method {
            Ok(self.list(state, params))
        } else if method == resource.add_method {
            self.add(state, params)
        } else if method == resource.update_method {
            self.update(state, params)
        } else if method == resource.delete_method {
            self.delete(state, params)
        } else {
            Err(format!("Method not found: {}", method))
        }
    }

    fn list(&self, state: &mut State, params: &Value) -> (Value, Option<usize>) {
        let strategy = &self.resource.strategy;
        let names = strategy.param_names();
        let key = strategy.key_id_field();
        let filter = params.get(&names.filter).and_then(Value::as_object);

        let boundary = filter.and_then(|f| {
            f.get(&format!(">{}", key))
                .or_else(|| f.get(&format!("<{}", key)))
                .cloned()
        });
        state.boundary_filters.push(boundary);

        let mut rows: Vec<&Value> = state
            .records
            .iter()
            .filter(|record| filter.is_none_or(|f| matches_filter(record, f)))
            .collect();
        let descending = params
            .get(&names.order)
            .and_then(|order| order.get(key))
            .and_then(Value::as_str)
            .is_some_and(|direction| direction.eq_ignore_ascii_case("desc"));
        if descending {
            rows.reverse();
        }

        let start = params.get(&names.start).and_then(number).map(|n| n as usize);
        if let Some(start) = start {
            state.requested_starts.push(start);
        }
        let total = state.reported_total.unwrap_or(rows.len());
        let select: Vec<&str> = params
            .get(&names.select)
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let page: Vec<Value> = rows
            .into_iter()
            .skip(start.unwrap_or(0))
            .take(strategy.page_size())
            .map(|record| project(record, &select))
            .collect();

        let result = match strategy.payload() {
            PayloadLocation::Root => Value::Array(page),
            PayloadLocation::Key(payload_key) => {
                let mut wrapped = Map::new();
                wrapped.insert(payload_key.clone(), Value::Array(page));
                Value::Object(wrapped)
            }
        };
        (result, Some(total))
    }

    fn add(&self, state: &mut State, params: &Value) -> Outcome {
        let fields = match &self.resource.mutations.add.payload_key {
            Some(payload_key) => params.get(payload_key),
            None => Some(params),
        }
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| "Required fields are missing".to_string())?;

        let id = state.next_id;
        state.next_id += 1;
        let record = self.new_record(id, fields);
        state.records.push(record);
        Ok((Value::from(id), None))
    }

    fn update(&self, state: &mut State, params: &Value) -> Outcome {
        let rule = &self.resource.mutations.update;
        let position = self.find(state, params.get(&rule.target_param))?;

        let fields = params
            .get("fields")
            .or_else(|| rule.payload_key.as_ref().and_then(|k| params.get(k)))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        if let Some(record) = state.records[position].as_object_mut() {
            for (name, value) in fields {
                record.insert(name, value);
            }
        }
        Ok((Value::Bool(true), None))
    }

    fn delete(&self, state: &mut State, params: &Value) -> Outcome {
        let mutations = &self.resource.mutations;
        let target = match &mutations.delete {
            DeleteRule::ScalarId { param } => params.get(param),
            DeleteRule::Record { .. } | DeleteRule::Projected { .. } => {
                params.get(&mutations.update.target_param)
            }
        };
        let position = self.find(state, target)?;
        state.records.remove(position);
        Ok((Value::Bool(true), None))
    }

    fn find(&self, state: &State, target: Option<&Value>) -> std::result::Result<usize, String> {
        let key = self.resource.strategy.key_id_field();
        let wanted = target
            .and_then(number)
            .ok_or_else(|| "Target id is missing".to_string())?;
        state
            .records
            .iter()
            .position(|record| item_id(record, key).ok() == Some(wanted))
            .ok_or_else(|| "Not found".to_string())
    }

    fn take_failure(state: &mut State) -> anyhow::Result<()> {
        match state.fail_next.take() {
            Some((0, message)) => Err(anyhow!(message)),
            Some((calls, message)) => {
                state.fail_next = Some((calls - 1, message));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BatchTransport for FakePortal {
    async fn call(&self, method: &str, parameters: &Parameters) -> anyhow::Result<ApiResponse> {
        let mut state = self.state.lock().unwrap();
        state.physical_calls += 1;
        state.single_calls += 1;
        Self::take_failure(&mut state)?;

        let params = resolve_map(parameters, &HashMap::new()).map_err(|e| anyhow!(e))?;
        let (result, total) = self.handle(&mut state, method, &params).map_err(|e| anyhow!(e))?;
        let next = total.and_then(|total| {
            let start = parameters
                .get(&self.resource.strategy.param_names().start)
                .map(ParamValue::to_json)
                .and_then(|v| number(&v))
                .unwrap_or(0) as usize;
            let end = start + self.resource.strategy.extract_items(&result).len();
            (end < total).then_some(end)
        });
        Ok(ApiResponse { result, total, next })
    }

    async fn execute_batch(&self, commands: &[Command]) -> anyhow::Result<BatchResult> {
        let mut state = self.state.lock().unwrap();
        state.physical_calls += 1;
        state.batch_sizes.push(commands.len());
        Self::take_failure(&mut state)?;

        let mut resolved: HashMap<String, Value> = HashMap::new();
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let outcome = resolve_map(&command.parameters, &resolved)
                .and_then(|params| self.handle(&mut state, &command.method, &params));
            match outcome {
                Ok((result, total)) => {
                    resolved.insert(command.id.clone(), result.clone());
                    results.push(CommandResult::success(command.id.clone(), result, total));
                }
                Err(message) => results.push(CommandResult::error(command.id.clone(), message)),
            }
        }
        Ok(BatchResult::new(results))
    }
}

fn resolve_map(params: &Parameters, results: &HashMap<String, Value>) -> std::result::Result<Value, String> {
    let mut out = Map::new();
    for (key, value) in params {
        out.insert(key.clone(), resolve_value(value, results)?);
    }
    Ok(Value::Object(out))
}

fn resolve_value(value: &ParamValue, results: &HashMap<String, Value>) -> std::result::Result<Value, String> {
    match value {
        ParamValue::Value(json) => Ok(json.clone()),
        ParamValue::Map(map) => resolve_map(map, results),
        ParamValue::Reference(reference) => {
            let mut current = results.get(&reference.command_id);
            for segment in &reference.path {
                current = current.and_then(|v| match segment {
                    PathSegment::Key(key) => v.get(key),
                    PathSegment::Index(index) => v.get(*index),
                });
            }
            current
                .cloned()
                .ok_or_else(|| format!("Unable to resolve {}", reference))
        }
    }
}

// Only selected fields come back, unless nothing or `*` is selected
fn project(record: &Value, select: &[&str]) -> Value {
    if select.is_empty() || select.contains(&"*") {
        return record.clone();
    }
    let Some(fields) = record.as_object() else {
        return record.clone();
    };
    Value::Object(
        select
            .iter()
            .filter_map(|name| Some((name.to_string(), fields.get(*name)?.clone())))
            .collect(),
    )
}

fn matches_filter(record: &Value, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| {
        if let Some(field) = key.strip_prefix('>') {
            compare(record.get(field), expected).is_some_and(|o| o.is_gt())
        } else if let Some(field) = key.strip_prefix('<') {
            compare(record.get(field), expected).is_some_and(|o| o.is_lt())
        } else {
            record.get(key).map(scalar) == Some(scalar(expected))
        }
    })
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    let actual = number(actual?)?;
    let expected = number(expected)?;
    Some(actual.cmp(&expected))
}

fn number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::operations::ResultReference;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolves_references_between_commands() {
        let portal = FakePortal::new(Resource::sale_orders()).with_records(120, |_| json!({}));
        let commands = vec![
            Command::new("first", "sale.order.list", Parameters::new()),
            Command::new(
                "second",
                "sale.order.list",
                Parameters::new().with(
                    "filter",
                    Parameters::new().with(">id", ResultReference::new("first").key("orders").index(49).key("id")),
                ),
            ),
        ];

        let results: Vec<_> = portal.execute_batch(&commands).await.unwrap().into_iter().collect();

        assert_eq!(results[1].data.as_ref().unwrap()["orders"][0]["id"], json!(51));
        assert_eq!(portal.boundary_filters(), vec![None, Some(json!(50))]);
    }

    #[tokio::test]
    async fn test_unresolvable_reference_is_command_error() {
        let portal = FakePortal::new(Resource::epics());
        let commands = vec![
            Command::new("a", "tasks.api.scrum.epic.list", Parameters::new()),
            Command::new(
                "b",
                "tasks.api.scrum.epic.list",
                Parameters::new().with(
                    "filter",
                    Parameters::new().with(">id", ResultReference::new("a").index(49).key("id")),
                ),
            ),
        ];

        let results: Vec<_> = portal.execute_batch(&commands).await.unwrap().into_iter().collect();

        assert!(results[0].is_success());
        assert!(results[1].is_error());
    }

    #[tokio::test]
    async fn test_offset_call_reports_next() {
        let portal = FakePortal::new(Resource::lists()).with_records(60, |_| json!({}));

        let response = portal.call("lists.get", &Parameters::new().with("start", 0usize)).await.unwrap();

        assert_eq!(response.total, Some(60));
        assert_eq!(response.next, Some(50));
        assert_eq!(response.result[0]["ID"], json!("1"));
    }
}
