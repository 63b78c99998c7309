//! Size-bounded command batch executed as one physical call

use std::time::Instant;

use super::command::{Command, CommandResult};
use super::params::Parameters;
use crate::api::constants::{COMMAND_ID_PREFIX, MAX_BATCH_COMMANDS};
use crate::api::observer::{BatchObserver, NoopObserver};
use crate::api::transport::BatchTransport;
use crate::error::{BatchError, Result};

/// Ordered collection of commands, sent together by [`CommandBatch::execute`].
///
/// Only grows by `register` and is only emptied by `clear`; callers must clear
/// it before building a new logical group.
#[derive(Debug, Clone)]
pub struct CommandBatch {
    commands: Vec<Command>,
    capacity: usize,
}

impl Default for CommandBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBatch {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BATCH_COMMANDS)
    }

    /// Capacity is clamped to `1..=MAX_BATCH_COMMANDS`
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_BATCH_COMMANDS);
        Self {
            commands: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a command under the next free `cmd_<n>` id
    pub fn register(&mut self, method: impl Into<String>, parameters: Parameters) -> Result<String> {
        let mut n = self.commands.len();
        let mut id = format!("{}{}", COMMAND_ID_PREFIX, n);
        while self.contains(&id) {
            n += 1;
            id = format!("{}{}", COMMAND_ID_PREFIX, n);
        }
        self.register_with_id(id, method, parameters)
    }

    /// Append a command under a caller-chosen id.
    ///
    /// References may only point at commands registered earlier in this batch.
    pub fn register_with_id(
        &mut self,
        id: impl Into<String>,
        method: impl Into<String>,
        parameters: Parameters,
    ) -> Result<String> {
        if self.commands.len() >= self.capacity {
            return Err(BatchError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let id = id.into();
        if id.is_empty() {
            return Err(BatchError::invalid_argument(
                self.commands.len(),
                "command id must not be empty",
            ));
        }
        if self.contains(&id) {
            return Err(BatchError::invalid_argument(&id, "duplicate command id"));
        }
        for reference in parameters.references() {
            if !self.contains(&reference.command_id) {
                return Err(BatchError::invalid_argument(
                    &id,
                    format!(
                        "reference {} points at a command not registered before it",
                        reference
                    ),
                ));
            }
        }

        self.commands.push(Command::new(id.clone(), method, parameters));
        Ok(id)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.commands.len()
    }

    fn contains(&self, id: &str) -> bool {
        self.commands.iter().any(|c| c.id == id)
    }

    /// Send every registered command as one physical call
    pub async fn execute(&self, transport: &dyn BatchTransport) -> Result<BatchResult> {
        self.execute_observed(transport, &NoopObserver).await
    }

    pub async fn execute_observed(
        &self,
        transport: &dyn BatchTransport,
        observer: &dyn BatchObserver,
    ) -> Result<BatchResult> {
        if self.commands.is_empty() {
            return Ok(BatchResult::default());
        }

        let method = self.commands[0].method.as_str();
        observer.batch_started(method, self.commands.len());
        let started = Instant::now();

        let result = transport
            .execute_batch(&self.commands)
            .await
            .map_err(|e| BatchError::execution("batch execution failed", e))
            .and_then(|result| result.aligned_to(&self.commands));

        match &result {
            Ok(result) => observer.batch_finished(method, result.len(), started.elapsed()),
            Err(error) => observer.failed("execute", error),
        }
        result
    }
}

/// Per-command results of one physical call, in submission order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    results: Vec<CommandResult>,
}

impl BatchResult {
    pub fn new(results: Vec<CommandResult>) -> Self {
        Self { results }
    }

    pub fn get(&self, command_id: &str) -> Option<&CommandResult> {
        self.results.iter().find(|r| r.command_id == command_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Reorder to match `commands`, requiring exactly one result per command
    fn aligned_to(mut self, commands: &[Command]) -> Result<Self> {
        if self.results.len() != commands.len() {
            return Err(BatchError::UnexpectedResponse(format!(
                "{} results for {} commands",
                self.results.len(),
                commands.len()
            )));
        }

        let in_order = self
            .results
            .iter()
            .zip(commands)
            .all(|(r, c)| r.command_id == c.id);
        if in_order {
            return Ok(self);
        }

        let mut ordered = Vec::with_capacity(commands.len());
        for command in commands {
            let position = self
                .results
                .iter()
                .position(|r| r.command_id == command.id)
                .ok_or_else(|| {
                    BatchError::UnexpectedResponse(format!("no result for command {}", command.id))
                })?;
            ordered.push(self.results.swap_remove(position));
        }
        Ok(Self { results: ordered })
    }
}

impl IntoIterator for BatchResult {
    type Item = CommandResult;
    type IntoIter = std::vec::IntoIter<CommandResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
