//! Core Command types for batched portal calls

use serde_json::Value;

use super::params::{Parameters, ResultReference};

/// A single logical remote-procedure invocation inside a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Caller-chosen id, unique within one batch
    pub id: String,
    /// Remote method name (e.g., "lists.element.get", "sale.order.list")
    pub method: String,
    /// Method parameters, possibly holding deferred references
    pub parameters: Parameters,
}

impl Command {
    pub fn new(id: impl Into<String>, method: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            parameters,
        }
    }

    /// Deferred references into sibling commands' results
    pub fn references(&self) -> Vec<&ResultReference> {
        self.parameters.references()
    }

    /// `method?query` form used as a `cmd` entry of the batch endpoint
    pub fn to_query_string(&self) -> String {
        let query = self.parameters.to_query();
        if query.is_empty() {
            self.method.clone()
        } else {
            format!("{}?{}", self.method, query)
        }
    }
}

/// Outcome of one command within a physical call
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    /// Id of the command this result belongs to
    pub command_id: String,
    /// Whether the portal reported success for this command
    pub success: bool,
    /// Raw result payload
    pub data: Option<Value>,
    /// Error message if the command failed
    pub error: Option<String>,
    /// Total record count reported for listing commands
    pub total: Option<usize>,
}

impl CommandResult {
    pub fn success(command_id: impl Into<String>, data: Value, total: Option<usize>) -> Self {
        Self {
            command_id: command_id.into(),
            success: true,
            data: Some(data),
            error: None,
            total,
        }
    }

    pub fn error(command_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            total: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }

    /// Get the result data, returning the error message if the command failed
    pub fn into_result(self) -> Result<Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "Unknown error".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_string() {
        let command = Command::new(
            "cmd_0",
            "sale.order.list",
            Parameters::new().with("start", 50i64),
        );
        assert_eq!(command.to_query_string(), "sale.order.list?start=50");

        let bare = Command::new("cmd_1", "lists.get", Parameters::new());
        assert_eq!(bare.to_query_string(), "lists.get");
    }

    #[test]
    fn test_references() {
        let command = Command::new(
            "cmd_1",
            "sale.order.list",
            Parameters::new().with(
                "filter",
                Parameters::new().with(">id", ResultReference::new("cmd_0").key("orders").index(49).key("id")),
            ),
        );

        let references = command.references();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].expression(), "$result[cmd_0][orders][49][id]");
    }

    #[test]
    fn test_command_result_into_result() {
        let ok = CommandResult::success("cmd_0", json!({"id": 5}), None);
        assert!(ok.is_success());
        assert_eq!(ok.into_result(), Ok(json!({"id": 5})));

        let failed = CommandResult::error("cmd_1", "Not found");
        assert!(failed.is_error());
        assert_eq!(failed.into_result(), Err("Not found".to_string()));
    }
}
