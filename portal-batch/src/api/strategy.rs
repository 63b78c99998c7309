//! Per-resource pagination policy
//!
//! An [`EntityStrategy`] holds the only resource-specific knowledge the
//! traversal engine needs: which field identifies an item, where items sit in
//! a raw result, how to reference the last item of a sibling command, and how
//! the listing parameters are named.

use serde_json::Value;

use super::constants::PAGE_SIZE;
use super::operations::ResultReference;

/// Addressing scheme of a listing method; fixed per resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    /// Explicit `start` offset, total count reported by the portal
    Offset,
    /// `>id` / `<id` filter on the last seen identifier
    IdBased,
}

/// Where the item array sits inside a command's raw result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadLocation {
    /// The result itself is the item array
    Root,
    /// The item array is nested under a key (e.g. `orders`, `items`)
    Key(String),
}

/// Names of the listing parameters of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParamNames {
    pub order: String,
    pub filter: String,
    pub select: String,
    pub start: String,
}

impl ListParamNames {
    pub fn new(
        order: impl Into<String>,
        filter: impl Into<String>,
        select: impl Into<String>,
    ) -> Self {
        Self {
            order: order.into(),
            filter: filter.into(),
            select: select.into(),
            start: "start".to_string(),
        }
    }

    /// `ORDER` / `FILTER` / `SELECT`, as the lists methods spell them
    pub fn uppercase() -> Self {
        Self::new("ORDER", "FILTER", "SELECT")
    }
}

impl Default for ListParamNames {
    fn default() -> Self {
        Self::new("order", "filter", "select")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityStrategy {
    key_id_field: String,
    pagination: PaginationMode,
    payload: PayloadLocation,
    params: ListParamNames,
    page_size: usize,
}

impl EntityStrategy {
    pub fn new(key_id_field: impl Into<String>, pagination: PaginationMode) -> Self {
        Self {
            key_id_field: key_id_field.into(),
            pagination,
            payload: PayloadLocation::Root,
            params: ListParamNames::default(),
            page_size: PAGE_SIZE,
        }
    }

    pub fn offset(key_id_field: impl Into<String>) -> Self {
        Self::new(key_id_field, PaginationMode::Offset)
    }

    pub fn id_based(key_id_field: impl Into<String>) -> Self {
        Self::new(key_id_field, PaginationMode::IdBased)
    }

    pub fn with_payload_key(mut self, key: impl Into<String>) -> Self {
        self.payload = PayloadLocation::Key(key.into());
        self
    }

    pub fn with_param_names(mut self, params: ListParamNames) -> Self {
        self.params = params;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn key_id_field(&self) -> &str {
        &self.key_id_field
    }

    pub fn pagination(&self) -> PaginationMode {
        self.pagination
    }

    pub fn payload(&self) -> &PayloadLocation {
        &self.payload
    }

    pub fn param_names(&self) -> &ListParamNames {
        &self.params
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Reference to `key_field` of item `index` in `command_id`'s result
    pub fn reference_field_path(
        &self,
        command_id: &str,
        index: usize,
        key_field: &str,
    ) -> ResultReference {
        let reference = ResultReference::new(command_id);
        let reference = match &self.payload {
            PayloadLocation::Root => reference,
            PayloadLocation::Key(key) => reference.key(key.clone()),
        };
        reference.index(index).key(key_field)
    }

    /// Item array of a raw result. Missing or malformed payloads are an empty page.
    pub fn extract_items(&self, raw: &Value) -> Vec<Value> {
        match &self.payload {
            PayloadLocation::Root => items_of(raw),
            PayloadLocation::Key(key) => raw.get(key).map(items_of).unwrap_or_default(),
        }
    }
}

// Listing results arrive either as arrays or, for id-keyed collections, as
// objects whose values are the records.
fn items_of(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) if !map.is_empty() && map.values().all(Value::is_object) => {
            map.values().cloned().collect()
        }
        _ => Vec::new(),
    }
}
