//! Id-based pagination: filter past the last seen identifier
//!
//! Resources without a `start` parameter are walked by sorting on the key
//! field and filtering `>key` (ascending) or `<key` (descending). Within one
//! physical call, every command after the first takes its boundary from a
//! deferred reference to the last item of the previous command, so the portal
//! chains up to `capacity` pages server-side.

use serde_json::Value;

use super::{PageContext, page_items};
use crate::api::operations::{ParamValue, Parameters};
use crate::error::{BatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Direction requested for `key` in a caller's order map; ascending unless
    /// the entry says `DESC`
    pub fn from_order(order: &Parameters, key: &str) -> Self {
        let entry = order
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| v.as_str());
        match entry {
            Some(direction) if direction.eq_ignore_ascii_case("desc") => Self::Descending,
            _ => Self::Ascending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    /// Filter operator selecting items past a boundary id
    pub fn boundary_operator(&self) -> &'static str {
        match self {
            Self::Ascending => ">",
            Self::Descending => "<",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdCursor {
    last_seen_id: Option<i64>,
    direction: SortDirection,
    filter_key: String,
    page_size: usize,
    finished: bool,
}

impl IdCursor {
    pub fn new(filter_key: impl Into<String>, direction: SortDirection, page_size: usize) -> Self {
        Self {
            last_seen_id: None,
            direction,
            filter_key: filter_key.into(),
            page_size,
            finished: false,
        }
    }

    pub fn last_seen_id(&self) -> Option<i64> {
        self.last_seen_id
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn advance(
        &mut self,
        ctx: &mut PageContext<'_>,
        wanted: Option<usize>,
    ) -> Result<Option<Vec<Value>>> {
        if self.finished {
            return Ok(None);
        }

        let pages = match wanted {
            Some(wanted) => wanted.div_ceil(self.page_size),
            None => ctx.batch.capacity(),
        }
        .min(ctx.batch.capacity());
        if pages == 0 {
            self.finished = true;
            return Ok(None);
        }

        ctx.batch.clear();
        let mut previous: Option<String> = None;
        for _ in 0..pages {
            let boundary = match &previous {
                None => self.last_seen_id.map(ParamValue::from),
                Some(command_id) => Some(ParamValue::Reference(ctx.strategy.reference_field_path(
                    command_id,
                    self.page_size - 1,
                    &self.filter_key,
                ))),
            };
            let params = self.page_parameters(ctx, boundary);
            previous = Some(ctx.batch.register(ctx.method, params)?);
        }

        let results = ctx.batch.execute_observed(ctx.transport, ctx.observer).await?;

        let mut items = Vec::new();
        for result in results {
            let page = page_items(ctx.strategy, result)?;
            let Some(last) = page.last() else {
                self.finished = true;
                break;
            };
            self.last_seen_id = Some(item_id(last, &self.filter_key)?);

            // A short page is the end of the data; references in the commands
            // after it point past the last item.
            let short = page.len() < self.page_size;
            items.extend(page);
            if short {
                self.finished = true;
                break;
            }
        }
        Ok(Some(items))
    }

    fn page_parameters(&self, ctx: &PageContext<'_>, boundary: Option<ParamValue>) -> Parameters {
        let names = ctx.strategy.param_names();
        let mut params = ctx.parameters.clone();

        params.insert(
            names.order.clone(),
            Parameters::new().with(self.filter_key.clone(), self.direction.as_str()),
        );

        // Boundaries and references read the key of every item, so a narrowed
        // select must still carry it
        let widened = match params.get(&names.select) {
            Some(ParamValue::Value(Value::Array(fields)))
                if !fields.is_empty() && !selects_key(fields, &self.filter_key) =>
            {
                let mut fields = fields.clone();
                fields.push(Value::from(self.filter_key.clone()));
                Some(fields)
            }
            _ => None,
        };
        if let Some(fields) = widened {
            params.insert(names.select.clone(), Value::Array(fields));
        }

        if let Some(boundary) = boundary {
            let mut filter = params
                .get(&names.filter)
                .and_then(ParamValue::as_map)
                .cloned()
                .unwrap_or_default();
            filter.insert(
                format!("{}{}", self.direction.boundary_operator(), self.filter_key),
                boundary,
            );
            params.insert(names.filter.clone(), filter);
        }
        params
    }
}

fn selects_key(fields: &[Value], key: &str) -> bool {
    fields
        .iter()
        .filter_map(Value::as_str)
        .any(|field| field == "*" || field.eq_ignore_ascii_case(key))
}

/// Integer id of an item; the portal sends ids as numbers or numeric strings
pub fn item_id(item: &Value, key: &str) -> Result<i64> {
    let value = item
        .get(key)
        .ok_or_else(|| BatchError::UnexpectedResponse(format!("item without «{}» field", key)))?;
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.ok_or_else(|| {
        BatchError::UnexpectedResponse(format!("«{}» value {} is not an integer id", key, value))
    })
}
