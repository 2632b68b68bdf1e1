//! Wire payload for `POST /api/sales/search`, stripped of absent values.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use serde_json::Value;

use crate::query_state::QueryState;

/// Canonical rendering of a [`NormalizedQuery`], used as the cache and
/// in-flight key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key for endpoints that take no parameters.
    pub(crate) fn unit(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Present fields of a [`QueryState`] snapshot.
///
/// Null, `""` and `[]` are dropped; numeric zero is kept. Keys live in a
/// `BTreeMap` and sets are emitted sorted, so equal content always yields
/// an equal payload and an equal [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct NormalizedQuery(BTreeMap<&'static str, Value>);

impl NormalizedQuery {
    pub fn from_state(state: &QueryState) -> Self {
        let mut query = Self::default();
        query.insert("search_query", state.search_query());
        query.insert("customer_regions", state.customer_regions());
        query.insert("genders", state.genders());
        query.insert("age_min", state.age_min());
        query.insert("age_max", state.age_max());
        query.insert("product_categories", state.product_categories());
        query.insert("tags", state.tags());
        query.insert("payment_methods", state.payment_methods());
        query.insert("date_start", state.date_start());
        query.insert("date_end", state.date_end());
        query.insert("sort_by", state.sort_by());
        query.insert("sort_order", state.sort_order());
        query.insert("page", state.page());
        query.insert("page_size", state.page_size());
        query
    }

    fn insert(&mut self, field: &'static str, value: impl Serialize) {
        let Ok(value) = serde_json::to_value(value) else {
            return;
        };
        if is_present(&value) {
            self.0.insert(field, value);
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn key(&self) -> QueryKey {
        // A map of plain JSON values with string keys always serializes.
        QueryKey(serde_json::to_string(&self.0).unwrap_or_default())
    }
}

impl From<&QueryState> for NormalizedQuery {
    fn from(state: &QueryState) -> Self {
        Self::from_state(state)
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}
