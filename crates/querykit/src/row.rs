//! Dialect-neutral result rows.

use crate::error::{OrmResult, QueryError};
use crate::value::{FromValue, Value};
use std::sync::Arc;

/// One row returned by a driver: ordered column names with their values.
///
/// Column names are shared between all rows of one result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
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

    /// Raw value of a column, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Typed access to a column.
    pub fn try_get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| QueryError::decode(column, "column not found"))?;
        T::from_value(value).ok_or_else(|| {
            QueryError::decode(
                column,
                format!(
                    "cannot convert {} into {}",
                    value.type_name(),
                    std::any::type_name::<T>()
                ),
            )
        })
    }
}
