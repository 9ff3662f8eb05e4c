use super::execute::Outcome;
use crate::row::Row;

/// Result of a DELETE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    /// Rows from RETURNING/OUTPUT, or any rows the driver produced.
    pub raw: Option<Vec<Row>>,
    /// Deleted rows as reported by the driver. `None` when it does not report
    /// a count, which is not the same as `Some(0)`.
    pub affected: Option<u64>,
}

impl DeleteResult {
    pub(crate) fn from_outcome(outcome: Outcome) -> Self {
        Self {
            raw: outcome.raw,
            affected: outcome.affected,
        }
    }
}

/// Result of an UPDATE. Same shape as [`DeleteResult`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub raw: Option<Vec<Row>>,
    pub affected: Option<u64>,
}

impl UpdateResult {
    pub(crate) fn from_outcome(outcome: Outcome) -> Self {
        Self {
            raw: outcome.raw,
            affected: outcome.affected,
        }
    }
}

/// Result of an INSERT.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertResult {
    pub raw: Option<Vec<Row>>,
    pub affected: Option<u64>,
    /// Rows returned by RETURNING/OUTPUT, typically generated keys.
    pub identifiers: Vec<Row>,
}

impl InsertResult {
    pub(crate) fn from_outcome(outcome: Outcome) -> Self {
        Self {
            identifiers: outcome.raw.clone().unwrap_or_default(),
            raw: outcome.raw,
            affected: outcome.affected,
        }
    }
}
