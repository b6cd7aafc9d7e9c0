//! Load-subset request options.

use alloc::vec::Vec;

use super::expr::BasicExpression;
use super::query::OrderByClause;

/// Keyset cursor split into the two halves a loader may need.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CursorExpressions {
    /// Rows strictly after the cursor position.
    pub where_from: BasicExpression,
    /// Tie-break rows sitting exactly at the cursor position.
    pub where_current: Option<BasicExpression>,
}

/// Describes a window of data a consumer wants loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LoadSubsetOptions {
    pub where_: Option<BasicExpression>,
    pub order_by: Option<Vec<OrderByClause>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub cursor: Option<CursorExpressions>,
}

impl LoadSubsetOptions {
    /// Options that load everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Options filtered by `where_`.
    pub fn filtered(where_: BasicExpression) -> Self {
        Self {
            where_: Some(where_),
            ..Self::default()
        }
    }

    pub fn with_order_by(mut self, order_by: Vec<OrderByClause>) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_cursor(mut self, cursor: CursorExpressions) -> Self {
        self.cursor = Some(cursor);
        self
    }
}
