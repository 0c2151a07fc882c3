//! Offset and keyset pagination

use std::fmt;
use std::marker::PhantomData;

use crate::schema::Field;

/// Default number of rows per page
pub const DEFAULT_LIMIT: u64 = 100;

/// Sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Asc => write!(f, "ASC"),
            Order::Desc => write!(f, "DESC"),
        }
    }
}

/// Offset pagination over the table of `T`
#[derive(Debug)]
pub struct Page<T> {
    pub number: u64,
    pub order_by: &'static str,
    pub limit: u64,
    pub order: Order,
    _table: PhantomData<fn() -> T>,
}

impl<T> Page<T> {
    /// Page `number` (zero based) ordered by a column of `T`
    pub fn new<V>(number: u64, order_by: Field<T, V>) -> Self {
        Self {
            number,
            order_by: order_by.name(),
            limit: DEFAULT_LIMIT,
            order: Order::Asc,
            _table: PhantomData,
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn offset(&self) -> u64 {
        self.number.saturating_mul(self.limit)
    }
}

/// Keyset pagination starting at `index`, inclusive
///
/// Rows whose `order_by` value equals `index` are part of the page, so a
/// cursor resumes at the first key of the next page. Ties on a non-unique
/// column are the caller's to break.
#[derive(Debug)]
pub struct Cursor<T, V> {
    pub index: V,
    pub order_by: Field<T, V>,
    pub limit: u64,
    pub order: Order,
}

impl<T, V> Cursor<T, V> {
    pub fn new(index: V, order_by: Field<T, V>) -> Self {
        Self {
            index,
            order_by,
            limit: DEFAULT_LIMIT,
            order: Order::Asc,
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Comparison selecting rows at or past the index
    pub fn comparison(&self) -> &'static str {
        match self.order {
            Order::Asc => ">=",
            Order::Desc => "<=",
        }
    }
}
