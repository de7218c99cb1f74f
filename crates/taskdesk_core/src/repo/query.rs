//! In-memory filter/sort/paginate composition for `find_all`.
//!
//! # Invariants
//! - Stages run in order: filters (AND-combined), sort, offset/limit.
//! - Sorting is stable; ties keep collection order.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Comparable projection of one entity field.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue<'a> {
    /// Date-like fields, compared chronologically; absent sorts first.
    Timestamp(Option<DateTime<Utc>>),
    /// Compared case-insensitively.
    Text(&'a str),
    /// Absent sorts first.
    Number(Option<f64>),
    /// Enum ordinal, e.g. priority rank.
    Rank(u8),
    Flag(bool),
}

impl SortValue<'_> {
    /// Total order between values of the same kind; mixed kinds tie.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Timestamp(left), Self::Timestamp(right)) => left.cmp(right),
            (Self::Text(left), Self::Text(right)) => left.to_lowercase().cmp(&right.to_lowercase()),
            (Self::Number(left), Self::Number(right)) => match (left, right) {
                (Some(left), Some(right)) => left.partial_cmp(right).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            (Self::Rank(left), Self::Rank(right)) => left.cmp(right),
            (Self::Flag(left), Self::Flag(right)) => left.cmp(right),
            _ => Ordering::Equal,
        }
    }
}

/// Options accepted by `Repository::find_all`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions<F, S> {
    /// Equality filters; an entity must match all of them.
    pub filters: Vec<F>,
    pub sort_by: Option<S>,
    pub sort_order: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl<F, S> Default for QueryOptions<F, S> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort_by: None,
            sort_order: SortOrder::Asc,
            offset: 0,
            limit: None,
        }
    }
}

impl<F, S> QueryOptions<F, S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: F) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sort(mut self, field: S, order: SortOrder) -> Self {
        self.sort_by = Some(field);
        self.sort_order = order;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Per-entity hooks used by the query engine.
pub trait Queryable {
    type Filter;
    type SortField: Copy;

    fn matches_filter(&self, filter: &Self::Filter) -> bool;
    fn sort_value(&self, field: Self::SortField) -> SortValue<'_>;
}

/// Applies filters, sort and pagination to a hydrated collection.
pub fn apply_query<E>(entities: Vec<E>, options: &QueryOptions<E::Filter, E::SortField>) -> Vec<E>
where
    E: Queryable,
{
    let mut matched: Vec<E> = entities
        .into_iter()
        .filter(|entity| {
            options
                .filters
                .iter()
                .all(|filter| entity.matches_filter(filter))
        })
        .collect();

    if let Some(field) = options.sort_by {
        matched.sort_by(|left, right| {
            let ordering = left.sort_value(field).compare(&right.sort_value(field));
            match options.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    let paged = matched.into_iter().skip(options.offset);
    match options.limit {
        Some(limit) => paged.take(limit).collect(),
        None => paged.collect(),
    }
}
