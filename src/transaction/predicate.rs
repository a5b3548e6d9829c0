//! Translation of a [QueryIntent] into a backend-agnostic search predicate.

use time::OffsetDateTime;

use super::params::QueryIntent;

/// The document field holding the ID of the user a transaction belongs to.
pub const USER_ID_FIELD: &str = "user_id";
/// The document field holding the creation timestamp of a transaction.
pub const CREATION_DATE_FIELD: &str = "creation_date";

/// A half-open interval of timestamps, `[from, to)`.
///
/// A missing bound leaves that side of the interval unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub from: Option<OffsetDateTime>,
    /// Exclusive upper bound.
    pub to: Option<OffsetDateTime>,
}

impl DateRange {
    /// Whether `timestamp` lies within the range.
    pub fn contains(&self, timestamp: OffsetDateTime) -> bool {
        self.from.is_none_or(|from| timestamp >= from) && self.to.is_none_or(|to| timestamp < to)
    }
}

/// A single filter that a document must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// The field must hold exactly `value`.
    Term {
        /// The document field to compare.
        field: &'static str,
        /// The value the field must equal.
        value: String,
    },
    /// The document must have at least one of the fields.
    ///
    /// Transaction types are stored as marker fields, so a type filter
    /// becomes "has field A or has field B".
    AnyExists {
        /// The candidate fields, in sorted order.
        fields: Vec<String>,
    },
    /// The timestamp in `field` must lie within `range`.
    Range {
        /// The document field holding an RFC 3339 timestamp.
        field: &'static str,
        /// The accepted interval.
        range: DateRange,
    },
}

/// A conjunction of [Clause]s. An empty predicate matches every document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPredicate {
    clauses: Vec<Clause>,
}

impl SearchPredicate {
    /// The clauses a document must all satisfy, in a stable order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

/// Build the predicate selecting the transactions described by `intent`.
///
/// Clauses are emitted in a fixed order: user, types, date range. Optional
/// fields that are absent produce no clause.
pub fn build_predicate(intent: &QueryIntent) -> SearchPredicate {
    let mut clauses = Vec::with_capacity(3);

    if let Some(user_id) = &intent.user_id {
        clauses.push(Clause::Term {
            field: USER_ID_FIELD,
            value: user_id.clone(),
        });
    }

    if !intent.types.is_empty() {
        clauses.push(Clause::AnyExists {
            fields: intent.types.iter().cloned().collect(),
        });
    }

    if intent.date_from.is_some() || intent.date_to.is_some() {
        clauses.push(Clause::Range {
            field: CREATION_DATE_FIELD,
            range: DateRange {
                from: intent.date_from,
                to: intent.date_to,
            },
        });
    }

    SearchPredicate { clauses }
}
