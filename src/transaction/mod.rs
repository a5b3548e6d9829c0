//! Transaction queries.
//!
//! This module contains everything between an HTTP request and the search
//! backend:
//! - Validation of query parameters into a [QueryIntent]
//! - Translation of a [QueryIntent] into a [SearchPredicate]
//! - The [TransactionService] that runs paginated searches and date range scrolls
//! - The route handlers

mod endpoint;
mod models;
mod params;
mod predicate;
mod scroll;
mod service;

pub use endpoint::{TransactionQueryState, get_transactions, get_user_transactions};
pub use models::{SortDirection, Transaction, TransactionsResponse};
pub use params::{
    QueryIntent, RawParams, TransactionTypes, validate_range_scoped, validate_user_scoped,
};
pub use predicate::{
    CREATION_DATE_FIELD, Clause, DateRange, SearchPredicate, USER_ID_FIELD, build_predicate,
};
pub use scroll::{Scroll, ScrollSummary, count_all};
pub use service::TransactionService;
