//! Validation of the query parameters accepted by the transaction routes.
//!
//! Raw parameters are turned into a [QueryIntent] before anything else
//! happens, so the rest of the crate never sees unvalidated input.

use std::collections::BTreeSet;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{Error, pagination::PageSize};

use super::models::SortDirection;

/// The query string parameters of a request, in the order they were given.
///
/// Parameters may repeat, e.g. `?type=fee&type=refund`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams {
    pairs: Vec<(String, String)>,
}

impl RawParams {
    /// Decode a URL query string (without the leading `?`).
    ///
    /// # Errors
    /// Returns [Error::InvalidArgument] if the query string is not valid
    /// `application/x-www-form-urlencoded` data.
    pub fn from_query(query: Option<&str>) -> Result<Self, Error> {
        let Some(query) = query else {
            return Ok(Self::default());
        };

        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .map(|pairs| Self { pairs })
            .map_err(|error| {
                Error::InvalidArgument(format!("could not decode query string: {error}"))
            })
    }

    /// The first value given for `key`, if any.
    fn first<'a>(&'a self, key: &str) -> Option<&'a str> {
        self.all(key).next()
    }

    /// Every value given for `key`.
    fn all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> {
        self.pairs
            .iter()
            .filter(move |(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for RawParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// The set of transaction type tags clients may filter by.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionTypes {
    /// `None` accepts any tag.
    recognized: Option<BTreeSet<String>>,
}

impl TransactionTypes {
    /// Accept any type tag.
    pub fn any() -> Self {
        Self { recognized: None }
    }

    /// Accept only the given type tags.
    ///
    /// An empty list accepts any tag, the same as [TransactionTypes::any].
    pub fn only<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();

        Self {
            recognized: (!tags.is_empty()).then_some(tags),
        }
    }

    /// Whether `tag` may be used as a type filter.
    pub fn is_recognized(&self, tag: &str) -> bool {
        self.recognized
            .as_ref()
            .is_none_or(|recognized| recognized.contains(tag))
    }
}

/// A validated and normalized transaction query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryIntent {
    /// Only set for queries scoped to a single user.
    pub user_id: Option<String>,
    /// Type tags to filter by. Empty means no type filter.
    pub types: BTreeSet<String>,
    /// The order to sort results by creation date.
    pub sort: SortDirection,
    /// The 1-based page number, only used for paginated queries.
    pub page: u64,
    /// The requested page size, only used for paginated queries.
    pub page_size: PageSize,
    /// Inclusive lower bound on the creation date.
    pub date_from: Option<OffsetDateTime>,
    /// Exclusive upper bound on the creation date.
    pub date_to: Option<OffsetDateTime>,
    /// Whether to only show open (or closed) transactions.
    pub open: Option<bool>,
}

impl Default for QueryIntent {
    fn default() -> Self {
        Self {
            user_id: None,
            types: BTreeSet::new(),
            sort: SortDirection::default(),
            page: 1,
            page_size: PageSize::Unset,
            date_from: None,
            date_to: None,
            open: None,
        }
    }
}

/// Validate the parameters of a request for a single user's transactions.
///
/// `user_id` comes from the request path.
///
/// # Errors
/// Returns [Error::InvalidArgument] naming the first parameter that is
/// missing or malformed.
pub fn validate_user_scoped(
    user_id: Option<&str>,
    params: &RawParams,
    transaction_types: &TransactionTypes,
) -> Result<QueryIntent, Error> {
    let user_id = user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::invalid_argument("invalid parameter 'user_id'"))?;

    Ok(QueryIntent {
        user_id: Some(user_id.to_owned()),
        types: parse_types(params, transaction_types)?,
        sort: parse_sort(params)?,
        page: parse_page(params)?,
        page_size: parse_page_size(params)?,
        date_from: parse_date(params, "date_from")?,
        date_to: parse_date(params, "date_to")?,
        open: parse_open(params)?,
    })
}

/// Validate the parameters of a request for all transactions in a date range.
///
/// Only `type`, `date_from` and `date_to` are read, anything else is ignored.
///
/// # Errors
/// Returns [Error::InvalidArgument] if a parameter is malformed or if neither
/// `date_from` nor `date_to` is given.
pub fn validate_range_scoped(
    params: &RawParams,
    transaction_types: &TransactionTypes,
) -> Result<QueryIntent, Error> {
    let types = parse_types(params, transaction_types)?;
    let date_from = parse_date(params, "date_from")?;
    let date_to = parse_date(params, "date_to")?;

    if date_from.is_none() && date_to.is_none() {
        return Err(Error::invalid_argument(
            "at least one of the date range boundaries must be set",
        ));
    }

    Ok(QueryIntent {
        types,
        date_from,
        date_to,
        ..Default::default()
    })
}

fn parse_types(
    params: &RawParams,
    transaction_types: &TransactionTypes,
) -> Result<BTreeSet<String>, Error> {
    params
        .all("type")
        .map(|tag| {
            if transaction_types.is_recognized(tag) {
                Ok(tag.to_owned())
            } else {
                Err(Error::invalid_argument(
                    "parameter 'type' does not match any of the accepted values",
                ))
            }
        })
        .collect()
}

fn parse_sort(params: &RawParams) -> Result<SortDirection, Error> {
    match params.first("sort") {
        None => Ok(SortDirection::Descending),
        Some("asc") => Ok(SortDirection::Ascending),
        Some("desc") => Ok(SortDirection::Descending),
        Some(_) => Err(Error::invalid_argument("invalid parameter 'sort'")),
    }
}

fn parse_page(params: &RawParams) -> Result<u64, Error> {
    match params.first("page") {
        None => Ok(1),
        Some(page) => {
            parse_positive(page).ok_or_else(|| Error::invalid_argument("invalid parameter 'page'"))
        }
    }
}

fn parse_page_size(params: &RawParams) -> Result<PageSize, Error> {
    match params.first("page_size") {
        None => Ok(PageSize::Unset),
        Some(page_size) => parse_positive(page_size)
            .map(PageSize::Requested)
            .ok_or_else(|| Error::invalid_argument("invalid parameter 'page_size'")),
    }
}

/// Parse a base 10 integer that must be at least one.
fn parse_positive(text: &str) -> Option<u64> {
    text.parse::<i64>()
        .ok()
        .filter(|value| *value >= 1)
        .and_then(|value| u64::try_from(value).ok())
}

fn parse_date(params: &RawParams, key: &str) -> Result<Option<OffsetDateTime>, Error> {
    params
        .first(key)
        .map(|text| {
            OffsetDateTime::parse(text, &Rfc3339)
                .map_err(|_| Error::InvalidArgument(format!("could not decode `{key}`")))
        })
        .transpose()
}

fn parse_open(params: &RawParams) -> Result<Option<bool>, Error> {
    params
        .first("open")
        .map(|text| match text {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            _ => Err(Error::invalid_argument("invalid parameter 'open'")),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;
    use time::macros::datetime;

    use crate::{
        Error,
        pagination::PageSize,
        transaction::{
            models::SortDirection,
            params::{
                QueryIntent, RawParams, TransactionTypes, validate_range_scoped,
                validate_user_scoped,
            },
        },
    };

    fn params(pairs: &[(&str, &str)]) -> RawParams {
        pairs.iter().copied().collect()
    }

    fn user_scoped(pairs: &[(&str, &str)]) -> Result<QueryIntent, Error> {
        validate_user_scoped(Some("42"), &params(pairs), &TransactionTypes::any())
    }

    fn invalid(message: &str) -> Error {
        Error::InvalidArgument(message.to_owned())
    }

    #[test]
    fn user_scoped_defaults() {
        let got = user_scoped(&[]).unwrap();

        assert_eq!(
            got,
            QueryIntent {
                user_id: Some("42".to_owned()),
                ..Default::default()
            }
        );
        assert_eq!(got.sort, SortDirection::Descending);
        assert_eq!(got.page, 1);
        assert_eq!(got.page_size, PageSize::Unset);
    }

    #[test]
    fn missing_user_id_is_invalid_argument() {
        let got = validate_user_scoped(None, &RawParams::default(), &TransactionTypes::any());

        assert_eq!(got, Err(invalid("invalid parameter 'user_id'")));
    }

    #[test]
    fn empty_user_id_is_invalid_argument() {
        let got = validate_user_scoped(Some(""), &RawParams::default(), &TransactionTypes::any());

        assert_eq!(got, Err(invalid("invalid parameter 'user_id'")));
    }

    #[test]
    fn parses_every_parameter() {
        let got = user_scoped(&[
            ("type", "fee"),
            ("type", "refund"),
            ("sort", "asc"),
            ("page", "3"),
            ("page_size", "50"),
            ("date_from", "2020-01-01T00:00:00Z"),
            ("date_to", "2020-02-01T00:00:00+01:00"),
            ("open", "true"),
        ])
        .unwrap();

        assert_eq!(
            got,
            QueryIntent {
                user_id: Some("42".to_owned()),
                types: BTreeSet::from(["fee".to_owned(), "refund".to_owned()]),
                sort: SortDirection::Ascending,
                page: 3,
                page_size: PageSize::Requested(50),
                date_from: Some(datetime!(2020-01-01 00:00:00 UTC)),
                date_to: Some(datetime!(2020-02-01 00:00:00 +01:00)),
                open: Some(true),
            }
        );
    }

    #[test]
    fn repeated_types_are_deduplicated() {
        let got = user_scoped(&[("type", "fee"), ("type", "fee")]).unwrap();

        assert_eq!(got.types, BTreeSet::from(["fee".to_owned()]));
    }

    #[test]
    fn unrecognized_type_rejects_whole_request() {
        let types = TransactionTypes::only(["fee", "credit"]);
        let got = validate_user_scoped(
            Some("42"),
            &params(&[("type", "fee"), ("type", "bogus")]),
            &types,
        );

        assert_eq!(
            got,
            Err(invalid(
                "parameter 'type' does not match any of the accepted values"
            ))
        );
    }

    #[test]
    fn empty_type_list_accepts_anything() {
        let types = TransactionTypes::only(Vec::<String>::new());

        assert!(types.is_recognized("anything"));
        assert_eq!(types, TransactionTypes::any());
    }

    #[test]
    fn first_value_of_repeated_parameter_wins() {
        let got = user_scoped(&[("sort", "asc"), ("sort", "bogus"), ("page", "2"), ("page", "x")])
            .unwrap();

        assert_eq!(got.sort, SortDirection::Ascending);
        assert_eq!(got.page, 2);
    }

    #[test]
    fn desc_sort_is_accepted() {
        assert_eq!(
            user_scoped(&[("sort", "desc")]).unwrap().sort,
            SortDirection::Descending
        );
    }

    #[test]
    fn page_must_be_positive_integer() {
        for page in ["0", "-1", "abc", "", "1.5"] {
            assert_eq!(
                user_scoped(&[("page", page)]),
                Err(invalid("invalid parameter 'page'")),
                "page {page:?} should be rejected"
            );
        }
    }

    #[test]
    fn page_size_must_be_positive_integer() {
        for page_size in ["0", "-20", "ten", ""] {
            assert_eq!(
                user_scoped(&[("page_size", page_size)]),
                Err(invalid("invalid parameter 'page_size'")),
                "page_size {page_size:?} should be rejected"
            );
        }
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert_eq!(
            user_scoped(&[("date_from", "2020-01-01")]),
            Err(invalid("could not decode `date_from`"))
        );
        assert_eq!(
            user_scoped(&[("date_to", "yesterday")]),
            Err(invalid("could not decode `date_to`"))
        );
    }

    #[test]
    fn open_accepts_boolean_literals() {
        for (text, want) in [("1", true), ("T", true), ("False", false), ("0", false)] {
            assert_eq!(user_scoped(&[("open", text)]).unwrap().open, Some(want));
        }

        assert_eq!(
            user_scoped(&[("open", "yes")]),
            Err(invalid("invalid parameter 'open'"))
        );
    }

    #[test]
    fn range_scoped_requires_a_date_boundary() {
        let got = validate_range_scoped(&params(&[("type", "fee")]), &TransactionTypes::any());

        assert_eq!(
            got,
            Err(invalid(
                "at least one of the date range boundaries must be set"
            ))
        );
    }

    #[test]
    fn range_scoped_accepts_lower_bound_only() {
        let got = validate_range_scoped(
            &params(&[("date_from", "2020-01-01T00:00:00Z")]),
            &TransactionTypes::any(),
        )
        .unwrap();

        assert_eq!(got.date_from, Some(datetime!(2020-01-01 00:00:00 UTC)));
        assert_eq!(got.date_to, None);
        assert_eq!(got.user_id, None);
    }

    #[test]
    fn range_scoped_ignores_paging_parameters() {
        let got = validate_range_scoped(
            &params(&[
                ("date_to", "2020-01-01T00:00:00Z"),
                ("page", "not a number"),
                ("sort", "sideways"),
            ]),
            &TransactionTypes::any(),
        )
        .unwrap();

        assert_eq!(got.page, 1);
        assert_eq!(got.sort, SortDirection::Descending);
    }

    #[test]
    fn decodes_query_string() {
        let query = "type=fee&type=credit&date_from=2020-01-01T00%3A00%3A00Z";
        let got = RawParams::from_query(Some(query)).unwrap();

        assert_eq!(
            got,
            params(&[
                ("type", "fee"),
                ("type", "credit"),
                ("date_from", "2020-01-01T00:00:00Z")
            ])
        );
        assert_eq!(RawParams::from_query(None).unwrap(), RawParams::default());
    }

    proptest! {
        #[test]
        fn sort_other_than_asc_or_desc_is_rejected(sort in "\\PC*") {
            prop_assume!(sort != "asc" && sort != "desc");

            let got = user_scoped(&[("sort", sort.as_str())]);

            prop_assert_eq!(got, Err(invalid("invalid parameter 'sort'")));
        }
    }
}
