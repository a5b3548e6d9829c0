//! This modules defines how page numbers and page sizes map onto backend offsets.

use crate::Error;

/// The config for pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    /// The page size to use when a request does not specify one.
    ///
    /// This is also the batch size used when scrolling through a date range.
    pub default_page_size: u64,
    /// The largest page size a client may request.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10_000,
            max_page_size: 10_000,
        }
    }
}

/// The page size requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    /// No page size was given, use [PaginationConfig::default_page_size].
    #[default]
    Unset,
    /// The client asked for this many items per page. Always at least one.
    Requested(u64),
}

/// The offset and limit to request from the backend for a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// The number of matching items to skip.
    pub offset: u64,
    /// The maximum number of items to return.
    pub limit: u64,
}

/// Translate a 1-based `page` and a `page_size` into a [PageWindow].
///
/// `page` must be at least one, which the query parameter validation
/// guarantees.
///
/// # Errors
/// Returns [Error::InvalidArgument] if `page_size` is larger than
/// `config.max_page_size`.
pub fn resolve_page_window(
    page_size: PageSize,
    page: u64,
    config: PaginationConfig,
) -> Result<PageWindow, Error> {
    let limit = match page_size {
        PageSize::Unset => config.default_page_size,
        PageSize::Requested(size) if size > config.max_page_size => {
            return Err(Error::InvalidArgument(format!(
                "invalid parameter 'page_size' > {}",
                config.max_page_size
            )));
        }
        PageSize::Requested(size) => size,
    };

    let offset = page
        .saturating_sub(1)
        .checked_mul(limit)
        .ok_or_else(|| Error::invalid_argument("invalid parameter 'page'"))?;

    Ok(PageWindow { offset, limit })
}
