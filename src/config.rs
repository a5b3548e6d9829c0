//! Server configuration read from command line flags and environment variables.

use clap::Parser;

use crate::{pagination::PaginationConfig, transaction::TransactionTypes};

/// The REST API server for querying transactions.
///
/// Every flag may also be given as an environment variable.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port to serve the API from.
    #[arg(short, long, env = "APP_PORT", default_value_t = 8080)]
    pub port: u16,

    /// The URL of the Elasticsearch cluster.
    #[arg(long, env = "ELASTIC_HOST", default_value = "http://localhost:9200")]
    pub elastic_host: String,

    /// The index transactions are stored in.
    #[arg(long, env = "ELASTIC_INDEX", default_value = "transactions")]
    pub elastic_index: String,

    /// The default page size, also used as the batch size when counting a date range.
    #[arg(
        long,
        env = "ELASTIC_RESPONSE_SIZE",
        default_value_t = 10_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub elastic_response_size: u64,

    /// The largest page size clients may ask for. Defaults to the response size.
    #[arg(long, env = "MAX_PAGE_SIZE", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_page_size: Option<u64>,

    /// Log every request sent to Elasticsearch and disable retries.
    #[arg(long, env = "ELASTIC_DEBUG")]
    pub elastic_debug: bool,

    /// Comma separated transaction types clients may filter by. Empty accepts any type.
    #[arg(long, env = "TRANSACTION_TYPES", value_delimiter = ',')]
    pub transaction_types: Vec<String>,
}

/// The errors that make a [Config] unusable.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The default page size would always be rejected by the maximum.
    #[error("the response size {default} is larger than the max page size {max}")]
    DefaultExceedsMax {
        /// The configured default page size.
        default: u64,
        /// The configured maximum page size.
        max: u64,
    },
}

impl Config {
    /// The page sizes to use for paginated queries.
    ///
    /// # Errors
    /// Returns [ConfigError::DefaultExceedsMax] if the default page size is
    /// larger than the maximum.
    pub fn pagination(&self) -> Result<PaginationConfig, ConfigError> {
        let default = self.elastic_response_size;
        let max = self.max_page_size.unwrap_or(default);

        if default > max {
            return Err(ConfigError::DefaultExceedsMax { default, max });
        }

        Ok(PaginationConfig {
            default_page_size: default,
            max_page_size: max,
        })
    }

    /// The transaction types clients may filter by.
    pub fn transaction_types(&self) -> TransactionTypes {
        TransactionTypes::only(
            self.transaction_types
                .iter()
                .map(|tag| tag.trim())
                .filter(|tag| !tag.is_empty()),
        )
    }
}
