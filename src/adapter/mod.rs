//! Outbound adapters for external services.

mod http;

pub use http::HttpLedgerClient;
