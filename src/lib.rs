pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod market_data;
pub mod rate_limit;
pub mod retry;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testutil;
