// MEXC perpetual contracts.
// Source: https://contract.mexc.com/api/v1/contract/detail, /api/v1/contract/depth/{symbol}

use serde::Deserialize;
use tracing::instrument;

use super::{build_snapshot, millis_to_utc, VenueAdapter};
use crate::config::VenueConfig;
use crate::error::{DepthxError, FetchError};
use crate::market_data::http::HttpClient;
use crate::market_data::normaliser::{levels_from_arrays, RawLevel};
use crate::market_data::types::{DepthSnapshot, NativeSymbol, SymbolDescriptor, VenueId};

const MAX_DEPTH: usize = 100;
const RATE_LIMIT_CODE: i64 = 510;

/// `{"success": true, "code": 0, "data": ...}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, FetchError> {
        let reason = self.message.unwrap_or_default();
        match (self.success, self.code, self.data) {
            (true, 0, Some(data)) => Ok(data),
            (true, 0, None) => Err(FetchError::malformed("success response without data")),
            (_, RATE_LIMIT_CODE, _) => Err(FetchError::rate_limited(reason)),
            (_, code, _) => Err(FetchError::api(code, reason)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractDetail {
    symbol: String,
    /// 0 = enabled.
    #[serde(default)]
    state: i64,
    contract_size: Option<f64>,
}

/// Levels are `[price, volume, order_count]`, volume in contracts.
#[derive(Debug, Deserialize)]
struct Depth {
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
    timestamp: Option<i64>,
}

pub struct MexcAdapter {
    venue: VenueId,
    base_url: String,
    http: HttpClient,
}

impl MexcAdapter {
    pub fn new(config: &VenueConfig) -> Result<Self, DepthxError> {
        Ok(Self {
            venue: config.id.clone(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            http: HttpClient::new(config.id.clone(), config.timeout())?,
        })
    }
}

fn decode_contracts(env: Envelope<Vec<ContractDetail>>) -> Result<Vec<NativeSymbol>, FetchError> {
    Ok(env
        .into_data()?
        .into_iter()
        .filter(|c| c.state == 0)
        .map(|c| {
            let size = c.contract_size.filter(|s| *s > 0.0).unwrap_or(1.0);
            NativeSymbol::new(c.symbol).with_contract_size(size)
        })
        .collect())
}

fn decode_depth(
    venue: &VenueId,
    symbol: &SymbolDescriptor,
    env: Envelope<Depth>,
    levels: usize,
) -> Result<DepthSnapshot, FetchError> {
    let depth = env.into_data()?;
    let bids = levels_from_arrays(&depth.bids, symbol.contract_size)?;
    let asks = levels_from_arrays(&depth.asks, symbol.contract_size)?;
    build_snapshot(venue, symbol, millis_to_utc(depth.timestamp), bids, asks, levels)
}

#[async_trait::async_trait]
impl VenueAdapter for MexcAdapter {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn list_symbols(&self) -> Result<Vec<NativeSymbol>, FetchError> {
        let url = format!("{}/api/v1/contract/detail", self.base_url);
        let env: Envelope<Vec<ContractDetail>> = self.http.get_json(&url, &[]).await?;
        decode_contracts(env)
    }

    #[instrument(skip(self, symbol), fields(venue = %self.venue, symbol = %symbol.native))]
    async fn fetch_depth(&self, symbol: &SymbolDescriptor, levels: usize) -> Result<DepthSnapshot, FetchError> {
        let url = format!("{}/api/v1/contract/depth/{}", self.base_url, symbol.native);
        let env: Envelope<Depth> = self.http.get_json(&url, &[("limit", levels.min(MAX_DEPTH).to_string())]).await?;
        decode_depth(&self.venue, symbol, env, levels)
    }
}
