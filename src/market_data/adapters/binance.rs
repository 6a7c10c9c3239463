// Binance USDⓈ-M futures.
// Source: https://fapi.binance.com/fapi/v1/exchangeInfo, /fapi/v1/depth

use serde::Deserialize;
use tracing::instrument;

use super::{build_snapshot, millis_to_utc, VenueAdapter};
use crate::config::VenueConfig;
use crate::error::{DepthxError, FetchError};
use crate::market_data::http::HttpClient;
use crate::market_data::normaliser::{levels_from_arrays, RawLevel};
use crate::market_data::types::{DepthSnapshot, NativeSymbol, SymbolDescriptor, VenueId};

/// The only `limit` values the depth endpoint accepts.
const DEPTH_LIMITS: [usize; 7] = [5, 10, 20, 50, 100, 500, 1000];

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    #[serde(default)]
    contract_type: String,
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    #[serde(rename = "T")]
    transaction_time: Option<i64>,
    #[serde(rename = "E")]
    event_time: Option<i64>,
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
}

pub struct BinanceAdapter {
    venue: VenueId,
    base_url: String,
    http: HttpClient,
}

impl BinanceAdapter {
    pub fn new(config: &VenueConfig) -> Result<Self, DepthxError> {
        Ok(Self {
            venue: config.id.clone(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            http: HttpClient::new(config.id.clone(), config.timeout())?,
        })
    }
}

/// Smallest accepted limit that covers `levels`; the response is truncated
/// back down afterwards.
fn depth_limit(levels: usize) -> usize {
    DEPTH_LIMITS.iter().copied().find(|&l| l >= levels).unwrap_or(1000)
}

fn decode_symbols(info: ExchangeInfo) -> Vec<NativeSymbol> {
    info.symbols
        .into_iter()
        .filter(|s| s.status == "TRADING" && s.contract_type == "PERPETUAL")
        .map(|s| NativeSymbol::new(s.symbol))
        .collect()
}

fn decode_depth(
    venue: &VenueId,
    symbol: &SymbolDescriptor,
    resp: DepthResponse,
    levels: usize,
) -> Result<DepthSnapshot, FetchError> {
    let bids = levels_from_arrays(&resp.bids, symbol.contract_size)?;
    let asks = levels_from_arrays(&resp.asks, symbol.contract_size)?;
    let ts = millis_to_utc(resp.transaction_time.or(resp.event_time));
    build_snapshot(venue, symbol, ts, bids, asks, levels)
}

#[async_trait::async_trait]
impl VenueAdapter for BinanceAdapter {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn list_symbols(&self) -> Result<Vec<NativeSymbol>, FetchError> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.base_url);
        let info: ExchangeInfo = self.http.get_json(&url, &[]).await?;
        Ok(decode_symbols(info))
    }

    #[instrument(skip(self, symbol), fields(venue = %self.venue, symbol = %symbol.native))]
    async fn fetch_depth(&self, symbol: &SymbolDescriptor, levels: usize) -> Result<DepthSnapshot, FetchError> {
        let url = format!("{}/fapi/v1/depth", self.base_url);
        let query = [("symbol", symbol.native.clone()), ("limit", depth_limit(levels).to_string())];
        let resp: DepthResponse = self.http.get_json(&url, &query).await?;
        decode_depth(&self.venue, symbol, resp, levels)
    }
}
