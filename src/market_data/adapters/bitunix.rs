// Bitunix USDT-margined futures.
// Source: https://fapi.bitunix.com/api/v1/futures/market/trading_pairs, /api/v1/futures/market/depth

use serde::Deserialize;
use tracing::instrument;

use super::{build_snapshot, millis_to_utc, VenueAdapter};
use crate::config::VenueConfig;
use crate::error::{DepthxError, FetchError};
use crate::market_data::http::HttpClient;
use crate::market_data::normaliser::{levels_from_arrays, RawLevel};
use crate::market_data::types::{DepthSnapshot, NativeSymbol, SymbolDescriptor, VenueId};

/// Fixed `limit` values the depth endpoint accepts; anything larger is "max".
const DEPTH_LIMITS: [usize; 4] = [1, 5, 15, 50];

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, FetchError> {
        match (self.code, self.data) {
            (0, Some(data)) => Ok(data),
            (0, None) => Err(FetchError::malformed("code 0 without data")),
            (code, _) => Err(FetchError::api(code, self.msg)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradingPair {
    symbol: String,
    #[serde(default)]
    symbol_status: String,
}

/// Sizes are in base-asset units; the response carries no book timestamp.
#[derive(Debug, Deserialize)]
struct Depth {
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
}

pub struct BitunixAdapter {
    venue: VenueId,
    base_url: String,
    http: HttpClient,
}

impl BitunixAdapter {
    pub fn new(config: &VenueConfig) -> Result<Self, DepthxError> {
        Ok(Self {
            venue: config.id.clone(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            http: HttpClient::new(config.id.clone(), config.timeout())?,
        })
    }
}

fn depth_limit(levels: usize) -> String {
    DEPTH_LIMITS
        .iter()
        .find(|&&l| l >= levels)
        .map_or_else(|| "max".to_string(), |l| l.to_string())
}

fn decode_pairs(env: Envelope<Vec<TradingPair>>) -> Result<Vec<NativeSymbol>, FetchError> {
    Ok(env
        .into_data()?
        .into_iter()
        .filter(|p| p.symbol_status == "OPEN")
        .map(|p| NativeSymbol::new(p.symbol))
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
    build_snapshot(venue, symbol, millis_to_utc(None), bids, asks, levels)
}

#[async_trait::async_trait]
impl VenueAdapter for BitunixAdapter {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn list_symbols(&self) -> Result<Vec<NativeSymbol>, FetchError> {
        let url = format!("{}/api/v1/futures/market/trading_pairs", self.base_url);
        let env: Envelope<Vec<TradingPair>> = self.http.get_json(&url, &[]).await?;
        decode_pairs(env)
    }

    #[instrument(skip(self, symbol), fields(venue = %self.venue, symbol = %symbol.native))]
    async fn fetch_depth(&self, symbol: &SymbolDescriptor, levels: usize) -> Result<DepthSnapshot, FetchError> {
        let url = format!("{}/api/v1/futures/market/depth", self.base_url);
        let query = [("symbol", symbol.native.clone()), ("limit", depth_limit(levels))];
        let env: Envelope<Depth> = self.http.get_json(&url, &query).await?;
        decode_depth(&self.venue, symbol, env, levels)
    }
}
