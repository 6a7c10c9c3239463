// WEEX USDT perpetual contracts.
// Source: https://api-contract.weex.com/capi/v2/market/contracts, /capi/v2/market/depth

use serde::Deserialize;
use tracing::instrument;

use super::{build_snapshot, millis_to_utc, VenueAdapter};
use crate::config::VenueConfig;
use crate::error::{DepthxError, FetchError};
use crate::market_data::http::HttpClient;
use crate::market_data::normaliser::{levels_from_arrays, RawLevel, RawNumber};
use crate::market_data::types::{DepthSnapshot, NativeSymbol, SymbolDescriptor, VenueId};

const MAX_DEPTH: usize = 200;

#[derive(Debug, Deserialize)]
struct Contract {
    symbol: String,
}

/// Depth sizes are already in base-asset units.
#[derive(Debug, Deserialize)]
struct Depth {
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
    timestamp: Option<RawNumber>,
}

pub struct WeexAdapter {
    venue: VenueId,
    base_url: String,
    http: HttpClient,
}

impl WeexAdapter {
    pub fn new(config: &VenueConfig) -> Result<Self, DepthxError> {
        Ok(Self {
            venue: config.id.clone(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            http: HttpClient::new(config.id.clone(), config.timeout())?,
        })
    }
}

fn decode_contracts(contracts: Vec<Contract>) -> Vec<NativeSymbol> {
    contracts.into_iter().map(|c| NativeSymbol::new(c.symbol)).collect()
}

fn decode_depth(
    venue: &VenueId,
    symbol: &SymbolDescriptor,
    depth: Depth,
    levels: usize,
) -> Result<DepthSnapshot, FetchError> {
    let bids = levels_from_arrays(&depth.bids, symbol.contract_size)?;
    let asks = levels_from_arrays(&depth.asks, symbol.contract_size)?;
    let ts = match &depth.timestamp {
        Some(ts) => Some(ts.value()? as i64),
        None => None,
    };
    build_snapshot(venue, symbol, millis_to_utc(ts), bids, asks, levels)
}

#[async_trait::async_trait]
impl VenueAdapter for WeexAdapter {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn list_symbols(&self) -> Result<Vec<NativeSymbol>, FetchError> {
        let url = format!("{}/capi/v2/market/contracts", self.base_url);
        let contracts: Vec<Contract> = self.http.get_json(&url, &[]).await?;
        Ok(decode_contracts(contracts))
    }

    #[instrument(skip(self, symbol), fields(venue = %self.venue, symbol = %symbol.native))]
    async fn fetch_depth(&self, symbol: &SymbolDescriptor, levels: usize) -> Result<DepthSnapshot, FetchError> {
        let url = format!("{}/capi/v2/market/depth", self.base_url);
        let query = [("symbol", symbol.native.clone()), ("limit", levels.min(MAX_DEPTH).to_string())];
        let depth: Depth = self.http.get_json(&url, &query).await?;
        decode_depth(&self.venue, symbol, depth, levels)
    }
}
