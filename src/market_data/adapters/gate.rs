// Gate.io USDT-settled futures.
// Source: https://api.gateio.ws/api/v4/futures/usdt/contracts, /api/v4/futures/usdt/order_book

use serde::Deserialize;
use tracing::instrument;

use super::{build_snapshot, millis_to_utc, VenueAdapter};
use crate::config::VenueConfig;
use crate::error::{DepthxError, FetchError};
use crate::market_data::http::HttpClient;
use crate::market_data::normaliser::{levels_from_pairs, RawNumber};
use crate::market_data::types::{DepthSnapshot, NativeSymbol, SymbolDescriptor, VenueId};

const MAX_DEPTH: usize = 300;

#[derive(Debug, Deserialize)]
struct Contract {
    name: String,
    #[serde(default)]
    in_delisting: bool,
    quanto_multiplier: Option<RawNumber>,
}

/// Gate levels are objects rather than arrays.
#[derive(Debug, Deserialize)]
struct GateLevel {
    p: RawNumber,
    s: RawNumber,
}

#[derive(Debug, Deserialize)]
struct OrderBook {
    /// Seconds, with fractional milliseconds.
    current: Option<f64>,
    bids: Vec<GateLevel>,
    asks: Vec<GateLevel>,
}

pub struct GateAdapter {
    venue: VenueId,
    base_url: String,
    http: HttpClient,
}

impl GateAdapter {
    pub fn new(config: &VenueConfig) -> Result<Self, DepthxError> {
        Ok(Self {
            venue: config.id.clone(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            http: HttpClient::new(config.id.clone(), config.timeout())?,
        })
    }
}

fn decode_contracts(contracts: Vec<Contract>) -> Result<Vec<NativeSymbol>, FetchError> {
    contracts
        .into_iter()
        .filter(|c| !c.in_delisting)
        .map(|c| {
            let multiplier = match &c.quanto_multiplier {
                Some(m) => m.value()?,
                None => 1.0,
            };
            // Some inverse-style contracts report 0; keep sizes as-is there.
            let multiplier = if multiplier > 0.0 { multiplier } else { 1.0 };
            Ok(NativeSymbol::new(c.name).with_contract_size(multiplier))
        })
        .collect()
}

fn side(levels: &[GateLevel]) -> Result<Vec<(f64, f64)>, FetchError> {
    levels.iter().map(|l| Ok((l.p.value()?, l.s.value()?))).collect()
}

fn decode_book(
    venue: &VenueId,
    symbol: &SymbolDescriptor,
    book: OrderBook,
    levels: usize,
) -> Result<DepthSnapshot, FetchError> {
    let bids = levels_from_pairs(&side(&book.bids)?, symbol.contract_size);
    let asks = levels_from_pairs(&side(&book.asks)?, symbol.contract_size);
    let ts = book.current.map(|secs| (secs * 1000.0).round() as i64);
    build_snapshot(venue, symbol, millis_to_utc(ts), bids, asks, levels)
}

#[async_trait::async_trait]
impl VenueAdapter for GateAdapter {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn list_symbols(&self) -> Result<Vec<NativeSymbol>, FetchError> {
        let url = format!("{}/api/v4/futures/usdt/contracts", self.base_url);
        let contracts: Vec<Contract> = self.http.get_json(&url, &[]).await?;
        decode_contracts(contracts)
    }

    #[instrument(skip(self, symbol), fields(venue = %self.venue, symbol = %symbol.native))]
    async fn fetch_depth(&self, symbol: &SymbolDescriptor, levels: usize) -> Result<DepthSnapshot, FetchError> {
        let url = format!("{}/api/v4/futures/usdt/order_book", self.base_url);
        let query = [("contract", symbol.native.clone()), ("limit", levels.min(MAX_DEPTH).to_string())];
        let book: OrderBook = self.http.get_json(&url, &query).await?;
        decode_book(&self.venue, symbol, book, levels)
    }
}
