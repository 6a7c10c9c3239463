// Bybit USDT/USDC linear perpetuals.
// Source: https://api.bybit.com/v5/market/instruments-info?category=linear, /v5/market/orderbook

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{build_snapshot, millis_to_utc, VenueAdapter};
use crate::config::VenueConfig;
use crate::error::{DepthxError, FetchError};
use crate::market_data::http::HttpClient;
use crate::market_data::normaliser::{levels_from_arrays, RawLevel};
use crate::market_data::types::{DepthSnapshot, NativeSymbol, SymbolDescriptor, VenueId};

const CATEGORY: &str = "linear";
const MAX_DEPTH: usize = 500;
const PAGE_SIZE: usize = 1000;
/// Upper bound on instrument pages followed in one listing.
const MAX_PAGES: usize = 20;
/// "Too many visits" in the v5 envelope.
const RATE_LIMIT_CODE: i64 = 10006;

/// `{"retCode": 0, "retMsg": "OK", "result": {...}}`. Errors carry an empty
/// `result` object, so result fields default.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, FetchError> {
        match (self.ret_code, self.result) {
            (0, Some(result)) => Ok(result),
            (0, None) => Err(FetchError::malformed("retCode 0 without result")),
            (RATE_LIMIT_CODE, _) => Err(FetchError::rate_limited(self.ret_msg)),
            (code, _) => Err(FetchError::api(code, self.ret_msg)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentPage {
    #[serde(default)]
    list: Vec<Instrument>,
    #[serde(default)]
    next_page_cursor: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instrument {
    symbol: String,
    status: String,
    #[serde(default)]
    contract_type: String,
}

#[derive(Debug, Deserialize)]
struct OrderBook {
    #[serde(default)]
    b: Vec<RawLevel>,
    #[serde(default)]
    a: Vec<RawLevel>,
    ts: Option<i64>,
}

pub struct BybitAdapter {
    venue: VenueId,
    base_url: String,
    http: HttpClient,
}

impl BybitAdapter {
    pub fn new(config: &VenueConfig) -> Result<Self, DepthxError> {
        Ok(Self {
            venue: config.id.clone(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            http: HttpClient::new(config.id.clone(), config.timeout())?,
        })
    }
}

/// Trading perpetuals on one page, plus the cursor of the next page if any.
fn decode_page(env: Envelope<InstrumentPage>) -> Result<(Vec<NativeSymbol>, Option<String>), FetchError> {
    let page = env.into_result()?;
    let symbols = page
        .list
        .into_iter()
        .filter(|i| i.status == "Trading" && i.contract_type == "LinearPerpetual")
        .map(|i| NativeSymbol::new(i.symbol))
        .collect();
    let next = Some(page.next_page_cursor).filter(|c| !c.is_empty());
    Ok((symbols, next))
}

fn decode_book(
    venue: &VenueId,
    symbol: &SymbolDescriptor,
    env: Envelope<OrderBook>,
    levels: usize,
) -> Result<DepthSnapshot, FetchError> {
    let book = env.into_result()?;
    let bids = levels_from_arrays(&book.b, symbol.contract_size)?;
    let asks = levels_from_arrays(&book.a, symbol.contract_size)?;
    build_snapshot(venue, symbol, millis_to_utc(book.ts), bids, asks, levels)
}

#[async_trait::async_trait]
impl VenueAdapter for BybitAdapter {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn list_symbols(&self) -> Result<Vec<NativeSymbol>, FetchError> {
        let url = format!("{}/v5/market/instruments-info", self.base_url);
        let mut symbols = Vec::new();
        let mut cursor: Option<String> = None;
        for page in 1..=MAX_PAGES {
            let mut query = vec![("category", CATEGORY.to_string()), ("limit", PAGE_SIZE.to_string())];
            if let Some(cursor) = &cursor {
                query.push(("cursor", cursor.clone()));
            }
            let env: Envelope<InstrumentPage> = self.http.get_json(&url, &query).await?;
            let (listed, next) = decode_page(env)?;
            symbols.extend(listed);
            match next {
                Some(next) => cursor = Some(next),
                None => return Ok(symbols),
            }
            debug!(page, "following instrument cursor");
        }
        Err(FetchError::malformed(format!("instrument listing exceeded {MAX_PAGES} pages")))
    }

    #[instrument(skip(self, symbol), fields(venue = %self.venue, symbol = %symbol.native))]
    async fn fetch_depth(&self, symbol: &SymbolDescriptor, levels: usize) -> Result<DepthSnapshot, FetchError> {
        let url = format!("{}/v5/market/orderbook", self.base_url);
        let query = [
            ("category", CATEGORY.to_string()),
            ("symbol", symbol.native.clone()),
            ("limit", levels.min(MAX_DEPTH).to_string()),
        ];
        let env: Envelope<OrderBook> = self.http.get_json(&url, &query).await?;
        decode_book(&self.venue, symbol, env, levels)
    }
}
