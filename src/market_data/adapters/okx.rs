// OKX perpetual swaps.
// Source: https://www.okx.com/api/v5/public/instruments?instType=SWAP, /api/v5/market/books

use serde::Deserialize;
use tracing::instrument;

use super::{build_snapshot, millis_to_utc, VenueAdapter};
use crate::config::VenueConfig;
use crate::error::{DepthxError, FetchError};
use crate::market_data::http::HttpClient;
use crate::market_data::normaliser::{levels_from_arrays, RawLevel, RawNumber};
use crate::market_data::types::{DepthSnapshot, NativeSymbol, SymbolDescriptor, VenueId};

const MAX_DEPTH: usize = 400;
/// "Too many requests" in the OKX envelope.
const RATE_LIMIT_CODE: &str = "50011";

/// Every v5 response: `{"code": "0", "msg": "", "data": [...]}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<Vec<T>, FetchError> {
        match self.code.as_str() {
            "0" => Ok(self.data),
            RATE_LIMIT_CODE => Err(FetchError::rate_limited(self.msg)),
            _ => Err(FetchError::api(self.code, self.msg)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instrument {
    inst_id: String,
    state: String,
    ct_val: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
struct Book {
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
    ts: Option<RawNumber>,
}

pub struct OkxAdapter {
    venue: VenueId,
    base_url: String,
    http: HttpClient,
}

impl OkxAdapter {
    pub fn new(config: &VenueConfig) -> Result<Self, DepthxError> {
        Ok(Self {
            venue: config.id.clone(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            http: HttpClient::new(config.id.clone(), config.timeout())?,
        })
    }
}

fn decode_instruments(env: Envelope<Instrument>) -> Result<Vec<NativeSymbol>, FetchError> {
    env.into_data()?
        .into_iter()
        .filter(|i| i.state == "live")
        .map(|i| {
            // ctVal is base units per contract; swaps book sizes in contracts.
            let contract_size = match &i.ct_val {
                Some(v) => v.value()?,
                None => 1.0,
            };
            Ok(NativeSymbol::new(i.inst_id).with_contract_size(contract_size))
        })
        .collect()
}

fn decode_book(
    venue: &VenueId,
    symbol: &SymbolDescriptor,
    env: Envelope<Book>,
    levels: usize,
) -> Result<DepthSnapshot, FetchError> {
    let book = env
        .into_data()?
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::malformed("books response has empty data"))?;
    let bids = levels_from_arrays(&book.bids, symbol.contract_size)?;
    let asks = levels_from_arrays(&book.asks, symbol.contract_size)?;
    let ts = match &book.ts {
        Some(ts) => Some(ts.value()? as i64),
        None => None,
    };
    build_snapshot(venue, symbol, millis_to_utc(ts), bids, asks, levels)
}

#[async_trait::async_trait]
impl VenueAdapter for OkxAdapter {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn list_symbols(&self) -> Result<Vec<NativeSymbol>, FetchError> {
        let url = format!("{}/api/v5/public/instruments", self.base_url);
        let env: Envelope<Instrument> = self.http.get_json(&url, &[("instType", "SWAP".to_string())]).await?;
        decode_instruments(env)
    }

    #[instrument(skip(self, symbol), fields(venue = %self.venue, symbol = %symbol.native))]
    async fn fetch_depth(&self, symbol: &SymbolDescriptor, levels: usize) -> Result<DepthSnapshot, FetchError> {
        let url = format!("{}/api/v5/market/books", self.base_url);
        let query = [("instId", symbol.native.clone()), ("sz", levels.min(MAX_DEPTH).to_string())];
        let env: Envelope<Book> = self.http.get_json(&url, &query).await?;
        decode_book(&self.venue, symbol, env, levels)
    }
}
