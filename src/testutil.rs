//! Shared test fixtures and helpers.
//!
//! Snapshot builders, a scripted in-memory `VenueAdapter`, and JSON wire
//! fixtures used by the per-venue decode tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use crate::error::FetchError;
use crate::market_data::adapters::VenueAdapter;
use crate::market_data::types::{CanonicalSymbol, DepthSnapshot, Level, NativeSymbol, SymbolDescriptor, VenueId};

pub(crate) fn sym(s: &str) -> CanonicalSymbol {
    s.parse().unwrap()
}

pub(crate) fn descriptor(canonical: &str, native: &str, contract_size: f64) -> SymbolDescriptor {
    SymbolDescriptor { canonical: sym(canonical), native: native.to_string(), contract_size }
}

pub(crate) fn levels(raw: &[(f64, f64)]) -> Vec<Level> {
    raw.iter().map(|&(p, s)| Level::new(p, s)).collect()
}

/// Valid snapshot from `(price, size)` slices (bids descending, asks ascending).
pub(crate) fn snapshot(venue: &str, symbol: &str, bids: &[(f64, f64)], asks: &[(f64, f64)]) -> DepthSnapshot {
    DepthSnapshot::new(VenueId::from(venue), sym(symbol), Utc::now(), levels(bids), levels(asks)).unwrap()
}

/// What the scripted adapter does on the next `fetch_depth` for a symbol.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Book(Vec<(f64, f64)>, Vec<(f64, f64)>),
    Fail(FetchError),
    /// Never completes.
    Hang,
}

/// In-memory adapter replaying scripted listing and depth responses.
///
/// Depth scripts are keyed by native symbol; an exhausted script answers
/// with a one-level book.
pub(crate) struct ScriptedAdapter {
    venue: VenueId,
    listing: Result<Vec<NativeSymbol>, FetchError>,
    listing_hangs: bool,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    depth_calls: AtomicU32,
}

impl ScriptedAdapter {
    pub(crate) fn new(venue: &str, natives: &[&str]) -> Self {
        Self {
            venue: VenueId::from(venue),
            listing: Ok(natives.iter().map(|n| NativeSymbol::new(*n)).collect()),
            listing_hangs: false,
            scripts: Mutex::new(HashMap::new()),
            depth_calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn failing_listing(venue: &str, error: FetchError) -> Self {
        Self { listing: Err(error), ..Self::new(venue, &[]) }
    }

    /// Listing call that never answers.
    pub(crate) fn hanging_listing(venue: &str) -> Self {
        Self { listing_hangs: true, ..Self::new(venue, &[]) }
    }

    pub(crate) fn script(self, native: &str, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().insert(native.to_string(), steps.into());
        self
    }

    pub(crate) fn depth_calls(&self) -> u32 {
        self.depth_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VenueAdapter for ScriptedAdapter {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    async fn list_symbols(&self) -> Result<Vec<NativeSymbol>, FetchError> {
        if self.listing_hangs {
            futures::future::pending::<()>().await;
        }
        self.listing.clone()
    }

    async fn fetch_depth(&self, symbol: &SymbolDescriptor, levels: usize) -> Result<DepthSnapshot, FetchError> {
        self.depth_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&symbol.native)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Step::Book(vec![(100.0, 1.0)], vec![(101.0, 1.0)]));
        match step {
            Step::Book(bids, asks) => {
                let mut bids = self::levels(&bids);
                let mut asks = self::levels(&asks);
                bids.truncate(levels);
                asks.truncate(levels);
                Ok(DepthSnapshot::new(self.venue.clone(), symbol.canonical.clone(), Utc::now(), bids, asks)?)
            }
            Step::Fail(e) => Err(e),
            Step::Hang => futures::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON wire fixtures
// ---------------------------------------------------------------------------

pub(crate) const BINANCE_EXCHANGE_INFO: &str = r#"{"timezone":"UTC","serverTime":1589436922972,"symbols":[
{"symbol":"BTCUSDT","pair":"BTCUSDT","contractType":"PERPETUAL","status":"TRADING","baseAsset":"BTC","quoteAsset":"USDT"},
{"symbol":"BTCUSDT_250328","pair":"BTCUSDT","contractType":"CURRENT_QUARTER","status":"TRADING","baseAsset":"BTC","quoteAsset":"USDT"},
{"symbol":"ETHUSDT","pair":"ETHUSDT","contractType":"PERPETUAL","status":"TRADING","baseAsset":"ETH","quoteAsset":"USDT"},
{"symbol":"LUNAUSDT","pair":"LUNAUSDT","contractType":"PERPETUAL","status":"SETTLING","baseAsset":"LUNA","quoteAsset":"USDT"}]}"#;

/// Includes a zero-size padding level on the bid side.
pub(crate) const BINANCE_DEPTH: &str = r#"{"lastUpdateId":1027024,"E":1589436922972,"T":1589436922959,
"bids":[["4.00000000","431.00000000"],["3.99000000","10.00000000"],["3.98000000","0.00000000"],["3.97000000","5.00000000"]],
"asks":[["4.00000200","12.00000000"],["4.01000000","3.00000000"]]}"#;

pub(crate) const OKX_INSTRUMENTS: &str = r#"{"code":"0","msg":"","data":[
{"instType":"SWAP","instId":"BTC-USDT-SWAP","ctVal":"0.01","ctValCcy":"BTC","settleCcy":"USDT","state":"live"},
{"instType":"SWAP","instId":"ETH-USDT-SWAP","ctVal":"0.1","ctValCcy":"ETH","settleCcy":"USDT","state":"live"},
{"instType":"SWAP","instId":"OLD-USDT-SWAP","ctVal":"1","ctValCcy":"OLD","settleCcy":"USDT","state":"suspend"}]}"#;

pub(crate) const OKX_BOOKS: &str = r#"{"code":"0","msg":"","data":[{
"asks":[["41006.8","60","0","1"],["41007","10","0","2"]],
"bids":[["41006.3","50","0","2"],["41006.1","0","0","0"],["41005.9","20","0","1"]],
"ts":"1629966436396"}]}"#;

pub(crate) const GATE_CONTRACTS: &str = r#"[
{"name":"BTC_USDT","type":"direct","quanto_multiplier":"0.0001","in_delisting":false},
{"name":"ETH_USDT","type":"direct","quanto_multiplier":"0.01","in_delisting":false},
{"name":"OLD_USDT","type":"direct","quanto_multiplier":"1","in_delisting":true}]"#;

pub(crate) const GATE_ORDER_BOOK: &str = r#"{"id":123456,"current":1623898993.123,"update":1623898993.121,
"asks":[{"p":"1.53","s":100},{"p":"1.54","s":200}],
"bids":[{"p":"1.52","s":100},{"p":"1.51","s":0}]}"#;

pub(crate) const MEXC_CONTRACTS: &str = r#"{"success":true,"code":0,"data":[
{"symbol":"BTC_USDT","baseCoin":"BTC","quoteCoin":"USDT","contractSize":0.0001,"state":0},
{"symbol":"ETH_USDT","baseCoin":"ETH","quoteCoin":"USDT","contractSize":0.01,"state":0},
{"symbol":"OLD_USDT","baseCoin":"OLD","quoteCoin":"USDT","contractSize":1,"state":4}]}"#;

pub(crate) const MEXC_DEPTH: &str = r#"{"success":true,"code":0,"data":{
"asks":[[64001.0,100,1],[64002.0,200,2]],
"bids":[[64000.5,12000,3],[64000.0,0,0],[63999.0,500,1]],
"version":123,"timestamp":1700000000000}}"#;

pub(crate) const BINGX_CONTRACTS: &str = r#"{"code":0,"msg":"","data":[
{"contractId":"100","symbol":"BTC-USDT","size":"0.0001","status":1},
{"contractId":"101","symbol":"ETH-USDT","size":"0.01","status":1},
{"contractId":"102","symbol":"OLD-USDT","size":"1","status":0}]}"#;

/// Asks arrive far-to-near.
pub(crate) const BINGX_DEPTH: &str = r#"{"code":0,"msg":"","data":{"T":1700000000000,
"bids":[["64000","5000"],["63999","10000"]],
"asks":[["64002","3000"],["64001","2000"]],
"bidsCoin":[["64000","0.5"],["63999","1.0"]],
"asksCoin":[["64002","0.3"],["64001","0.2"]]}}"#;

pub(crate) const WEEX_CONTRACTS: &str = r#"[
{"symbol":"cmt_btcusdt","underlying_index":"BTC","quote_currency":"USDT"},
{"symbol":"cmt_ethusdt","underlying_index":"ETH","quote_currency":"USDT"}]"#;

pub(crate) const WEEX_DEPTH: &str = r#"{"asks":[["64000.5","0.75"],["64001.0","1.25"]],
"bids":[["64000.1","2.5"],["63999.9","0"],["63999.0","4"]],
"timestamp":"1700000000000"}"#;

pub(crate) const BYBIT_INSTRUMENTS: &str = r#"{"retCode":0,"retMsg":"OK","result":{"category":"linear","list":[
{"symbol":"BTCUSDT","contractType":"LinearPerpetual","status":"Trading","baseCoin":"BTC","quoteCoin":"USDT"},
{"symbol":"BTC-27JUN25","contractType":"LinearFutures","status":"Trading","baseCoin":"BTC","quoteCoin":"USDC"},
{"symbol":"ETHUSDT","contractType":"LinearPerpetual","status":"Trading","baseCoin":"ETH","quoteCoin":"USDT"},
{"symbol":"NEWUSDT","contractType":"LinearPerpetual","status":"PreLaunch","baseCoin":"NEW","quoteCoin":"USDT"}],
"nextPageCursor":"page2"},"time":1716863719100}"#;

/// Includes a zero-size padding level on the bid side.
pub(crate) const BYBIT_ORDERBOOK: &str = r#"{"retCode":0,"retMsg":"OK","result":{"s":"BTCUSDT",
"b":[["65485.47","47.081"],["65485.10","0"],["65484.90","1.5"]],
"a":[["65485.48","0.443"],["65486.00","2"]],
"ts":1716863719031,"u":5277055,"seq":108157120040},"time":1716863719382}"#;

pub(crate) const BITUNIX_TRADING_PAIRS: &str = r#"{"code":0,"msg":"Success","data":[
{"symbol":"BTCUSDT","base":"BTC","quote":"USDT","symbolStatus":"OPEN"},
{"symbol":"ETHUSDT","base":"ETH","quote":"USDT","symbolStatus":"OPEN"},
{"symbol":"OLDUSDT","base":"OLD","quote":"USDT","symbolStatus":"STOP"}]}"#;

pub(crate) const BITUNIX_DEPTH: &str = r#"{"code":0,"msg":"Success","data":{
"bids":[["64000.5","2"],["64000","3"],["63999","4"]],
"asks":[["64001","1.25"],["64002","5"]]}}"#;

pub(crate) const BLOFIN_INSTRUMENTS: &str = r#"{"code":"0","msg":"success","data":[
{"instId":"BTC-USDT","instType":"SWAP","baseCurrency":"BTC","quoteCurrency":"USDT","contractValue":"0.001","state":"live"},
{"instId":"ETH-USDT","instType":"SWAP","baseCurrency":"ETH","quoteCurrency":"USDT","contractValue":"0.01","state":"live"},
{"instId":"OLD-USDT","instType":"SWAP","baseCurrency":"OLD","quoteCurrency":"USDT","contractValue":"1","state":"suspend"}]}"#;

pub(crate) const BLOFIN_BOOKS: &str = r#"{"code":"0","msg":"success","data":[{
"asks":[["64000.5","800"],["64001","1200"]],
"bids":[["64000.1","1500"],["64000","0"],["63999.5","300"]],
"ts":"1700000000123"}]}"#;
