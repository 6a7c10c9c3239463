// BingX perpetual swaps.
// Source: https://open-api.bingx.com/openApi/swap/v2/quote/contracts, /openApi/swap/v2/quote/depth

use serde::Deserialize;
use tracing::instrument;

use super::{asks_ascending, build_snapshot, millis_to_utc, VenueAdapter};
use crate::config::VenueConfig;
use crate::error::{DepthxError, FetchError};
use crate::market_data::http::HttpClient;
use crate::market_data::normaliser::{levels_from_arrays, RawLevel, RawNumber};
use crate::market_data::types::{DepthSnapshot, NativeSymbol, SymbolDescriptor, VenueId};

const DEPTH_LIMITS: [usize; 7] = [5, 10, 20, 50, 100, 500, 1000];
const RATE_LIMIT_CODE: i64 = 100410;

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
            (RATE_LIMIT_CODE, _) => Err(FetchError::rate_limited(self.msg)),
            (code, _) => Err(FetchError::api(code, self.msg)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Contract {
    symbol: String,
    /// Base-asset units per contract.
    size: Option<RawNumber>,
    /// 1 = online.
    #[serde(default)]
    status: i64,
}

/// `bids`/`asks` are in contracts; `bidsCoin`/`asksCoin`, when present,
/// carry the same levels already in base-asset units.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Depth {
    #[serde(rename = "T")]
    time: Option<i64>,
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
    bids_coin: Option<Vec<RawLevel>>,
    asks_coin: Option<Vec<RawLevel>>,
}

pub struct BingxAdapter {
    venue: VenueId,
    base_url: String,
    http: HttpClient,
}

impl BingxAdapter {
    pub fn new(config: &VenueConfig) -> Result<Self, DepthxError> {
        Ok(Self {
            venue: config.id.clone(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            http: HttpClient::new(config.id.clone(), config.timeout())?,
        })
    }
}

fn depth_limit(levels: usize) -> usize {
    DEPTH_LIMITS.iter().copied().find(|&l| l >= levels).unwrap_or(1000)
}

fn decode_contracts(env: Envelope<Vec<Contract>>) -> Result<Vec<NativeSymbol>, FetchError> {
    env.into_data()?
        .into_iter()
        .filter(|c| c.status == 1)
        .map(|c| {
            let contract_size = match &c.size {
                Some(size) => size.value()?,
                None => 1.0,
            };
            Ok(NativeSymbol::new(c.symbol).with_contract_size(contract_size))
        })
        .collect()
}

fn decode_depth(
    venue: &VenueId,
    symbol: &SymbolDescriptor,
    env: Envelope<Depth>,
    levels: usize,
) -> Result<DepthSnapshot, FetchError> {
    let depth = env.into_data()?;
    let (bids, asks) = match (&depth.bids_coin, &depth.asks_coin) {
        (Some(bids), Some(asks)) => (levels_from_arrays(bids, 1.0)?, levels_from_arrays(asks, 1.0)?),
        _ => (
            levels_from_arrays(&depth.bids, symbol.contract_size)?,
            levels_from_arrays(&depth.asks, symbol.contract_size)?,
        ),
    };
    build_snapshot(venue, symbol, millis_to_utc(depth.time), bids, asks_ascending(asks), levels)
}

#[async_trait::async_trait]
impl VenueAdapter for BingxAdapter {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn list_symbols(&self) -> Result<Vec<NativeSymbol>, FetchError> {
        let url = format!("{}/openApi/swap/v2/quote/contracts", self.base_url);
        let env: Envelope<Vec<Contract>> = self.http.get_json(&url, &[]).await?;
        decode_contracts(env)
    }

    #[instrument(skip(self, symbol), fields(venue = %self.venue, symbol = %symbol.native))]
    async fn fetch_depth(&self, symbol: &SymbolDescriptor, levels: usize) -> Result<DepthSnapshot, FetchError> {
        let url = format!("{}/openApi/swap/v2/quote/depth", self.base_url);
        let query = [("symbol", symbol.native.clone()), ("limit", depth_limit(levels).to_string())];
        let env: Envelope<Depth> = self.http.get_json(&url, &query).await?;
        decode_depth(&self.venue, symbol, env, levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::http::decode;
    use crate::testutil::{descriptor, BINGX_CONTRACTS, BINGX_DEPTH};

    #[test]
    fn test_lists_online_contracts_with_size() {
        let env: Envelope<Vec<Contract>> = decode(BINGX_CONTRACTS).unwrap();
        let symbols = decode_contracts(env).unwrap();
        let natives: Vec<&str> = symbols.iter().map(|s| s.native.as_str()).collect();
        assert_eq!(natives, vec!["BTC-USDT", "ETH-USDT"]);
        assert_eq!(symbols[0].contract_size, 0.0001);
        assert_eq!(symbols[1].contract_size, 0.01);
    }

    #[test]
    fn test_contract_levels_agree_with_coin_levels() {
        // The fixture's contract-denominated side times the listed size equals
        // its coin-denominated side.
        let contracts: Envelope<Vec<Contract>> = decode(BINGX_CONTRACTS).unwrap();
        let btc = decode_contracts(contracts).unwrap().remove(0);
        let mut depth: Envelope<Depth> = decode(BINGX_DEPTH).unwrap();
        if let Some(d) = depth.data.as_mut() {
            d.bids_coin = None;
            d.asks_coin = None;
        }
        let snap = decode_depth(&VenueId::from("bingx"), &descriptor("BTC/USDT", "BTC-USDT", btc.contract_size), depth, 20)
            .unwrap();
        assert!((snap.best_bid().unwrap().size - 0.5).abs() < 1e-12);
        assert!((snap.best_ask().unwrap().size - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_prefers_coin_levels_and_orders_asks() {
        let env: Envelope<Depth> = decode(BINGX_DEPTH).unwrap();
        let snap = decode_depth(&VenueId::from("bingx"), &descriptor("BTC/USDT", "BTC-USDT", 1.0), env, 20).unwrap();
        assert_eq!(snap.best_bid().unwrap(), crate::market_data::types::Level::new(64000.0, 0.5));
        assert_eq!(snap.best_ask().unwrap().price, 64001.0);
        assert_eq!(snap.asks().len(), 2);
    }

    #[test]
    fn test_falls_back_to_contract_levels() {
        let body = r#"{"code":0,"msg":"","data":{"T":1,"bids":[["10","3"]],"asks":[["11","4"]]}}"#;
        let env: Envelope<Depth> = decode(body).unwrap();
        let snap = decode_depth(&VenueId::from("bingx"), &descriptor("BTC/USDT", "BTC-USDT", 2.0), env, 5).unwrap();
        assert_eq!(snap.best_bid().unwrap().size, 6.0);
        assert_eq!(snap.best_ask().unwrap().size, 8.0);
    }

    #[test]
    fn test_rate_limit_code() {
        let env: Envelope<Depth> = decode(r#"{"code":100410,"msg":"rate limited"}"#).unwrap();
        assert!(matches!(env.into_data(), Err(FetchError::VenueRateLimited { .. })));
    }
}
