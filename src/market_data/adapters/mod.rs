// Shared capability interface for venue adapters.
//
// The orchestrator and resolver only ever hold `Arc<dyn VenueAdapter>`; the
// concrete type is picked once from configuration in `build_adapters`.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::config::{Settings, VenueConfig, VenueKind};
use crate::error::{DepthxError, FetchError};
use crate::market_data::types::{DepthSnapshot, Level, NativeSymbol, SymbolDescriptor, VenueId};

pub mod binance;
pub mod bingx;
pub mod bitunix;
pub mod blofin;
pub mod bybit;
pub mod gate;
pub mod mexc;
pub mod okx;
pub mod weex;

#[async_trait::async_trait]
pub trait VenueAdapter: Send + Sync {
    fn venue(&self) -> &VenueId;

    /// Tradable instruments as the venue spells them, with contract sizes.
    async fn list_symbols(&self) -> Result<Vec<NativeSymbol>, FetchError>;

    /// Top `levels` of the book for one symbol, sizes in base-asset units.
    async fn fetch_depth(&self, symbol: &SymbolDescriptor, levels: usize) -> Result<DepthSnapshot, FetchError>;
}

/// One adapter per enabled venue.
pub fn build_adapters(settings: &Settings) -> Result<Vec<Arc<dyn VenueAdapter>>, DepthxError> {
    settings.enabled_venues().map(build_adapter).collect()
}

pub fn build_adapter(config: &VenueConfig) -> Result<Arc<dyn VenueAdapter>, DepthxError> {
    let adapter: Arc<dyn VenueAdapter> = match config.kind {
        VenueKind::Binance => Arc::new(binance::BinanceAdapter::new(config)?),
        VenueKind::Okx => Arc::new(okx::OkxAdapter::new(config)?),
        VenueKind::Gate => Arc::new(gate::GateAdapter::new(config)?),
        VenueKind::Mexc => Arc::new(mexc::MexcAdapter::new(config)?),
        VenueKind::Bingx => Arc::new(bingx::BingxAdapter::new(config)?),
        VenueKind::Weex => Arc::new(weex::WeexAdapter::new(config)?),
        VenueKind::Bybit => Arc::new(bybit::BybitAdapter::new(config)?),
        VenueKind::Bitunix => Arc::new(bitunix::BitunixAdapter::new(config)?),
        VenueKind::Blofin => Arc::new(blofin::BlofinAdapter::new(config)?),
    };
    Ok(adapter)
}

/// Venue clock in milliseconds; falls back to local time when absent or out
/// of range.
pub(crate) fn millis_to_utc(ms: Option<i64>) -> DateTime<Utc> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single()).unwrap_or_else(Utc::now)
}

/// Truncates both sides to `levels` and validates the result.
pub(crate) fn build_snapshot(
    venue: &VenueId,
    symbol: &SymbolDescriptor,
    timestamp: DateTime<Utc>,
    mut bids: Vec<Level>,
    mut asks: Vec<Level>,
    levels: usize,
) -> Result<DepthSnapshot, FetchError> {
    bids.truncate(levels);
    asks.truncate(levels);
    Ok(DepthSnapshot::new(venue.clone(), symbol.canonical.clone(), timestamp, bids, asks)?)
}

/// Some venues list asks far-to-near. Flip them when they arrive descending.
pub(crate) fn asks_ascending(mut asks: Vec<Level>) -> Vec<Level> {
    if let (Some(first), Some(last)) = (asks.first(), asks.last()) {
        if first.price > last.price {
            asks.reverse();
        }
    }
    asks
}
