// Market data module entrypoint
pub mod adapters;    // venue-specific REST fetchers behind VenueAdapter
pub mod collector;   // fans depth fetches out across venues and symbols
pub mod http;        // shared reqwest transport + status classification
pub mod normaliser;  // native symbol spelling and wire numbers -> canonical
pub mod resolver;    // per-venue symbol discovery -> SymbolUniverse
pub mod types;       // canonical model: symbols, levels, DepthSnapshot
