// Metric engine: per-snapshot metrics and the cross-venue table.
pub mod comparison;     // ComparisonRow + deterministic ordering
pub mod depth_metrics;  // cutoff volumes, ratios, risk tiers
