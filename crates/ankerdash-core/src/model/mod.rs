// ── Dashboard domain model ──
//
// Typed views of what the printer reports. Raw envelopes come from the
// codec; these types are what the presenter and the CLI consume.

pub mod telemetry;

// ── Re-exports ──────────────────────────────────────────────────────

pub use telemetry::{
    LayerInfo, PrintSpeed, PrintStatus, Telemetry, Temperature, from_centi, format_hms,
};
