//! Data layer: core types, wavenumber ranges, and file I/O.
//!
//! Architecture:
//! ```text
//!  .csv (wavenumber, intensity)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Spectrum (ascending axis)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  model    │  Spectrum, Peak, PeakBoundary
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  range    │  validated RangeSet → per-range index segments
//!   └──────────┘
//! ```

pub mod loader;
pub mod model;
pub mod range;
