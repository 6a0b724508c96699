//! Provider adapters for the upstream vehicle telemetry services.
//!
//! Each adapter implements [`VehicleProvider`](crate::provider::VehicleProvider)
//! and hides its upstream quirks behind the shared snapshot model:
//!
//! | Adapter | Auth | Wire format |
//! |---------|------|-------------|
//! | [`TessieProvider`] | Bearer token header | Nested, typed JSON |
//! | [`TeslafiProvider`] | Token in query string | Flat JSON, values as strings |
//!
//! Both adapters run against the live API when given a real transport and
//! fall back to deterministic seed-derived data behind a mock transport,
//! always through the same normalizers.

pub mod tessie;
pub mod teslafi;

pub use tessie::TessieProvider;
pub use teslafi::TeslafiProvider;
