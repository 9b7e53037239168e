pub mod config;
pub mod crypto;
pub mod pki;
pub mod telemetry;
pub mod xmldsig;
