// PostgreSQL plumbing shared by the pool and transaction handles:
// - config: validated pool construction
// - params: `RowValues` -> tokio-postgres argument conversion

pub mod config;
pub mod params;

pub use config::create_pool;
pub use params::Params;
