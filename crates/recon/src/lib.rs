//! `folio-recon`: structural reconciliation between two versions of a document.
//!
//! Pure engine crate: receives pre-loaded element collections, returns
//! resolution records, duplicate groups and placement decisions. No CLI or
//! file IO; the tree-mutation layer applies the results.

pub mod config;
pub mod context;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod loader;
pub mod model;
pub mod placement;
pub mod resolver;
pub mod scorer;
pub mod signature;

pub use config::ReconConfig;
pub use context::ReconciliationContext;
pub use engine::run;
pub use error::ReconError;
pub use model::{Document, ReconInput, ReconResult};
