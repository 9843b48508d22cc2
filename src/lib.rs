pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::AppConfig;

pub use adapters::{LocalStorage, MemoryStorage};
pub use core::{dataset::Dataset, ledger::Ledger, service::EmissionService, timeline::Timeline};
pub use utils::error::{EmissionError, Result};
