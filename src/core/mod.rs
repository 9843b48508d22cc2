pub mod accounting;
pub mod aggregation;
pub mod dataset;
pub mod ledger;
pub mod service;
pub mod timeline;
pub mod views;

pub use crate::domain::model::{
    NewModification, NewSource, ReductionModification, ReductionStrategy, Report, Source,
    SourceOwner, SourceScope, Year,
};
pub use crate::domain::ports::{ConfigProvider, Storage};
pub use crate::utils::error::Result;
