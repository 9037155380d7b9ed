pub mod config;
pub mod error;
pub mod models;
pub mod replace;

mod memory;
pub use memory::MemoryStore;

pub use config::{DatasetConfig, ReplacePolicy};
pub use error::{ReplaceError, StoreError};
pub use models::{
    decode_items, AnnualOccurrence, Cell, Record, Row, TableKind, UsedHoliday, UsedSubHoliday,
    UserDataset, WeekendSubHoliday,
};
pub use replace::{Extent, ReplaceEngine, ReplaceSummary, SaveReport, TableFailure, TableStore};
