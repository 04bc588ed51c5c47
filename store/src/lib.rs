pub mod cache;
pub mod checksum;
pub mod db;
pub mod errors;

pub use checksum::Checksum;
pub use db::{Batch, Database, ALL_COLUMN_FAMILIES};
pub use errors::{StoreError, StoreResult};
