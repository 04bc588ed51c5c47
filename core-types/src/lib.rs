//! Shared entities, canonical key encoders, and the transaction wire format
//! for the state-transition core: PKID/public-key aliases, the per-entity
//! store records, and the typed error enum every connect/disconnect
//! handler returns.

pub mod entries;
pub mod errors;
pub mod extra_data;
pub mod keys;
pub mod pkid;
pub mod wire;

pub use core_hashes::Hash;
pub use errors::{CoreError, CoreResult};
pub use extra_data::ExtraData;
pub use pkid::{Pkid, PublicKey, PUBLIC_KEY_LENGTH};
