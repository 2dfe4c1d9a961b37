pub mod algorithm;
pub mod error;
pub mod hashing;
pub mod localize;
pub mod path_safety;
pub mod record;
pub mod search;
pub mod store;
pub mod verify;

pub use error::{Result, SignatureError};
