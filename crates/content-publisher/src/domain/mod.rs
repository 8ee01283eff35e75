//! Content addressing: the one hash primitive used for every blob the
//! pipeline stores (§4.2, §6).

mod hashing;

pub use hashing::content_address;
