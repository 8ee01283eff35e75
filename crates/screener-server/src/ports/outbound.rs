//! Outbound ports. Resolving a historical CID to bytes is the one capability
//! this crate needs from the object store; it depends on `content-publisher`'s
//! [`content_publisher::ObjectStore`] trait directly rather than redeclaring
//! it, the same way `gap-backfiller` reuses `stream-consumer`'s codec port.

pub use content_publisher::ObjectStore;
