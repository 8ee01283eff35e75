//! Pure decoding logic for the upstream subscription frame. No I/O: the
//! actual subscription and chain-specific recovery are outbound ports,
//! implemented by adapters in `node-runtime`.

mod decode;
mod value_objects;

pub use decode::decode_frame;
pub use value_objects::StreamConfig;
