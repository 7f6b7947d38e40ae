mod framing;
mod transport;

pub use framing::LineFramer;
pub use transport::{Transport, TransportHandler, TransportSettings};
