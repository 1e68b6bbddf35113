//! Protocol extensions. Currently permessage-deflate (RFC 7692).

pub mod deflate;

pub use deflate::{Deflater, DeflateConfig, Inflater};
