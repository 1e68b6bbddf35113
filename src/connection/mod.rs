//! Session layer: roles, lifecycle state, and the read/write engines
//! behind the public [`WebSocket`] type.

pub mod role;
pub mod state;
pub mod websocket;

pub(crate) mod reader;
pub(crate) mod shared;
pub(crate) mod writer;

pub use reader::ControlObserver;
pub use role::Role;
pub use state::ConnectionState;
pub use websocket::{Receiver, Sender, WebSocket};
