//! # wscore - WebSocket Protocol Engine
//!
//! `wscore` is a message-oriented, RFC 6455 compliant WebSocket protocol
//! engine for Rust. It operates on an already-upgraded transport: the HTTP
//! handshake happens outside this crate, which then takes over the raw
//! byte stream (plus any leftover bytes the handshake layer over-read).
//!
//! ## Features
//!
//! - **Message-oriented API** with transparent fragmentation and reassembly
//! - **Full RFC 6455 compliance** with strict validation and masking
//! - **permessage-deflate** (RFC 7692) with per-direction window and
//!   context-takeover parameters
//! - **Incremental delivery** via bounded partial reads of large messages
//! - **Split halves** for one concurrent read alongside one concurrent write
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wscore::{WebSocket, Options, Role, MessageKind};
//!
//! let mut ws = WebSocket::new(stream, Role::Client, Options::default());
//! ws.write(b"hello").await?;
//!
//! let mut payload = Vec::new();
//! let kind = ws.read(&mut payload).await?;
//! assert_eq!(kind, MessageKind::Binary);
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod extensions;
pub mod message;
pub mod protocol;

pub use config::Options;
pub use connection::{ConnectionState, ControlObserver, Receiver, Role, Sender, WebSocket};
pub use error::{Error, Result};
pub use extensions::DeflateConfig;
pub use message::{CloseCode, CloseFrame, ControlKind, MessageKind};
pub use protocol::OpCode;
