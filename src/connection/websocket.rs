//! The public session surface: [`WebSocket`] and its split halves.
//!
//! Construction consumes an already-upgraded transport plus the negotiated
//! role, optional permessage-deflate parameters, and any leftover bytes the
//! handshake layer read past the upgrade response. [`WebSocket::split`]
//! yields one [`Sender`] and one [`Receiver`] for one concurrent read
//! alongside one concurrent write.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::Options;
use crate::connection::reader::ReadCore;
use crate::connection::shared::Shared;
use crate::connection::writer::WriteCore;
use crate::connection::{ConnectionState, Role};
use crate::error::Result;
use crate::extensions::{DeflateConfig, Deflater, Inflater};
use crate::message::{CloseFrame, ControlKind, MessageKind};
use crate::protocol::OpCode;

/// The write half: data messages, pings, pongs, and close initiation.
///
/// All operations queue on the shared write token, so they may also be
/// called while the [`Receiver`] is mid-read without interleaving frames.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T: AsyncWrite + Unpin> Sender<T> {
    /// Send a whole message. Its kind (text or binary) comes from the
    /// session options.
    pub async fn write(&self, payload: &[u8]) -> Result<()> {
        self.shared.send_data(true, payload).await
    }

    /// Send one message fragment; `fin` marks the last fragment.
    pub async fn write_some(&self, fin: bool, payload: &[u8]) -> Result<()> {
        self.shared.send_data(fin, payload).await
    }

    /// Send a ping frame (payload at most 125 bytes).
    pub async fn ping(&self, payload: &[u8]) -> Result<()> {
        self.shared.send_control(OpCode::Ping, payload).await
    }

    /// Send an unsolicited pong frame (payload at most 125 bytes).
    pub async fn pong(&self, payload: &[u8]) -> Result<()> {
        self.shared.send_control(OpCode::Pong, payload).await
    }

    /// Initiate the close handshake.
    ///
    /// Reserved close codes are rejected before any I/O. After this
    /// succeeds, further sends return [`Error::Aborted`](crate::Error::Aborted);
    /// keep reading until the peer's close arrives.
    pub async fn close(&self, frame: Option<CloseFrame>) -> Result<()> {
        self.shared.send_close(frame).await
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.status()
    }
}

/// The read half. Exactly one exists per session; its operations take
/// `&mut self`, so at most one read is in flight.
pub struct Receiver<T> {
    core: ReadCore<T>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Receiver<T> {
    /// Read the next whole message, appending its payload to `dest`.
    ///
    /// Control frames received along the way are handled in place. A close
    /// frame completes the read with
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed).
    pub async fn read(&mut self, dest: &mut Vec<u8>) -> Result<MessageKind> {
        self.core.read(dest).await
    }

    /// Read up to `limit` bytes of the current message into `dest`,
    /// returning the number appended.
    ///
    /// Completion is reported as `Ok(0)` exactly once, after the last
    /// bytes of the message have been delivered; the call after that
    /// starts the next message. [`message_kind`](Self::message_kind)
    /// reports the kind of the message in progress.
    pub async fn read_some(&mut self, dest: &mut Vec<u8>, limit: usize) -> Result<usize> {
        self.core.read_some(dest, limit).await
    }

    /// Kind of the message currently being received, if any.
    #[must_use]
    pub fn message_kind(&self) -> Option<MessageKind> {
        self.core.message_kind()
    }

    /// True when no partially-delivered message is outstanding.
    #[must_use]
    pub fn is_message_complete(&self) -> bool {
        self.core.is_message_complete()
    }

    /// The peer's close frame, once the close handshake has completed.
    #[must_use]
    pub fn peer_close(&self) -> Option<CloseFrame> {
        self.core.shared().lock_state(|state| state.peer_close.clone())
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.core.shared().status()
    }

    /// Install a callback invoked for every incoming control frame, before
    /// any automatic response is sent.
    pub fn set_control_observer<F>(&mut self, observer: F)
    where
        F: FnMut(ControlKind, &[u8]) + Send + 'static,
    {
        self.core.set_observer(Some(Box::new(observer)));
    }

    /// Remove the control observer.
    pub fn clear_control_observer(&mut self) {
        self.core.set_observer(None);
    }
}

/// A message-oriented WebSocket session over any async transport.
pub struct WebSocket<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> WebSocket<T> {
    /// Create a session over an already-upgraded transport.
    #[must_use]
    pub fn new(io: T, role: Role, options: Options) -> Self {
        Self::build(io, role, options, None, &[])
    }

    /// Create a session with negotiated permessage-deflate parameters.
    #[must_use]
    pub fn with_deflate(io: T, role: Role, options: Options, deflate: DeflateConfig) -> Self {
        Self::build(io, role, options, Some(deflate), &[])
    }

    /// Create a session, seeding the read buffer with bytes the handshake
    /// layer already consumed from the wire.
    #[must_use]
    pub fn with_leftover(
        io: T,
        role: Role,
        options: Options,
        deflate: Option<DeflateConfig>,
        leftover: &[u8],
    ) -> Self {
        Self::build(io, role, options, deflate, leftover)
    }

    fn build(
        io: T,
        role: Role,
        options: Options,
        deflate: Option<DeflateConfig>,
        leftover: &[u8],
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(io);
        let deflater = deflate.as_ref().map(|config| Deflater::for_role(role, config));
        let inflater = deflate.as_ref().map(|config| Inflater::for_role(role, config));
        let shared = Arc::new(Shared::new(
            WriteCore::new(write_half, role, deflater),
            options,
        ));
        let core = ReadCore::new(read_half, role, inflater, leftover, Arc::clone(&shared));
        Self {
            sender: Sender { shared },
            receiver: Receiver { core },
        }
    }

    /// Split into the write and read halves for concurrent use.
    #[must_use]
    pub fn split(self) -> (Sender<T>, Receiver<T>) {
        (self.sender, self.receiver)
    }

    /// Read the next whole message. See [`Receiver::read`].
    pub async fn read(&mut self, dest: &mut Vec<u8>) -> Result<MessageKind> {
        self.receiver.read(dest).await
    }

    /// Read part of the current message. See [`Receiver::read_some`].
    pub async fn read_some(&mut self, dest: &mut Vec<u8>, limit: usize) -> Result<usize> {
        self.receiver.read_some(dest, limit).await
    }

    /// Send a whole message. See [`Sender::write`].
    pub async fn write(&self, payload: &[u8]) -> Result<()> {
        self.sender.write(payload).await
    }

    /// Send one message fragment. See [`Sender::write_some`].
    pub async fn write_some(&self, fin: bool, payload: &[u8]) -> Result<()> {
        self.sender.write_some(fin, payload).await
    }

    /// Send a ping frame.
    pub async fn ping(&self, payload: &[u8]) -> Result<()> {
        self.sender.ping(payload).await
    }

    /// Send an unsolicited pong frame.
    pub async fn pong(&self, payload: &[u8]) -> Result<()> {
        self.sender.pong(payload).await
    }

    /// Initiate the close handshake. See [`Sender::close`].
    pub async fn close(&self, frame: Option<CloseFrame>) -> Result<()> {
        self.sender.close(frame).await
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.sender.state()
    }

    /// Kind of the message currently being received, if any.
    #[must_use]
    pub fn message_kind(&self) -> Option<MessageKind> {
        self.receiver.message_kind()
    }

    /// True when no partially-delivered message is outstanding.
    #[must_use]
    pub fn is_message_complete(&self) -> bool {
        self.receiver.is_message_complete()
    }

    /// The peer's close frame, once the close handshake has completed.
    #[must_use]
    pub fn peer_close(&self) -> Option<CloseFrame> {
        self.receiver.peer_close()
    }

    /// Install a control-frame observer. See
    /// [`Receiver::set_control_observer`].
    pub fn set_control_observer<F>(&mut self, observer: F)
    where
        F: FnMut(ControlKind, &[u8]) + Send + 'static,
    {
        self.receiver.set_control_observer(observer);
    }

    /// Enable or disable automatic fragmentation of outgoing messages.
    pub fn set_auto_fragment(&self, enabled: bool) {
        self.sender
            .shared
            .update_options(|options| options.auto_fragment = enabled);
    }

    /// Set the kind used for messages sent with [`write`](Self::write).
    pub fn set_message_kind(&self, kind: MessageKind) {
        self.sender
            .shared
            .update_options(|options| options.message_kind = kind);
    }

    /// Set the write buffer size, which is also the auto-fragment size.
    pub fn set_write_buffer_size(&self, size: usize) {
        self.sender
            .shared
            .update_options(|options| options.write_buffer_size = size);
    }

    /// Set the maximum incoming message size.
    pub fn set_max_message_size(&self, size: usize) {
        self.sender
            .shared
            .update_options(|options| options.max_message_size = size);
    }

    /// Enable or disable outgoing compression (when deflate was negotiated).
    pub fn set_compress(&self, enabled: bool) {
        self.sender
            .shared
            .update_options(|options| options.compress = enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::message::CloseCode;

    fn pair() -> (
        WebSocket<tokio::io::DuplexStream>,
        WebSocket<tokio::io::DuplexStream>,
    ) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let client = WebSocket::new(client_io, Role::Client, Options::default());
        let server = WebSocket::new(server_io, Role::Server, Options::default());
        (client, server)
    }

    #[tokio::test]
    async fn test_simple_roundtrip() {
        let (client, mut server) = pair();
        client.set_message_kind(MessageKind::Text);
        client.write(b"hello there").await.unwrap();

        let mut dest = Vec::new();
        let kind = server.read(&mut dest).await.unwrap();
        assert_eq!(kind, MessageKind::Text);
        assert_eq!(dest, b"hello there");
    }

    #[tokio::test]
    async fn test_fragmented_message_reassembled() {
        let (client, mut server) = pair();
        client.write_some(false, b"one ").await.unwrap();
        client.write_some(false, b"two ").await.unwrap();
        client.write_some(true, b"three").await.unwrap();

        let mut dest = Vec::new();
        let kind = server.read(&mut dest).await.unwrap();
        assert_eq!(kind, MessageKind::Binary);
        assert_eq!(dest, b"one two three");
    }

    #[tokio::test]
    async fn test_read_some_bounded() {
        let (client, mut server) = pair();
        client.write(b"abcdefgh").await.unwrap();

        let mut dest = Vec::new();
        while !server.is_message_complete() || dest.is_empty() {
            let n = server.read_some(&mut dest, 3).await.unwrap();
            assert!(n <= 3);
            if n == 0 {
                break;
            }
        }
        assert_eq!(dest, b"abcdefgh");
        assert!(server.is_message_complete());
    }

    #[tokio::test]
    async fn test_ping_answered_with_pong() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (mut client, mut server) = pair();
        client.ping(b"are you there").await.unwrap();
        client.write(b"payload").await.unwrap();

        // The server answers the ping while reading the message
        let mut dest = Vec::new();
        server.read(&mut dest).await.unwrap();
        assert_eq!(dest, b"payload");

        // A trailing server message lets the client's read end after the pong
        server.write(b"done").await.unwrap();

        static PONGS: AtomicUsize = AtomicUsize::new(0);
        client.set_control_observer(|kind, payload| {
            assert_eq!(kind, ControlKind::Pong);
            assert_eq!(payload, b"are you there");
            PONGS.fetch_add(1, Ordering::SeqCst);
        });
        let mut dest = Vec::new();
        client.read(&mut dest).await.unwrap();
        assert_eq!(dest, b"done");
        assert_eq!(PONGS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_handshake() {
        let (client, mut server) = pair();
        client
            .close(Some(CloseFrame::new(CloseCode::Normal, "bye")))
            .await
            .unwrap();
        assert_eq!(client.state(), ConnectionState::Closing);

        let mut dest = Vec::new();
        let result = server.read(&mut dest).await;
        match result {
            Err(Error::ConnectionClosed(Some(frame))) => {
                assert_eq!(frame.code, CloseCode::Normal);
                assert_eq!(frame.reason, "bye");
            }
            other => panic!("expected close, got {other:?}"),
        }
        assert_eq!(server.state(), ConnectionState::Closed);

        // Writes after the handshake abort without I/O
        assert!(matches!(server.write(b"x").await, Err(Error::Aborted)));
    }

    #[tokio::test]
    async fn test_write_after_close_aborts() {
        let (client, _server) = pair();
        client.close(None).await.unwrap();
        assert!(matches!(client.write(b"x").await, Err(Error::Aborted)));
        assert!(matches!(client.ping(b"x").await, Err(Error::Aborted)));
        assert!(matches!(client.close(None).await, Err(Error::Aborted)));
    }

    #[tokio::test]
    async fn test_reserved_close_code_rejected_before_io() {
        let (client, _server) = pair();
        let result = client
            .close(Some(CloseFrame::new(CloseCode::Other(1005), "")))
            .await;
        assert!(matches!(result, Err(Error::InvalidCloseCode(1005))));
        // The session is still open
        assert_eq!(client.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_max_message_size_enforced() {
        let (client, mut server) = pair();
        server.set_max_message_size(8);
        client.write(&[0u8; 64]).await.unwrap();

        let mut dest = Vec::new();
        let result = server.read(&mut dest).await;
        assert!(matches!(result, Err(Error::MessageTooLarge { .. })));
        assert_eq!(server.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_compressed_roundtrip() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let config = DeflateConfig::default();
        let client = WebSocket::with_deflate(
            client_io,
            Role::Client,
            Options::default(),
            config.clone(),
        );
        let mut server =
            WebSocket::with_deflate(server_io, Role::Server, Options::default(), config);

        let message: Vec<u8> = (0..20_000u32).map(|i| (i % 7) as u8).collect();
        client.write(&message).await.unwrap();

        let mut dest = Vec::new();
        let kind = server.read(&mut dest).await.unwrap();
        assert_eq!(kind, MessageKind::Binary);
        assert_eq!(dest, message);
    }

    #[tokio::test]
    async fn test_leftover_bytes_seed_the_stream() {
        use tokio::io::AsyncWriteExt;

        // The handshake layer over-read part of the first frame: an unmasked
        // server Text frame "Hi" split after its first payload byte
        let (local, mut remote) = tokio::io::duplex(4096);
        let mut ws = WebSocket::with_leftover(
            local,
            Role::Client,
            Options::default(),
            None,
            &[0x81, 0x02, b'H'],
        );
        remote.write_all(&[b'i']).await.unwrap();

        let mut dest = Vec::new();
        let kind = ws.read(&mut dest).await.unwrap();
        assert_eq!(kind, MessageKind::Text);
        assert_eq!(dest, b"Hi");
    }
}
