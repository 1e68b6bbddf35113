//! The write engine: turns messages and control payloads into wire frames.
//!
//! Lives behind the shared write token (`tokio::sync::Mutex`); every frame
//! is written wholly while the token is held, so frames from the
//! application sender and the read engine's automatic responses never
//! interleave on the wire.

use tokio::io::{AsyncWrite, AsyncWriteExt, WriteHalf};

use crate::config::Options;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::extensions::Deflater;
use crate::message::MessageKind;
use crate::protocol::{
    FrameHeader, MAX_CONTROL_PAYLOAD, MAX_HEADER_LEN, MaskGenerator, OpCode, apply_mask,
};

/// Options snapshot taken when a message starts.
///
/// Option changes mid-message take effect from the next message.
#[derive(Debug, Clone, Copy)]
struct MessageSnapshot {
    kind: MessageKind,
    compress: bool,
    auto_fragment: bool,
    fragment_size: usize,
    /// The first frame of this message has been emitted.
    started: bool,
}

pub(crate) struct WriteCore<T> {
    io: WriteHalf<T>,
    role: Role,
    mask_gen: MaskGenerator,
    deflater: Option<Deflater>,
    /// Masked copy of the current frame's payload (client role only).
    mask_buf: Vec<u8>,
    /// In-progress fragmented message, between `write_some(false, ..)` calls.
    message: Option<MessageSnapshot>,
}

const fn data_opcode(kind: MessageKind) -> OpCode {
    match kind {
        MessageKind::Text => OpCode::Text,
        MessageKind::Binary => OpCode::Binary,
    }
}

impl<T: AsyncWrite> WriteCore<T> {
    pub fn new(io: WriteHalf<T>, role: Role, deflater: Option<Deflater>) -> Self {
        Self {
            io,
            role,
            mask_gen: MaskGenerator::new(),
            deflater,
            mask_buf: Vec::new(),
            message: None,
        }
    }
}

impl<T: AsyncWrite + Unpin> WriteCore<T> {
    /// Write one message fragment; `fin` marks the last fragment.
    ///
    /// The first call of a message snapshots the relevant options. With
    /// auto-fragment enabled the staged payload is additionally split into
    /// frames of at most the configured write buffer size.
    pub async fn write_some(&mut self, fin: bool, payload: &[u8], options: &Options) -> Result<()> {
        if self.message.is_none() {
            self.message = Some(MessageSnapshot {
                kind: options.message_kind,
                compress: options.compress && self.deflater.is_some(),
                auto_fragment: options.auto_fragment,
                fragment_size: options.write_buffer_size.max(1),
                started: false,
            });
        }
        // Checked above
        let Some(snapshot) = self.message else {
            return Err(Error::Aborted);
        };

        if snapshot.compress {
            let mut staged = Vec::new();
            if let Some(deflater) = self.deflater.as_mut() {
                deflater.deflate(payload, &mut staged)?;
                if fin {
                    deflater.finish_message(&mut staged)?;
                }
            }
            self.emit_payload(&staged, fin, snapshot).await?;
        } else {
            self.emit_payload(payload, fin, snapshot).await?;
        }

        if fin {
            self.message = None;
        }
        self.io.flush().await?;
        Ok(())
    }

    /// Write a control frame (close, ping, pong).
    pub async fn write_control(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(payload.len()));
        }
        let header = FrameHeader::new(true, opcode, payload.len() as u64);
        self.emit_frame(header, payload).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Emit the staged payload as one or more data frames, updating the
    /// message snapshot's `started` flag.
    async fn emit_payload(
        &mut self,
        data: &[u8],
        fin: bool,
        snapshot: MessageSnapshot,
    ) -> Result<()> {
        let fragment_size = if snapshot.auto_fragment {
            snapshot.fragment_size
        } else {
            data.len().max(1)
        };

        let mut offset: usize = 0;
        loop {
            let end = offset.saturating_add(fragment_size).min(data.len());
            let last = end == data.len();
            let started = self
                .message
                .as_ref()
                .is_some_and(|message| message.started);
            let opcode = if started {
                OpCode::Continuation
            } else {
                data_opcode(snapshot.kind)
            };
            let mut header = FrameHeader::new(fin && last, opcode, (end - offset) as u64);
            // RSV1 marks the message as compressed, on its first frame only
            header.rsv1 = snapshot.compress && !started;
            self.emit_frame(header, &data[offset..end]).await?;
            if let Some(message) = self.message.as_mut() {
                message.started = true;
            }
            if last {
                return Ok(());
            }
            offset = end;
        }
    }

    /// Write a single frame: header then payload, masked for the client role.
    async fn emit_frame(&mut self, mut header: FrameHeader, payload: &[u8]) -> Result<()> {
        let mut head = [0u8; MAX_HEADER_LEN];
        if self.role.must_mask() {
            let key = self.mask_gen.next_key();
            header.mask = Some(key);
            let head_len = header.encode(&mut head);
            self.mask_buf.clear();
            self.mask_buf.extend_from_slice(payload);
            apply_mask(&mut self.mask_buf, key);
            self.io.write_all(&head[..head_len]).await?;
            self.io.write_all(&self.mask_buf).await?;
        } else {
            let head_len = header.encode(&mut head);
            self.io.write_all(&head[..head_len]).await?;
            self.io.write_all(payload).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn server_core(
        io: tokio::io::DuplexStream,
        deflater: Option<Deflater>,
    ) -> WriteCore<tokio::io::DuplexStream> {
        let (_, write_half) = tokio::io::split(io);
        WriteCore::new(write_half, Role::Server, deflater)
    }

    async fn read_wire(peer: &mut tokio::io::DuplexStream, len: usize) -> Vec<u8> {
        let mut wire = vec![0u8; len];
        peer.read_exact(&mut wire).await.unwrap();
        wire
    }

    #[tokio::test]
    async fn test_single_frame_message() {
        let (local, mut peer) = tokio::io::duplex(256);
        let mut core = server_core(local, None);
        let options = Options::new().with_message_kind(MessageKind::Text);

        core.write_some(true, b"Hello", &options).await.unwrap();

        let wire = read_wire(&mut peer, 7).await;
        assert_eq!(wire, [0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
    }

    #[tokio::test]
    async fn test_explicit_fragmentation() {
        let (local, mut peer) = tokio::io::duplex(256);
        let mut core = server_core(local, None);
        let options = Options::new().with_message_kind(MessageKind::Text);

        core.write_some(false, b"Hel", &options).await.unwrap();
        core.write_some(true, b"lo", &options).await.unwrap();

        let wire = read_wire(&mut peer, 9).await;
        // Text FIN=0 "Hel", then Continuation FIN=1 "lo"
        assert_eq!(&wire[..5], &[0x01, 0x03, 0x48, 0x65, 0x6c]);
        assert_eq!(&wire[5..], &[0x80, 0x02, 0x6c, 0x6f]);
    }

    #[tokio::test]
    async fn test_auto_fragment_splits_message() {
        let (local, mut peer) = tokio::io::duplex(256);
        let mut core = server_core(local, None);
        let options = Options::new()
            .with_auto_fragment(true)
            .with_write_buffer_size(4);

        core.write_some(true, b"abcdefghij", &options).await.unwrap();

        // 4 + 4 + 2 payload bytes, 2 header bytes each
        let wire = read_wire(&mut peer, 16).await;
        assert_eq!(&wire[..6], &[0x02, 0x04, b'a', b'b', b'c', b'd']);
        assert_eq!(&wire[6..12], &[0x00, 0x04, b'e', b'f', b'g', b'h']);
        assert_eq!(&wire[12..], &[0x80, 0x02, b'i', b'j']);
    }

    #[tokio::test]
    async fn test_client_frames_are_masked() {
        let (local, mut peer) = tokio::io::duplex(256);
        let (_, write_half) = tokio::io::split(local);
        let mut core = WriteCore::new(write_half, Role::Client, None);

        core.write_some(true, b"Hi", &Options::default()).await.unwrap();

        let wire = read_wire(&mut peer, 8).await;
        assert_eq!(wire[0], 0x82);
        assert_eq!(wire[1], 0x82); // MASK bit + len=2
        let key = [wire[2], wire[3], wire[4], wire[5]];
        let mut payload = [wire[6], wire[7]];
        apply_mask(&mut payload, key);
        assert_eq!(&payload, b"Hi");
    }

    #[tokio::test]
    async fn test_control_frame_size_limit() {
        let (local, _peer) = tokio::io::duplex(256);
        let mut core = server_core(local, None);

        let result = core.write_control(OpCode::Ping, &[0u8; 126]).await;
        assert!(matches!(result, Err(Error::ControlFrameTooLarge(126))));

        core.write_control(OpCode::Ping, &[0u8; 125]).await.unwrap();
    }

    #[tokio::test]
    async fn test_compressed_message_sets_rsv1_once() {
        use crate::extensions::DeflateConfig;

        let (local, mut peer) = tokio::io::duplex(4096);
        let config = DeflateConfig::default();
        let mut core = server_core(local, Some(Deflater::for_role(Role::Server, &config)));

        core.write_some(false, b"part one ", &Options::default())
            .await
            .unwrap();
        core.write_some(true, b"part two", &Options::default())
            .await
            .unwrap();

        // First frame: Binary with RSV1, FIN=0 (payload length in byte 1,
        // no extended length for small compressed chunks)
        let head = read_wire(&mut peer, 2).await;
        assert_eq!(head[0], 0x42);
        let len = usize::from(head[1] & 0x7f);
        let _ = read_wire(&mut peer, len).await;

        // Continuation frame: FIN=1, no RSV1
        let head = read_wire(&mut peer, 2).await;
        assert_eq!(head[0], 0x80);
    }
}
