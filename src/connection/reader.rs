//! The read engine: streams wire frames back into messages.
//!
//! A resumable pipeline over a read-ahead buffer: header acquisition,
//! continuation-state checks, incremental unmask, inflate, UTF-8
//! validation, and delivery into the caller's buffer. Control frames are
//! handled in place (observer callback, automatic pong, close echo) and
//! never end the caller's read early; a close frame completes the read
//! with `Error::ConnectionClosed`. Once this side has sent a close, data
//! frames are drained and discarded until the peer's close arrives.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadHalf};

use crate::connection::Role;
use crate::connection::shared::Shared;
use crate::error::{Error, Result};
use crate::extensions::Inflater;
use crate::message::{CloseFrame, ControlKind, MessageKind};
use crate::protocol::{FrameHeader, OpCode, Utf8Validator, apply_mask, apply_mask_offset};

/// Callback invoked for every incoming control frame, before any automatic
/// response is sent.
pub type ControlObserver = Box<dyn FnMut(ControlKind, &[u8]) + Send>;

const READ_BUFFER_SIZE: usize = 8192;

/// Dispatch class of a frame; every opcode narrows to exactly one.
enum FrameClass {
    Control(ControlKind),
    Continuation,
    Start(MessageKind),
}

const fn classify(opcode: OpCode) -> FrameClass {
    match opcode {
        OpCode::Continuation => FrameClass::Continuation,
        OpCode::Text => FrameClass::Start(MessageKind::Text),
        OpCode::Binary => FrameClass::Start(MessageKind::Binary),
        OpCode::Close => FrameClass::Control(ControlKind::Close),
        OpCode::Ping => FrameClass::Control(ControlKind::Ping),
        OpCode::Pong => FrameClass::Control(ControlKind::Pong),
    }
}

/// A frame whose payload is still being consumed from the wire.
#[derive(Debug)]
struct FrameInProgress {
    header: FrameHeader,
    /// Payload bytes not yet read off the wire.
    remaining: u64,
    /// Payload bytes of this frame already unmasked; resumes the masking
    /// key index across partial reads.
    mask_offset: usize,
}

/// A message whose frames are still arriving or whose output has not been
/// fully delivered.
#[derive(Debug)]
struct MessageInProgress {
    kind: MessageKind,
    /// First frame carried RSV1.
    compressed: bool,
    /// Total (decompressed) bytes produced so far; checked against the
    /// message size ceiling.
    produced: usize,
    max_size: usize,
    /// Produced but not yet delivered bytes.
    pending: Vec<u8>,
    /// Unmasked compressed input the inflater has not accepted yet. Forms
    /// when the caller's output cap stalls decompression mid-chunk.
    backlog: Vec<u8>,
    /// The final frame has been fully read off the wire.
    fin_seen: bool,
    /// All output produced and end-of-message processing done.
    complete: bool,
    /// Completion has been returned to the caller.
    reported: bool,
}

pub(crate) struct ReadCore<T> {
    io: ReadHalf<T>,
    role: Role,
    shared: Arc<Shared<T>>,
    buf: BytesMut,
    inflater: Option<Inflater>,
    utf8: Utf8Validator,
    observer: Option<ControlObserver>,
    frame: Option<FrameInProgress>,
    message: Option<MessageInProgress>,
}

impl<T> ReadCore<T> {
    pub fn new(
        io: ReadHalf<T>,
        role: Role,
        inflater: Option<Inflater>,
        leftover: &[u8],
        shared: Arc<Shared<T>>,
    ) -> Self {
        let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE.max(leftover.len()));
        buf.extend_from_slice(leftover);
        Self {
            io,
            role,
            shared,
            buf,
            inflater,
            utf8: Utf8Validator::new(),
            observer: None,
            frame: None,
            message: None,
        }
    }

    pub fn shared(&self) -> &Arc<Shared<T>> {
        &self.shared
    }

    pub fn set_observer(&mut self, observer: Option<ControlObserver>) {
        self.observer = observer;
    }

    /// Kind of the message currently being received, if any.
    pub fn message_kind(&self) -> Option<MessageKind> {
        self.message.as_ref().map(|message| message.kind)
    }

    /// True when no partially-delivered message is outstanding.
    pub fn is_message_complete(&self) -> bool {
        self.message
            .as_ref()
            .is_none_or(|message| message.complete && message.pending.is_empty())
    }

    fn notify(&mut self, kind: ControlKind, payload: &[u8]) {
        if let Some(observer) = self.observer.as_mut() {
            observer(kind, payload);
        }
    }

    /// Size ceiling and UTF-8 validation over the bytes appended to
    /// `pending` since `before`.
    fn account(
        message: &mut MessageInProgress,
        utf8: &mut Utf8Validator,
        before: usize,
    ) -> Result<()> {
        message.produced += message.pending.len() - before;
        if message.produced > message.max_size {
            return Err(Error::MessageTooLarge {
                size: message.produced,
                max: message.max_size,
            });
        }
        if message.kind.is_text() {
            utf8.feed(&message.pending[before..])?;
        }
        Ok(())
    }

    /// End-of-message processing: flush output the decompressor still
    /// holds, verify the end of the compressed stream, complete UTF-8
    /// validation.
    ///
    /// Completion stays deferred while the flush still produces output
    /// under the caller's cap; the read loop retries until the flush runs
    /// dry.
    fn try_finish(
        message: &mut MessageInProgress,
        inflater: Option<&mut Inflater>,
        utf8: &mut Utf8Validator,
        limit: usize,
    ) -> Result<()> {
        if message.compressed {
            if let Some(inflater) = inflater {
                let before = message.pending.len();
                inflater.inflate(&[], &mut message.pending, limit)?;
                if message.pending.len() != before {
                    return Self::account(message, utf8, before);
                }
                inflater.finish_message()?;
            }
        }
        if message.kind.is_text() {
            utf8.finish()?;
        }
        message.complete = true;
        Ok(())
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> ReadCore<T> {
    /// Read a whole message, appending its payload to `dest`.
    pub async fn read(&mut self, dest: &mut Vec<u8>) -> Result<MessageKind> {
        loop {
            self.read_some(dest, usize::MAX).await?;
            let done = self
                .message
                .as_ref()
                .is_some_and(|message| message.complete && message.pending.is_empty());
            if done {
                if let Some(message) = self.message.take() {
                    return Ok(message.kind);
                }
            }
        }
    }

    /// Read up to `limit` bytes of the current message into `dest`.
    ///
    /// Returns the number of bytes appended. Completion is reported as
    /// `Ok(0)` exactly once, after the last bytes of the message have been
    /// delivered; the call after that starts the next message.
    pub async fn read_some(&mut self, dest: &mut Vec<u8>, limit: usize) -> Result<usize> {
        if !self.shared.status().can_receive() {
            return Err(Error::Aborted);
        }
        // A completed message stays visible to message_kind() until its
        // completion has been reported.
        if self
            .message
            .as_ref()
            .is_some_and(|message| message.reported)
        {
            self.message = None;
        }
        match self.read_some_inner(dest, limit.max(1)).await {
            Ok(n) => Ok(n),
            Err(error) => {
                if error.is_protocol_violation() {
                    self.shared.fail(&error).await;
                }
                Err(error)
            }
        }
    }

    async fn read_some_inner(&mut self, dest: &mut Vec<u8>, limit: usize) -> Result<usize> {
        loop {
            // Data arriving after we sent a close is discarded; only the
            // peer's close completes the read.
            let draining = self.shared.lock_state(|state| state.close_sent);

            if draining {
                if self
                    .message
                    .as_ref()
                    .is_some_and(|message| message.complete)
                {
                    self.message = None;
                } else if let Some(message) = self.message.as_mut() {
                    message.pending.clear();
                    message.backlog.clear();
                }
            } else if let Some(message) = self.message.as_mut() {
                // Deliver produced output before touching the wire.
                if !message.pending.is_empty() {
                    let n = message.pending.len().min(limit);
                    dest.extend_from_slice(&message.pending[..n]);
                    message.pending.drain(..n);
                    return Ok(n);
                }
                if message.complete {
                    message.reported = true;
                    return Ok(0);
                }
            }

            // Run already-buffered compressed input (or a deferred
            // end-of-message flush) before touching the wire.
            let needs_transform = self.message.as_ref().is_some_and(|message| {
                !message.backlog.is_empty() || (message.fin_seen && !message.complete)
            });
            if needs_transform {
                self.drain_backlog(limit)?;
                continue;
            }

            if self.frame.is_none() {
                let header = self.next_header().await?;
                match classify(header.opcode) {
                    FrameClass::Control(kind) => {
                        self.handle_control(kind, header).await?;
                        continue;
                    }
                    FrameClass::Continuation => self.begin_data_frame(header, None)?,
                    FrameClass::Start(kind) => self.begin_data_frame(header, Some(kind))?,
                }
            }

            if self.frame.as_ref().is_some_and(|frame| frame.remaining > 0)
                && self.buf.is_empty()
            {
                self.fill().await?;
            }
            self.consume_payload(limit, draining)?;
        }
    }

    /// Decode the next frame header, filling the read-ahead buffer as
    /// needed, and validate it structurally.
    async fn next_header(&mut self) -> Result<FrameHeader> {
        loop {
            match FrameHeader::decode(&self.buf) {
                Ok((header, header_len)) => {
                    self.buf.advance(header_len);
                    let accept_unmasked = self.shared.options_snapshot().accept_unmasked;
                    header.validate(self.role, self.inflater.is_some(), accept_unmasked)?;
                    return Ok(header);
                }
                Err(Error::IncompleteFrame { .. }) => self.fill().await?,
                Err(error) => return Err(error),
            }
        }
    }

    async fn fill(&mut self) -> Result<()> {
        let n = self.io.read_buf(&mut self.buf).await?;
        if n == 0 {
            // Transport ended without a close handshake
            self.shared.transport_closed();
            return Err(Error::ConnectionClosed(None));
        }
        Ok(())
    }

    /// Handle a control frame in place. Close completes the read with
    /// `Error::ConnectionClosed` after recording the handshake.
    async fn handle_control(&mut self, kind: ControlKind, header: FrameHeader) -> Result<()> {
        let len = header.payload_len as usize;
        while self.buf.len() < len {
            self.fill().await?;
        }
        let mut payload = self.buf.split_to(len);
        if let Some(key) = header.mask {
            apply_mask(&mut payload, key);
        }

        match kind {
            ControlKind::Ping => {
                // Ignored entirely once we have sent a close: no observer
                // callback, and no frame may follow our close on the wire.
                let closing = self.shared.lock_state(|state| state.close_sent);
                if !closing {
                    self.notify(ControlKind::Ping, &payload);
                    self.shared.send_pong(&payload).await?;
                }
            }
            ControlKind::Pong => {
                let closing = self.shared.lock_state(|state| state.close_sent);
                if !closing {
                    self.notify(ControlKind::Pong, &payload);
                }
            }
            ControlKind::Close => {
                let frame = CloseFrame::decode(&payload)?;
                self.notify(ControlKind::Close, &payload);
                self.shared.peer_closed(frame.as_ref()).await;
                return Err(Error::ConnectionClosed(frame));
            }
        }
        Ok(())
    }

    /// Apply the continuation rules and start tracking a data frame.
    ///
    /// `start` carries the message kind for Text/Binary and is `None` for
    /// a continuation frame.
    fn begin_data_frame(&mut self, header: FrameHeader, start: Option<MessageKind>) -> Result<()> {
        let in_progress = self
            .message
            .as_ref()
            .is_some_and(|message| !message.complete);
        match start {
            None => {
                if !in_progress {
                    return Err(Error::UnexpectedContinuation);
                }
            }
            Some(kind) => {
                if in_progress {
                    return Err(Error::ExpectedContinuation);
                }
                self.utf8.reset();
                self.message = Some(MessageInProgress {
                    kind,
                    compressed: header.rsv1,
                    produced: 0,
                    max_size: self.shared.options_snapshot().max_message_size,
                    pending: Vec::new(),
                    backlog: Vec::new(),
                    fin_seen: false,
                    complete: false,
                    reported: false,
                });
            }
        }
        self.frame = Some(FrameInProgress {
            header,
            remaining: header.payload_len,
            mask_offset: 0,
        });
        Ok(())
    }

    /// Feed buffered compressed input through the inflater, producing at
    /// most `limit` bytes, and run deferred end-of-message processing once
    /// the backlog is gone.
    fn drain_backlog(&mut self, limit: usize) -> Result<()> {
        let Some(message) = self.message.as_mut() else {
            return Ok(());
        };
        if !message.backlog.is_empty() {
            let before = message.pending.len();
            if let Some(inflater) = self.inflater.as_mut() {
                let consumed = inflater.inflate(&message.backlog, &mut message.pending, limit)?;
                message.backlog.drain(..consumed);
            } else {
                message.backlog.clear();
            }
            Self::account(message, &mut self.utf8, before)?;
        }
        if message.backlog.is_empty() && message.fin_seen && !message.complete {
            Self::try_finish(message, self.inflater.as_mut(), &mut self.utf8, limit)?;
        }
        Ok(())
    }

    /// Move buffered wire bytes off the frame: unmask, then append to the
    /// pending output (uncompressed) or stage in the backlog for the
    /// inflater (compressed). Runs end-of-frame and end-of-message
    /// processing when the frame is exhausted. With `discard` set the
    /// payload is dropped unread.
    fn consume_payload(&mut self, limit: usize, discard: bool) -> Result<()> {
        if let Some(frame) = self.frame.as_mut() {
            if frame.remaining > 0 && !self.buf.is_empty() {
                let compressed = self
                    .message
                    .as_ref()
                    .is_some_and(|message| message.compressed);
                let mut take = frame.remaining.min(self.buf.len() as u64) as usize;
                if !compressed && !discard {
                    // Uncompressed output maps 1:1 onto wire bytes; cap the
                    // intake at the caller's budget so undelivered payload
                    // stays in the read buffer.
                    take = take.min(limit);
                }
                let mut chunk = self.buf.split_to(take);
                if !discard {
                    if let Some(key) = frame.header.mask {
                        apply_mask_offset(&mut chunk, key, frame.mask_offset);
                    }
                }
                frame.mask_offset += take;
                frame.remaining -= take as u64;

                if !discard {
                    if let Some(message) = self.message.as_mut() {
                        if message.compressed {
                            message.backlog.extend_from_slice(&chunk);
                        } else {
                            let before = message.pending.len();
                            message.pending.extend_from_slice(&chunk);
                            Self::account(message, &mut self.utf8, before)?;
                        }
                    }
                }
            }
        }

        if self.frame.as_ref().is_some_and(|frame| frame.remaining == 0) {
            let fin = self.frame.as_ref().is_some_and(|frame| frame.header.fin);
            self.frame = None;
            if fin {
                if let Some(message) = self.message.as_mut() {
                    message.fin_seen = true;
                    if discard {
                        message.complete = true;
                    } else if message.backlog.is_empty() {
                        Self::try_finish(message, self.inflater.as_mut(), &mut self.utf8, limit)?;
                    }
                }
            }
        }
        Ok(())
    }
}
