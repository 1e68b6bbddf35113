//! State shared between the two halves of a session.
//!
//! The write-ownership token is a FIFO-fair `tokio::sync::Mutex` around the
//! write engine: the application sender and the read engine's automatic
//! responses (pong, close echo, failure close) queue on it and run in
//! acquisition order. The session record and options use plain mutexes,
//! never held across an await.

use std::sync::Mutex as StdMutex;

use tokio::io::AsyncWrite;
use tokio::sync::Mutex;

use crate::config::Options;
use crate::connection::state::{ConnectionState, SessionState};
use crate::connection::writer::WriteCore;
use crate::error::{Error, Result};
use crate::message::CloseFrame;
use crate::protocol::OpCode;

pub(crate) struct Shared<T> {
    pub writer: Mutex<WriteCore<T>>,
    pub state: StdMutex<SessionState>,
    pub options: StdMutex<Options>,
}

impl<T> Shared<T> {
    pub fn new(writer: WriteCore<T>, options: Options) -> Self {
        Self {
            writer: Mutex::new(writer),
            state: StdMutex::new(SessionState::new()),
            options: StdMutex::new(options),
        }
    }

    pub fn status(&self) -> ConnectionState {
        self.lock_state(|state| state.status)
    }

    pub fn options_snapshot(&self) -> Options {
        match self.options.lock() {
            Ok(options) => options.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update_options(&self, update: impl FnOnce(&mut Options)) {
        match self.options.lock() {
            Ok(mut options) => update(&mut options),
            Err(poisoned) => update(&mut poisoned.into_inner()),
        }
    }

    pub fn lock_state<R>(&self, access: impl FnOnce(&mut SessionState) -> R) -> R {
        match self.state.lock() {
            Ok(mut state) => access(&mut state),
            Err(poisoned) => access(&mut poisoned.into_inner()),
        }
    }
}

impl<T: AsyncWrite + Unpin> Shared<T> {
    /// Send a data message fragment through the write token.
    pub async fn send_data(&self, fin: bool, payload: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        self.lock_state(|state| {
            if state.status.can_send() && !state.close_sent {
                Ok(())
            } else {
                Err(Error::Aborted)
            }
        })?;
        let options = self.options_snapshot();
        writer.write_some(fin, payload, &options).await
    }

    /// Send a ping or unsolicited pong through the write token.
    pub async fn send_control(&self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        self.lock_state(|state| {
            if state.status.can_send() && !state.close_sent {
                Ok(())
            } else {
                Err(Error::Aborted)
            }
        })?;
        writer.write_control(opcode, payload).await
    }

    /// Automatic pong in answer to a ping.
    ///
    /// Skipped silently if a close has been sent by the time the token is
    /// acquired: a pong must never follow our close frame.
    pub async fn send_pong(&self, payload: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let skip = self.lock_state(|state| state.close_sent || !state.status.can_send());
        if skip {
            return Ok(());
        }
        writer.write_control(OpCode::Pong, payload).await
    }

    /// Initiate the close handshake from this side.
    pub async fn send_close(&self, frame: Option<CloseFrame>) -> Result<()> {
        if let Some(frame) = &frame {
            if frame.code.is_reserved() || !frame.code.is_valid() {
                return Err(Error::InvalidCloseCode(frame.code.as_u16()));
            }
        }
        let mut writer = self.writer.lock().await;
        self.lock_state(|state| {
            if !state.status.can_send() || state.close_sent {
                return Err(Error::Aborted);
            }
            state.close_sent = true;
            state.status = if state.close_received {
                ConnectionState::Closed
            } else {
                ConnectionState::Closing
            };
            Ok(())
        })?;
        let payload = frame.map(|f| f.encode()).unwrap_or_default();
        writer.write_control(OpCode::Close, &payload).await
    }

    /// Record the peer's close frame and echo one if we have not closed yet.
    pub async fn peer_closed(&self, frame: Option<&CloseFrame>) {
        let mut writer = self.writer.lock().await;
        let echo = self.lock_state(|state| {
            state.close_received = true;
            state.peer_close = frame.cloned();
            state.status = ConnectionState::Closed;
            let echo = !state.close_sent;
            state.close_sent = true;
            echo
        });
        if echo {
            // Echo the peer's code with an empty reason
            let payload = frame
                .map(|f| CloseFrame::new(f.code, "").encode())
                .unwrap_or_default();
            let _ = writer.write_control(OpCode::Close, &payload).await;
        }
    }

    /// Fail the connection: best-effort close frame, then the terminal
    /// `Failed` state. Every subsequent operation aborts without I/O.
    ///
    /// A session already in a terminal state is left untouched.
    pub async fn fail(&self, error: &Error) {
        let mut writer = self.writer.lock().await;
        let send_close = self.lock_state(|state| {
            if state.status.is_terminal() {
                return false;
            }
            let send = !state.close_sent;
            state.close_sent = true;
            state.status = ConnectionState::Failed;
            send
        });
        if send_close {
            if let Some(code) = error.close_code() {
                let payload = CloseFrame::new(code, "").encode();
                let _ = writer.write_control(OpCode::Close, &payload).await;
            }
        }
    }

    /// Mark the session closed without any further I/O (transport EOF).
    pub fn transport_closed(&self) {
        self.lock_state(|state| {
            if !state.status.is_terminal() {
                state.status = ConnectionState::Closed;
            }
        });
    }
}
