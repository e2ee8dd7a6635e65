//! Command dispatch.
//!
//! Drives one inbound chunk through the pipeline:
//!
//! ```text
//! chunk ─► Reassembler ─► Message ─► route ─┬─► Ping echo
//!                                           ├─► APDU decode ─► handler
//!                                           └─► reject
//!                      Response ─► Message ─► encode ─► chunks ─► Link
//! ```
//!
//! Every failure along the way becomes an `Error` message sent through the
//! same encoder as a success, so nothing is dropped silently.

use std::sync::Arc;
use std::time::Instant;

use crate::apdu::ApduRequest;
use crate::core::{ErrorCode, INIT_FRAME_FLAG, ProtocolError};
use crate::transport::{Command, Feed, Message, Mtu, encode};

use super::link::Link;
use super::registry::{InstructionHandler, InstructionRegistry};
use super::session::Session;

/// Response to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Echo of a ping payload.
    Ping(Vec<u8>),
    /// Handler output for a `Message` request.
    Apdu(Vec<u8>),
    /// Failure reported as an `Error` message.
    Error(ErrorCode),
}

impl Response {
    /// Convert to the outbound message.
    ///
    /// A payload the length field cannot declare degrades to
    /// `Error(MessageTooLong)`.
    pub fn into_message(self) -> Message {
        let (command, payload) = match self {
            Self::Ping(payload) => (Command::Ping, payload),
            Self::Apdu(payload) => (Command::Message, payload),
            Self::Error(code) => return code.to_message(),
        };
        Message::new(command, payload).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "response payload too large");
            ErrorCode::MessageTooLong.to_message()
        })
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        Self::Error(err.error_code())
    }
}

/// Where a complete inbound message goes.
pub enum Route<'a> {
    /// Echo a ping.
    Echo,
    /// Invoke an instruction handler.
    Instruction(ApduRequest, &'a dyn InstructionHandler),
    /// Answer with an error.
    Reject(ProtocolError),
}

impl std::fmt::Debug for Route<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Echo => f.write_str("Echo"),
            Self::Instruction(req, _) => f.debug_tuple("Instruction").field(req).finish(),
            Self::Reject(err) => f.debug_tuple("Reject").field(err).finish(),
        }
    }
}

/// Dispatches reassembled messages to instruction handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<InstructionRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over a registry.
    pub fn new(registry: Arc<InstructionRegistry>) -> Self {
        Self { registry }
    }

    /// Get the registry.
    pub fn registry(&self) -> &InstructionRegistry {
        &self.registry
    }

    /// Decide how to handle a complete message.
    pub fn route(&self, message: &Message) -> Route<'_> {
        match message.command() {
            Command::Ping => Route::Echo,
            Command::Message => {
                let request = match ApduRequest::decode(message.payload()) {
                    Ok(request) => request,
                    Err(e) => return Route::Reject(e.into()),
                };
                match self.registry.get(request.instruction()) {
                    Some(handler) => Route::Instruction(request, handler),
                    None => Route::Reject(ProtocolError::InstructionNotSupported(request.ins)),
                }
            }
            other => Route::Reject(ProtocolError::InvalidCommand(other.bits())),
        }
    }

    /// Produce the response to a complete message.
    pub fn dispatch(&self, message: &Message) -> Response {
        match self.route(message) {
            Route::Echo => Response::Ping(message.payload().to_vec()),
            Route::Instruction(request, handler) => match handler.handle(&request) {
                Ok(data) => Response::Apdu(data),
                Err(code) => {
                    tracing::debug!(ins = request.ins, %code, "instruction handler failed");
                    ProtocolError::Handler(code).into()
                }
            },
            Route::Reject(err) => {
                tracing::debug!(error = %err, "rejecting message");
                err.into()
            }
        }
    }

    /// Encode a response into outbound chunks.
    ///
    /// Never fails: a message too long for the MTU is replaced by
    /// `Error(MessageTooLong)`, which fits any MTU.
    pub fn respond(&self, response: Response, mtu: Mtu) -> Vec<Vec<u8>> {
        let message = response.into_message();
        encode(&message, mtu).unwrap_or_else(|e| {
            tracing::warn!(error = %e, %mtu, "response does not fit sequence space");
            let fallback = ErrorCode::MessageTooLong.to_message();
            encode(&fallback, mtu).unwrap_or_default()
        })
    }

    /// Feed one inbound chunk and return the chunks to send back, if any.
    ///
    /// A message that stalled past its deadline is reported as
    /// `RequestTimeout` ahead of whatever the chunk itself produces. A late
    /// continuation belongs to the expired message and produces nothing else.
    pub fn process_chunk(&self, session: &mut Session, chunk: &[u8], now: Instant) -> Vec<Vec<u8>> {
        let mut out = self.poll_timeout(session, now);
        let late_continuation =
            !out.is_empty() && chunk.first().is_some_and(|b| b & INIT_FRAME_FLAG == 0);

        session.touch(now);
        if late_continuation {
            return out;
        }
        let mtu = session.current_mtu();

        tracing::trace!(connection = %session.id(), len = chunk.len(), "inbound chunk");

        let response = match session.reassembler_mut().feed(chunk, mtu, now) {
            Ok(Feed::Incomplete) => return out,
            Ok(Feed::Complete(message)) => {
                tracing::debug!(
                    connection = %session.id(),
                    command = ?message.command(),
                    len = message.len(),
                    "message complete"
                );
                self.dispatch(&message)
            }
            Err(e) => {
                tracing::debug!(connection = %session.id(), error = %e, "reassembly failed");
                ProtocolError::from(e).into()
            }
        };

        out.extend(self.respond(response, mtu));
        out
    }

    /// Expire a stalled reassembly and return the `RequestTimeout` chunks.
    pub fn poll_timeout(&self, session: &mut Session, now: Instant) -> Vec<Vec<u8>> {
        match session.reassembler_mut().expire(now) {
            Some(e) => {
                tracing::debug!(connection = %session.id(), "request timed out");
                self.respond(ProtocolError::from(e).into(), session.current_mtu())
            }
            None => Vec::new(),
        }
    }

    /// Feed one inbound chunk and send every resulting chunk through the link.
    ///
    /// Returns the number of chunks sent.
    pub fn on_inbound_chunk<L: Link>(
        &self,
        session: &mut Session,
        chunk: &[u8],
        now: Instant,
        link: &mut L,
    ) -> Result<usize, L::Error> {
        let chunks = self.process_chunk(session, chunk, now);
        send_all(session, &chunks, link)
    }

    /// Expire a stalled reassembly and send the timeout error through the link.
    pub fn on_timeout<L: Link>(
        &self,
        session: &mut Session,
        now: Instant,
        link: &mut L,
    ) -> Result<usize, L::Error> {
        let chunks = self.poll_timeout(session, now);
        send_all(session, &chunks, link)
    }
}

fn send_all<L: Link>(
    session: &Session,
    chunks: &[Vec<u8>],
    link: &mut L,
) -> Result<usize, L::Error> {
    for chunk in chunks {
        tracing::trace!(connection = %session.id(), len = chunk.len(), "outbound chunk");
        link.send_outbound_chunk(session.id(), chunk)?;
    }
    Ok(chunks.len())
}
