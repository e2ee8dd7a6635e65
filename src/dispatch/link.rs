//! Outbound side of the link.

use std::convert::Infallible;

use super::session::ConnectionId;

/// Sends outbound chunks to the host.
///
/// Implementations wrap the status characteristic notification; the
/// dispatcher calls [`Link::send_outbound_chunk`] once per chunk, in order.
pub trait Link {
    /// Error raised when a chunk cannot be handed to the link.
    type Error: std::error::Error;

    /// Send one chunk to a connection.
    fn send_outbound_chunk(
        &mut self,
        connection: ConnectionId,
        chunk: &[u8],
    ) -> Result<(), Self::Error>;
}

/// Collects chunks in memory.
impl Link for Vec<(ConnectionId, Vec<u8>)> {
    type Error = Infallible;

    fn send_outbound_chunk(
        &mut self,
        connection: ConnectionId,
        chunk: &[u8],
    ) -> Result<(), Self::Error> {
        self.push((connection, chunk.to_vec()));
        Ok(())
    }
}
