//! RPC transport port
//!
//! The dispatcher never frames or delivers messages itself. Any transport
//! that can send a command, answer a single request, or hand back a
//! pull-based source of responses can back it.

use crate::{CallOptions, Envelope, TransportError};
use async_trait::async_trait;

/// Transport primitives the call layer is built over
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Send a command without expecting any response
    async fn send_command(
        &self,
        command: &str,
        payload: Envelope,
        opts: &CallOptions,
    ) -> Result<(), TransportError>;

    /// Send a request and wait for its single response
    async fn send_request(
        &self,
        command: &str,
        payload: Envelope,
        opts: &CallOptions,
    ) -> Result<Envelope, TransportError>;

    /// Send a request that may produce many responses
    async fn send_streaming(
        &self,
        command: &str,
        payload: Envelope,
        opts: &CallOptions,
    ) -> Result<Box<dyn ResponseSource>, TransportError>;
}

/// Pull-based source of responses for one streaming exchange.
///
/// Dropping the source releases whatever per-call resources the transport
/// holds for it.
#[async_trait]
pub trait ResponseSource: Send {
    /// Whether the remote side has signalled the end of the exchange
    fn is_done(&self) -> bool;

    /// Wait for the next response
    async fn next_response(&mut self) -> Result<Envelope, TransportError>;
}
