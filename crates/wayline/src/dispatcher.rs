//! Typed unary and streaming calls over an RPC transport

use crate::stream::ResponseStream;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;
use wayline_proto::{CallError, CallOptions, Envelope, ResponseOrError, RpcTransport};

/// Issues typed calls through an optional transport.
///
/// A dispatcher without a transport is valid; every call on it fails with
/// [`CallError::TransportUnavailable`]. Cloning is cheap and clones share the
/// transport and cancellation token.
#[derive(Clone, Default)]
pub struct Dispatcher {
    /// Bound transport, if any
    transport: Option<Arc<dyn RpcTransport>>,
    /// Cancels every call issued through this dispatcher
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher bound to `transport`
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport: Some(transport),
            cancel: CancellationToken::new(),
        }
    }

    /// Create a dispatcher with no transport
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Replace the cancellation token.
    ///
    /// Pass a child token to cancel a group of calls without affecting the
    /// rest of the dispatcher's users.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Whether a transport is bound
    pub fn is_bound(&self) -> bool {
        self.transport.is_some()
    }

    /// The dispatcher's cancellation token
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel every outstanding and future call of this dispatcher
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Send `command` and decode its single response into `T`.
    ///
    /// With `no_response` set, only the send is awaited and `T::default()`
    /// is returned.
    pub async fn call<T, P>(
        &self,
        command: &str,
        payload: &P,
        opts: Option<&CallOptions>,
    ) -> Result<T, CallError>
    where
        T: DeserializeOwned + Default,
        P: Serialize + ?Sized,
    {
        let call_id = Uuid::new_v4();
        let Some(transport) = self.transport.as_ref() else {
            warn!("Call {} ({}) issued with no transport bound", call_id, command);
            return Err(CallError::TransportUnavailable);
        };
        let opts = opts.cloned().unwrap_or_default();
        let payload = Envelope::encode(payload)?;

        debug!("Call {} sending {} (no_response: {})", call_id, command, opts.no_response);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CallError::Cancelled),
            result = exchange(transport.as_ref(), command, payload, &opts) => result,
        };

        if let Err(e) = &result {
            debug!("Call {} ({}) failed: {}", call_id, command, e);
        }
        result
    }

    /// Like [`Dispatcher::call`], returning the tagged result
    pub async fn call_tagged<T, P>(
        &self,
        command: &str,
        payload: &P,
        opts: Option<&CallOptions>,
    ) -> ResponseOrError<T>
    where
        T: DeserializeOwned + Default,
        P: Serialize + ?Sized,
    {
        self.call(command, payload, opts).await.into()
    }

    /// Fire-and-forget `command`
    pub async fn send<P>(
        &self,
        command: &str,
        payload: &P,
        opts: Option<&CallOptions>,
    ) -> Result<(), CallError>
    where
        P: Serialize + ?Sized,
    {
        let mut opts = opts.cloned().unwrap_or_default();
        opts.no_response = true;
        self.call::<(), P>(command, payload, Some(&opts)).await
    }

    /// Start a streaming call and return a stream of decoded responses.
    ///
    /// Failures to start are delivered as the stream's only item.
    pub fn stream<T, P>(
        &self,
        command: &str,
        payload: &P,
        opts: Option<&CallOptions>,
    ) -> ResponseStream<T>
    where
        T: DeserializeOwned + Send + 'static,
        P: Serialize + ?Sized,
    {
        ResponseStream::spawn(
            self.transport.clone(),
            command.to_string(),
            Envelope::encode(payload),
            opts.cloned().unwrap_or_default(),
            &self.cancel,
        )
    }
}

async fn exchange<T>(
    transport: &dyn RpcTransport,
    command: &str,
    payload: Envelope,
    opts: &CallOptions,
) -> Result<T, CallError>
where
    T: DeserializeOwned + Default,
{
    if opts.no_response {
        transport.send_command(command, payload, opts).await?;
        return Ok(T::default());
    }
    let envelope = transport.send_request(command, payload, opts).await?;
    envelope.decode()
}
