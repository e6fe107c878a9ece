//! Push-style response streams
//!
//! A streaming call is driven by one worker task that pulls from the
//! transport's [`ResponseSource`] and pushes decoded items into a bounded
//! channel. The worker owns the only sender, so the channel closes exactly
//! once, when the worker ends.

use futures::Stream;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};
use uuid::Uuid;
use wayline_proto::{
    CallError, CallOptions, Envelope, ResponseOrError, ResponseSource, RpcTransport,
};

/// One response in flight at a time
const STREAM_CAPACITY: usize = 1;

/// Receiving end of a streaming call.
///
/// Each item is a [`ResponseOrError`]. Items arrive in transport order. At
/// most one error is delivered, and it is always the last item. Dropping the stream stops the worker and
/// releases the transport's response source.
pub struct ResponseStream<T> {
    id: Uuid,
    rx: mpsc::Receiver<ResponseOrError<T>>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl<T> ResponseStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(crate) fn spawn(
        transport: Option<Arc<dyn RpcTransport>>,
        command: String,
        payload: Result<Envelope, CallError>,
        opts: CallOptions,
        parent: &CancellationToken,
    ) -> Self {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let cancel = parent.child_token();

        let worker = Worker {
            id,
            transport,
            command,
            payload,
            opts,
            tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(worker.run());

        Self {
            id,
            rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }
}

impl<T> ResponseStream<T> {
    /// Identifier used in this stream's log lines
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Receive the next item; `None` once the stream has closed
    pub async fn recv(&mut self) -> Option<ResponseOrError<T>> {
        self.rx.recv().await
    }

    /// Drain the stream, stopping at the first error
    pub async fn collect_all(mut self) -> Result<Vec<T>, CallError> {
        let mut items = Vec::new();
        while let Some(item) = self.rx.recv().await {
            items.push(item.into_result()?);
        }
        Ok(items)
    }

    /// Stop the worker; items already buffered can still be received
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the stream was cancelled, directly or through its parent
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> Stream for ResponseStream<T> {
    type Item = ResponseOrError<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// State moved into the worker task
struct Worker<T> {
    id: Uuid,
    transport: Option<Arc<dyn RpcTransport>>,
    command: String,
    payload: Result<Envelope, CallError>,
    opts: CallOptions,
    tx: mpsc::Sender<ResponseOrError<T>>,
    cancel: CancellationToken,
}

impl<T> Worker<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn run(self) {
        let Worker {
            id,
            transport,
            command,
            payload,
            opts,
            tx,
            cancel,
        } = self;

        debug!("Stream {} starting {}", id, command);

        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Stream {} cancelled before start", id);
                return;
            }
            started = start(transport, &command, payload, &opts) => started,
        };

        let mut source = match started {
            Ok(source) => source,
            Err(e) => {
                debug!("Stream {} failed to start: {}", id, e);
                // The channel is empty, so the single error always fits
                let _ = tx.try_send(ResponseOrError::Error(e));
                return;
            }
        };

        let mut received = 0usize;
        loop {
            if source.is_done() {
                debug!("Stream {} done after {} responses", id, received);
                break;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Stream {} cancelled after {} responses", id, received);
                    break;
                }
                _ = tx.closed() => {
                    debug!("Stream {} receiver dropped after {} responses", id, received);
                    break;
                }
                next = source.next_response() => next,
            };

            let item = match next.map_err(CallError::from).and_then(Envelope::decode::<T>) {
                Ok(item) => item,
                Err(e) => {
                    debug!("Stream {} terminated after {} responses: {}", id, received, e);
                    let terminated = CallError::StreamTerminated {
                        received,
                        source: Box::new(e),
                    };
                    deliver(&tx, &cancel, ResponseOrError::Error(terminated)).await;
                    break;
                }
            };

            if !deliver(&tx, &cancel, ResponseOrError::Response(item)).await {
                break;
            }
            received += 1;
            trace!("Stream {} delivered response {}", id, received);
        }

        // Release the transport's resources before the channel closes
        drop(source);
        drop(tx);
    }
}

async fn start(
    transport: Option<Arc<dyn RpcTransport>>,
    command: &str,
    payload: Result<Envelope, CallError>,
    opts: &CallOptions,
) -> Result<Box<dyn ResponseSource>, CallError> {
    let transport = transport.ok_or(CallError::TransportUnavailable)?;
    let payload = payload?;
    Ok(transport.send_streaming(command, payload, opts).await?)
}

/// Push one item, giving up if the stream is cancelled or its receiver is
/// gone. Returns whether the item was accepted.
async fn deliver<T>(
    tx: &mpsc::Sender<ResponseOrError<T>>,
    cancel: &CancellationToken,
    item: ResponseOrError<T>,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}
