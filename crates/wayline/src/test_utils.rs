//! Scripted RPC transport for tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use wayline_proto::{
    CallOptions, Envelope, ErrorCode, ErrorDetails, ResponseSource, RpcTransport, TransportError,
};

/// Which transport primitive a call used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `send_command`
    Command,
    /// `send_request`
    Request,
    /// `send_streaming`
    Streaming,
}

/// One call seen by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// Primitive used
    pub kind: CallKind,
    /// Command name
    pub command: String,
    /// Payload as sent
    pub payload: Envelope,
    /// Options as sent
    pub opts: CallOptions,
}

#[derive(Debug, Clone)]
enum Unary {
    Reply(Result<Envelope, TransportError>),
    Hang,
}

#[derive(Debug, Clone)]
struct StreamScript {
    start: Result<(), TransportError>,
    items: Vec<Result<Envelope, TransportError>>,
    /// Keep pending after the scripted items instead of reporting done
    hang_after: bool,
}

#[derive(Default)]
struct Script {
    unary: HashMap<String, Unary>,
    streams: HashMap<String, StreamScript>,
    calls: Vec<CallRecord>,
}

/// Transport that answers from a script instead of a connection
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    live_sources: Arc<AtomicUsize>,
    reply_delay: Option<Duration>,
}

impl ScriptedTransport {
    /// Transport with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` requests with `response`
    pub fn reply(self, command: impl Into<String>, response: impl Into<Envelope>) -> Self {
        self.lock().unary.insert(command.into(), Unary::Reply(Ok(response.into())));
        self
    }

    /// Fail `command` requests and commands with `error`
    pub fn fail(self, command: impl Into<String>, error: TransportError) -> Self {
        self.lock().unary.insert(command.into(), Unary::Reply(Err(error)));
        self
    }

    /// Never answer `command`
    pub fn hang(self, command: impl Into<String>) -> Self {
        self.lock().unary.insert(command.into(), Unary::Hang);
        self
    }

    /// Stream `items` for `command`, then report done
    pub fn stream(
        self,
        command: impl Into<String>,
        items: Vec<Result<Envelope, TransportError>>,
    ) -> Self {
        self.insert_stream(command, Ok(()), items, false)
    }

    /// Stream `items` for `command`, then wait forever
    pub fn stream_then_hang(
        self,
        command: impl Into<String>,
        items: Vec<Result<Envelope, TransportError>>,
    ) -> Self {
        self.insert_stream(command, Ok(()), items, true)
    }

    /// Refuse to start a stream for `command`
    pub fn stream_fails(self, command: impl Into<String>, error: TransportError) -> Self {
        self.insert_stream(command, Err(error), Vec::new(), false)
    }

    /// Delay every unary answer
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = Some(delay);
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    /// Response sources handed out and not yet dropped
    pub fn live_sources(&self) -> usize {
        self.live_sources.load(Ordering::SeqCst)
    }

    fn insert_stream(
        self,
        command: impl Into<String>,
        start: Result<(), TransportError>,
        items: Vec<Result<Envelope, TransportError>>,
        hang_after: bool,
    ) -> Self {
        self.lock().streams.insert(
            command.into(),
            StreamScript {
                start,
                items,
                hang_after,
            },
        );
        self
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, kind: CallKind, command: &str, payload: Envelope, opts: &CallOptions) {
        self.lock().calls.push(CallRecord {
            kind,
            command: command.to_string(),
            payload,
            opts: opts.clone(),
        });
    }

    async fn answer(&self, command: &str) -> Result<Envelope, TransportError> {
        let unary = self.lock().unary.get(command).cloned();
        if let Some(delay) = self.reply_delay {
            tokio::time::sleep(delay).await;
        }
        match unary {
            Some(Unary::Reply(reply)) => reply,
            Some(Unary::Hang) => std::future::pending().await,
            None => Err(unknown_command(command)),
        }
    }
}

fn unknown_command(command: &str) -> TransportError {
    TransportError::Remote(ErrorDetails::new(
        ErrorCode::UnknownCommand,
        format!("unknown command: {}", command),
    )
    .with_context("command", command))
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn send_command(
        &self,
        command: &str,
        payload: Envelope,
        opts: &CallOptions,
    ) -> Result<(), TransportError> {
        self.record(CallKind::Command, command, payload, opts);
        let failure = match self.lock().unary.get(command) {
            Some(Unary::Reply(Err(e))) => Some(e.clone()),
            _ => None,
        };
        failure.map_or(Ok(()), Err)
    }

    async fn send_request(
        &self,
        command: &str,
        payload: Envelope,
        opts: &CallOptions,
    ) -> Result<Envelope, TransportError> {
        self.record(CallKind::Request, command, payload, opts);
        self.answer(command).await
    }

    async fn send_streaming(
        &self,
        command: &str,
        payload: Envelope,
        opts: &CallOptions,
    ) -> Result<Box<dyn ResponseSource>, TransportError> {
        self.record(CallKind::Streaming, command, payload, opts);
        let script = self
            .lock()
            .streams
            .get(command)
            .cloned()
            .ok_or_else(|| unknown_command(command))?;
        script.start?;

        self.live_sources.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSource {
            items: script.items.into(),
            hang_after: script.hang_after,
            live_sources: self.live_sources.clone(),
        }))
    }
}

struct ScriptedSource {
    items: VecDeque<Result<Envelope, TransportError>>,
    hang_after: bool,
    live_sources: Arc<AtomicUsize>,
}

#[async_trait]
impl ResponseSource for ScriptedSource {
    fn is_done(&self) -> bool {
        self.items.is_empty() && !self.hang_after
    }

    async fn next_response(&mut self) -> Result<Envelope, TransportError> {
        match self.items.pop_front() {
            Some(item) => item,
            None if self.hang_after => std::future::pending().await,
            None => Err(TransportError::Closed),
        }
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.live_sources.fetch_sub(1, Ordering::SeqCst);
    }
}
