//! Self-healing WebSocket channel.
//!
//! A [`ChannelClient`] owns one logical connection to the printer bridge.
//! It dials the endpoint, dispatches frames to caller-supplied
//! [`LifecycleHooks`], and when the transport closes or fails it waits a
//! fixed delay and dials again. There is no retry limit and no backoff:
//! the bridge is a single local peer that is usually reachable.
//!
//! # Example
//!
//! ```rust,ignore
//! use ankerdash_api::{ChannelClient, ChannelConfig, LifecycleHooks};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let config = ChannelConfig::new("telemetry", Url::parse("ws://127.0.0.1:4470/ws/mqtt")?);
//! let hooks = LifecycleHooks::new()
//!     .on_connected(|_| println!("telemetry healthy"))
//!     .on_message(|frame| println!("{} bytes", frame.as_bytes().len()));
//!
//! let channel = ChannelClient::new(config, hooks, CancellationToken::new());
//! channel.connect();
//! // ...
//! channel.shutdown();
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::lifecycle::{ChannelState, Lifecycle};

/// Delay between a close and the next connection attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

// ── Frame ────────────────────────────────────────────────────────────

/// One application frame as received from (or sent to) the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    /// Raw payload bytes, regardless of frame type.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::text(text),
            Self::Binary(data) => Message::binary(data),
        }
    }
}

/// Work item for the writer half of a connection.
enum Outbound {
    Frame(Frame),
    Flush(oneshot::Sender<()>),
}

// ── ChannelConfig ────────────────────────────────────────────────────

/// Static description of a channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Unique name, used for addressing and in logs.
    pub name: String,

    /// WebSocket endpoint.
    pub endpoint: Url,

    /// Frames carry opaque bytes instead of JSON text.
    pub binary: bool,

    /// Fixed delay before every reconnect. Default: 1s.
    pub retry_delay: Duration,
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>, endpoint: Url) -> Self {
        Self {
            name: name.into(),
            endpoint,
            binary: false,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

// ── LifecycleHooks ───────────────────────────────────────────────────

type Hook = Arc<dyn Fn() + Send + Sync>;
type FrameHook = Arc<dyn Fn(&Frame) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Callbacks bound to a channel at construction.
///
/// Every hook is optional. Hooks run on the channel's task, in order, and
/// must not block.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    on_connecting: Option<Hook>,
    on_connected: Option<FrameHook>,
    on_disconnected: Option<Hook>,
    on_transport_error: Option<ErrorHook>,
    on_message: Option<FrameHook>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport reported "connected"; no frame seen yet.
    pub fn on_connecting(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connecting = Some(Arc::new(f));
        self
    }

    /// First frame of a connection. Fires before `on_message` for that frame.
    pub fn on_connected(mut self, f: impl Fn(&Frame) + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(f));
        self
    }

    /// Transport closed, for any reason. A reconnect is already scheduled.
    pub fn on_disconnected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Arc::new(f));
        self
    }

    /// Handshake or transport failure. Always followed by `on_disconnected`.
    pub fn on_transport_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_transport_error = Some(Arc::new(f));
        self
    }

    /// Every frame, including the first.
    pub fn on_message(mut self, f: impl Fn(&Frame) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    fn connecting(&self) {
        if let Some(f) = &self.on_connecting {
            f();
        }
    }

    fn connected(&self, frame: &Frame) {
        if let Some(f) = &self.on_connected {
            f(frame);
        }
    }

    fn disconnected(&self) {
        if let Some(f) = &self.on_disconnected {
            f();
        }
    }

    fn transport_error(&self, err: &Error) {
        if let Some(f) = &self.on_transport_error {
            f(err);
        }
    }

    fn message(&self, frame: &Frame) {
        if let Some(f) = &self.on_message {
            f(frame);
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_connecting", &self.on_connecting.is_some())
            .field("on_connected", &self.on_connected.is_some())
            .field("on_disconnected", &self.on_disconnected.is_some())
            .field("on_transport_error", &self.on_transport_error.is_some())
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

// ── ChannelClient ────────────────────────────────────────────────────

/// Handle to one reconnecting channel.
///
/// Cheaply cloneable via `Arc<ChannelInner>`. Each call to
/// [`connect`](Self::connect) starts a fresh connection loop and retires
/// the previous one; a retired loop never touches state or hooks again.
#[derive(Clone, Debug)]
pub struct ChannelClient {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    config: ChannelConfig,
    hooks: LifecycleHooks,
    cancel: CancellationToken,
    generation: AtomicU64,
    /// Held while a hook runs and while the generation changes.
    hook_gate: Mutex<()>,
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<ChannelState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    session: Mutex<Option<Session>>,
}

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl fmt::Debug for ChannelInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelInner")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl ChannelClient {
    /// Create a channel. Does NOT connect -- call [`connect()`](Self::connect).
    ///
    /// Cancelling `cancel` (or calling [`shutdown`](Self::shutdown)) stops
    /// the connection loop and any pending reconnect timer for good.
    pub fn new(config: ChannelConfig, hooks: LifecycleHooks, cancel: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Closed);
        Self {
            inner: Arc::new(ChannelInner {
                config,
                hooks,
                cancel,
                generation: AtomicU64::new(0),
                hook_gate: Mutex::new(()),
                lifecycle: Mutex::new(Lifecycle::new()),
                state_tx,
                outbound: Mutex::new(None),
                session: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state_tx.borrow()
    }

    /// `true` once a frame has arrived on the current connection.
    pub fn is_healthy(&self) -> bool {
        lock(&self.inner.lifecycle).is_healthy()
    }

    /// Connection attempts started since construction.
    pub fn attempts(&self) -> u64 {
        lock(&self.inner.lifecycle).attempts()
    }

    /// Delay before the next reconnect. Constant across attempts.
    pub fn reconnect_delay(&self) -> Duration {
        self.inner.config.retry_delay
    }

    /// Subscribe to state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    /// Start (or restart) the connection loop.
    ///
    /// Always creates a fresh transport. Any previous loop is cancelled
    /// and its hooks are never invoked again: a hook already running on the
    /// previous transport finishes before this returns. Must be called from
    /// within a Tokio runtime, and never from inside one of this channel's
    /// own hooks. A no-op after [`shutdown`](Self::shutdown).
    pub fn connect(&self) {
        if self.inner.cancel.is_cancelled() {
            warn!(channel = %self.name(), "connect after shutdown ignored");
            return;
        }

        let generation = {
            let _gate = lock(&self.inner.hook_gate);
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        let session_cancel = self.inner.cancel.child_token();

        let inner = Arc::clone(&self.inner);
        let task_cancel = session_cancel.clone();
        let task = tokio::spawn(async move {
            channel_loop(inner, generation, task_cancel).await;
        });

        let previous = lock(&self.inner.session).replace(Session {
            cancel: session_cancel,
            task,
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
            previous.task.abort();
            debug!(channel = %self.name(), generation, "replaced previous transport");
        }
    }

    /// Queue a frame on the open connection.
    ///
    /// Fire-and-forget: the frame is written by the channel task in order
    /// with other sends. Fails if the channel is not `Open`.
    pub fn send(&self, frame: Frame) -> Result<(), Error> {
        let not_open = || Error::ChannelNotOpen {
            channel: self.name().to_owned(),
        };

        if self.state() != ChannelState::Open {
            return Err(not_open());
        }

        let outbound = lock(&self.inner.outbound);
        let tx = outbound.as_ref().ok_or_else(not_open)?;
        tx.send(Outbound::Frame(frame)).map_err(|_| not_open())
    }

    /// Resolve once every frame queued before this call has been written.
    ///
    /// Fails if the connection is not open or drops first.
    pub async fn flush(&self) -> Result<(), Error> {
        let not_open = || Error::ChannelNotOpen {
            channel: self.name().to_owned(),
        };

        let (done_tx, done_rx) = oneshot::channel();
        {
            let outbound = lock(&self.inner.outbound);
            let tx = outbound.as_ref().ok_or_else(not_open)?;
            tx.send(Outbound::Flush(done_tx)).map_err(|_| not_open())?;
        }
        done_rx.await.map_err(|_| not_open())
    }

    /// Stop the loop and cancel any pending reconnect timer.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(session) = lock(&self.inner.session).take() {
            session.task.abort();
        }
        let _gate = lock(&self.inner.hook_gate);
        let current = self.inner.generation.load(Ordering::SeqCst);
        self.inner.retire(current);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        debug!(channel = %self.name(), "channel shut down");
    }
}

impl ChannelInner {
    /// Apply `f` to the lifecycle if `generation` is still current, then
    /// publish the resulting state.
    fn transition<R>(&self, generation: u64, f: impl FnOnce(&mut Lifecycle) -> R) -> Option<R> {
        let mut lifecycle = lock(&self.lifecycle);
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        let out = f(&mut lifecycle);
        self.state_tx.send_replace(lifecycle.state());
        Some(out)
    }

    /// Install the outbound queue and move to `Open`.
    fn open_session(&self, generation: u64, tx: mpsc::UnboundedSender<Outbound>) -> bool {
        let mut lifecycle = lock(&self.lifecycle);
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        *lock(&self.outbound) = Some(tx);
        let opened = lifecycle.opened();
        self.state_tx.send_replace(lifecycle.state());
        opened
    }

    /// Close bookkeeping for a connection. Returns whether the close was a
    /// real transition, or `None` if the generation is stale.
    fn close_session(&self, generation: u64) -> Option<bool> {
        let mut lifecycle = lock(&self.lifecycle);
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        lock(&self.outbound).take();
        let was_live = lifecycle.closed();
        self.state_tx.send_replace(lifecycle.state());
        Some(was_live)
    }

    /// Silent close used on teardown: no hooks.
    fn retire(&self, generation: u64) {
        let _ = self.close_session(generation);
    }

    /// Run `f` against the hooks only if `generation` is still current.
    fn fire(&self, generation: u64, f: impl FnOnce(&LifecycleHooks)) {
        let _gate = lock(&self.hook_gate);
        if self.generation.load(Ordering::SeqCst) == generation {
            f(&self.hooks);
        }
    }

    fn deliver(&self, generation: u64, frame: &Frame) {
        let _gate = lock(&self.hook_gate);
        let Some(first) = self.transition(generation, Lifecycle::message) else {
            return;
        };
        if first {
            debug!(channel = %self.config.name, "first frame received, channel healthy");
            self.hooks.connected(frame);
        }
        self.hooks.message(frame);
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on close or error, wait → reconnect.
async fn channel_loop(inner: Arc<ChannelInner>, generation: u64, cancel: CancellationToken) {
    let name = inner.config.name.clone();

    loop {
        if inner.transition(generation, Lifecycle::begin_connect).is_none() {
            break;
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&inner, generation, &cancel) => result,
        };

        if let Err(ref e) = result {
            warn!(channel = %name, error = %e, "channel transport error");
            inner.fire(generation, |hooks| hooks.transport_error(e));
        } else {
            info!(channel = %name, "channel closed");
        }

        match inner.close_session(generation) {
            None => break,
            Some(true) => inner.fire(generation, LifecycleHooks::disconnected),
            Some(false) => {}
        }

        let delay = inner.config.retry_delay;
        info!(
            channel = %name,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    inner.retire(generation);
    debug!(channel = %name, generation, "channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a single WebSocket connection and pump frames until it drops.
async fn connect_and_read(
    inner: &ChannelInner,
    generation: u64,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let name = inner.config.name.as_str();
    info!(channel = name, url = %inner.config.endpoint, "connecting");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(inner.config.endpoint.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    if !inner.open_session(generation, tx) {
        return Ok(());
    }
    info!(channel = name, "transport open");
    inner.fire(generation, LifecycleHooks::connecting);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            Some(outbound) = rx.recv() => match outbound {
                Outbound::Frame(frame) => {
                    write
                        .send(frame.into_message())
                        .await
                        .map_err(|e| Error::WebSocketTransport(e.to_string()))?;
                }
                Outbound::Flush(done) => {
                    write
                        .flush()
                        .await
                        .map_err(|e| Error::WebSocketTransport(e.to_string()))?;
                    let _ = done.send(());
                }
            },
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        inner.deliver(generation, &Frame::Text(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if !inner.config.binary {
                            trace!(channel = name, len = data.len(), "binary frame on text channel");
                        }
                        inner.deliver(generation, &Frame::Binary(data));
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        trace!(channel = name, "ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            info!(
                                channel = name,
                                code = %cf.code,
                                reason = %cf.reason,
                                "close frame received"
                            );
                        } else {
                            info!(channel = name, "close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketTransport(e.to_string()));
                    }
                    None => {
                        info!(channel = name, "stream ended");
                        return Ok(());
                    }
                    Some(Ok(_)) => {
                        // Pong, raw Frame -- ignore
                    }
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::mpsc as std_mpsc;

    use super::*;

    fn config() -> ChannelConfig {
        ChannelConfig::new("control", Url::parse("ws://127.0.0.1:9/ws/ctrl").unwrap())
    }

    #[test]
    fn default_config() {
        let cfg = config();
        assert_eq!(cfg.retry_delay, Duration::from_secs(1));
        assert!(!cfg.binary);
    }

    #[test]
    fn reconnect_delay_is_fixed() {
        let channel = ChannelClient::new(
            config().with_retry_delay(Duration::from_millis(250)),
            LifecycleHooks::new(),
            CancellationToken::new(),
        );
        assert_eq!(channel.reconnect_delay(), Duration::from_millis(250));
    }

    #[test]
    fn new_channel_is_closed() {
        let channel = ChannelClient::new(config(), LifecycleHooks::new(), CancellationToken::new());
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(!channel.is_healthy());
        assert_eq!(channel.attempts(), 0);
    }

    #[test]
    fn send_on_closed_channel_fails() {
        let channel = ChannelClient::new(config(), LifecycleHooks::new(), CancellationToken::new());
        let err = channel.send(Frame::Text("{}".into())).unwrap_err();
        assert!(matches!(err, Error::ChannelNotOpen { ref channel } if channel == "control"));
    }

    #[test]
    fn connect_after_shutdown_is_ignored() {
        let channel = ChannelClient::new(config(), LifecycleHooks::new(), CancellationToken::new());
        channel.shutdown();
        // No runtime needed: nothing is spawned.
        channel.connect();
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(channel.attempts(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connect_waits_for_a_running_hook_and_retires_its_transport() {
        let (entered_tx, entered_rx) = std_mpsc::channel::<()>();
        let (release_tx, release_rx) = std_mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let s = Arc::clone(&seen);
        let hooks = LifecycleHooks::new().on_message(move |frame| {
            let text = String::from_utf8_lossy(frame.as_bytes()).into_owned();
            if text == "slow" {
                entered_tx.send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
            }
            s.lock().unwrap().push(text);
        });

        let channel = ChannelClient::new(
            config().with_retry_delay(Duration::from_secs(60)),
            hooks,
            CancellationToken::new(),
        );
        let inner = Arc::clone(&channel.inner);

        // An open transport on generation 1.
        inner.generation.store(1, Ordering::SeqCst);
        inner.transition(1, Lifecycle::begin_connect).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(inner.open_session(1, tx));

        let reader = std::thread::spawn({
            let inner = Arc::clone(&inner);
            move || inner.deliver(1, &Frame::Text("slow".into()))
        });
        entered_rx.recv().unwrap();

        let reconnected = Arc::new(AtomicBool::new(false));
        let runtime = tokio::runtime::Handle::current();
        let connector = std::thread::spawn({
            let channel = channel.clone();
            let reconnected = Arc::clone(&reconnected);
            move || {
                let _guard = runtime.enter();
                channel.connect();
                reconnected.store(true, Ordering::SeqCst);
            }
        });

        std::thread::sleep(Duration::from_millis(100));
        assert!(!reconnected.load(Ordering::SeqCst));

        release_tx.send(()).unwrap();
        reader.join().unwrap();
        connector.join().unwrap();
        assert!(reconnected.load(Ordering::SeqCst));

        // The replaced transport no longer reaches the hooks.
        inner.deliver(1, &Frame::Text("stale".into()));
        assert_eq!(*seen.lock().unwrap(), vec!["slow".to_owned()]);

        channel.shutdown();
    }

    #[test]
    fn hooks_are_optional() {
        let hooks = LifecycleHooks::new();
        hooks.connecting();
        hooks.connected(&Frame::Text(String::new()));
        hooks.disconnected();
        hooks.transport_error(&Error::WebSocketConnect("refused".into()));
        hooks.message(&Frame::Binary(Bytes::new()));
    }

    #[test]
    fn hooks_fire_the_bound_closures() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let hooks = LifecycleHooks::new().on_message(move |frame| {
            c.fetch_add(frame.as_bytes().len(), Ordering::SeqCst);
        });

        hooks.message(&Frame::Text("abc".into()));
        hooks.message(&Frame::Binary(Bytes::from_static(&[1, 2])));
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn hooks_debug_shows_presence() {
        let hooks = LifecycleHooks::new().on_connecting(|| {});
        let dbg = format!("{hooks:?}");
        assert!(dbg.contains("on_connecting: true"));
        assert!(dbg.contains("on_message: false"));
    }
}
