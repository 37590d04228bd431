//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use uuid::Uuid;

use btsms_bridge::bluetooth::{LinkStream, SerialLink};
use btsms_bridge::error::{ConnectError, LocationError, ReadError, SendError};
use btsms_bridge::platform::{
    Accuracy, ConfigurationStore, Location, LocationProvider, MessageTransport, NotificationSink,
};

/// What the peer does next on an open stream.
pub enum Step {
    Data(Vec<u8>),
    Error(String),
    Close,
    Panic,
}

pub struct MockStream {
    steps: mpsc::UnboundedReceiver<Step>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl LinkStream for MockStream {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        match self.steps.recv().await {
            Some(Step::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(Step::Error(msg)) => Err(ReadError(msg)),
            Some(Step::Close) | None => Ok(0),
            Some(Step::Panic) => panic!("stream driver crashed"),
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Test side of a [`MockStream`].
#[derive(Clone)]
pub struct Peer {
    steps: mpsc::UnboundedSender<Step>,
    closed: Arc<AtomicBool>,
}

impl Peer {
    pub fn send(&self, payload: &str) {
        let _ = self.steps.send(Step::Data(payload.as_bytes().to_vec()));
    }

    pub fn fail(&self, msg: &str) {
        let _ = self.steps.send(Step::Error(msg.to_string()));
    }

    pub fn crash(&self) {
        let _ = self.steps.send(Step::Panic);
    }

    pub fn hang_up(&self) {
        let _ = self.steps.send(Step::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn mock_stream() -> (Peer, MockStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    (
        Peer {
            steps: tx,
            closed: Arc::clone(&closed),
        },
        MockStream { steps: rx, closed },
    )
}

/// Serial link whose open results are scripted by the test.
///
/// Once the script runs out every attempt fails with `ConnectFailed`.
pub struct MockLink {
    adapter_on: AtomicBool,
    script: Mutex<VecDeque<Result<MockStream, ConnectError>>>,
    opens: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    open_delay: Duration,
}

impl MockLink {
    pub fn new() -> Arc<Self> {
        Self::with_open_delay(Duration::ZERO)
    }

    pub fn with_open_delay(open_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            adapter_on: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            opens: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            open_delay,
        })
    }

    pub fn set_adapter(&self, on: bool) {
        self.adapter_on.store(on, Ordering::SeqCst);
    }

    pub fn push_failure(&self, err: ConnectError) {
        self.script.lock().push_back(Err(err));
    }

    /// Script a successful open and return the peer end.
    pub fn push_stream(&self) -> Peer {
        let (peer, stream) = mock_stream();
        self.script.lock().push_back(Ok(stream));
        peer
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.opens.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SerialLink for MockLink {
    async fn adapter_enabled(&self) -> bool {
        self.adapter_on.load(Ordering::SeqCst)
    }

    async fn open(
        &self,
        _peer_name: &str,
        _service_id: Uuid,
    ) -> Result<Box<dyn LinkStream>, ConnectError> {
        self.opens.lock().push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        let next = self.script.lock().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match next {
            Some(Ok(stream)) => Ok(Box::new(stream)),
            Some(Err(e)) => Err(e),
            None => Err(ConnectError::ConnectFailed("connection refused".to_string())),
        }
    }
}

/// Records every notification update.
#[derive(Default)]
pub struct RecordingSink {
    bodies: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn upsert(&self, _title: &str, body: &str) {
        self.bodies.lock().push(body.to_string());
    }
}

/// Records sends; optionally refuses them.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<(String, Vec<String>)>>,
    fail: AtomicBool,
}

impl MockTransport {
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail.store(true, Ordering::SeqCst);
        transport
    }

    pub fn sent(&self) -> Vec<(String, Vec<String>)> {
        self.sent.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    fn backend_name(&self) -> &'static str {
        "mock"
    }

    async fn send_message(&self, destination: &str, parts: &[String]) -> Result<(), SendError> {
        self.sent
            .lock()
            .push((destination.to_string(), parts.to_vec()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(SendError::SendFailed("no service".to_string()));
        }
        Ok(())
    }
}

/// Destination number held in memory.
pub struct MockStore {
    number_tx: watch::Sender<String>,
}

impl MockStore {
    pub fn new(number: &str) -> Self {
        let (number_tx, _) = watch::channel(number.to_string());
        Self { number_tx }
    }

    pub fn set(&self, number: &str) {
        self.number_tx.send_replace(number.to_string());
    }
}

impl ConfigurationStore for MockStore {
    fn destination_number(&self) -> String {
        self.number_tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<String> {
        self.number_tx.subscribe()
    }
}

/// Answers after `delay`, or fails when `location` is `None`.
pub struct SlowLocation {
    pub delay: Duration,
    pub location: Option<Location>,
}

#[async_trait]
impl LocationProvider for SlowLocation {
    async fn current_location(&self, _accuracy: Accuracy) -> Result<Location, LocationError> {
        tokio::time::sleep(self.delay).await;
        self.location
            .ok_or_else(|| LocationError::LocationUnavailable("no fix".to_string()))
    }
}

/// Poll `cond` on the paused clock until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cond()
}
