//! Bootstrap state tracking and graceful shutdown with in-flight call tracking.
//!
//! Uses `ArcSwap` for lock-free state transitions and an atomic counter
//! with RAII guards for accurate in-flight call tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

/// Process lifecycle state.
///
/// State machine: Unstarted -> SecretValidated -> ListenerBound ->
/// HandshakeEmitted -> Serving -> ShuttingDown -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// Nothing has run yet.
    Unstarted,
    /// The pre-shared secret matched.
    SecretValidated,
    /// The RPC listener holds a port.
    ListenerBound,
    /// The handshake line has been written to stdout.
    HandshakeEmitted,
    /// Calls are being accepted.
    Serving,
    /// A termination signal arrived; in-flight calls are draining.
    ShuttingDown,
    /// Everything has stopped.
    Stopped,
}

impl BootstrapState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BootstrapState::Unstarted => "unstarted",
            BootstrapState::SecretValidated => "secret_validated",
            BootstrapState::ListenerBound => "listener_bound",
            BootstrapState::HandshakeEmitted => "handshake_emitted",
            BootstrapState::Serving => "serving",
            BootstrapState::ShuttingDown => "shutting_down",
            BootstrapState::Stopped => "stopped",
        }
    }
}

/// Tracks bootstrap state and coordinates graceful shutdown.
///
/// 1. The bootstrap sequence advances the state with `advance()`
/// 2. The RPC service holds an `in_flight_guard()` per call
/// 3. `trigger_shutdown()` moves to `ShuttingDown` and signals listeners
/// 4. `wait_for_drain()` waits, bounded, until in-flight calls complete
#[derive(Debug)]
pub struct ShutdownController {
    shutdown_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    state: ArcSwap<BootstrapState>,
}

impl ShutdownController {
    /// Creates a new controller in the `Unstarted` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            shutdown_signal: tx,
            in_flight: Arc::new(AtomicU64::new(0)),
            state: ArcSwap::from_pointee(BootstrapState::Unstarted),
        }
    }

    /// Moves to `next`.
    pub fn advance(&self, next: BootstrapState) {
        self.state.store(Arc::new(next));
    }

    #[must_use]
    pub fn state(&self) -> BootstrapState {
        **self.state.load()
    }

    /// Returns a receiver notified when shutdown is triggered.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// Moves to `ShuttingDown` and signals all shutdown receivers.
    pub fn trigger_shutdown(&self) {
        self.advance(BootstrapState::ShuttingDown);
        // Receivers may already be gone.
        let _ = self.shutdown_signal.send(true);
    }

    /// Creates an RAII guard that tracks an in-flight call.
    ///
    /// The counter is decremented when the guard drops, including during
    /// unwinding.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits for in-flight calls to complete, up to `timeout`.
    ///
    /// Returns `true` and moves to `Stopped` if everything drained. Returns
    /// `false` if the timeout expired; the state stays `ShuttingDown`.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                self.advance(BootstrapState::Stopped);
                return true;
            }

            if tokio::time::Instant::now() >= deadline {
                return false;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
