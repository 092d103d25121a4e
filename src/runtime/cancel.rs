//! Cancellation token for the active run.
//!
//! The orchestrator keeps the sending side; the stream reader holds a
//! [`CancelToken`] and observes it at every read.

use tokio::sync::watch;

/// Receiving half handed to the stream reader.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Resolve once cancellation is signalled. A dropped controller counts as
    /// a cancellation.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct CancellationController {
    tx: Option<watch::Sender<bool>>,
    in_flight: bool,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fresh token for a new session, dropping any previous one.
    pub fn open(&mut self) -> CancelToken {
        let (tx, rx) = watch::channel(false);
        self.tx = Some(tx);
        self.in_flight = false;
        CancelToken { rx }
    }

    /// Signal the token and mark a cancel as in flight.
    ///
    /// Returns `false` when a cancel is already in flight or no token is
    /// armed, which makes repeated calls no-ops.
    pub fn begin(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        let Some(tx) = &self.tx else {
            return false;
        };
        let _ = tx.send(true);
        self.in_flight = true;
        true
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Disarm after the session reached a terminal state.
    pub fn finish(&mut self) {
        self.in_flight = false;
        self.tx = None;
    }

    /// Stop the reader without starting a remote cancel.
    pub fn abort_silently(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(true);
        }
        self.in_flight = false;
    }
}
