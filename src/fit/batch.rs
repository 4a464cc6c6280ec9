//! Multi-channel fitting.
//!
//! Channels are independent: each is fit on the rayon pool and a failure is
//! recorded on that channel only. `BatchWorker` moves the whole batch off the
//! calling thread and reports back over a channel, so a front end stays
//! responsive while fits run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{DecayCurve, FitOptions, FitResult, ModelKind, ModelScore};
use crate::error::FitError;
use crate::fit::selection::fit_curve;

/// Outcome of fitting one channel.
#[derive(Debug, Clone)]
pub struct ChannelFit {
    pub channel: u32,
    pub outcome: Result<FitResult, FitError>,
    /// Every converged candidate, in bank order. Empty when the fit failed.
    pub scores: Vec<ModelScore>,
    /// Candidates that were skipped or failed, and why.
    pub skipped: Vec<(ModelKind, String)>,
}

/// Shared cancellation flag.
///
/// Checked before each channel starts; a solve already in flight finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Message sent once by a [`BatchWorker`].
#[derive(Debug)]
pub enum BatchEvent {
    Completed(Vec<ChannelFit>),
    /// Channels that finished before cancellation was observed, in input order.
    Cancelled { completed: Vec<ChannelFit> },
}

/// Fit every curve. Output order matches input order.
pub fn fit_batch(curves: &[DecayCurve], opts: &FitOptions) -> Vec<ChannelFit> {
    fit_batch_cancellable(curves, opts, &CancelToken::new())
}

/// Fit every curve unless `token` is cancelled. Channels skipped because of
/// cancellation are left out of the result.
pub fn fit_batch_cancellable(
    curves: &[DecayCurve],
    opts: &FitOptions,
    token: &CancelToken,
) -> Vec<ChannelFit> {
    info!(channels = curves.len(), "fitting batch");

    let fits: Vec<Option<ChannelFit>> = curves
        .par_iter()
        .map(|curve| {
            if token.is_cancelled() {
                return None;
            }
            let fit = match fit_curve(curve, opts) {
                Ok(selection) => ChannelFit {
                    channel: curve.channel,
                    outcome: Ok(selection.best),
                    scores: selection.scores,
                    skipped: selection.skipped,
                },
                Err(e) => {
                    debug!(channel = curve.channel, error = %e, "channel fit failed");
                    ChannelFit {
                        channel: curve.channel,
                        outcome: Err(e),
                        scores: Vec::new(),
                        skipped: Vec::new(),
                    }
                }
            };
            Some(fit)
        })
        .collect();

    fits.into_iter().flatten().collect()
}

/// `Cancelled` only when cancellation actually left channels unfit.
fn batch_event(fits: Vec<ChannelFit>, total: usize) -> BatchEvent {
    if fits.len() < total {
        info!(completed = fits.len(), total, "batch cancelled");
        BatchEvent::Cancelled { completed: fits }
    } else {
        BatchEvent::Completed(fits)
    }
}

/// A batch fit running on its own thread.
pub struct BatchWorker {
    token: CancelToken,
    rx: Receiver<BatchEvent>,
    handle: Option<JoinHandle<()>>,
}

impl BatchWorker {
    pub fn spawn(curves: Vec<DecayCurve>, opts: FitOptions) -> Self {
        Self::spawn_with_token(curves, opts, CancelToken::new())
    }

    pub fn spawn_with_token(curves: Vec<DecayCurve>, opts: FitOptions, token: CancelToken) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker_token = token.clone();

        let handle = thread::spawn(move || {
            let fits = fit_batch_cancellable(&curves, &opts, &worker_token);
            // The receiver may already be gone; nobody is left to tell.
            let _ = tx.send(batch_event(fits, curves.len()));
        });

        Self {
            token,
            rx,
            handle: Some(handle),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Non-blocking poll.
    pub fn try_event(&self) -> Option<BatchEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the batch finishes. `None` if the worker thread died.
    pub fn wait(mut self) -> Option<BatchEvent> {
        let event = self.rx.recv().ok();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::SyntheticDecay;
    use crate::domain::HISTOGRAM_BINS;
    use crate::math::linspace;

    fn curves() -> Vec<DecayCurve> {
        let good = SyntheticDecay {
            components: vec![(900.0, 2.5)],
            background: 8.0,
            ..SyntheticDecay::default()
        };
        vec![
            good.curve(0).unwrap(),
            DecayCurve::new(1, linspace(0.0, 25.0, HISTOGRAM_BINS), vec![0.0; HISTOGRAM_BINS]),
            good.curve(2).unwrap(),
        ]
    }

    #[test]
    fn failing_channel_does_not_abort_batch() {
        let fits = fit_batch(&curves(), &FitOptions::default());
        assert_eq!(fits.iter().map(|f| f.channel).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(fits[0].outcome.is_ok());
        assert_eq!(fits[1].outcome.as_ref().unwrap_err(), &FitError::AllCountsZero);
        assert!(fits[2].outcome.is_ok());
    }

    #[test]
    fn worker_delivers_completed_event() {
        let worker = BatchWorker::spawn(curves(), FitOptions::default());
        match worker.wait() {
            Some(BatchEvent::Completed(fits)) => assert_eq!(fits.len(), 3),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn cancelled_before_start_fits_nothing() {
        let token = CancelToken::new();
        token.cancel();
        let worker = BatchWorker::spawn_with_token(curves(), FitOptions::default(), token);
        match worker.wait() {
            Some(BatchEvent::Cancelled { completed }) => assert!(completed.is_empty()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn polling_eventually_yields_the_single_event() {
        let worker = BatchWorker::spawn(curves(), FitOptions::default());
        let event = loop {
            if let Some(event) = worker.try_event() {
                break event;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        };
        assert!(matches!(event, BatchEvent::Completed(ref fits) if fits.len() == 3));

        worker.cancel();
        assert!(worker.try_event().is_none());
    }

    #[test]
    fn late_cancellation_keeps_a_complete_batch() {
        let token = CancelToken::new();
        let fits = fit_batch_cancellable(&curves(), &FitOptions::default(), &token);
        token.cancel();
        assert_eq!(fits.len(), 3);
        assert!(fits[0].scores.iter().any(|s| s.model == fits[0].outcome.as_ref().unwrap().model));
        assert!(fits[1].scores.is_empty());

        match batch_event(fits.clone(), 3) {
            BatchEvent::Completed(done) => assert_eq!(done.len(), 3),
            other => panic!("unexpected event: {other:?}"),
        }
        match batch_event(fits[..1].to_vec(), 3) {
            BatchEvent::Cancelled { completed } => assert_eq!(completed.len(), 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
