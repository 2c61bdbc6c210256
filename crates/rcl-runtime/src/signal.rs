use rcl_schemas::TradeCandidate;
use tokio::sync::mpsc;

/// Where an account loop gets its trade candidates.
///
/// Polled once per tick, after protection and close detection. Must not
/// block: return `None` when nothing is ready.
pub trait SignalSource: Send {
    fn poll_candidate(&mut self) -> Option<TradeCandidate>;
}

/// Candidates pushed from elsewhere in the process (e.g. the admin API).
pub struct ChannelSignalSource {
    rx: mpsc::Receiver<TradeCandidate>,
}

impl ChannelSignalSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<TradeCandidate>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

impl SignalSource for ChannelSignalSource {
    fn poll_candidate(&mut self) -> Option<TradeCandidate> {
        self.rx.try_recv().ok()
    }
}

/// A source that never produces anything; protection-only loops.
#[derive(Default)]
pub struct NoSignals;

impl SignalSource for NoSignals {
    fn poll_candidate(&mut self) -> Option<TradeCandidate> {
        None
    }
}
