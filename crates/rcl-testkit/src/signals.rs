use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rcl_runtime::SignalSource;
use rcl_schemas::TradeCandidate;

/// A signal source fed by the test. Candidates come out one per tick in the
/// order they were pushed.
#[derive(Default)]
pub struct ScriptedSignals {
    queue: Arc<Mutex<VecDeque<TradeCandidate>>>,
}

/// Push side of a [`ScriptedSignals`]; stays usable after the source has
/// moved into a running loop.
#[derive(Clone)]
pub struct ScriptHandle {
    queue: Arc<Mutex<VecDeque<TradeCandidate>>>,
}

impl ScriptedSignals {
    pub fn new(script: impl IntoIterator<Item = TradeCandidate>) -> (ScriptHandle, Self) {
        let queue = Arc::new(Mutex::new(script.into_iter().collect()));
        (
            ScriptHandle {
                queue: Arc::clone(&queue),
            },
            Self { queue },
        )
    }
}

impl ScriptHandle {
    pub fn push(&self, c: TradeCandidate) {
        self.queue.lock().push_back(c);
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl SignalSource for ScriptedSignals {
    fn poll_candidate(&mut self) -> Option<TradeCandidate> {
        self.queue.lock().pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::long_candidate;

    #[test]
    fn yields_in_push_order_then_none() {
        let first = long_candidate("a", "s", "EUR_USD", 1.1, 1.095, 1.11);
        let (handle, mut src) = ScriptedSignals::new([first.clone()]);
        let mut second = first.clone();
        second.rationale = "second".to_string();
        handle.push(second.clone());

        assert_eq!(handle.pending(), 2);
        assert_eq!(src.poll_candidate(), Some(first));
        assert_eq!(src.poll_candidate(), Some(second));
        assert_eq!(src.poll_candidate(), None);
        assert_eq!(handle.pending(), 0);
    }
}
