use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{AccountLoop, SignalSource};

/// The set of running account loops sharing one shutdown signal.
pub struct Fleet {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl Default for Fleet {
    fn default() -> Self {
        Self::new()
    }
}

impl Fleet {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            tasks: Vec::new(),
        }
    }

    pub fn spawn<S>(&mut self, account_loop: AccountLoop<S>)
    where
        S: SignalSource + Sync + 'static,
    {
        let account_id = account_loop.account_id().to_string();
        let rx = self.shutdown.subscribe();
        let handle = tokio::spawn(account_loop.run(rx));
        self.tasks.push((account_id, handle));
    }

    /// Receiver that flips to true when [`Fleet::shutdown`] is called.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn account_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Signal every loop and wait for each to finish its current tick.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (account_id, handle) in self.tasks {
            match handle.await {
                Ok(()) => info!(%account_id, "account loop joined"),
                Err(e) => error!(%account_id, error = %e, "account loop task failed"),
            }
        }
    }
}
