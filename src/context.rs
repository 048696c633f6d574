use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use displaydoc::Display;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::config::Config;
use crate::database::{self, Pool};
use crate::dispatch::job::JobRegistry;
use crate::dispatch::{self, Queues, Workers};
use crate::remote::{Executor, SshExecutor};

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Failed to create database pool: {0}
    Pool(database::Error),
}

/// Shared service state handed to handlers, dispatchers and drivers.
pub struct Context {
    pub config: Config,
    pub pool: Pool,
    pub executor: Arc<dyn Executor>,
    pub queues: Queues,
    pub jobs: JobRegistry,
    pub locks: MachineLocks,
}

impl Context {
    /// Builds the context and returns the queue consumers alongside it, for
    /// [`dispatch::spawn`].
    pub async fn new(config: Config) -> Result<(Arc<Self>, Workers), Error> {
        let pool = Pool::new(&config.database).await.map_err(Error::Pool)?;
        let executor = Arc::new(SshExecutor::new(&config.ssh, &config.docker));
        let (queues, workers) = dispatch::queues(config.queue_depth);

        let context = Arc::new(Context {
            config,
            pool,
            executor,
            queues,
            jobs: JobRegistry::default(),
            locks: MachineLocks::default(),
        });
        Ok((context, workers))
    }
}

/// Name-keyed locks that make lifecycle operations on the same machine
/// mutually exclusive. Operations on different machines do not contend.
#[derive(Default)]
pub struct MachineLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl MachineLocks {
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("machine locks poisoned");
            locks.entry(name.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_machine_is_serialized() {
        let locks = MachineLocks::default();
        let guard = locks.acquire("VM_ab12").await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire("VM_ab12"));
        assert!(blocked.await.is_err());

        drop(guard);
        let _reacquired = locks.acquire("VM_ab12").await;
    }

    #[tokio::test]
    async fn different_machines_do_not_contend() {
        let locks = MachineLocks::default();
        let _a = locks.acquire("VM_ab12").await;
        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire("VM_cd34"));
        assert!(other.await.is_ok());
    }
}
