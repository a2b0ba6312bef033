//! Shard runtime — spawns and owns the per-shard worker threads.

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use strata_core::config::StrataConfig;
use strata_sessions::SessionRegistry;

use crate::router::ShardRouter;
use crate::worker;

/// The running set of shard workers plus their shared registry.
pub struct ShardRuntime {
    registry: Arc<SessionRegistry>,
    router: ShardRouter,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ShardRuntime {
    /// Spawn one worker thread per configured shard.
    pub fn start(config: &StrataConfig) -> std::io::Result<Self> {
        let num_shards = config.shards.effective_count();
        let slots_per_shard = config.sessions.effective_slots();
        let sweep_interval = Duration::from_secs(config.sessions.sweep_interval_secs.max(1));

        let registry = Arc::new(SessionRegistry::new(num_shards, slots_per_shard));

        let mut senders = Vec::with_capacity(num_shards as usize);
        let mut workers = Vec::with_capacity(num_shards as usize);
        for shard_id in 0..num_shards {
            let (tx, rx) = mpsc::channel();
            let registry = Arc::clone(&registry);
            let handle = thread::Builder::new()
                .name(format!("strata-shard-{shard_id}"))
                .spawn(move || worker::run(registry, shard_id, rx, sweep_interval))?;
            senders.push(tx);
            workers.push(handle);
        }

        tracing::info!(
            shards = num_shards,
            slots_per_shard,
            sweep_interval_secs = sweep_interval.as_secs(),
            "shard runtime started"
        );

        Ok(Self {
            registry,
            router: ShardRouter::new(senders, config.sessions.default_timeout_ticks),
            workers,
        })
    }

    /// A fresh client handle. Clones freely; workers run until every clone
    /// (and the runtime itself) is dropped.
    pub fn router(&self) -> ShardRouter {
        self.router.clone()
    }

    /// The registry, for affinity-free surfaces like the stats counters.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Stop the workers and wait for them to drain.
    ///
    /// Blocks until all outstanding [`ShardRouter`] clones are dropped —
    /// their queues keep the workers alive.
    pub fn shutdown(self) {
        drop(self.router);
        for worker in self.workers {
            let _ = worker.join();
        }
        tracing::info!("shard runtime stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
