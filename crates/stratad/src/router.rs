//! Routes session operations to the owning shard's worker queue.

use std::sync::mpsc;
use std::sync::Arc;

use tokio::sync::oneshot;

use strata_core::SessionIdentity;
use strata_sessions::pool::SweepReport;
use strata_sessions::registry::RegistryError;
use strata_sessions::{OwnerHandle, SessionHandle};

// ── Commands ──────────────────────────────────────────────────────────────────

/// One registry operation, executed on the owning shard's worker thread.
/// Replies travel back over a oneshot channel.
pub enum ShardCommand {
    Create {
        owner: Option<OwnerHandle>,
        routing_id: u8,
        timeout_ticks: u64,
        owner_tag: String,
        reply: oneshot::Sender<Result<SessionIdentity, RegistryError>>,
    },
    Lookup {
        identity: SessionIdentity,
        reply: oneshot::Sender<Result<Option<SessionHandle>, RegistryError>>,
    },
    LookupIdle {
        identity: SessionIdentity,
        reply: oneshot::Sender<Result<Option<SessionHandle>, RegistryError>>,
    },
    Destroy {
        identity: SessionIdentity,
        reply: oneshot::Sender<Result<bool, RegistryError>>,
    },
    /// Force an eviction pass outside the timer cadence.
    Sweep {
        reply: oneshot::Sender<Result<SweepReport, RegistryError>>,
    },
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("no shard {shard_id} in this runtime")]
    NoSuchShard { shard_id: u8 },

    #[error("shard {shard_id} worker is down")]
    ShardDown { shard_id: u8 },
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Cloneable client handle to the shard runtime.
///
/// Every operation is routed by shard id and executed on that shard's own
/// worker thread, so callers — network workers, timers, tests — need no
/// shard affinity themselves. Shard workers run until every router clone
/// has been dropped.
#[derive(Clone)]
pub struct ShardRouter {
    senders: Arc<[mpsc::Sender<ShardCommand>]>,
    default_timeout_ticks: u64,
}

impl ShardRouter {
    pub(crate) fn new(
        senders: Vec<mpsc::Sender<ShardCommand>>,
        default_timeout_ticks: u64,
    ) -> Self {
        Self {
            senders: senders.into(),
            default_timeout_ticks,
        }
    }

    pub fn num_shards(&self) -> u8 {
        self.senders.len() as u8
    }

    /// Create a session on `shard_id` with the configured default timeout.
    pub async fn create(
        &self,
        shard_id: u8,
        owner: Option<OwnerHandle>,
        routing_id: u8,
        owner_tag: impl Into<String>,
    ) -> Result<SessionIdentity, RouterError> {
        self.create_with_timeout(shard_id, owner, routing_id, self.default_timeout_ticks, owner_tag)
            .await
    }

    /// Create a session with an explicit inactivity budget, in sweep ticks.
    pub async fn create_with_timeout(
        &self,
        shard_id: u8,
        owner: Option<OwnerHandle>,
        routing_id: u8,
        timeout_ticks: u64,
        owner_tag: impl Into<String>,
    ) -> Result<SessionIdentity, RouterError> {
        let (reply, response) = oneshot::channel();
        self.send(
            shard_id,
            ShardCommand::Create {
                owner,
                routing_id,
                timeout_ticks,
                owner_tag: owner_tag.into(),
                reply,
            },
        )?;
        self.wait(shard_id, response).await?.map_err(Into::into)
    }

    /// Salt-validated lookup; touches liveness on success.
    pub async fn lookup(
        &self,
        identity: SessionIdentity,
    ) -> Result<Option<SessionHandle>, RouterError> {
        let shard_id = identity.shard_id;
        let (reply, response) = oneshot::channel();
        self.send(shard_id, ShardCommand::Lookup { identity, reply })?;
        self.wait(shard_id, response).await?.map_err(Into::into)
    }

    /// Exclusive-access lookup: `None` while the session's owner is busy.
    pub async fn lookup_idle(
        &self,
        identity: SessionIdentity,
    ) -> Result<Option<SessionHandle>, RouterError> {
        let shard_id = identity.shard_id;
        let (reply, response) = oneshot::channel();
        self.send(shard_id, ShardCommand::LookupIdle { identity, reply })?;
        self.wait(shard_id, response).await?.map_err(Into::into)
    }

    /// Decode an ASCII token and look the session up on its shard.
    pub async fn resolve_token(
        &self,
        token: &[u8],
    ) -> Result<Option<SessionHandle>, RouterError> {
        let identity = SessionIdentity::decode_ascii(token).map_err(RegistryError::from)?;
        self.lookup(identity).await
    }

    /// Destroy a session. `false` for a stale identity — idempotent.
    pub async fn destroy(&self, identity: SessionIdentity) -> Result<bool, RouterError> {
        let shard_id = identity.shard_id;
        let (reply, response) = oneshot::channel();
        self.send(shard_id, ShardCommand::Destroy { identity, reply })?;
        self.wait(shard_id, response).await?.map_err(Into::into)
    }

    /// Force an eviction pass on `shard_id`, off the timer cadence.
    pub async fn sweep(&self, shard_id: u8) -> Result<SweepReport, RouterError> {
        let (reply, response) = oneshot::channel();
        self.send(shard_id, ShardCommand::Sweep { reply })?;
        self.wait(shard_id, response).await?.map_err(Into::into)
    }

    fn send(&self, shard_id: u8, command: ShardCommand) -> Result<(), RouterError> {
        let sender = self
            .senders
            .get(shard_id as usize)
            .ok_or(RouterError::NoSuchShard { shard_id })?;
        sender
            .send(command)
            .map_err(|_| RouterError::ShardDown { shard_id })
    }

    async fn wait<T>(
        &self,
        shard_id: u8,
        response: oneshot::Receiver<T>,
    ) -> Result<T, RouterError> {
        response
            .await
            .map_err(|_| RouterError::ShardDown { shard_id })
    }
}
