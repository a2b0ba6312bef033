//! Per-shard worker loop — the shard's single-writer execution context.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_sessions::{SessionRegistry, ShardScope};

use crate::router::ShardCommand;

/// Drive one shard until every router clone is gone.
///
/// The worker enters its shard scope once and holds it for the thread's
/// lifetime — every registry call it makes passes the affinity check, and no
/// other thread may touch this shard's pool. Sweeps run on an absolute
/// deadline so a busy command queue can never starve eviction.
pub(crate) fn run(
    registry: Arc<SessionRegistry>,
    shard_id: u8,
    commands: Receiver<ShardCommand>,
    sweep_interval: Duration,
) {
    let _scope = ShardScope::enter(shard_id);
    tracing::debug!(shard_id, "shard worker started");

    let mut next_sweep = Instant::now() + sweep_interval;
    loop {
        let now = Instant::now();
        if now >= next_sweep {
            match registry.sweep_shard(shard_id) {
                Ok(_) => {}
                Err(error) => tracing::warn!(shard_id, %error, "timed sweep failed"),
            }
            next_sweep += sweep_interval;
            continue;
        }

        match commands.recv_timeout(next_sweep - now) {
            Ok(command) => handle_command(&registry, shard_id, command),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!(shard_id, "shard worker stopped");
}

/// Execute one routed command. Reply-send failures mean the caller stopped
/// waiting; the operation itself has already taken effect.
fn handle_command(registry: &SessionRegistry, shard_id: u8, command: ShardCommand) {
    match command {
        ShardCommand::Create {
            owner,
            routing_id,
            timeout_ticks,
            owner_tag,
            reply,
        } => {
            let _ = reply.send(registry.create(shard_id, owner, routing_id, timeout_ticks, owner_tag));
        }
        ShardCommand::Lookup { identity, reply } => {
            let _ = reply.send(registry.lookup(&identity));
        }
        ShardCommand::LookupIdle { identity, reply } => {
            let _ = reply.send(registry.lookup_idle(&identity));
        }
        ShardCommand::Destroy { identity, reply } => {
            let _ = reply.send(registry.destroy(&identity));
        }
        ShardCommand::Sweep { reply } => {
            let _ = reply.send(registry.sweep_shard(shard_id));
        }
    }
}
