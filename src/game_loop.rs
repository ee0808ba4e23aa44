//! Per-session game loop task
//!
//! One independent tokio task drives each active session at the configured
//! rate until the session reaches a terminal state. There is no explicit
//! cancellation signal: a concurrent teardown flips the status under the
//! session lock and the loop observes it at its next acquisition.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::RoomConfig;
use crate::env::RenderedState;
use crate::events::{EventSink, ServerEvent};
use crate::registry::Registry;
use crate::session::{Session, SessionStatus};

/// Everything a session's loop task needs.
pub(crate) struct GameLoopContext {
    pub session: Arc<Session>,
    pub registry: Arc<Registry>,
    pub sink: Arc<dyn EventSink>,
    pub config: Arc<RoomConfig>,
}

/// Spawn the loop task for a freshly promoted session.
pub(crate) fn spawn(ctx: GameLoopContext) -> JoinHandle<()> {
    tokio::spawn(run_session(ctx))
}

async fn run_session(ctx: GameLoopContext) {
    let id = ctx.session.id();
    log::info!("session {id}: game loop starting");

    // First episode. A reset failure skips straight to the epilogue so the
    // session is reclaimed without ever ticking.
    let started = {
        let mut state = ctx.session.lock().await;
        match state.reset(None) {
            Ok(()) => Some(state.render()),
            Err(err) => {
                log::error!("session {id}: initial reset failed: {err}");
                None
            }
        }
    };
    if let Some(rendered) = started {
        broadcast_state(&ctx, rendered, 0);
        drive(&ctx).await;
    }

    finish(&ctx).await;
}

/// Tick until the session reaches a terminal state.
async fn drive(ctx: &GameLoopContext) {
    let id = ctx.session.id();
    let interval = ctx.config.tick_interval();

    loop {
        let (rendered, tick, status) = {
            let mut state = ctx.session.lock().await;
            if state.status().is_terminal() {
                break;
            }
            ctx.sink.broadcast(id, &ServerEvent::InputRequest);
            if let Err(err) = state.tick() {
                log::error!("session {id}: environment step failed: {err}");
                break;
            }
            (state.render(), state.tick_count(), state.status())
        };
        broadcast_state(ctx, rendered, tick);

        if status == SessionStatus::Reset && !reset_cycle(ctx).await {
            break;
        }

        tokio::time::sleep(interval).await;
    }
}

/// Wait out an episode boundary and start the next episode.
///
/// Returns false when the session should stop (torn down while waiting, or
/// the environment refused to reset).
async fn reset_cycle(ctx: &GameLoopContext) -> bool {
    let id = ctx.session.id();
    let barrier = ctx.registry.barrier();

    ctx.sink.broadcast(
        id,
        &ServerEvent::ResetPending {
            timeout_ms: ctx.config.reset_timeout_ms,
            config: ctx.config.to_json(),
        },
    );

    let awaited = {
        let state = ctx.session.lock().await;
        state.human_participants()
    };
    barrier.begin_cycle(id, awaited);

    let patience = Duration::from_millis(ctx.config.reset_timeout_ms);
    if tokio::time::timeout(patience, barrier.wait_all(id))
        .await
        .is_err()
    {
        log::warn!(
            "session {id}: reset acknowledgments still outstanding after {}ms, resuming anyway",
            ctx.config.reset_timeout_ms
        );
    }
    barrier.clear(id);

    let resumed = {
        let mut state = ctx.session.lock().await;
        // A participant may have left while the barrier was open, tearing
        // the session down; resurrecting it here would orphan the loop.
        if state.status() != SessionStatus::Reset {
            return false;
        }
        match state.reset(None) {
            Ok(()) => Some(state.render()),
            Err(err) => {
                log::error!("session {id}: episode reset failed: {err}");
                None
            }
        }
    };
    match resumed {
        Some(rendered) => {
            broadcast_state(ctx, rendered, 0);
            true
        }
        None => false,
    }
}

/// Announce the end, tear down if needed, and reclaim the session id.
async fn finish(ctx: &GameLoopContext) {
    let id = ctx.session.id();
    let mut state = ctx.session.lock().await;

    ctx.sink.broadcast(
        id,
        &ServerEvent::SessionEnded {
            redirect_url: ctx.config.redirect_url.clone(),
            timeout_ms: ctx.config.redirect_timeout_ms,
        },
    );

    if state.status() != SessionStatus::Inactive {
        state.tear_down();
    }
    ctx.registry.cleanup(id);
    log::info!("session {id}: game loop finished");
}

fn broadcast_state(ctx: &GameLoopContext, rendered_state: RenderedState, tick: u64) {
    ctx.sink.broadcast(
        ctx.session.id(),
        &ServerEvent::StateUpdate {
            rendered_state,
            tick,
        },
    );
}
