//! The game loop: one thread that owns the simulation.
//!
//! Runs a current-thread tokio runtime on a dedicated `game-logic` thread,
//! paced by a [`TickScheduler`]. Each tick:
//!
//! 1. Drain the command queue, executing every command in arrival order
//! 2. Integrate player positions (`position += velocity * dt`)
//! 3. Broadcast one snapshot per room to its members
//!
//! A `watch` channel stops the loop; commands still queued at that point are
//! executed before the thread exits.

use std::thread::JoinHandle;

use skirmish_session::CommandReceiver;
use skirmish_tick::{TickConfig, TickScheduler};
use tokio::sync::watch;

use crate::SkirmishError;
use crate::commands::{GameContext, execute};

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub commands: usize,
    pub snapshot_frames: usize,
}

/// Executes every queued command. Returns how many ran.
pub fn drain_commands(ctx: &GameContext, commands: &CommandReceiver) -> usize {
    let mut executed = 0;
    for command in commands.try_iter() {
        execute(command, ctx);
        executed += 1;
    }
    executed
}

/// Runs one simulation step.
pub fn run_tick(ctx: &GameContext, commands: &CommandReceiver, tick: u32, dt: f32) -> TickReport {
    let executed = drain_commands(ctx, commands);
    ctx.rooms.update_all(dt);
    let snapshot_frames = ctx.rooms.broadcast_snapshots(tick);
    TickReport {
        commands: executed,
        snapshot_frames,
    }
}

/// Handle to the running game-logic thread.
pub struct GameLoop {
    thread: Option<JoinHandle<()>>,
    stop: watch::Sender<bool>,
}

impl GameLoop {
    /// Starts the game-logic thread.
    ///
    /// # Errors
    /// Returns [`SkirmishError::Io`] if the thread cannot be spawned.
    pub fn spawn(ctx: GameContext, commands: CommandReceiver, tick: TickConfig) -> Result<Self, SkirmishError> {
        let (stop, stop_rx) = watch::channel(false);
        let thread = std::thread::Builder::new()
            .name("game-logic".to_string())
            .spawn(move || run(&ctx, &commands, tick, stop_rx))?;
        Ok(Self {
            thread: Some(thread),
            stop,
        })
    }

    /// Signals the loop and waits for the thread. Idempotent.
    pub fn stop(&mut self) {
        self.stop.send_replace(true);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("game loop panicked");
            }
        }
    }
}

impl Drop for GameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(ctx: &GameContext, commands: &CommandReceiver, tick: TickConfig, mut stop: watch::Receiver<bool>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "game loop runtime failed to start");
            return;
        }
    };

    runtime.block_on(async {
        let mut scheduler = TickScheduler::new(tick);
        tracing::info!(tick_rate_hz = scheduler.tick_rate_hz(), "game loop started");
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                info = scheduler.wait_for_tick() => {
                    let report = run_tick(ctx, commands, info.tick, info.dt_secs());
                    if report.commands > 0 {
                        tracing::trace!(tick = info.tick, commands = report.commands, "tick");
                    }
                    scheduler.record_tick_end();
                }
            }
        }
        let metrics = scheduler.metrics();
        tracing::info!(
            ticks = metrics.total_ticks,
            overruns = metrics.total_overruns,
            "game loop stopping"
        );
    });

    let drained = drain_commands(ctx, commands);
    if drained > 0 {
        tracing::debug!(drained, "executed commands queued at shutdown");
    }
}
