//! Dispatch loop.
//!
//! The `Dispatcher` moves packets from a [`FairQueueScheduler`] to workers.
//! It handles:
//! - Periodic dispatch passes on a tick timer
//! - Immediate passes when a worker completes or a caller kicks the loop
//! - Bounding in-service work to `max_in_flight`
//!
//! Workers receive packets on an mpsc channel and report completion through
//! a [`DispatcherHandle`], which finishes the packet on the scheduler and
//! kicks the loop so freed capacity is refilled without waiting for a tick.

use std::sync::Arc;

use helix_fq::{Clock, Completion, FairQueueScheduler, Packet, SystemClock};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::error::{ConfigError, DispatchError};

/// Commands that can be sent to the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchCommand {
    /// Run a dispatch pass now.
    Kick,
    /// Stop the loop.
    Shutdown,
}

/// Counters reported when the dispatch loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Timer-driven passes.
    pub ticks: u64,
    /// Kick-driven passes.
    pub kicks: u64,
    /// Packets handed to workers.
    pub dispatched: u64,
}

/// Handle to interact with a running dispatcher.
pub struct DispatcherHandle<T, C = SystemClock> {
    /// Command sender.
    commands: mpsc::Sender<DispatchCommand>,
    /// Scheduler packets are finished on.
    scheduler: Arc<FairQueueScheduler<T, C>>,
}

impl<T, C> Clone for DispatcherHandle<T, C> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<T, C: Clock> DispatcherHandle<T, C> {
    /// Returns the scheduler the dispatcher drains.
    #[must_use]
    pub const fn scheduler(&self) -> &Arc<FairQueueScheduler<T, C>> {
        &self.scheduler
    }

    /// Finishes a packet, measuring service time from the scheduler clock,
    /// and kicks the loop.
    ///
    /// # Errors
    /// Returns `DispatchError::Scheduler` if the packet is not in service.
    pub fn complete(&self, packet: Packet<T>) -> Result<Completion<T>, DispatchError> {
        let completion = self.scheduler.complete(packet)?;
        self.kick();
        Ok(completion)
    }

    /// Requests a dispatch pass.
    ///
    /// Kicks coalesce: if one is already queued, this is a no-op.
    pub fn kick(&self) {
        // A full channel already holds a pending pass; a closed one means
        // the loop is gone and there is nothing to wake.
        let _ = self.commands.try_send(DispatchCommand::Kick);
    }

    /// Requests the dispatcher to shut down.
    ///
    /// # Errors
    /// Returns an error if the dispatcher is not available.
    pub async fn shutdown(&self) -> Result<(), DispatchError> {
        self.commands
            .send(DispatchCommand::Shutdown)
            .await
            .map_err(|_| DispatchError::Unavailable)
    }
}

/// The dispatch loop.
pub struct Dispatcher<T, C = SystemClock> {
    /// Dispatch configuration.
    config: DispatchConfig,
    /// Scheduler to drain.
    scheduler: Arc<FairQueueScheduler<T, C>>,
    /// Packets for workers.
    workers: mpsc::Sender<Packet<T>>,
    /// Counters.
    stats: DispatchStats,
}

impl<T, C> Dispatcher<T, C>
where
    T: Send + 'static,
    C: Clock + 'static,
{
    /// Creates a dispatcher and the channel workers receive packets on.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: DispatchConfig,
        scheduler: Arc<FairQueueScheduler<T, C>>,
    ) -> Result<(Self, mpsc::Receiver<Packet<T>>), ConfigError> {
        config.validate()?;
        let (workers, packets) = mpsc::channel(config.channel_capacity);
        let dispatcher = Self {
            config,
            scheduler,
            workers,
            stats: DispatchStats::default(),
        };
        Ok((dispatcher, packets))
    }

    /// Runs the dispatcher, returning a handle for interaction.
    ///
    /// The returned future drives the loop and resolves with the loop's
    /// counters after shutdown.
    pub fn run(
        self,
    ) -> (
        DispatcherHandle<T, C>,
        impl std::future::Future<Output = DispatchStats>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(self.config.channel_capacity);
        let handle = DispatcherHandle {
            commands: cmd_tx,
            scheduler: Arc::clone(&self.scheduler),
        };

        (handle, self.run_loop(cmd_rx))
    }

    /// Main dispatch loop.
    async fn run_loop(mut self, mut commands: mpsc::Receiver<DispatchCommand>) -> DispatchStats {
        let mut tick_timer = interval(self.config.tick_interval);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tick_ms = self.config.tick_interval.as_millis(),
            max_in_flight = self.config.max_in_flight,
            "dispatcher started"
        );

        loop {
            let keep_running = tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(DispatchCommand::Kick) => {
                        self.stats.kicks += 1;
                        self.dispatch_pass().await
                    }
                    Some(DispatchCommand::Shutdown) | None => {
                        info!("dispatcher shutting down");
                        false
                    }
                },

                _ = tick_timer.tick() => {
                    self.stats.ticks += 1;
                    self.dispatch_pass().await
                }
            };

            if !keep_running {
                break;
            }
        }

        debug!(
            ticks = self.stats.ticks,
            kicks = self.stats.kicks,
            dispatched = self.stats.dispatched,
            "dispatcher stopped"
        );
        self.stats
    }

    /// Dequeues while capacity remains, handing packets to workers.
    ///
    /// Returns false if the worker channel has closed.
    async fn dispatch_pass(&mut self) -> bool {
        let mut dispatched = 0;
        while dispatched < self.config.max_dispatch_per_tick
            && self.scheduler.in_service() < self.config.max_in_flight
        {
            let Some(packet) = self.scheduler.dequeue() else {
                break;
            };

            if let Err(mpsc::error::SendError(packet)) = self.workers.send(packet).await {
                warn!(
                    flow = %packet.flow(),
                    packet = %packet.id(),
                    "worker channel closed, stopping dispatcher"
                );
                // Nobody will serve it; return its charge to the flow.
                if let Err(e) = self.scheduler.finish(packet, std::time::Duration::ZERO) {
                    warn!(error = %e, "failed to release undelivered packet");
                }
                return false;
            }
            dispatched += 1;
        }

        if dispatched > 0 {
            self.stats.dispatched += dispatched as u64;
            debug!(
                dispatched,
                in_service = self.scheduler.in_service(),
                pending = self.scheduler.pending(),
                "dispatch pass"
            );
        }
        true
    }
}
