//! Tokio driver for [`SignalController`].
//!
//! One task owns the controller. Commands from [`DashboardHandle`], results
//! of spawned effects and the cadence ticks are all serialised through that
//! task, so the controller itself never needs a lock.

use crate::channels::{ChannelCompletion, ChannelEffect, ChannelFeedback, MultiChannelBackend};
use crate::config::ControllerConfig;
use crate::controller::{Completion, Effect, Feedback, SignalController};
use crate::prelude::{
    AnalysisBackend, DashResult, DashboardError, DerivedSignal, RawFile, Source, ViewerSlot,
    ZoomRange,
};
use crate::presentation::DashboardSnapshot;
use crate::telemetry::{LogManager, MetricsRecorder};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Executes one controller effect against `backend`.
pub async fn perform<B: AnalysisBackend>(backend: &B, effect: Effect) -> Feedback {
    match effect {
        Effect::Analyze { generation, source } => {
            let result = backend.analyze(&source).await;
            Feedback::Completed(Completion::Analyzed { generation, result })
        }
        Effect::FetchChunk(ticket) => {
            let result = backend
                .fetch_chunk(&ticket.analysis_id, ticket.position)
                .await;
            Feedback::Completed(Completion::Chunk { ticket, result })
        }
        Effect::Resample { ticket, source } => {
            let result = backend.resample(&source, ticket.value).await;
            Feedback::Completed(Completion::Resampled { ticket, result })
        }
        Effect::ArmSettleTimer(timer) => {
            sleep(timer.delay).await;
            Feedback::Settled(timer.token)
        }
    }
}

/// Executes one multi-channel viewer effect against `backend`.
pub async fn perform_channel<B: MultiChannelBackend>(
    backend: &B,
    effect: ChannelEffect,
) -> ChannelFeedback {
    match effect {
        ChannelEffect::LoadDemo { generation } => {
            let result = backend.load_demo().await;
            ChannelFeedback::Completed(ChannelCompletion::Loaded { generation, result })
        }
        ChannelEffect::Upload { generation, source } => {
            let result = backend.upload(&source).await;
            ChannelFeedback::Completed(ChannelCompletion::Loaded { generation, result })
        }
        ChannelEffect::Graph { ticket, request } => {
            let result = backend.graph(request).await;
            ChannelFeedback::Completed(ChannelCompletion::Graph { ticket, result })
        }
        ChannelEffect::ArmSettleTimer(timer) => {
            sleep(timer.delay).await;
            ChannelFeedback::Settled(timer.token)
        }
    }
}

enum Command {
    Accept(RawFile, oneshot::Sender<DashResult<()>>),
    Analyze(oneshot::Sender<DashResult<()>>),
    Start(ViewerSlot, oneshot::Sender<bool>),
    Pause(ViewerSlot),
    Restart(ViewerSlot),
    EnableComparison(oneshot::Sender<DashResult<()>>),
    DisableComparison,
    SliderChanged(u32),
    SetZoom(Option<ZoomRange>),
    MoveCarousel(isize, oneshot::Sender<bool>),
    CurrentSource(oneshot::Sender<Option<Source>>),
    AttachVariant {
        label: String,
        base: Source,
        derived: DerivedSignal,
        reply: oneshot::Sender<DashResult<()>>,
    },
    DismissError,
    Teardown,
    Shutdown,
}

/// Cloneable front end of a running dashboard.
#[derive(Clone)]
pub struct DashboardHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<DashboardSnapshot>,
    metrics: Arc<MetricsRecorder>,
}

/// Starts the controller on the current tokio runtime.
pub fn spawn<B: AnalysisBackend>(backend: B, config: ControllerConfig) -> DashboardHandle {
    let metrics = Arc::new(MetricsRecorder::new());
    let controller = SignalController::with_metrics(config, metrics.clone());
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
    tokio::spawn(run(Arc::new(backend), controller, command_rx, snapshot_tx));
    DashboardHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        metrics,
    }
}

async fn run<B: AnalysisBackend>(
    backend: Arc<B>,
    mut controller: SignalController,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<DashboardSnapshot>,
) {
    let logger = LogManager::new("runtime");
    let (feedback_tx, mut feedback_rx) = mpsc::unbounded_channel::<Feedback>();
    let mut ticker = interval(controller.config().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    logger.trace("controller task started");

    loop {
        let effects = tokio::select! {
            command = commands.recv() => match command {
                None | Some(Command::Shutdown) => break,
                Some(command) => apply(&mut controller, command),
            },
            Some(feedback) = feedback_rx.recv() => controller.feed(feedback),
            _ = ticker.tick() => controller.tick(),
        };

        for effect in effects {
            let backend = Arc::clone(&backend);
            let feedback = feedback_tx.clone();
            tokio::spawn(async move {
                let result = perform(backend.as_ref(), effect).await;
                // The controller may already be gone; nothing left to update.
                let _ = feedback.send(result);
            });
        }

        let next = controller.snapshot();
        snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
    logger.trace("controller task stopped");
}

fn apply(controller: &mut SignalController, command: Command) -> Vec<Effect> {
    match command {
        Command::Accept(raw, reply) => respond(controller.accept(raw), reply),
        Command::Analyze(reply) => respond(controller.analyze(), reply),
        Command::Start(slot, reply) => {
            let _ = reply.send(controller.start(slot));
            Vec::new()
        }
        Command::Pause(slot) => {
            controller.pause(slot);
            Vec::new()
        }
        Command::Restart(slot) => {
            controller.restart(slot);
            Vec::new()
        }
        Command::EnableComparison(reply) => respond(controller.enable_comparison(), reply),
        Command::DisableComparison => {
            controller.disable_comparison();
            Vec::new()
        }
        Command::SliderChanged(value) => controller.on_slider_change(value),
        Command::SetZoom(zoom) => {
            controller.set_zoom(zoom);
            Vec::new()
        }
        Command::MoveCarousel(delta, reply) => {
            let _ = reply.send(controller.move_carousel(delta));
            Vec::new()
        }
        Command::CurrentSource(reply) => {
            let _ = reply.send(controller.source().cloned());
            Vec::new()
        }
        Command::AttachVariant {
            label,
            base,
            derived,
            reply,
        } => respond(controller.attach_variant(label, &base, derived), reply),
        Command::DismissError => {
            controller.dismiss_error();
            Vec::new()
        }
        Command::Teardown => {
            controller.teardown();
            Vec::new()
        }
        Command::Shutdown => Vec::new(),
    }
}

fn respond(result: DashResult<Vec<Effect>>, reply: oneshot::Sender<DashResult<()>>) -> Vec<Effect> {
    match result {
        Ok(effects) => {
            let _ = reply.send(Ok(()));
            effects
        }
        Err(err) => {
            let _ = reply.send(Err(err));
            Vec::new()
        }
    }
}

impl DashboardHandle {
    fn send(&self, command: Command) -> DashResult<()> {
        self.commands
            .send(command)
            .map_err(|_| DashboardError::RuntimeClosed)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> DashResult<T> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply))?;
        response.await.map_err(|_| DashboardError::RuntimeClosed)
    }

    pub async fn accept(&self, raw: RawFile) -> DashResult<()> {
        self.request(|reply| Command::Accept(raw, reply)).await?
    }

    pub async fn analyze(&self) -> DashResult<()> {
        self.request(Command::Analyze).await?
    }

    pub async fn start(&self, slot: ViewerSlot) -> DashResult<bool> {
        self.request(|reply| Command::Start(slot, reply)).await
    }

    pub fn pause(&self, slot: ViewerSlot) -> DashResult<()> {
        self.send(Command::Pause(slot))
    }

    pub fn restart(&self, slot: ViewerSlot) -> DashResult<()> {
        self.send(Command::Restart(slot))
    }

    pub async fn enable_comparison(&self) -> DashResult<()> {
        self.request(Command::EnableComparison).await?
    }

    pub fn disable_comparison(&self) -> DashResult<()> {
        self.send(Command::DisableComparison)
    }

    pub fn on_slider_change(&self, value: u32) -> DashResult<()> {
        self.send(Command::SliderChanged(value))
    }

    pub fn set_zoom(&self, zoom: Option<ZoomRange>) -> DashResult<()> {
        self.send(Command::SetZoom(zoom))
    }

    pub async fn move_carousel(&self, delta: isize) -> DashResult<bool> {
        self.request(|reply| Command::MoveCarousel(delta, reply)).await
    }

    /// Source currently loaded on the page, if any.
    pub async fn source(&self) -> DashResult<Option<Source>> {
        self.request(Command::CurrentSource).await
    }

    /// Attaches a signal derived from `base`; refused once `base` has been
    /// replaced by a newer upload.
    pub async fn attach_variant(
        &self,
        label: impl Into<String>,
        base: Source,
        derived: DerivedSignal,
    ) -> DashResult<()> {
        let label = label.into();
        self.request(|reply| Command::AttachVariant {
            label,
            base,
            derived,
            reply,
        })
        .await?
    }

    pub fn dismiss_error(&self) -> DashResult<()> {
        self.send(Command::DismissError)
    }

    pub fn teardown(&self) -> DashResult<()> {
        self.send(Command::Teardown)
    }

    /// Stops the controller task and waits for it to exit. In-flight
    /// requests are abandoned.
    pub async fn shutdown(&self) -> DashResult<()> {
        self.send(Command::Shutdown)?;
        let mut receiver = self.snapshots.clone();
        while receiver.changed().await.is_ok() {}
        Ok(())
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshots.clone()
    }

    /// Resolves with the first published snapshot satisfying `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&DashboardSnapshot) -> bool,
    ) -> DashResult<DashboardSnapshot> {
        let mut receiver = self.snapshots.clone();
        let snapshot = receiver
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| DashboardError::RuntimeClosed)?;
        Ok(snapshot.clone())
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }
}
