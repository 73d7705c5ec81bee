//! The meshd daemon orchestrator.
//!
//! Ties together the topology graph, the local device and the links to
//! directly connected neighbors. The device runs in a background task; the
//! event loop in [`MeshNode::run`] is the single writer of the graph.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Result};
use chrono::Utc;
use meshd_core::NodeId;
use meshd_device::{Device, DeviceSpec};
use meshd_graph::{EdgeOrigin, Graph, GraphError, SharedGraph};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::MeshConfig;
use crate::dispatch::{self, Delivery};
use crate::events::{MeshFrame, PeerMessage, SessionEvent};
use crate::links::LinkTable;
use crate::state::NodeState;

/// Base delay after a failed device read, multiplied by the error streak.
const DEVICE_RETRY_STEP: Duration = Duration::from_millis(50);

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What the device task reports to the event loop.
#[derive(Debug)]
enum DeviceInput {
    Frame(Vec<u8>),
    Failed(String),
}

/// A running mesh node.
pub struct MeshNode {
    /// Daemon configuration.
    config: MeshConfig,
    /// The local node's id.
    self_id: NodeId,
    /// Resolved device settings.
    device_spec: DeviceSpec,
    /// Topology and routing state.
    graph: SharedGraph,
    /// Outbound channels to neighbors.
    links: Arc<LinkTable>,
    /// Traffic counters.
    state: Arc<NodeState>,
    /// Handed out to the session layer.
    session_tx: mpsc::Sender<SessionEvent>,
    session_rx: Option<mpsc::Receiver<SessionEvent>>,
    /// Frames read by the device task (None until started).
    device_rx: Option<mpsc::Receiver<DeviceInput>>,
    /// Frames to be written by the device task.
    device_write_tx: Option<mpsc::Sender<Vec<u8>>>,
    device_task: Option<JoinHandle<()>>,
}

impl MeshNode {
    /// Create a node from configuration.
    ///
    /// Device settings are validated before any topology state exists, so
    /// a configuration error leaves nothing behind.
    pub fn new(config: MeshConfig) -> Result<Self> {
        let device_spec = config.device.resolve(config.routing.mode)?;
        ensure!(
            config.daemon.event_channel_capacity > 0,
            "event_channel_capacity must be positive"
        );
        let self_id = config.node_id()?;

        let graph = SharedGraph::new(Graph::new(self_id.clone()));
        let (session_tx, session_rx) = mpsc::channel(config.daemon.event_channel_capacity);

        tracing::info!(
            node = %self_id,
            mode = %config.routing.mode,
            device = %device_spec.path.display(),
            "mesh node created"
        );

        Ok(Self {
            state: Arc::new(NodeState::new(self_id.clone())),
            config,
            self_id,
            device_spec,
            graph,
            links: Arc::new(LinkTable::new()),
            session_tx,
            session_rx: Some(session_rx),
            device_rx: None,
            device_write_tx: None,
            device_task: None,
        })
    }

    /// Open the configured device and start its task.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting mesh node");
        let device = meshd_device::open(&self.device_spec).await?;
        self.attach_device(device);
        Ok(())
    }

    /// Start the device task on an already opened device.
    pub fn attach_device(&mut self, device: Box<dyn Device>) {
        let capacity = self.config.daemon.event_channel_capacity;
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (write_tx, write_rx) = mpsc::channel(capacity);

        let state = Arc::clone(&self.state);
        let max_errors = self.config.daemon.max_device_errors.max(1);
        self.device_task = Some(tokio::spawn(drive_device(
            device, write_rx, input_tx, state, max_errors,
        )));
        self.device_rx = Some(input_rx);
        self.device_write_tx = Some(write_tx);
    }

    /// Run the event loop until the device fails or the session layer goes
    /// away.
    pub async fn run(&mut self) -> Result<()> {
        let mut session_rx = self
            .session_rx
            .take()
            .ok_or_else(|| anyhow!("node already running"))?;
        let mut device_rx = self
            .device_rx
            .take()
            .ok_or_else(|| anyhow!("node not started"))?;

        let period = Duration::from_secs(self.config.routing.sweep_interval_secs.max(1));
        let mut sweep = tokio::time::interval(period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("entering main event loop");

        loop {
            tokio::select! {
                event = session_rx.recv() => match event {
                    Some(event) => self.handle_session_event(event).await?,
                    None => {
                        tracing::info!("session channel closed");
                        break;
                    }
                },
                input = device_rx.recv() => match input {
                    Some(DeviceInput::Frame(frame)) => self.handle_device_frame(frame).await?,
                    Some(DeviceInput::Failed(reason)) => {
                        return Err(anyhow!("device failed: {}", reason));
                    }
                    None => return Err(anyhow!("device task exited")),
                },
                _ = sweep.tick() => {
                    self.sweep_unreachable()?;
                }
            }
            self.flush_outbox()?;
        }

        Ok(())
    }

    /// Stop the device task and log final statistics.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down mesh node");

        // Closing the write channel ends the device task.
        self.device_write_tx = None;
        self.device_rx = None;
        if let Some(task) = self.device_task.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(joined) => joined?,
                Err(_) => tracing::warn!("device task did not stop in time"),
            }
        }

        let stats = self.state.snapshot();
        tracing::info!(
            frames_from_device = stats.frames_from_device,
            frames_to_device = stats.frames_to_device,
            frames_forwarded = stats.frames_forwarded,
            frames_dropped = stats.frames_dropped,
            gossip_sent = stats.gossip_sent,
            "mesh node shut down"
        );
        Ok(())
    }

    pub fn self_id(&self) -> &NodeId {
        &self.self_id
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn links(&self) -> &Arc<LinkTable> {
        &self.links
    }

    pub fn state(&self) -> &Arc<NodeState> {
        &self.state
    }

    /// Channel the session layer delivers its events on.
    pub fn session_sender(&self) -> mpsc::Sender<SessionEvent> {
        self.session_tx.clone()
    }

    /// Apply one session-layer event.
    pub async fn handle_session_event(&self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::EdgeEstablished { peer, weight, link } => {
                tracing::info!(peer = %peer, weight, "tunnel established");
                self.links.register(peer.clone(), link);
                log_rejection(self.graph.add_edge(&self.self_id, &peer, weight, EdgeOrigin::Local));
            }
            SessionEvent::EdgeLost { peer } => {
                tracing::info!(peer = %peer, "tunnel lost");
                self.links.unregister(&peer);
                log_rejection(self.graph.remove_edge(&self.self_id, &peer));
            }
            SessionEvent::NodeSeen { node } => {
                self.graph.node_seen(&node)?;
            }
            SessionEvent::NodeEvicted { node } => {
                log_rejection(self.graph.evict_node(&node));
            }
            SessionEvent::Gossip { from, announcement } => {
                log_rejection(self.graph.apply_announcement(&from, &announcement));
            }
            SessionEvent::FrameReceived { from, frame } => {
                self.handle_peer_frame(&from, frame).await?;
            }
            SessionEvent::SubnetsAdvertised { node, subnets } => {
                self.graph.with(|g| g.set_subnets(&node, subnets))?;
            }
        }
        Ok(())
    }

    /// Send every queued topology announcement to its neighbor.
    pub fn flush_outbox(&self) -> Result<()> {
        for outbound in self.graph.drain_outbox()? {
            if self
                .links
                .send(&outbound.to, PeerMessage::Gossip(outbound.announcement))
            {
                self.state.record_gossip_sent();
            }
        }
        Ok(())
    }

    /// Evict nodes that stayed unreachable past the configured timeout.
    pub fn sweep_unreachable(&self) -> Result<Vec<NodeId>> {
        // Capped so the conversion can never overflow.
        let secs = self.config.routing.unreachable_timeout_secs.min(u64::from(u32::MAX));
        let timeout = chrono::Duration::seconds(secs as i64);

        let stale = self
            .graph
            .with(|g| g.unreachable_longer_than(timeout, Utc::now()))?;
        for node in &stale {
            if self.graph.evict_node(node)? {
                tracing::info!(node = %node, "evicted unreachable node");
            }
        }
        Ok(stale)
    }

    async fn handle_device_frame(&self, payload: Vec<u8>) -> Result<()> {
        let mode = self.config.routing.mode;
        let delivery = self
            .graph
            .with(|g| dispatch::route_local_frame(g, mode, &payload))?;
        let frame = MeshFrame {
            source: self.self_id.clone(),
            destination: None,
            payload,
        };
        self.deliver(delivery, &frame).await;
        Ok(())
    }

    async fn handle_peer_frame(&self, from: &NodeId, frame: MeshFrame) -> Result<()> {
        let deliveries = self
            .graph
            .with(|g| dispatch::route_peer_frame(g, from, &frame))?;
        for delivery in deliveries {
            self.deliver(delivery, &frame).await;
        }
        Ok(())
    }

    async fn deliver(&self, delivery: Delivery, frame: &MeshFrame) {
        match delivery {
            Delivery::Unicast {
                next_hop,
                destination,
            } => {
                let message = PeerMessage::Frame(MeshFrame {
                    destination: Some(destination),
                    ..frame.clone()
                });
                if self.links.send(&next_hop, message) {
                    self.state.record_forwarded(1);
                } else {
                    self.state.record_dropped();
                }
            }
            Delivery::Flood(targets) => {
                let mut sent = 0;
                for target in targets {
                    let message = PeerMessage::Frame(MeshFrame {
                        destination: None,
                        ..frame.clone()
                    });
                    if self.links.send(&target, message) {
                        sent += 1;
                    }
                }
                self.state.record_forwarded(sent);
            }
            Delivery::Local => self.write_device(frame.payload.clone()).await,
            Delivery::Drop(reason) => {
                self.state.record_dropped();
                tracing::trace!(?reason, source = %frame.source, "frame dropped");
            }
        }
    }

    async fn write_device(&self, payload: Vec<u8>) {
        let Some(device) = &self.device_write_tx else {
            self.state.record_dropped();
            return;
        };
        if device.send(payload).await.is_err() {
            tracing::warn!("device task gone, dropping frame");
            self.state.record_dropped();
        }
    }
}

fn log_rejection(result: Result<bool, GraphError>) {
    if let Err(e) = result {
        tracing::debug!(error = %e, "topology update not applied");
    }
}

/// Owns the device: reads frames for the event loop and writes frames
/// handed to it, until the write channel closes or errors pile up.
async fn drive_device(
    mut device: Box<dyn Device>,
    mut write_rx: mpsc::Receiver<Vec<u8>>,
    input_tx: mpsc::Sender<DeviceInput>,
    state: Arc<NodeState>,
    max_errors: u32,
) {
    let mut errors: u32 = 0;

    loop {
        tokio::select! {
            frame = write_rx.recv() => {
                let Some(frame) = frame else { break };
                match device.write(&frame).await {
                    Ok(()) => {
                        errors = 0;
                        state.record_device_write();
                    }
                    Err(e) => {
                        errors += 1;
                        state.record_device_error();
                        tracing::error!(error = %e, consecutive = errors, "device write failed");
                    }
                }
            }
            result = device.read() => match result {
                Ok(frame) => {
                    errors = 0;
                    state.record_device_read();
                    if input_tx.send(DeviceInput::Frame(frame)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    errors += 1;
                    state.record_device_error();
                    tracing::error!(error = %e, consecutive = errors, "device read failed");
                    if errors < max_errors {
                        tokio::time::sleep(DEVICE_RETRY_STEP * errors).await;
                    }
                }
            }
        }

        if errors >= max_errors {
            let reason = format!("{} consecutive device errors", errors);
            let _ = input_tx.send(DeviceInput::Failed(reason)).await;
            break;
        }
    }

    if let Err(e) = device.close().await {
        tracing::warn!(error = %e, "closing device failed");
    }
}
