use crate::activator::ConfigActivator;
use crate::config::Config;
use crate::error::{CoordinatorError, Result};
use api::{ActivationQueue, ActivationReport};
use consensus::{MembershipReconciler, RepairReport};
use network::{BroadcastSummary, PeerNotifier};
use std::sync::Arc;
use storage::{
    Announcement, AnnouncementStore, ConfigGenerator, MarkOutcome, PeerDiscovery, PeerSet,
    ReadinessMarker,
};
use system::{CommandRunner, NodeIdentity, ProcessRunner, ServiceManager};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// `Initializing` runs the one-shot startup sequence; `Serving` answers
/// triggers until the process is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Initializing,
    Serving,
}

/// What the startup sequence did, step by step.
#[derive(Debug, Clone)]
pub struct StartupReport {
    pub announcement: Announcement,
    pub peers: PeerSet,
    pub activation: ActivationReport,
    pub broadcast: BroadcastSummary,
    pub repair: RepairReport,
    pub readiness: MarkOutcome,
}

pub struct Node {
    config: Config,
    identity: NodeIdentity,
    state: NodeState,
    announcements: AnnouncementStore,
    discovery: PeerDiscovery,
    generator: ConfigGenerator,
    notifier: PeerNotifier,
    reconciler: MembershipReconciler,
    marker: ReadinessMarker,
    queue: ActivationQueue,
    worker: JoinHandle<()>,
}

impl Node {
    /// Resolves this node's identity from the OS and drives real processes.
    pub async fn new(config: Config) -> Result<Self> {
        let identity =
            NodeIdentity::resolve(&config.interface, config.hostname.clone(), config.address)?;
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(config.command_timeout()));
        Self::with_parts(config, identity, runner).await
    }

    pub async fn with_parts(
        config: Config,
        identity: NodeIdentity,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        info!("Initializing rejoin coordinator for {}", identity);

        let storage_config: storage::Config = config.clone().into();
        let api_config: api::Config = config.clone().into();

        let activator = ConfigActivator::new(
            &storage_config.rendered_config,
            &config.install_config,
            &config.service_unit,
            ServiceManager::new(runner.clone(), &config.systemctl),
        );
        let (queue, worker) = ActivationQueue::spawn(Arc::new(activator), api_config.queue_depth);

        Ok(Self {
            announcements: AnnouncementStore::new(&storage_config.shared_dir),
            discovery: PeerDiscovery::new(&storage_config.shared_dir),
            generator: ConfigGenerator::new(
                &storage_config.base_config,
                &storage_config.rendered_config,
            ),
            marker: ReadinessMarker::new(&storage_config.ready_marker),
            notifier: PeerNotifier::new(config.clone().into())?,
            reconciler: MembershipReconciler::new(config.clone().into(), runner),
            queue,
            worker,
            identity,
            state: NodeState::Initializing,
            config,
        })
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Runs the startup sequence once. Only failing to announce aborts it;
    /// every other step logs and moves on.
    pub async fn initialize(&mut self) -> Result<StartupReport> {
        if self.state != NodeState::Initializing {
            return Err(CoordinatorError::InvalidState(self.state, NodeState::Initializing));
        }

        let announcement = self.announcements.announce(&self.identity).await?;

        let peers = match self.discovery.list().await {
            Ok(peers) => peers,
            Err(e) => {
                error!("Failed to list shared storage, continuing with self only: {}", e);
                PeerSet::new(vec![announcement.clone()])
            }
        };
        if !peers.contains(&self.identity) {
            warn!("Own announcement {} missing from shared storage listing", announcement);
        }

        if let Err(e) = self.generator.generate(&peers).await {
            error!("Failed to construct load-balancer config: {}", e);
        }

        let activation = self
            .queue
            .run()
            .await
            .map_err(|_| CoordinatorError::WorkerStopped)?;

        let broadcast = self.notifier.broadcast(&peers, &self.identity).await;
        let repair = self.reconciler.repair(&self.identity, &peers).await;
        let readiness = self.marker.mark().await;

        self.state = NodeState::Serving;
        info!("Startup sequence finished with {} known peers", peers.len());

        Ok(StartupReport {
            announcement,
            peers,
            activation,
            broadcast,
            repair,
            readiness,
        })
    }

    /// Runs the startup sequence, then serves triggers forever.
    pub async fn start(mut self) -> Result<()> {
        self.initialize().await?;

        let server = self.trigger_server();
        let listener = server.bind().await?;
        self.run(server, listener).await
    }

    /// Answers triggers on `listener`. Returns only if the server or the
    /// activation worker dies.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        if self.state != NodeState::Serving {
            return Err(CoordinatorError::InvalidState(self.state, NodeState::Serving));
        }

        let server = self.trigger_server();
        self.run(server, listener).await
    }

    fn trigger_server(&self) -> api::Server {
        api::Server::new(self.config.clone().into(), self.queue.clone())
    }

    async fn run(self, server: api::Server, listener: TcpListener) -> Result<()> {
        let worker = self.worker;

        tokio::select! {
            result = server.serve(listener) => {
                error!("Trigger server stopped: {:?}", result);
                result?;
                Err(CoordinatorError::ServerStopped)
            }
            result = worker => {
                error!("Activation worker stopped: {:?}", result);
                Err(CoordinatorError::WorkerStopped)
            }
        }
    }
}
