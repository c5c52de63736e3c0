//! Pipeline construction and wiring.
//!
//! Adapters, store, queue, and directory are constructed once at process
//! start and injected here; nothing in the pipeline reaches for globals.
//! `build()` is fail-fast: a channel the pipeline will dispatch on must have
//! an adapter, and the configuration must validate, before anything runs.

use std::sync::Arc;

use thiserror::Error;

use crate::adapter::{AdapterRegistry, ChannelAdapter};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, HeraldConfig};
use crate::dispatch::NotificationDispatcher;
use crate::domain::{AdminDirectory, Channel, FixedAdminDirectory, IdGenerator, UlidGenerator};
use crate::fanout::AdminFanout;
use crate::queue::{ChannelLimits, InMemoryTaskQueue, RetryPolicy, TaskQueue};
use crate::store::{InMemoryNotificationStore, NotificationStore};
use crate::sweep::Sweeper;
use crate::worker::{SendProcessor, WorkerGroup};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("missing adapters for channels: {0:?}. These channels are dispatched on but have no adapter registered.")]
    MissingChannels(Vec<Channel>),

    #[error("adapter for channel {0} registered twice")]
    DuplicateAdapter(Channel),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Builder for a fully wired pipeline.
///
/// Store, queue, directory, and clock default to the in-process
/// implementations; adapters always have to be supplied.
pub struct PipelineBuilder {
    config: HeraldConfig,
    adapters: AdapterRegistry,
    store: Option<Arc<dyn NotificationStore>>,
    queue: Option<Arc<dyn TaskQueue>>,
    directory: Option<Arc<dyn AdminDirectory>>,
    clock: Arc<dyn Clock>,
    expected_channels: Vec<Channel>,
}

impl PipelineBuilder {
    pub fn new(config: HeraldConfig) -> Self {
        Self {
            config,
            adapters: AdapterRegistry::new(),
            store: None,
            queue: None,
            directory: None,
            clock: Arc::new(SystemClock),
            expected_channels: vec![Channel::Sms, Channel::Email],
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ChannelAdapter>) -> Result<Self, BuildError> {
        let channel = adapter.channel();
        self.adapters
            .register(adapter)
            .map_err(|_| BuildError::DuplicateAdapter(channel))?;
        Ok(self)
    }

    pub fn with_store(mut self, store: Arc<dyn NotificationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_admin_directory(mut self, directory: Arc<dyn AdminDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Channels the pipeline is expected to dispatch on. Defaults to
    /// sms + email; `build()` fails if any lacks an adapter.
    pub fn expect_channels(mut self, channels: &[Channel]) -> Self {
        self.expected_channels = channels.to_vec();
        self
    }

    pub fn build(self) -> Result<Pipeline, BuildError> {
        self.config.validate()?;

        let registered = self.adapters.registered_channels();
        let missing: Vec<Channel> = self
            .expected_channels
            .iter()
            .copied()
            .filter(|c| !registered.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingChannels(missing));
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryNotificationStore::new()));
        let queue = self.queue.unwrap_or_else(|| {
            Arc::new(InMemoryTaskQueue::new(
                RetryPolicy::new(
                    self.config.retry.backoff,
                    self.config.retry.backoff_multiplier,
                ),
                ChannelLimits {
                    sms_per_minute: self.config.sms.per_minute,
                    email_per_minute: self.config.email.per_minute,
                },
            ))
        });
        let directory = self
            .directory
            .unwrap_or_else(|| Arc::new(FixedAdminDirectory::default()));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(ArcClock(self.clock.clone())));
        let adapters = Arc::new(self.adapters);

        let email_adapter = adapters
            .get(Channel::Email)
            .cloned()
            .ok_or(BuildError::MissingChannels(vec![Channel::Email]))?;

        let fanout = Arc::new(AdminFanout::new(
            directory,
            email_adapter,
            store.clone(),
            ids.clone(),
            self.clock.clone(),
            self.config.retry.max_retries,
        ));

        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            queue.clone(),
            ids.clone(),
            self.clock.clone(),
            fanout.clone(),
            self.config.retry.max_retries,
        ));

        let processor = Arc::new(SendProcessor::new(
            store.clone(),
            adapters,
            self.clock.clone(),
        ));

        let sweeper = Arc::new(Sweeper::new(
            store.clone(),
            queue.clone(),
            ids,
            self.clock.clone(),
            self.config.retention.retry_window,
            self.config.retention.purge_after,
            self.config.retention.sweep_interval,
        ));

        Ok(Pipeline {
            config: self.config,
            store,
            queue,
            dispatcher,
            fanout,
            processor,
            sweeper,
        })
    }
}

/// `Clock` adapter so the ULID generator can borrow the shared clock.
struct ArcClock(Arc<dyn Clock>);

impl Clock for ArcClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.0.now()
    }
}

/// A wired pipeline: dispatcher plus the handles needed to run and observe
/// it.
pub struct Pipeline {
    config: HeraldConfig,
    store: Arc<dyn NotificationStore>,
    queue: Arc<dyn TaskQueue>,
    dispatcher: Arc<NotificationDispatcher>,
    fanout: Arc<AdminFanout>,
    processor: Arc<SendProcessor>,
    sweeper: Arc<Sweeper>,
}

impl Pipeline {
    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    pub fn fanout(&self) -> &Arc<AdminFanout> {
        &self.fanout
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    pub fn queue(&self) -> &Arc<dyn TaskQueue> {
        &self.queue
    }

    /// Spawn the configured number of workers.
    pub fn spawn_workers(&self) -> WorkerGroup {
        WorkerGroup::spawn(
            self.config.workers,
            self.queue.clone(),
            self.processor.clone(),
        )
    }

    /// Spawn the background sweep loop.
    pub fn spawn_sweeper(&self) -> crate::sweep::SweeperHandle {
        self.sweeper.clone().spawn()
    }

    /// Direct access to the sweeps, for schedulers that bring their own
    /// cadence.
    pub fn sweeper(&self) -> &Arc<Sweeper> {
        &self.sweeper
    }
}
