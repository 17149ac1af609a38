//! The engine: one context object holding everything the IRC core shares.
//!
//! An [`IrcEngine`] owns the factory (and through it the pools), the
//! listener set, and the single parser task. Connections reach it through a
//! weak reference, so dropping the last `Arc<IrcEngine>` is never blocked by
//! a connection that is still around.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use sbi_proto::Sender;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, NetworkConfig, ProfileConfig};
use crate::connection::IrcConnection;
use crate::error::{IrcResult, IrcStatus};
use crate::factory::IrcFactory;
use crate::listener::{IrcEvent, IrcListener};
use crate::parser;
use crate::pool::IrcPools;
use crate::state::{IrcChannel, IrcNetwork, IrcUser};

pub struct IrcEngine {
    config: EngineConfig,
    factory: IrcFactory,
    listeners: RwLock<Vec<Arc<dyn IrcListener>>>,
    /// Parser wakeup. Permits coalesce, so one wake drains everything.
    sync: Arc<Notify>,
    quitting: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    parser_task: Mutex<Option<JoinHandle<()>>>,
}

impl IrcEngine {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            config,
            factory: IrcFactory::default(),
            listeners: RwLock::new(Vec::new()),
            sync: Arc::new(Notify::new()),
            quitting: AtomicBool::new(false),
            shutdown_tx,
            parser_task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn factory(&self) -> &IrcFactory {
        &self.factory
    }

    pub fn pools(&self) -> &IrcPools {
        self.factory.pools()
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::Acquire)
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a listener. Delivery follows registration order.
    pub fn add_listener(&self, listener: Arc<dyn IrcListener>) {
        self.listeners.write().push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn IrcListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Deliver `event` to every listener that accepts its kind.
    pub fn notify_listeners(&self, connection: &Arc<IrcConnection>, event: &IrcEvent) {
        // snapshot, so a listener may register others from inside a callback
        let listeners = self.listeners.read().clone();
        let kind = event.kind();
        for listener in listeners.iter().filter(|l| l.accepts(kind)) {
            listener.on_event(connection, event);
        }
    }

    // ========================================================================
    // Creation
    // ========================================================================

    pub fn create_network(&self, group_name: &str) -> IrcResult<Arc<IrcNetwork>> {
        self.factory.create_network(group_name)
    }

    /// Create a network named after `network` and install its configuration.
    pub fn create_configured_network(
        &self,
        network: &NetworkConfig,
        profile: &ProfileConfig,
    ) -> IrcResult<Arc<IrcNetwork>> {
        let created = self.factory.create_network(&network.network_name)?;
        created.configure(network, profile);
        Ok(created)
    }

    pub fn create_connection(self: &Arc<Self>, network_name: &str) -> IrcResult<Arc<IrcConnection>> {
        let network = self
            .get_network(network_name)
            .ok_or_else(|| IrcStatus::ObjectAddError(format!("no network {network_name}")))?;
        Ok(self
            .factory
            .create_connection(Arc::downgrade(self), &network))
    }

    pub fn create_channel(&self, connection_id: u32, name: &str) -> IrcResult<Arc<IrcChannel>> {
        let connection = self
            .get_connection(connection_id)
            .ok_or_else(|| IrcStatus::ObjectAddError(format!("no connection {connection_id}")))?;
        self.factory.create_channel(&connection, name)
    }

    /// Create a user and add it to the channel's member list.
    pub fn create_user(
        &self,
        connection_id: u32,
        channel: &str,
        nickname: &str,
        ident: &str,
        hostmask: &str,
    ) -> IrcResult<Arc<IrcUser>> {
        let channel = self
            .get_connection(connection_id)
            .and_then(|c| c.get_channel(channel))
            .ok_or_else(|| IrcStatus::ObjectAddError(format!("no channel {channel}")))?;

        let user = self.factory.create_user(
            &channel,
            &Sender {
                nickname: nickname.to_string(),
                ident: ident.to_string(),
                hostmask: hostmask.to_string(),
            },
        );
        if let Err(e) = channel.add_user(Arc::clone(&user)) {
            self.factory.free_users(vec![user]);
            return Err(e);
        }
        Ok(user)
    }

    pub fn get_network(&self, group_name: &str) -> Option<Arc<IrcNetwork>> {
        self.pools().get_network(group_name)
    }

    pub fn get_connection(&self, id: u32) -> Option<Arc<IrcConnection>> {
        self.pools().get_connection(id)
    }

    /// Disconnect every connection of a network and release it all.
    pub async fn destroy_network(&self, group_name: &str) -> IrcResult {
        let network = self
            .get_network(group_name)
            .ok_or_else(|| IrcStatus::not_found(group_name))?;

        for connection in network.connections() {
            connection.cleanup().await;
            network.detach(connection.id());
            self.pools().connections.free(&connection)?;
        }
        self.pools().networks.free(&network)?;
        info!(network = %group_name, "network destroyed");
        Ok(())
    }

    // ========================================================================
    // Parser task
    // ========================================================================

    /// Start the parser task if it is not running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_parser(self: &Arc<Self>) {
        let mut task = self.parser_task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        *task = Some(tokio::spawn(parser::run(
            Arc::downgrade(self),
            Arc::clone(&self.sync),
            self.shutdown_tx.subscribe(),
        )));
        debug!("parser task started");
    }

    /// Wake the parser. Calls made while it is busy merge into one wake.
    pub fn trigger_sync(&self) {
        self.sync.notify_one();
    }

    /// Drain every connection's receive queue on the calling thread.
    pub fn parse_all(&self) {
        parser::parse_all(self);
    }

    /// Disconnect everything and stop the parser.
    pub async fn shutdown(&self) {
        if self.quitting.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("engine shutting down");

        for connection in self.pools().connections.allocated() {
            connection.cleanup().await;
        }

        let _ = self.shutdown_tx.send(());
        let task = self.parser_task.lock().take();
        if let Some(mut task) = task {
            let limit = Duration::from_millis(self.config.join_timeout_ms);
            if timeout(limit, &mut task).await.is_err() {
                warn!("parser task did not stop in time, aborting");
                task.abort();
            }
        }
        self.pools().reclaim();
    }
}

impl std::fmt::Debug for IrcEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrcEngine")
            .field("config", &self.config)
            .field("listeners", &self.listeners.read().len())
            .field("quitting", &self.is_quitting())
            .finish_non_exhaustive()
    }
}
