//! Construction of pooled IRC objects.
//!
//! The factory is the only place that builds networks, connections,
//! channels and users. Each object is placed into its pool and linked to its
//! parent: parents hold children strongly, children point back weakly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use sbi_proto::Sender;
use tracing::debug;

use crate::connection::IrcConnection;
use crate::engine::IrcEngine;
use crate::error::{IrcResult, IrcStatus};
use crate::pool::IrcPools;
use crate::state::{IrcChannel, IrcNetwork, IrcUser};

#[derive(Debug)]
pub struct IrcFactory {
    pools: IrcPools,
    next_connection_id: AtomicU32,
}

impl Default for IrcFactory {
    fn default() -> Self {
        Self::new(IrcPools::default())
    }
}

impl IrcFactory {
    pub fn new(pools: IrcPools) -> Self {
        Self {
            pools,
            next_connection_id: AtomicU32::new(1),
        }
    }

    pub fn pools(&self) -> &IrcPools {
        &self.pools
    }

    /// Build a network. Group names are unique.
    pub fn create_network(&self, group_name: &str) -> IrcResult<Arc<IrcNetwork>> {
        if group_name.is_empty() {
            return Err(IrcStatus::ObjectAddError("empty network name".into()));
        }
        if self.pools.get_network(group_name).is_some() {
            return Err(IrcStatus::ObjectAddError(format!(
                "network {group_name} exists"
            )));
        }
        debug!(network = %group_name, "creating network");
        Ok(self.pools.networks.allocate(IrcNetwork::new(group_name)))
    }

    /// Build a connection for `network` and attach it.
    pub fn create_connection(
        &self,
        engine: Weak<IrcEngine>,
        network: &Arc<IrcNetwork>,
    ) -> Arc<IrcConnection> {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let connection = self
            .pools
            .connections
            .allocate(IrcConnection::new(id, engine, Arc::downgrade(network)));
        network.attach(Arc::clone(&connection));
        debug!(connection = id, network = %network.group_name(), "creating connection");
        connection
    }

    /// Build a channel and start tracking it on `connection`.
    pub fn create_channel(
        &self,
        connection: &Arc<IrcConnection>,
        name: &str,
    ) -> IrcResult<Arc<IrcChannel>> {
        if name.is_empty() {
            return Err(IrcStatus::ObjectAddError("empty channel name".into()));
        }
        let channel = self
            .pools
            .channels
            .allocate(IrcChannel::new(Arc::downgrade(connection), name));
        if let Err(e) = connection.add_channel(Arc::clone(&channel)) {
            let _ = self.pools.channels.free(&channel);
            return Err(e);
        }
        Ok(channel)
    }

    /// Build a user belonging to `channel`. The caller decides which of the
    /// channel's lists it goes into.
    pub fn create_user(&self, channel: &Arc<IrcChannel>, who: &Sender) -> Arc<IrcUser> {
        self.pools.users.allocate(IrcUser::new(
            Arc::downgrade(channel),
            &who.nickname,
            &who.ident,
            &who.hostmask,
        ))
    }

    /// Return users to the pool.
    pub fn free_users(&self, users: Vec<Arc<IrcUser>>) {
        self.pools.users.free_all(users);
    }

    /// Return a channel and its members to the pools.
    pub fn free_channel(&self, channel: &Arc<IrcChannel>) {
        self.free_users(channel.cleanup());
        if let Err(e) = self.pools.channels.free(channel) {
            debug!(channel = %channel.name(), error = %e, "channel not pooled");
        }
    }
}
