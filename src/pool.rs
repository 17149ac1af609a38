//! Object pools for networks, connections, channels and users.
//!
//! A pool is a growable arena of slots with a free list. It does not own
//! the objects in any exclusive sense: handing out `Arc`s means the caller
//! may keep an object alive after it has been freed. Such objects are parked
//! on a delete-later list and only let go once the pool holds the last
//! reference, so a slot is never reported free while something still uses
//! what was in it.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::connection::IrcConnection;
use crate::error::{IrcResult, IrcStatus};
use crate::state::{IrcChannel, IrcNetwork, IrcUser};

/// Allocation counters for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total objects ever handed out.
    pub allocations: u64,
    /// Highest number of simultaneously live objects.
    pub max_alive: usize,
}

#[derive(Debug)]
struct PoolInner<T> {
    slots: Vec<Option<Arc<T>>>,
    free: Vec<usize>,
    delete_later: Vec<Arc<T>>,
    stats: PoolStats,
}

/// A growable slot arena handing out shared handles.
#[derive(Debug)]
pub struct ObjectPool<T> {
    kind: &'static str,
    inner: Mutex<PoolInner<T>>,
}

impl<T> ObjectPool<T> {
    pub fn new(kind: &'static str) -> Self {
        Self::with_capacity(kind, 0)
    }

    /// Create a pool with `capacity` slots preallocated.
    pub fn with_capacity(kind: &'static str, capacity: usize) -> Self {
        Self {
            kind,
            inner: Mutex::new(PoolInner {
                slots: Vec::with_capacity(capacity),
                free: Vec::new(),
                delete_later: Vec::new(),
                stats: PoolStats::default(),
            }),
        }
    }

    /// Place `value` in a slot and return a handle to it.
    pub fn allocate(&self, value: T) -> Arc<T> {
        let obj = Arc::new(value);
        let mut inner = self.inner.lock();

        match inner.free.pop() {
            Some(idx) => inner.slots[idx] = Some(Arc::clone(&obj)),
            None => inner.slots.push(Some(Arc::clone(&obj))),
        }

        inner.stats.allocations += 1;
        let alive = inner.slots.len() - inner.free.len();
        inner.stats.max_alive = inner.stats.max_alive.max(alive);
        obj
    }

    /// Release `obj` from the pool.
    ///
    /// If handles other than the caller's are still outstanding, the object
    /// is parked on the delete-later list instead of being dropped.
    pub fn free(&self, obj: &Arc<T>) -> IrcResult {
        let mut inner = self.inner.lock();

        let idx = inner
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| Arc::ptr_eq(s, obj)))
            .ok_or_else(|| IrcStatus::ObjectFreeError(format!("{} not in pool", self.kind)))?;

        let Some(held) = inner.slots[idx].take() else {
            return Err(IrcStatus::ObjectFreeError(format!("{} slot empty", self.kind)));
        };
        inner.free.push(idx);

        // ours + the caller's
        if Arc::strong_count(&held) > 2 {
            debug!(kind = self.kind, refs = Arc::strong_count(&held), "deferring free");
            inner.delete_later.push(held);
        }
        Ok(())
    }

    /// Free every object in `objs`, logging (not failing) on strays.
    pub fn free_all(&self, objs: impl IntoIterator<Item = Arc<T>>) {
        for obj in objs {
            if let Err(e) = self.free(&obj) {
                debug!(kind = self.kind, error = %e, "free_all skipped object");
            }
        }
    }

    /// Drop parked objects that nobody references any more.
    ///
    /// Returns how many were released.
    pub fn reclaim(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.delete_later.len();
        inner.delete_later.retain(|o| Arc::strong_count(o) > 1);
        before - inner.delete_later.len()
    }

    /// Every live object, in slot order.
    pub fn allocated(&self) -> Vec<Arc<T>> {
        self.inner.lock().slots.iter().flatten().cloned().collect()
    }

    pub fn alive(&self) -> usize {
        let inner = self.inner.lock();
        inner.slots.len() - inner.free.len()
    }

    /// Objects freed but still referenced elsewhere.
    pub fn deferred(&self) -> usize {
        self.inner.lock().delete_later.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats
    }

    /// First live object matching `pred`.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<Arc<T>> {
        self.inner
            .lock()
            .slots
            .iter()
            .flatten()
            .find(|o| pred(o))
            .cloned()
    }
}

/// The four pools the engine allocates from.
#[derive(Debug)]
pub struct IrcPools {
    pub networks: ObjectPool<IrcNetwork>,
    pub connections: ObjectPool<IrcConnection>,
    pub channels: ObjectPool<IrcChannel>,
    pub users: ObjectPool<IrcUser>,
}

impl Default for IrcPools {
    fn default() -> Self {
        Self {
            networks: ObjectPool::with_capacity("network", 4),
            connections: ObjectPool::with_capacity("connection", 4),
            channels: ObjectPool::with_capacity("channel", 32),
            users: ObjectPool::with_capacity("user", 256),
        }
    }
}

impl IrcPools {
    pub fn get_network(&self, group_name: &str) -> Option<Arc<IrcNetwork>> {
        self.networks.find(|n| n.group_name() == group_name)
    }

    pub fn get_connection(&self, id: u32) -> Option<Arc<IrcConnection>> {
        self.connections.find(|c| c.id() == id)
    }

    /// Look a user up through its connection and channel.
    pub fn get_user(&self, connection_id: u32, channel: &str, nickname: &str) -> Option<Arc<IrcUser>> {
        self.get_connection(connection_id)?
            .get_channel(channel)?
            .get_user(nickname)
    }

    /// Sweep every delete-later list.
    pub fn reclaim(&self) -> usize {
        self.networks.reclaim()
            + self.connections.reclaim()
            + self.channels.reclaim()
            + self.users.reclaim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_reuses_free_slots() {
        let pool = ObjectPool::new("test");
        let a = pool.allocate(1u32);
        let b = pool.allocate(2u32);
        assert_eq!(pool.alive(), 2);

        pool.free(&a).unwrap();
        drop(a);
        assert_eq!(pool.alive(), 1);

        let _c = pool.allocate(3u32);
        assert_eq!(pool.alive(), 2);
        let stats = pool.stats();
        assert_eq!(stats.allocations, 3);
        assert_eq!(stats.max_alive, 2);

        let values: Vec<u32> = pool.allocated().iter().map(|v| **v).collect();
        assert_eq!(values, vec![3, 2]);
        drop(b);
    }

    #[test]
    fn free_defers_while_referenced() {
        let pool = ObjectPool::new("test");
        let a = pool.allocate(String::from("held"));
        let extra = Arc::clone(&a);

        pool.free(&a).unwrap();
        assert_eq!(pool.deferred(), 1);
        assert_eq!(pool.reclaim(), 0);

        drop(extra);
        drop(a);
        assert_eq!(pool.reclaim(), 1);
        assert_eq!(pool.deferred(), 0);
    }

    #[test]
    fn free_unknown_object_fails() {
        let pool = ObjectPool::new("test");
        let stray = Arc::new(5u8);
        assert_eq!(
            pool.free(&stray),
            Err(IrcStatus::ObjectFreeError(String::new()))
        );

        let a = pool.allocate(1u8);
        pool.free(&a).unwrap();
        assert!(pool.free(&a).is_err());
    }
}
