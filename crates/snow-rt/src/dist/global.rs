//! Global process name registry, replicated across all cluster nodes.
//!
//! Unlike the local `ProcessRegistry` (node-scoped), the global registry
//! provides cluster-wide name registration. Every node holds a complete
//! replica of the name table; lookups are always local (no network).
//!
//! ## Replication Strategy
//!
//! Fully replicated with asynchronous broadcast:
//! - `register()` stores locally and broadcasts `DIST_GLOBAL_REGISTER`
//! - `unregister()` removes locally and broadcasts `DIST_GLOBAL_UNREGISTER`
//! - On node connect, a `DIST_GLOBAL_SYNC` snapshot is exchanged
//! - On node disconnect, all names owned by that node are cleaned up
//! - On process exit, all global names for that PID are cleaned up
//!
//! ## Lock Design
//!
//! All three maps are wrapped in a single `RwLock<GlobalRegistryInner>` to
//! avoid deadlocks and ensure consistency between the forward and reverse
//! indexes.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

use crate::actor::process::ProcessId;

// ---------------------------------------------------------------------------
// GlobalRegistryInner -- the three maps under a single lock
// ---------------------------------------------------------------------------

/// Inner state of the global registry, protected by a single RwLock.
struct GlobalRegistryInner {
    /// name -> (PID, owning_node_name) mapping
    names: FxHashMap<String, (ProcessId, String)>,
    /// PID -> names reverse index for efficient cleanup on process exit
    pid_names: FxHashMap<ProcessId, Vec<String>>,
    /// node_name -> names reverse index for efficient cleanup on node disconnect
    node_names: FxHashMap<String, Vec<String>>,
}

impl GlobalRegistryInner {
    fn new() -> Self {
        GlobalRegistryInner {
            names: FxHashMap::default(),
            pid_names: FxHashMap::default(),
            node_names: FxHashMap::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// GlobalRegistry
// ---------------------------------------------------------------------------

/// Global process name registry, replicated across all cluster nodes.
///
/// Unlike the local `ProcessRegistry`, this tracks the owning node name
/// for each registration to enable cleanup when a node disconnects.
pub struct GlobalRegistry {
    inner: RwLock<GlobalRegistryInner>,
}

impl GlobalRegistry {
    /// Create a new empty global registry.
    pub fn new() -> Self {
        GlobalRegistry {
            inner: RwLock::new(GlobalRegistryInner::new()),
        }
    }

    /// Register a name globally.
    ///
    /// Returns `Ok(())` if the name was successfully registered, or
    /// `Err(message)` if the name is already taken.
    pub fn register(&self, name: String, pid: ProcessId, node_name: String) -> Result<(), String> {
        let mut inner = self.inner.write();

        if let Some((existing_pid, _)) = inner.names.get(&name) {
            return Err(format!(
                "name '{}' already globally registered to {}",
                name, existing_pid
            ));
        }

        inner.names.insert(name.clone(), (pid, node_name.clone()));
        inner.pid_names.entry(pid).or_default().push(name.clone());
        inner.node_names.entry(node_name).or_default().push(name);

        Ok(())
    }

    /// Look up a globally registered name.
    ///
    /// Always local -- no network call. Returns `Some(pid)` if registered,
    /// `None` otherwise.
    pub fn whereis(&self, name: &str) -> Option<ProcessId> {
        let inner = self.inner.read();
        inner.names.get(name).map(|(pid, _)| *pid)
    }

    /// Unregister a globally registered name.
    ///
    /// Removes from all three maps. Returns `true` if the name was found
    /// and removed, `false` if not found.
    pub fn unregister(&self, name: &str) -> bool {
        let mut inner = self.inner.write();

        if let Some((pid, node_name)) = inner.names.remove(name) {
            // Remove from pid_names reverse index.
            if let Some(list) = inner.pid_names.get_mut(&pid) {
                list.retain(|n| n != name);
                if list.is_empty() {
                    inner.pid_names.remove(&pid);
                }
            }
            // Remove from node_names reverse index.
            if let Some(list) = inner.node_names.get_mut(&node_name) {
                list.retain(|n| n != name);
                if list.is_empty() {
                    inner.node_names.remove(&node_name);
                }
            }
            true
        } else {
            false
        }
    }

    /// Remove all registrations owned by a specific node.
    ///
    /// Called when a node disconnects. Returns the list of removed names
    /// (for broadcasting unregister messages to remaining nodes).
    pub fn cleanup_node(&self, node_name: &str) -> Vec<String> {
        let mut inner = self.inner.write();

        let names_to_remove = inner
            .node_names
            .remove(node_name)
            .unwrap_or_default();

        if !names_to_remove.is_empty() {
            for name in &names_to_remove {
                if let Some((pid, _)) = inner.names.remove(name) {
                    if let Some(list) = inner.pid_names.get_mut(&pid) {
                        list.retain(|n| n != name);
                        if list.is_empty() {
                            inner.pid_names.remove(&pid);
                        }
                    }
                }
            }
        }

        names_to_remove
    }

    /// Remove all registrations for a specific PID.
    ///
    /// Called when a local process exits. Returns the list of removed names
    /// (for broadcasting unregister messages to other nodes).
    pub fn cleanup_process(&self, pid: ProcessId) -> Vec<String> {
        let mut inner = self.inner.write();

        let names_to_remove = inner
            .pid_names
            .remove(&pid)
            .unwrap_or_default();

        if !names_to_remove.is_empty() {
            for name in &names_to_remove {
                if let Some((_, node_name)) = inner.names.remove(name) {
                    if let Some(list) = inner.node_names.get_mut(&node_name) {
                        list.retain(|n| n != name);
                        if list.is_empty() {
                            inner.node_names.remove(&node_name);
                        }
                    }
                }
            }
        }

        names_to_remove
    }

    /// Get all current registrations as a snapshot for syncing to a newly
    /// connected node.
    ///
    /// Returns `(name, pid, owning_node_name)` tuples.
    pub fn snapshot(&self) -> Vec<(String, ProcessId, String)> {
        let inner = self.inner.read();
        inner
            .names
            .iter()
            .map(|(name, (pid, node))| (name.clone(), *pid, node.clone()))
            .collect()
    }

    /// Bulk-insert registrations from a remote node's sync snapshot.
    ///
    /// Idempotent: skips names that are already registered (first-writer wins).
    pub fn merge_snapshot(&self, entries: Vec<(String, ProcessId, String)>) {
        let mut inner = self.inner.write();

        for (name, pid, node_name) in entries {
            // Skip if already registered (idempotent merge).
            if inner.names.contains_key(&name) {
                continue;
            }
            inner.names.insert(name.clone(), (pid, node_name.clone()));
            inner.pid_names.entry(pid).or_default().push(name.clone());
            inner.node_names.entry(node_name).or_default().push(name);
        }
    }
}

// ---------------------------------------------------------------------------
// Global singleton
// ---------------------------------------------------------------------------

/// The global name registry, lazily initialized.
static GLOBAL_NAME_REGISTRY: OnceLock<GlobalRegistry> = OnceLock::new();

/// Get a reference to the global name registry.
pub fn global_name_registry() -> &'static GlobalRegistry {
    GLOBAL_NAME_REGISTRY.get_or_init(GlobalRegistry::new)
}

// ---------------------------------------------------------------------------
// Broadcast functions (pub(crate) for use from actor/mod.rs)
// ---------------------------------------------------------------------------

/// Broadcast a global register event to all connected nodes.
///
/// Follows the `send_peer_list` pattern: collect session references under
/// read lock, drop lock, then iterate and write to each stream.
pub(crate) fn broadcast_global_register(name: &str, pid: ProcessId, node_name: &str) {
    let state = match super::node::node_state() {
        Some(s) => s,
        None => return,
    };

    // Build payload: [tag 0x1B][u16 name_len][name][u64 pid][u16 node_name_len][node_name]
    let name_bytes = name.as_bytes();
    let node_bytes = node_name.as_bytes();
    let mut payload = Vec::with_capacity(1 + 2 + name_bytes.len() + 8 + 2 + node_bytes.len());
    payload.push(super::node::DIST_GLOBAL_REGISTER);
    payload.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    payload.extend_from_slice(name_bytes);
    payload.extend_from_slice(&pid.as_u64().to_le_bytes());
    payload.extend_from_slice(&(node_bytes.len() as u16).to_le_bytes());
    payload.extend_from_slice(node_bytes);

    // Collect session references, then drop sessions lock before writing.
    let sessions: Vec<std::sync::Arc<super::node::NodeSession>> = {
        let map = state.sessions.read();
        map.values().map(|s| std::sync::Arc::clone(s)).collect()
    };

    for session in &sessions {
        let mut stream = session.stream.lock().unwrap();
        let _ = super::node::write_msg(&mut *stream, &payload);
    }
}

/// Broadcast a global unregister event to all connected nodes.
///
/// Follows the same broadcast pattern as `broadcast_global_register`.
pub(crate) fn broadcast_global_unregister(name: &str) {
    let state = match super::node::node_state() {
        Some(s) => s,
        None => return,
    };

    // Build payload: [tag 0x1C][u16 name_len][name]
    let name_bytes = name.as_bytes();
    let mut payload = Vec::with_capacity(1 + 2 + name_bytes.len());
    payload.push(super::node::DIST_GLOBAL_UNREGISTER);
    payload.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    payload.extend_from_slice(name_bytes);

    // Collect session references, then drop sessions lock before writing.
    let sessions: Vec<std::sync::Arc<super::node::NodeSession>> = {
        let map = state.sessions.read();
        map.values().map(|s| std::sync::Arc::clone(s)).collect()
    };

    for session in &sessions {
        let mut stream = session.stream.lock().unwrap();
        let _ = super::node::write_msg(&mut *stream, &payload);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
