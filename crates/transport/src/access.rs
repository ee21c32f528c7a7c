//! Connection-level access control.
//!
//! Consulted before every upgrade: with the expected identifier on the
//! outbound side, and with the verified derived identifier on the
//! inbound side before the connection surfaces. The empty identifier is
//! always denied.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use dep2p_types::config::{AccessConfig, AccessMode};
use dep2p_types::NodeId;
use log::warn;

use crate::error::AccessError;

/// The policy engine gating inbound and outbound upgrades.
pub struct AccessController {
    mode: AccessMode,
    allow: RwLock<HashSet<NodeId>>,
    deny: RwLock<HashSet<NodeId>>,
    allowed_count: AtomicU64,
    denied_count: AtomicU64,
}

impl AccessController {
    /// Creates a controller with empty sets.
    pub fn new(mode: AccessMode) -> Self {
        Self {
            mode,
            allow: RwLock::new(HashSet::new()),
            deny: RwLock::new(HashSet::new()),
            allowed_count: AtomicU64::new(0),
            denied_count: AtomicU64::new(0),
        }
    }

    /// Creates a controller from startup configuration.
    pub fn from_config(config: &AccessConfig) -> Self {
        let controller = Self::new(config.mode);
        if let Ok(mut allow) = controller.allow.write() {
            allow.extend(config.allow.iter().copied());
        }
        if let Ok(mut deny) = controller.deny.write() {
            deny.extend(config.deny.iter().copied());
        }
        controller
    }

    /// The active mode.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Decides whether `node` may connect, updating the decision
    /// counters. Denials are logged at `warn`.
    pub fn check(&self, node: &NodeId) -> Result<(), AccessError> {
        let decision = self.decide(node);
        match &decision {
            Ok(()) => {
                self.allowed_count.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.denied_count.fetch_add(1, Ordering::Relaxed);
                warn!("access denied for {}: {}", node.short(), err);
            }
        }
        decision
    }

    fn decide(&self, node: &NodeId) -> Result<(), AccessError> {
        if node.is_empty() {
            return Err(AccessError::EmptyNodeId);
        }

        let in_allow = self
            .allow
            .read()
            .map(|s| s.contains(node))
            .unwrap_or(false);
        let in_deny = self.deny.read().map(|s| s.contains(node)).unwrap_or(true);

        match self.mode {
            AccessMode::AllowAll => Ok(()),
            AccessMode::Whitelist => {
                if !in_allow {
                    Err(AccessError::NotInWhitelist(*node))
                } else if in_deny {
                    Err(AccessError::InBlacklist(*node))
                } else {
                    Ok(())
                }
            }
            AccessMode::Blacklist => {
                if in_deny {
                    Err(AccessError::InBlacklist(*node))
                } else {
                    Ok(())
                }
            }
            // Whitelist wins, then the deny set, then default-allow.
            AccessMode::Mixed => {
                if in_allow {
                    Ok(())
                } else if in_deny {
                    Err(AccessError::InBlacklist(*node))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Adds an identifier to the allow set.
    pub fn allow(&self, node: NodeId) {
        if let Ok(mut set) = self.allow.write() {
            set.insert(node);
        }
    }

    /// Removes an identifier from the allow set.
    pub fn remove_allowed(&self, node: &NodeId) {
        if let Ok(mut set) = self.allow.write() {
            set.remove(node);
        }
    }

    /// Adds an identifier to the deny set.
    pub fn deny(&self, node: NodeId) {
        if let Ok(mut set) = self.deny.write() {
            set.insert(node);
        }
    }

    /// Removes an identifier from the deny set.
    pub fn remove_denied(&self, node: &NodeId) {
        if let Ok(mut set) = self.deny.write() {
            set.remove(node);
        }
    }

    /// Decisions that allowed a connection so far.
    pub fn allowed_count(&self) -> u64 {
        self.allowed_count.load(Ordering::Relaxed)
    }

    /// Decisions that denied a connection so far.
    pub fn denied_count(&self) -> u64 {
        self.denied_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for AccessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessController")
            .field("mode", &self.mode)
            .field("allowed", &self.allowed_count())
            .field("denied", &self.denied_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> NodeId {
        NodeId::new([byte; 32])
    }

    #[test]
    fn allow_all_denies_only_empty() {
        let ctrl = AccessController::new(AccessMode::AllowAll);
        ctrl.check(&id(1)).unwrap();
        assert!(matches!(
            ctrl.check(&NodeId::EMPTY),
            Err(AccessError::EmptyNodeId)
        ));
        assert_eq!(ctrl.allowed_count(), 1);
        assert_eq!(ctrl.denied_count(), 1);
    }

    #[test]
    fn whitelist_requires_membership() {
        let ctrl = AccessController::new(AccessMode::Whitelist);
        ctrl.allow(id(1));

        ctrl.check(&id(1)).unwrap();
        assert!(matches!(
            ctrl.check(&id(2)),
            Err(AccessError::NotInWhitelist(_))
        ));

        // Whitelisted but also denied: deny wins inside whitelist mode.
        ctrl.deny(id(1));
        assert!(matches!(ctrl.check(&id(1)), Err(AccessError::InBlacklist(_))));
    }

    #[test]
    fn blacklist_denies_members_only() {
        let ctrl = AccessController::new(AccessMode::Blacklist);
        ctrl.deny(id(9));

        assert!(matches!(ctrl.check(&id(9)), Err(AccessError::InBlacklist(_))));
        ctrl.check(&id(1)).unwrap();

        ctrl.remove_denied(&id(9));
        ctrl.check(&id(9)).unwrap();
    }

    #[test]
    fn mixed_mode_whitelist_wins() {
        let ctrl = AccessController::new(AccessMode::Mixed);
        ctrl.allow(id(1));
        ctrl.deny(id(1));

        // In both sets: the allow set takes precedence.
        ctrl.check(&id(1)).unwrap();

        ctrl.deny(id(2));
        assert!(matches!(ctrl.check(&id(2)), Err(AccessError::InBlacklist(_))));

        // In neither set: allowed.
        ctrl.check(&id(3)).unwrap();
    }

    #[test]
    fn from_config_seeds_sets() {
        let mut config = AccessConfig {
            mode: AccessMode::Whitelist,
            ..AccessConfig::default()
        };
        config.allow.insert(id(5));

        let ctrl = AccessController::from_config(&config);
        ctrl.check(&id(5)).unwrap();
        assert!(ctrl.check(&id(6)).is_err());
    }
}
