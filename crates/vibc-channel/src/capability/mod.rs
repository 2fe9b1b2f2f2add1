// Capability-based authorization for ports and channels

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host;

/// Unforgeable token proving ownership of a named port or channel.
///
/// Only a [`CapabilityKeeper`] hands these out; holding one with the right
/// index is what authenticates a caller.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability {
    index: u64,
}

impl Capability {
    pub fn index(&self) -> u64 {
        self.index
    }
}

/// Capability keeper errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Capability already exists: {0}")]
    AlreadyExists(String),

    #[error("Capability name cannot be empty")]
    EmptyName,
}

pub trait CapabilityKeeper {
    /// Mint a fresh capability bound to `name`.
    fn new_capability(&mut self, name: &str) -> Result<Capability, CapabilityError>;

    fn get_capability(&self, name: &str) -> Option<Capability>;

    fn authenticate_capability(&self, capability: &Capability, name: &str) -> bool;

    /// Claim a port for a module. Ports are bound once.
    fn bind_port(&mut self, port_id: &str) -> Result<Capability, CapabilityError> {
        self.new_capability(&host::port_capability_name(port_id))
    }
}

/// In-memory capability keeper
#[derive(Debug, Default, Clone)]
pub struct MemoryCapabilityKeeper {
    next_index: u64,
    by_name: BTreeMap<String, Capability>,
}

impl MemoryCapabilityKeeper {
    pub fn new() -> Self {
        Self {
            next_index: 1,
            by_name: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl CapabilityKeeper for MemoryCapabilityKeeper {
    fn new_capability(&mut self, name: &str) -> Result<Capability, CapabilityError> {
        if name.trim().is_empty() {
            return Err(CapabilityError::EmptyName);
        }
        if self.by_name.contains_key(name) {
            return Err(CapabilityError::AlreadyExists(name.to_string()));
        }

        // Index 0 is never issued
        let index = self.next_index.max(1);
        self.next_index = index + 1;

        let capability = Capability { index };
        self.by_name.insert(name.to_string(), capability);
        Ok(capability)
    }

    fn get_capability(&self, name: &str) -> Option<Capability> {
        self.by_name.get(name).copied()
    }

    fn authenticate_capability(&self, capability: &Capability, name: &str) -> bool {
        self.by_name.get(name) == Some(capability)
    }
}
