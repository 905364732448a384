//! Per-session display-name registry.
//!
//! Everything internal is keyed by [`PersonaId`]; display names are looked up
//! here only when text is rendered. Each session owns one registry and hands
//! out clones of the [`SharedRegistry`] handle.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use colloquy_types::error::RegistryError;
use colloquy_types::persona::PersonaId;

#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    /// Registration order, used for stable name listings.
    order: Vec<PersonaId>,
    names: HashMap<PersonaId, String>,
    by_name: HashMap<String, PersonaId>,
    history: HashMap<PersonaId, Vec<String>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: PersonaId, name: &str) -> Result<(), RegistryError> {
        let key = name.to_lowercase();
        if self.by_name.get(&key).is_some_and(|owner| *owner != id) {
            return Err(RegistryError::NameTaken(name.to_string()));
        }
        if !self.names.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.names.insert(id.clone(), name.to_string());
        self.by_name.insert(key, id.clone());
        self.history.entry(id).or_default().push(name.to_string());
        Ok(())
    }

    /// Remove a persona, returning its last display name.
    ///
    /// Its name history is kept so old mentions still resolve.
    pub fn unregister(&mut self, id: &PersonaId) -> Option<String> {
        let name = self.names.remove(id)?;
        self.by_name.remove(&name.to_lowercase());
        self.order.retain(|other| other != id);
        Some(name)
    }

    /// Change a display name, returning the previous one.
    pub fn rename(&mut self, id: &PersonaId, new_name: &str) -> Result<String, RegistryError> {
        let Some(old) = self.names.get(id).cloned() else {
            return Err(RegistryError::NotRegistered(id.to_string()));
        };
        let key = new_name.to_lowercase();
        if self.by_name.get(&key).is_some_and(|owner| owner != id) {
            return Err(RegistryError::NameTaken(new_name.to_string()));
        }
        self.by_name.remove(&old.to_lowercase());
        self.by_name.insert(key, id.clone());
        self.names.insert(id.clone(), new_name.to_string());
        self.history
            .entry(id.clone())
            .or_default()
            .push(new_name.to_string());
        Ok(old)
    }

    /// Current display name, or the id itself when unknown.
    pub fn name_of(&self, id: &PersonaId) -> String {
        self.names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Exact (case-insensitive) lookup by current name.
    pub fn id_of(&self, name: &str) -> Option<PersonaId> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    /// Exact match, then prefix of a current name, then prefix of a past name.
    pub fn resolve(&self, name: &str) -> Option<PersonaId> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        if let Some(id) = self.by_name.get(&needle) {
            return Some(id.clone());
        }
        if let Some(id) = self.order.iter().find(|id| {
            self.names
                .get(*id)
                .is_some_and(|n| n.to_lowercase().starts_with(&needle))
        }) {
            return Some(id.clone());
        }
        self.order
            .iter()
            .chain(self.history.keys().filter(|id| !self.names.contains_key(*id)))
            .find(|id| {
                self.history.get(*id).is_some_and(|names| {
                    names.iter().any(|n| n.to_lowercase().starts_with(&needle))
                })
            })
            .cloned()
    }

    /// Current names in registration order.
    pub fn all_names(&self) -> Vec<String> {
        self.order.iter().map(|id| self.name_of(id)).collect()
    }

    /// Every name `id` has carried, oldest first, the current one last.
    pub fn history(&self, id: &PersonaId) -> Vec<String> {
        self.history.get(id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Cloneable handle to a session's registry.
///
/// Guards must not be held across `.await`; every accessor here takes the
/// lock for one synchronous lookup.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry(Arc<RwLock<NameRegistry>>);

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, NameRegistry> {
        self.0.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, NameRegistry> {
        self.0.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn name_of(&self, id: &PersonaId) -> String {
        self.read().name_of(id)
    }

    pub fn resolve(&self, name: &str) -> Option<PersonaId> {
        self.read().resolve(name)
    }

    pub fn all_names(&self) -> Vec<String> {
        self.read().all_names()
    }
}
