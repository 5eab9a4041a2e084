//! Keyed pools of reusable entity instances.
//!
//! Every instance lives in one slot for the lifetime of the manager and keeps
//! its [`PoolHandle`]. A slot is either parked (owned by its tag's queue) or
//! checked out (owned by exactly one caller until released). Checkout and
//! release never touch the instance's gameplay state; callers reset it on
//! every checkout.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolTag(String);

impl PoolTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PoolTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolHandle(u32);

impl PoolHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The recipe a pool uses to synthesize new instances when it runs dry.
pub trait PoolTemplate: PartialEq + fmt::Debug {
    type Instance;

    fn instantiate(&self) -> Self::Instance;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("no pool registered for tag '{tag}'")]
    UnknownTag { tag: PoolTag },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Parked,
    CheckedOut,
}

struct Slot<T> {
    pool_index: usize,
    state: SlotState,
    instance: T,
}

struct TagPool<P> {
    tag: PoolTag,
    template: P,
    parked: VecDeque<PoolHandle>,
    checked_out: usize,
    created: usize,
}

pub struct PoolManager<P: PoolTemplate> {
    pools: Vec<TagPool<P>>,
    pool_index_by_tag: HashMap<PoolTag, usize>,
    slots: Vec<Slot<P::Instance>>,
}

impl<P: PoolTemplate> Default for PoolManager<P> {
    fn default() -> Self {
        Self {
            pools: Vec::new(),
            pool_index_by_tag: HashMap::new(),
            slots: Vec::new(),
        }
    }
}

impl<P: PoolTemplate> PoolManager<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tag` and pre-populates `initial_count` parked instances.
    /// Registering the same tag again with an equal template is accepted and
    /// leaves the pool untouched.
    pub fn register(
        &mut self,
        tag: PoolTag,
        template: P,
        initial_count: usize,
    ) -> Result<(), ConfigurationError> {
        if tag.as_str().trim().is_empty() {
            return Err(ConfigurationError::EmptyPoolTag);
        }
        if let Some(&pool_index) = self.pool_index_by_tag.get(&tag) {
            let same_template = self
                .pools
                .get(pool_index)
                .is_some_and(|pool| pool.template == template);
            if same_template {
                debug!(tag = %tag, "pool_reregistered");
                return Ok(());
            }
            return Err(ConfigurationError::DuplicatePoolTag {
                tag: tag.as_str().to_string(),
            });
        }

        let pool_index = self.pools.len();
        let mut parked = VecDeque::with_capacity(initial_count);
        for _ in 0..initial_count {
            let handle = self.push_slot(pool_index, SlotState::Parked, template.instantiate());
            parked.push_back(handle);
        }
        info!(tag = %tag, initial_count, "pool_registered");
        self.pool_index_by_tag.insert(tag.clone(), pool_index);
        self.pools.push(TagPool {
            tag,
            template,
            parked,
            checked_out: 0,
            created: initial_count,
        });
        Ok(())
    }

    /// Hands out a parked instance, or synthesizes one from the template
    /// when the queue is empty. Exhaustion never fails.
    pub fn checkout(&mut self, tag: &PoolTag) -> Result<PoolHandle, PoolError> {
        let Some(&pool_index) = self.pool_index_by_tag.get(tag) else {
            return Err(PoolError::UnknownTag { tag: tag.clone() });
        };
        let Some(pool) = self.pools.get_mut(pool_index) else {
            return Err(PoolError::UnknownTag { tag: tag.clone() });
        };

        let handle = match pool.parked.pop_front() {
            Some(handle) => {
                if let Some(slot) = self.slots.get_mut(handle.index()) {
                    slot.state = SlotState::CheckedOut;
                }
                handle
            }
            None => {
                let instance = pool.template.instantiate();
                pool.created = pool.created.saturating_add(1);
                debug!(tag = %pool.tag, created = pool.created, "pool_grew");
                self.push_slot(pool_index, SlotState::CheckedOut, instance)
            }
        };
        if let Some(pool) = self.pools.get_mut(pool_index) {
            pool.checked_out = pool.checked_out.saturating_add(1);
        }
        Ok(handle)
    }

    /// Parks a checked-out instance. Returns `false` (and does nothing) when
    /// the handle is already parked or unknown.
    pub fn release(&mut self, handle: PoolHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index()) else {
            return false;
        };
        if slot.state == SlotState::Parked {
            return false;
        }
        slot.state = SlotState::Parked;
        let Some(pool) = self.pools.get_mut(slot.pool_index) else {
            return false;
        };
        pool.parked.push_back(handle);
        pool.checked_out = pool.checked_out.saturating_sub(1);
        true
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&P::Instance> {
        self.slots.get(handle.index()).map(|slot| &slot.instance)
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut P::Instance> {
        self.slots
            .get_mut(handle.index())
            .map(|slot| &mut slot.instance)
    }

    pub fn is_checked_out(&self, handle: PoolHandle) -> bool {
        self.slots
            .get(handle.index())
            .is_some_and(|slot| slot.state == SlotState::CheckedOut)
    }

    pub fn tag_of(&self, handle: PoolHandle) -> Option<&PoolTag> {
        let slot = self.slots.get(handle.index())?;
        self.pools.get(slot.pool_index).map(|pool| &pool.tag)
    }

    pub fn is_registered(&self, tag: &PoolTag) -> bool {
        self.pool_index_by_tag.contains_key(tag)
    }

    pub fn checked_out_handles(&self) -> Vec<PoolHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == SlotState::CheckedOut)
            .map(|(index, _)| PoolHandle(index as u32))
            .collect()
    }

    pub fn iter_checked_out(&self) -> impl Iterator<Item = (PoolHandle, &P::Instance)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == SlotState::CheckedOut)
            .map(|(index, slot)| (PoolHandle(index as u32), &slot.instance))
    }

    pub fn active_count(&self, tag: &PoolTag) -> usize {
        self.pool(tag).map_or(0, |pool| pool.checked_out)
    }

    pub fn parked_count(&self, tag: &PoolTag) -> usize {
        self.pool(tag).map_or(0, |pool| pool.parked.len())
    }

    pub fn created_count(&self, tag: &PoolTag) -> usize {
        self.pool(tag).map_or(0, |pool| pool.created)
    }

    pub fn total_active(&self) -> usize {
        self.pools.iter().map(|pool| pool.checked_out).sum()
    }

    pub fn active_counts_by_tag(&self) -> HashMap<PoolTag, usize> {
        self.pools
            .iter()
            .map(|pool| (pool.tag.clone(), pool.checked_out))
            .collect()
    }

    fn pool(&self, tag: &PoolTag) -> Option<&TagPool<P>> {
        let pool_index = *self.pool_index_by_tag.get(tag)?;
        self.pools.get(pool_index)
    }

    fn push_slot(
        &mut self,
        pool_index: usize,
        state: SlotState,
        instance: P::Instance,
    ) -> PoolHandle {
        let handle = PoolHandle(self.slots.len() as u32);
        self.slots.push(Slot {
            pool_index,
            state,
            instance,
        });
        handle
    }
}
