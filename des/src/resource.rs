//! Capacity-limited resources with FIFO waiting
//!
//! A pool hands out [`Permit`]s. A permit is a token for one unit of capacity and
//! cannot be cloned. Agents keep it inside their own state while they hold the
//! unit and give it back through [`crate::Context::release`].
//!
//! The pool also records which agent holds each unit. When an agent finishes
//! while still holding units (it dropped the permit, or never released it) the
//! event loop takes them back and hands them on, so every grant is matched by
//! exactly one release. Agents abandoned at the horizon keep what they hold.

use std::collections::VecDeque;

use crate::{AgentId, SimError};

/// Handle to a pool registered with an [`crate::EventLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(pub(crate) usize);

/// One granted unit of a [`ResourcePool`]
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a permit has to be released back to its pool"]
pub struct Permit {
    pool: PoolId,
}

impl Permit {
    pub fn pool(&self) -> PoolId {
        self.pool
    }
}

#[derive(Debug)]
pub struct ResourcePool {
    id: PoolId,
    capacity: usize,
    in_use: usize,
    waiters: VecDeque<AgentId>,
    /// One entry per unit in use
    holders: Vec<AgentId>,
    total_grants: u64,
    total_reclaimed: u64,
    total_queued: u64,
    peak_queue_len: usize,
}

impl ResourcePool {
    pub(crate) fn new(id: PoolId, capacity: usize) -> Result<ResourcePool, SimError> {
        if capacity == 0 {
            return Err(SimError::configuration(
                "resource pool capacity must be at least 1",
            ));
        }
        Ok(ResourcePool {
            id,
            capacity,
            in_use: 0,
            waiters: VecDeque::new(),
            holders: Vec::with_capacity(capacity),
            total_grants: 0,
            total_reclaimed: 0,
            total_queued: 0,
            peak_queue_len: 0,
        })
    }

    /// Grant a unit right away if one is free, otherwise queue `agent`.
    pub(crate) fn request(&mut self, agent: AgentId) -> Option<Permit> {
        if self.in_use < self.capacity {
            self.in_use += 1;
            self.total_grants += 1;
            self.holders.push(agent);
            return Some(Permit { pool: self.id });
        }
        self.waiters.push_back(agent);
        self.total_queued += 1;
        self.peak_queue_len = self.peak_queue_len.max(self.waiters.len());
        None
    }

    /// Take back the unit held by `holder`. When somebody is queued the unit moves
    /// straight to the head of the queue and the new owner is returned with its
    /// permit.
    pub(crate) fn release(&mut self, holder: AgentId, permit: Permit) -> Option<(AgentId, Permit)> {
        debug_assert_eq!(permit.pool, self.id, "permit released to a foreign pool");
        debug_assert!(self.in_use > 0);

        if let Some(pos) = self.holders.iter().position(|&h| h == holder) {
            self.holders.swap_remove(pos);
        }
        self.hand_over(permit)
    }

    /// Take back every unit `agent` still holds, returning the hand-overs.
    pub(crate) fn reclaim(&mut self, agent: AgentId) -> Vec<(AgentId, Permit)> {
        let mut handed = Vec::new();
        while let Some(pos) = self.holders.iter().position(|&h| h == agent) {
            self.holders.swap_remove(pos);
            self.total_reclaimed += 1;
            if let Some(next) = self.hand_over(Permit { pool: self.id }) {
                handed.push(next);
            }
        }
        handed
    }

    fn hand_over(&mut self, permit: Permit) -> Option<(AgentId, Permit)> {
        match self.waiters.pop_front() {
            Some(next) => {
                // in_use is unchanged: the unit changes hands
                self.total_grants += 1;
                self.holders.push(next);
                Some((next, permit))
            }
            None => {
                self.in_use -= 1;
                None
            }
        }
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn available(&self) -> usize {
        self.capacity - self.in_use
    }

    pub fn queue_len(&self) -> usize {
        self.waiters.len()
    }

    /// Agents currently blocked on this pool, head first.
    pub fn waiters(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.waiters.iter().copied()
    }

    /// Agents holding a unit, one entry per unit.
    pub fn holders(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.holders.iter().copied()
    }

    /// Units taken back from agents that finished without releasing them
    pub fn total_reclaimed(&self) -> u64 {
        self.total_reclaimed
    }

    pub fn total_grants(&self) -> u64 {
        self.total_grants
    }

    pub fn total_queued(&self) -> u64 {
        self.total_queued
    }

    pub fn peak_queue_len(&self) -> usize {
        self.peak_queue_len
    }

    pub fn is_at_capacity(&self) -> bool {
        self.in_use == self.capacity
    }
}
