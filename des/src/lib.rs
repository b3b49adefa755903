//! Process-oriented discrete event simulation kernel
//!
//! An [`EventLoop`] owns the simulation clock, a queue of pending wake-ups, the
//! live agents, the resource pools and a model context `C`. Agents are explicit
//! state machines: each call to [`Agent::act`] runs one step of an agent and
//! returns a [`Response`] saying how it suspends next (hold for a delay, wait for
//! a pool, or finish), plus any new agents it wants to start.
//!
//! Wake-ups are ordered by due time and then by the order they were scheduled,
//! so a run with the same seed replays exactly.

pub mod dists;
pub mod error;
pub mod parallel;
mod resource;

pub use error::SimError;
pub use resource::{Permit, PoolId, ResourcePool};

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

/// Simulated time, in whatever unit the model uses
pub type SimTime = f64;

/// Handle to an agent registered with an [`EventLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub(crate) usize);

/// Sequence number of a scheduled wake-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

/// Why an agent is being resumed
#[derive(Debug, PartialEq)]
pub enum Wake {
    /// First activation after being spawned
    Start,
    /// A hold requested with [`Response::hold`] has elapsed
    Timeout,
    /// A pool requested with [`Response::acquire`] granted a unit
    Granted(Permit),
}

struct Event {
    t: SimTime,
    seq: u64,
    agent: AgentId,
    wake: Wake,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap
        other
            .t
            .total_cmp(&self.t)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Clock plus pending wake-ups
struct Scheduler {
    now: SimTime,
    next_seq: u64,
    queue: BinaryHeap<Event>,
}

impl Scheduler {
    fn new() -> Scheduler {
        Scheduler {
            now: 0.0,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    fn schedule_after(
        &mut self,
        delay: SimTime,
        agent: AgentId,
        wake: Wake,
    ) -> Result<EventId, SimError> {
        // also rejects NaN
        if !(delay >= 0.0) {
            return Err(SimError::InvalidDelay { delay });
        }
        Ok(self.push(self.now + delay, agent, wake))
    }

    fn push(&mut self, t: SimTime, agent: AgentId, wake: Wake) -> EventId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Event {
            t,
            seq,
            agent,
            wake,
        });
        EventId(seq)
    }

    /// Pop the earliest wake-up if it is due no later than `horizon`.
    fn pop_until(&mut self, horizon: SimTime) -> Option<Event> {
        if self.queue.peek()?.t > horizon {
            return None;
        }
        let event = self.queue.pop()?;
        self.now = event.t;
        Some(event)
    }
}

enum Next {
    Hold(SimTime),
    Acquire(PoolId),
    Finish,
}

/// What an agent does after a step: how it suspends, and what it spawns
pub struct Response<C> {
    next: Next,
    agents: Vec<Box<dyn Agent<C>>>,
}

impl<C> Response<C> {
    /// Suspend for `delay` time units, then resume with [`Wake::Timeout`].
    pub fn hold(delay: SimTime) -> Response<C> {
        Response {
            next: Next::Hold(delay),
            agents: Vec::new(),
        }
    }

    /// Suspend until `pool` grants a unit, then resume with [`Wake::Granted`].
    pub fn acquire(pool: PoolId) -> Response<C> {
        Response {
            next: Next::Acquire(pool),
            agents: Vec::new(),
        }
    }

    /// The agent is done and is dropped. Units it still holds go back to their
    /// pools and on to whoever is queued.
    pub fn finish() -> Response<C> {
        Response {
            next: Next::Finish,
            agents: Vec::new(),
        }
    }

    /// Start `agent` at the current time, after this step completes.
    pub fn spawn(mut self, agent: Box<dyn Agent<C>>) -> Response<C> {
        self.agents.push(agent);
        self
    }
}

pub trait Agent<C> {
    fn act(&mut self, wake: Wake, ctx: &mut Context<'_, C>) -> Response<C>;
}

/// View of the loop handed to an agent while it runs
pub struct Context<'a, C> {
    agent: AgentId,
    scheduler: &'a mut Scheduler,
    pools: &'a mut [ResourcePool],
    state: &'a mut C,
}

impl<C> Context<'_, C> {
    pub fn now(&self) -> SimTime {
        self.scheduler.now
    }

    /// The agent currently running
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn state(&self) -> &C {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut C {
        &mut *self.state
    }

    pub fn pool(&self, id: PoolId) -> Option<&ResourcePool> {
        self.pools.get(id.0)
    }

    /// Give a unit back to its pool. If another agent is queued it is granted
    /// the unit and resumed at the current time.
    pub fn release(&mut self, permit: Permit) {
        let Some(pool) = self.pools.get_mut(permit.pool().0) else {
            return;
        };
        if let Some((next, permit)) = pool.release(self.agent, permit) {
            let now = self.scheduler.now;
            self.scheduler.push(now, next, Wake::Granted(permit));
        }
    }
}

/// Outcome of [`EventLoop::run`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub now: SimTime,
    pub events_fired: u64,
    /// Agents still suspended when the horizon was reached
    pub suspended_agents: usize,
}

pub struct EventLoop<C> {
    scheduler: Scheduler,
    agents: Vec<Option<Box<dyn Agent<C>>>>,
    /// Slots of finished agents, reused by the next registration
    free_slots: Vec<usize>,
    live_agents: usize,
    pools: Vec<ResourcePool>,
    state: C,
    events_fired: u64,
}

impl<C> EventLoop<C> {
    pub fn new(state: C) -> EventLoop<C> {
        EventLoop {
            scheduler: Scheduler::new(),
            agents: Vec::new(),
            free_slots: Vec::new(),
            live_agents: 0,
            pools: Vec::new(),
            state,
            events_fired: 0,
        }
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now
    }

    pub fn state(&self) -> &C {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut C {
        &mut self.state
    }

    pub fn into_state(self) -> C {
        self.state
    }

    pub fn add_pool(&mut self, capacity: usize) -> Result<PoolId, SimError> {
        let id = PoolId(self.pools.len());
        self.pools.push(ResourcePool::new(id, capacity)?);
        Ok(id)
    }

    pub fn pool(&self, id: PoolId) -> Option<&ResourcePool> {
        self.pools.get(id.0)
    }

    pub fn pools(&self) -> &[ResourcePool] {
        &self.pools
    }

    /// Start `agent` at the current time.
    pub fn spawn(&mut self, agent: Box<dyn Agent<C>>) -> AgentId {
        let id = self.register(agent);
        let now = self.scheduler.now;
        self.scheduler.push(now, id, Wake::Start);
        id
    }

    /// Start `agent` once `delay` time units have passed.
    pub fn spawn_after(
        &mut self,
        delay: SimTime,
        agent: Box<dyn Agent<C>>,
    ) -> Result<AgentId, SimError> {
        if !(delay >= 0.0) {
            return Err(SimError::InvalidDelay { delay });
        }
        let id = self.register(agent);
        self.scheduler.schedule_after(delay, id, Wake::Start)?;
        Ok(id)
    }

    fn register(&mut self, agent: Box<dyn Agent<C>>) -> AgentId {
        self.live_agents += 1;
        match self.free_slots.pop() {
            Some(slot) => {
                self.agents[slot] = Some(agent);
                AgentId(slot)
            }
            None => {
                self.agents.push(Some(agent));
                AgentId(self.agents.len() - 1)
            }
        }
    }

    /// Number of wake-ups not yet fired
    pub fn pending(&self) -> usize {
        self.scheduler.queue.len()
    }

    /// Fire every wake-up due at or before `until`, then move the clock to
    /// `until`. Agents still suspended afterwards are left where they are.
    pub fn run(&mut self, until: SimTime) -> Result<RunSummary, SimError> {
        let now = self.scheduler.now;
        if !(until >= now) {
            return Err(SimError::InvalidHorizon {
                horizon: until,
                now,
            });
        }
        debug!(from = now, until, agents = self.live_agents, "running");

        while let Some(event) = self.scheduler.pop_until(until) {
            self.events_fired += 1;
            self.dispatch(event.agent, event.wake)?;
        }
        self.scheduler.now = until;

        let summary = RunSummary {
            now: until,
            events_fired: self.events_fired,
            suspended_agents: self.live_agents,
        };
        debug!(
            events = summary.events_fired,
            suspended = summary.suspended_agents,
            pending = self.pending(),
            "reached horizon"
        );
        Ok(summary)
    }

    fn dispatch(&mut self, id: AgentId, wake: Wake) -> Result<(), SimError> {
        let Some(mut agent) = self.agents.get_mut(id.0).and_then(Option::take) else {
            return Ok(());
        };

        let mut wake = wake;
        loop {
            let response = {
                let mut ctx = Context {
                    agent: id,
                    scheduler: &mut self.scheduler,
                    pools: self.pools.as_mut_slice(),
                    state: &mut self.state,
                };
                agent.act(wake, &mut ctx)
            };

            for spawned in response.agents {
                self.spawn(spawned);
            }

            match response.next {
                Next::Hold(delay) => {
                    self.scheduler.schedule_after(delay, id, Wake::Timeout)?;
                    break;
                }
                Next::Acquire(pool_id) => {
                    let pool = self
                        .pools
                        .get_mut(pool_id.0)
                        .ok_or(SimError::UnknownPool(pool_id))?;
                    match pool.request(id) {
                        // granted synchronously: keep running the same agent
                        Some(permit) => wake = Wake::Granted(permit),
                        None => break,
                    }
                }
                Next::Finish => {
                    self.reclaim(id);
                    // a running agent has no pending wake-up, so the slot is free
                    self.free_slots.push(id.0);
                    self.live_agents -= 1;
                    return Ok(());
                }
            }
        }

        self.agents[id.0] = Some(agent);
        Ok(())
    }

    fn reclaim(&mut self, agent: AgentId) {
        let now = self.scheduler.now;
        for pool in &mut self.pools {
            for (next, permit) in pool.reclaim(agent) {
                debug!(pool = pool.id().0, from = agent.0, to = next.0, "reclaimed unit");
                self.scheduler.push(now, next, Wake::Granted(permit));
            }
        }
    }
}
