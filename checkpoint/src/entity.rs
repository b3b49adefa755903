use des::{Agent, Context, Permit, Response, SimTime, Wake};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;

use crate::context::RunContext;

/// Seed of entity `id`'s private random stream within a run seeded `run_seed`.
///
/// Service times depend only on this stream, so the same entity draws the same
/// durations whatever the stage capacities are.
pub fn entity_seed(run_seed: u64, id: u64) -> u64 {
    run_seed.wrapping_mul(1_000_003).wrapping_add(id)
}

#[derive(Debug)]
pub enum EntityState {
    Arrived,
    Waiting { stage: usize, since: SimTime },
    InService { stage: usize, permit: Permit, service: f64 },
    Departed,
}

/// One passenger (or car) travelling through every stage in order
pub struct Entity {
    id: u64,
    arrival_time: SimTime,
    state: EntityState,
    stage_waits: Vec<f64>,
    rng: StdRng,
}

impl Entity {
    pub fn new(id: u64, arrival_time: SimTime, seed: u64) -> Entity {
        Entity {
            id,
            arrival_time,
            state: EntityState::Arrived,
            stage_waits: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn arrival_time(&self) -> SimTime {
        self.arrival_time
    }

    pub fn state(&self) -> &EntityState {
        &self.state
    }

    /// Wait at each stage granted so far
    pub fn stage_waits(&self) -> &[f64] {
        &self.stage_waits
    }

    pub fn accumulated_wait(&self) -> f64 {
        self.stage_waits.iter().sum()
    }

    fn request(&mut self, stage: usize, ctx: &mut Context<'_, RunContext>) -> Response<RunContext> {
        let now = ctx.now();
        let pool = ctx.state().stage(stage).pool;
        ctx.state_mut().on_request(self.id, stage, now);
        self.state = EntityState::Waiting { stage, since: now };
        Response::acquire(pool)
    }
}

impl Agent<RunContext> for Entity {
    fn act(&mut self, wake: Wake, ctx: &mut Context<'_, RunContext>) -> Response<RunContext> {
        let now = ctx.now();
        let state = std::mem::replace(&mut self.state, EntityState::Departed);

        match (state, wake) {
            (EntityState::Arrived, Wake::Start) => {
                ctx.state_mut().on_arrival(self.id, now);
                self.request(0, ctx)
            }
            (EntityState::Waiting { stage, since }, Wake::Granted(permit)) => {
                let wait = now - since;
                self.stage_waits.push(wait);
                ctx.state_mut().on_grant(self.id, stage, wait, now);
                let service = ctx.state().stage(stage).service.sample(&mut self.rng);
                self.state = EntityState::InService {
                    stage,
                    permit,
                    service,
                };
                Response::hold(service)
            }
            (
                EntityState::InService {
                    stage,
                    permit,
                    service,
                },
                Wake::Timeout,
            ) => {
                // release before asking for the next stage
                ctx.release(permit);
                ctx.state_mut()
                    .on_service_completed(self.id, stage, service, now);
                if stage + 1 < ctx.state().stage_count() {
                    self.request(stage + 1, ctx)
                } else {
                    let total_wait = self.accumulated_wait();
                    ctx.state_mut().on_departure(self.id, total_wait, now);
                    Response::finish()
                }
            }
            (state, wake) => unreachable!("entity {} woken by {:?} while {:?}", self.id, wake, state),
        }
    }
}
