use des::dists::VariateSource;
use des::{Agent, Context, Response, SimTime, Wake};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;

use crate::CheckpointError;
use crate::config::ArrivalConfig;
use crate::context::RunContext;
use crate::entity::{Entity, entity_seed};

/// Creates entities at random intervals until the horizon (or `max_entities`)
pub struct ArrivalGenerator {
    interarrival: VariateSource,
    rng: StdRng,
    run_seed: u64,
    initial_entities: usize,
    max_entities: Option<usize>,
    created: u64,
}

impl ArrivalGenerator {
    pub fn new(config: &ArrivalConfig, run_seed: u64) -> Result<ArrivalGenerator, CheckpointError> {
        Ok(ArrivalGenerator {
            interarrival: config.interarrival.source()?,
            rng: StdRng::seed_from_u64(run_seed),
            run_seed,
            initial_entities: config.initial_entities,
            max_entities: config.max_entities,
            created: 0,
        })
    }

    fn exhausted(&self) -> bool {
        self.max_entities
            .is_some_and(|max| self.created >= max as u64)
    }

    fn create(&mut self, now: SimTime) -> Box<dyn Agent<RunContext>> {
        self.created += 1;
        let id = self.created;
        Box::new(Entity::new(id, now, entity_seed(self.run_seed, id)))
    }
}

impl Agent<RunContext> for ArrivalGenerator {
    fn act(&mut self, wake: Wake, ctx: &mut Context<'_, RunContext>) -> Response<RunContext> {
        let now = ctx.now();
        let mut batch = Vec::new();
        match wake {
            Wake::Start => {
                for _ in 0..self.initial_entities {
                    if self.exhausted() {
                        break;
                    }
                    batch.push(self.create(now));
                }
            }
            Wake::Timeout => {
                if !self.exhausted() {
                    batch.push(self.create(now));
                }
            }
            Wake::Granted(_) => unreachable!("arrival generator never acquires a pool"),
        }

        let mut response = if self.exhausted() {
            Response::finish()
        } else {
            Response::hold(self.interarrival.sample(&mut self.rng))
        };
        for entity in batch {
            response = response.spawn(entity);
        }
        response
    }
}
