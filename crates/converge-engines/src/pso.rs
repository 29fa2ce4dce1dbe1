use crate::driver::OptimizationAlgorithm;
use converge_core::executor::{Executor, Status};
use converge_core::params::ParameterTree;
use converge_core::{
    AlgorithmTraits, Individual, Optimize, Population, PsoTraits, random_provider,
};
use converge_error::{ConvergeResult, converge_err, ensure};
use serde::{Deserialize, Serialize};

/// Velocity update rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateRule {
    /// Inertia-weighted rule with per-dimension random scaling.
    Default,
    /// As the default rule but without the inertia term.
    Classic,
    /// Fixed scalar blends, no random scaling.
    Linear,
}

/// Velocity coefficients. `personal`, `local` and `global` scale the pulls
/// towards the respective bests; `velocity` is the inertia weight.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwarmCoefficients {
    pub personal: f64,
    pub local: f64,
    pub global: f64,
    pub velocity: f64,
}

impl Default for SwarmCoefficients {
    fn default() -> Self {
        SwarmCoefficients {
            personal: 1.49,
            local: 1.49,
            global: 0.15,
            velocity: 0.72,
        }
    }
}

/// Particle swarm optimization over `n_neighborhoods x n_members`
/// contiguous neighborhoods.
///
/// Every member carries its velocity and personal best in its traits; each
/// neighborhood owns a local best and the swarm owns a global best, all
/// stored as owned deep copies so no worker ever aliases driver state. The
/// global best individual is retained byte for byte across iterations.
pub struct ParticleSwarm {
    template: ParameterTree,
    population: Population,
    executor: Box<dyn Executor>,
    n_neighborhoods: usize,
    n_members: usize,
    coefficients: SwarmCoefficients,
    update_rule: UpdateRule,
    local_bests: Vec<Option<Individual>>,
    global_best: Option<Individual>,
}

impl ParticleSwarm {
    pub fn new(
        template: ParameterTree,
        optimize: Optimize,
        executor: Box<dyn Executor>,
        n_neighborhoods: usize,
        n_members: usize,
        coefficients: SwarmCoefficients,
        update_rule: UpdateRule,
    ) -> ConvergeResult<Self> {
        ensure!(n_neighborhoods >= 1, Config: "n_neighborhoods must be at least 1");
        ensure!(n_members >= 1, Config: "n_members must be at least 1");
        ensure!(
            template.count::<f64>() > 0,
            Config: "particle swarm requires at least one float parameter"
        );

        Ok(ParticleSwarm {
            template,
            population: Population::new(optimize),
            executor,
            n_neighborhoods,
            n_members,
            coefficients,
            update_rule,
            local_bests: vec![None; n_neighborhoods],
            global_best: None,
        })
    }

    pub fn global_best(&self) -> Option<&Individual> {
        self.global_best.as_ref()
    }

    fn neighborhood_of(&self, member: usize) -> usize {
        member / self.n_members
    }

    /// A copy safe to hold as a best: the nested best slots are cleared so
    /// stored bests never chain into each other.
    fn detached_clone(individual: &Individual) -> Individual {
        let mut copy = individual.clone();
        if let Some(traits) = copy.pso_traits_mut() {
            traits.local_best = None;
            traits.global_best = None;
        }
        copy
    }

    /// Mirrors the working bests into their carrier members' traits so the
    /// next population snapshot round-trips them.
    fn stash_bests(&mut self) {
        for neighborhood in 0..self.n_neighborhoods {
            let anchor = neighborhood * self.n_members;
            if anchor >= self.population.len() {
                break;
            }
            let stored = self.local_bests[neighborhood].clone().map(Box::new);
            if let Some(traits) = self.population[anchor].pso_traits_mut() {
                traits.local_best = stored;
            }
        }

        let stored = self.global_best.clone().map(Box::new);
        if let Some(traits) = self.population[0].pso_traits_mut() {
            traits.global_best = stored;
        }
    }

    /// Inverse of [stash_bests](Self::stash_bests): reads the carried bests
    /// back out of a restored population.
    fn unstash_bests(&mut self) {
        self.local_bests = (0..self.n_neighborhoods)
            .map(|neighborhood| {
                let anchor = neighborhood * self.n_members;
                self.population
                    .get(anchor)
                    .and_then(Individual::pso_traits)
                    .and_then(|traits| traits.local_best.as_deref().cloned())
            })
            .collect();

        self.global_best = self
            .population
            .get(0)
            .and_then(Individual::pso_traits)
            .and_then(|traits| traits.global_best.as_deref().cloned());
    }

    fn evaluate_dirty(&mut self) -> ConvergeResult<()> {
        let iteration = self.population.iteration();
        let batch = self.population.individuals_mut();
        let mut positions: Vec<Status> = batch
            .iter()
            .map(|individual| {
                if individual.is_dirty() {
                    Status::Unprocessed
                } else {
                    Status::Processed
                }
            })
            .collect();

        self.executor.work_on(iteration, batch, &mut positions)?;
        Ok(())
    }

    /// Harvests returns from earlier iterations: a late individual replaces
    /// a member of its neighborhood that has not returned yet, as long as
    /// the neighborhood holds fewer than `n_members` returned members.
    /// Anything beyond that is discarded.
    fn accept_old_items(&mut self) {
        let old_items = self.executor.drain_old();

        for old in old_items {
            if old.position >= self.population.len() {
                continue;
            }
            let neighborhood = self.neighborhood_of(old.position);
            let members = neighborhood * self.n_members..(neighborhood + 1) * self.n_members;

            let returned = members
                .clone()
                .filter(|&idx| !self.population[idx].is_dirty())
                .count();
            if returned >= self.n_members {
                continue;
            }

            let slot = members
                .clone()
                .find(|&idx| self.population[idx].is_dirty());
            let (Some(slot), false) = (slot, old.individual.is_dirty()) else {
                continue;
            };

            let mut replacement = old.individual;
            if let Some(traits) = replacement.pso_traits_mut() {
                traits.neighborhood = neighborhood;
                // the late arrival was evaluated where it stands; let it sit
                // out the next position update
                traits.position_suppressed = true;
            }
            self.population[slot] = replacement;
        }
    }

    fn move_particles(&mut self) {
        let iteration = self.population.iteration();
        let rule = self.update_rule;
        let coeff = self.coefficients;

        let global_position = self
            .global_best
            .as_ref()
            .map(|best| best.tree().streamline_flat::<f64>());
        let local_positions: Vec<Option<Vec<f64>>> = self
            .local_bests
            .iter()
            .map(|best| best.as_ref().map(|b| b.tree().streamline_flat::<f64>()))
            .collect();

        for member in 0..self.population.len() {
            let neighborhood = self.neighborhood_of(member);

            // a member inserted from a late return sits out one update; its
            // fitness is already valid at the position it holds
            let suppressed = self.population[member]
                .pso_traits()
                .is_some_and(|t| t.position_suppressed);
            if suppressed {
                if let Some(traits) = self.population[member].pso_traits_mut() {
                    traits.position_suppressed = false;
                }
                continue;
            }

            let x = self.population[member].tree().streamline_flat::<f64>();
            let (personal, velocity) = match self.population[member].pso_traits() {
                Some(traits) => (traits.personal_best.clone(), traits.velocity.clone()),
                None => (x.clone(), vec![0.0; x.len()]),
            };
            let local = local_positions[neighborhood].as_deref().unwrap_or(&personal);
            let global = global_position.as_deref().unwrap_or(local);

            let mut new_velocity = Vec::with_capacity(x.len());
            for j in 0..x.len() {
                let v = match rule {
                    UpdateRule::Default => {
                        coeff.velocity * velocity[j]
                            + coeff.personal
                                * random_provider::random::<f64>()
                                * (personal[j] - x[j])
                            + coeff.local * random_provider::random::<f64>() * (local[j] - x[j])
                            + coeff.global * random_provider::random::<f64>() * (global[j] - x[j])
                    }
                    UpdateRule::Classic => {
                        coeff.personal * random_provider::random::<f64>() * (personal[j] - x[j])
                            + coeff.local * random_provider::random::<f64>() * (local[j] - x[j])
                            + coeff.global * random_provider::random::<f64>() * (global[j] - x[j])
                    }
                    UpdateRule::Linear => {
                        coeff.velocity * velocity[j]
                            + coeff.personal * (personal[j] - x[j])
                            + coeff.local * (local[j] - x[j])
                            + coeff.global * (global[j] - x[j])
                    }
                };
                new_velocity.push(v);
            }

            let new_position: Vec<f64> = x
                .iter()
                .zip(&new_velocity)
                .map(|(xi, vi)| xi + vi)
                .collect();

            let individual = &mut self.population[member];
            // same-shape assignment cannot fail
            let _ = individual.tree_mut().assign_flat(&new_position);
            if let Some(traits) = individual.pso_traits_mut() {
                traits.velocity = new_velocity;
            }
            individual.invalidate(iteration);
        }
    }

    /// Personal bests first, then local bests per neighborhood, then the
    /// global best.
    fn update_bests(&mut self) -> Option<f64> {
        let optimize = self.population.optimize();

        for member in 0..self.population.len() {
            let Some(score) = self.population[member].score() else {
                continue;
            };
            let position = self.population[member].tree().streamline_flat::<f64>();

            if let Some(traits) = self.population[member].pso_traits_mut() {
                let improved = match traits.personal_best_fitness {
                    Some(known) => optimize.is_better(score, known),
                    None => true,
                };
                if improved {
                    traits.personal_best = position;
                    traits.personal_best_fitness = Some(score);
                }
            }
        }

        for neighborhood in 0..self.n_neighborhoods {
            let members = neighborhood * self.n_members..(neighborhood + 1) * self.n_members;
            for member in members {
                if member >= self.population.len() {
                    break;
                }
                let Some(score) = self.population[member].score() else {
                    continue;
                };

                let improves = match &self.local_bests[neighborhood] {
                    Some(best) => best
                        .score()
                        .map(|known| optimize.is_better(score, known))
                        .unwrap_or(true),
                    None => true,
                };
                if improves {
                    self.local_bests[neighborhood] =
                        Some(Self::detached_clone(&self.population[member]));
                }
            }
        }

        for neighborhood_best in self.local_bests.iter().flatten() {
            let Some(score) = neighborhood_best.score() else {
                continue;
            };
            let improves = match &self.global_best {
                Some(best) => best
                    .score()
                    .map(|known| optimize.is_better(score, known))
                    .unwrap_or(true),
                None => true,
            };
            if improves {
                self.global_best = Some(neighborhood_best.clone());
            }
        }

        self.global_best.as_ref().and_then(Individual::score)
    }
}

impl OptimizationAlgorithm for ParticleSwarm {
    fn name(&self) -> &'static str {
        "pso"
    }

    fn init(&mut self) -> ConvergeResult<()> {
        let dim = self.template.count::<f64>();

        if !self.population.is_empty() {
            // restored from a checkpoint: the historical bests travel in
            // the carrier members' traits, not in the live positions
            self.unstash_bests();
            if self.global_best.is_none() {
                // a population that never cycled carries no stashed bests;
                // seed them from the current members
                let _ = self.update_bests();
            }
            return Ok(());
        }

        let optimize = self.population.optimize();
        let size = self.n_neighborhoods * self.n_members;
        self.population = Population::from_template(&self.template, size, optimize);

        for member in 0..size {
            let position = self.population[member].tree().streamline_flat::<f64>();
            self.population[member].set_traits(AlgorithmTraits::Pso(PsoTraits {
                neighborhood: member / self.n_members,
                personal_best: position,
                personal_best_fitness: None,
                velocity: vec![0.0; dim],
                position_suppressed: false,
                local_best: None,
                global_best: None,
            }));
        }

        // seed the bests so the first cycle has something to steer towards
        self.evaluate_dirty()?;
        let _ = self.update_bests();

        Ok(())
    }

    fn cycle(&mut self) -> ConvergeResult<f64> {
        self.move_particles();
        self.evaluate_dirty()?;
        self.accept_old_items();

        let best = self.update_bests();
        self.stash_bests();

        best.ok_or_else(|| converge_err!(Evaluation: "swarm has no evaluated member"))
    }

    fn population(&self) -> &Population {
        &self.population
    }

    fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_core::executor::{Completeness, OldItem};
    use converge_core::problem::{FnProblem, Problem};
    use converge_core::{Command, SerialExecutor};
    use std::sync::Arc;

    /// From `skip_from` on, never returns the listed positions and hands a
    /// queued late return to the first `drain_old` call.
    struct LateExecutor {
        problem: Arc<dyn Problem>,
        skip: Vec<usize>,
        skip_from: u32,
        old: Vec<OldItem>,
    }

    impl Executor for LateExecutor {
        fn work_on(
            &mut self,
            iteration: u32,
            batch: &mut [Individual],
            positions: &mut [Status],
        ) -> ConvergeResult<Completeness> {
            let mut complete = Completeness::All;
            for (idx, (individual, status)) in
                batch.iter_mut().zip(positions.iter_mut()).enumerate()
            {
                if *status == Status::Processed {
                    continue;
                }
                if iteration >= self.skip_from && self.skip.contains(&idx) {
                    complete = Completeness::Partial;
                    continue;
                }
                if individual
                    .process(Command::Evaluate, self.problem.as_ref())
                    .is_ok()
                    && !individual.is_dirty()
                {
                    *status = Status::Processed;
                }
            }

            Ok(complete)
        }

        fn drain_old(&mut self) -> Vec<OldItem> {
            std::mem::take(&mut self.old)
        }
    }

    fn sphere() -> Arc<dyn Problem> {
        let adaptor = converge_core::params::GaussianAdaptor::with_sigma(0.5).unwrap();
        FnProblem::shared(
            ParameterTree::float_vector(2, -2.0..2.0, adaptor),
            |x| x.iter().map(|v| v * v).sum(),
        )
    }

    fn swarm(problem: &Arc<dyn Problem>, executor: Box<dyn Executor>) -> ParticleSwarm {
        ParticleSwarm::new(
            problem.template(),
            Optimize::Minimize,
            executor,
            2,
            4,
            SwarmCoefficients::default(),
            UpdateRule::Default,
        )
        .unwrap()
    }

    #[test]
    fn test_init_partitions_neighborhoods() {
        random_provider::set_seed(71);

        let problem = sphere();
        let mut algorithm = swarm(
            &problem,
            Box::new(SerialExecutor::new(Arc::clone(&problem))),
        );
        algorithm.init().unwrap();

        assert_eq!(algorithm.population().len(), 8);
        for (member, individual) in algorithm.population().individuals().iter().enumerate() {
            let traits = individual.pso_traits().unwrap();
            assert_eq!(traits.neighborhood, member / 4);
            assert_eq!(traits.velocity, vec![0.0, 0.0]);
            assert!(!individual.is_dirty());
        }
    }

    #[test]
    fn test_late_return_replaces_unreturned_member() {
        random_provider::set_seed(72);

        let problem = sphere();

        // a straggler from "iteration 0", already evaluated at its position
        let mut late = Individual::new(problem.template());
        late.tree_mut().random_init();
        late.set_traits(AlgorithmTraits::Pso(PsoTraits {
            neighborhood: 9,
            personal_best: late.tree().streamline_flat::<f64>(),
            personal_best_fitness: None,
            velocity: vec![0.0, 0.0],
            position_suppressed: false,
            local_best: None,
            global_best: None,
        }));
        late.fitness(problem.as_ref()).unwrap();

        let executor = LateExecutor {
            problem: Arc::clone(&problem),
            skip: vec![3],
            skip_from: 1,
            old: vec![OldItem {
                iteration: 0,
                position: 3,
                individual: late.clone(),
            }],
        };

        let mut algorithm = swarm(&problem, Box::new(executor));
        algorithm.init().unwrap();
        algorithm.population_mut().advance_iteration();
        algorithm.cycle().unwrap();

        let replaced = &algorithm.population()[3];
        let traits = replaced.pso_traits().unwrap();

        assert!(!replaced.is_dirty());
        assert_eq!(replaced.score(), late.score());
        // rehomed into the neighborhood it landed in, sitting out the next
        // position update
        assert_eq!(traits.neighborhood, 0);
        assert!(traits.position_suppressed);
    }

    #[test]
    fn test_full_neighborhood_discards_late_return() {
        random_provider::set_seed(73);

        let problem = sphere();

        let mut late = Individual::new(problem.template());
        late.set_traits(AlgorithmTraits::Pso(PsoTraits {
            neighborhood: 0,
            personal_best: late.tree().streamline_flat::<f64>(),
            personal_best_fitness: None,
            velocity: vec![0.0, 0.0],
            position_suppressed: false,
            local_best: None,
            global_best: None,
        }));
        late.fitness(problem.as_ref()).unwrap();

        // nothing is skipped, so every neighborhood is full when the late
        // return shows up
        let executor = LateExecutor {
            problem: Arc::clone(&problem),
            skip: Vec::new(),
            skip_from: u32::MAX,
            old: vec![OldItem {
                iteration: 0,
                position: 1,
                individual: late,
            }],
        };

        let mut algorithm = swarm(&problem, Box::new(executor));
        algorithm.init().unwrap();
        algorithm.population_mut().advance_iteration();
        algorithm.cycle().unwrap();

        // the regular member kept its slot
        let kept = &algorithm.population()[1];
        assert!(!kept.pso_traits().unwrap().position_suppressed);
    }

    #[test]
    fn test_snapshot_round_trips_swarm_bests() {
        random_provider::set_seed(75);

        let problem = sphere();
        let mut algorithm = swarm(
            &problem,
            Box::new(SerialExecutor::new(Arc::clone(&problem))),
        );
        algorithm.init().unwrap();
        for _ in 0..10 {
            algorithm.population_mut().advance_iteration();
            algorithm.cycle().unwrap();
        }

        let global_before = algorithm.global_best().cloned().unwrap();
        let locals_before = algorithm.local_bests.clone();

        let bytes = serde_json::to_vec(algorithm.population()).unwrap();
        let restored: Population = serde_json::from_slice(&bytes).unwrap();

        let mut reloaded = swarm(
            &problem,
            Box::new(SerialExecutor::new(Arc::clone(&problem))),
        );
        *reloaded.population_mut() = restored;
        reloaded.init().unwrap();

        // the historical bests come back verbatim, not recomputed from
        // wherever the members currently sit
        assert_eq!(reloaded.global_best(), Some(&global_before));
        assert_eq!(reloaded.local_bests, locals_before);

        let best_current = algorithm
            .population()
            .iter()
            .filter_map(Individual::score)
            .fold(f64::INFINITY, f64::min);
        assert!(global_before.score().unwrap() <= best_current);
    }

    #[test]
    fn test_linear_rule_is_deterministic_given_state() {
        random_provider::set_seed(74);

        let problem = sphere();
        let mut algorithm = ParticleSwarm::new(
            problem.template(),
            Optimize::Minimize,
            Box::new(SerialExecutor::new(Arc::clone(&problem))),
            1,
            4,
            SwarmCoefficients::default(),
            UpdateRule::Linear,
        )
        .unwrap();

        algorithm.init().unwrap();
        let before = algorithm.population().clone();

        algorithm.population_mut().advance_iteration();
        algorithm.cycle().unwrap();

        // fixed scalar blends draw nothing; replaying the same state gives
        // the same positions no matter what the RNG did in between
        let after_first: Vec<Vec<f64>> = algorithm
            .population()
            .iter()
            .map(|m| m.tree().streamline_flat::<f64>())
            .collect();

        random_provider::set_seed(99);
        let mut replay = ParticleSwarm::new(
            problem.template(),
            Optimize::Minimize,
            Box::new(SerialExecutor::new(Arc::clone(&problem))),
            1,
            4,
            SwarmCoefficients::default(),
            UpdateRule::Linear,
        )
        .unwrap();
        *replay.population_mut() = before;
        replay.init().unwrap();
        replay.population_mut().advance_iteration();
        replay.cycle().unwrap();

        let after_replay: Vec<Vec<f64>> = replay
            .population()
            .iter()
            .map(|m| m.tree().streamline_flat::<f64>())
            .collect();

        assert_eq!(after_first, after_replay);
    }
}
