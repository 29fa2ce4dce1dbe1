use crate::driver::OptimizationAlgorithm;
use converge_core::executor::{Executor, Status};
use converge_core::params::ParameterTree;
use converge_core::{AlgorithmTraits, EaTraits, Individual, Optimize, Population, random_provider};
use converge_error::{ConvergeResult, converge_err, ensure};
use serde::{Deserialize, Serialize};

/// How children inherit parameters from the parent generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recombination {
    /// Copy one parent chosen uniformly at random.
    Default,
    /// Pick every gene independently from a random parent.
    Random,
    /// Copy one parent chosen with probability proportional to fitness rank.
    Value,
}

/// How the next parent generation is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sorting {
    /// Best of parents and children together.
    #[serde(rename = "plus")]
    MuPlusNu,
    /// Best of the children only; requires at least as many children as
    /// parents.
    #[serde(rename = "comma")]
    MuCommaNu,
    /// Comma selection, but the best current parent always survives.
    #[serde(rename = "nu_pretain")]
    MuNuPretain,
}

/// A (μ, λ) / (μ + λ) evolutionary algorithm: `mu` parents at the front of
/// the population, `nu` children behind them. Each cycle recombines children
/// from parents, self-adapts them, evaluates the dirty batch through the
/// executor and selects the next parent generation.
///
/// Partial evaluation returns are tolerated: a child that did not come back
/// stays dirty and is simply invisible to selection this iteration.
pub struct EvolutionaryAlgorithm {
    template: ParameterTree,
    population: Population,
    executor: Box<dyn Executor>,
    mu: usize,
    nu: usize,
    recombination: Recombination,
    sorting: Sorting,
}

impl EvolutionaryAlgorithm {
    pub fn new(
        template: ParameterTree,
        optimize: Optimize,
        executor: Box<dyn Executor>,
        pop_size: usize,
        n_parents: usize,
        recombination: Recombination,
        sorting: Sorting,
    ) -> ConvergeResult<Self> {
        ensure!(n_parents >= 1, Config: "n_parents must be at least 1");
        ensure!(
            pop_size > n_parents,
            Config: "pop_size {} leaves no room for children of {} parents",
            pop_size,
            n_parents
        );

        let nu = pop_size - n_parents;
        if matches!(sorting, Sorting::MuCommaNu | Sorting::MuNuPretain) {
            ensure!(
                nu >= n_parents,
                Config: "comma selection needs at least {} children, got {}",
                n_parents,
                nu
            );
        }

        Ok(EvolutionaryAlgorithm {
            template,
            population: Population::new(optimize),
            executor,
            mu: n_parents,
            nu,
            recombination,
            sorting,
        })
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
        // stale returns have no slot to go back to in a generational scheme
        let _ = self.executor.drain_old();

        Ok(())
    }

    fn recombine(&mut self) {
        let iteration = self.population.iteration();

        let parent_trees: Vec<ParameterTree> = self.population.individuals()[..self.mu]
            .iter()
            .map(|parent| parent.tree().clone())
            .collect();
        let parent_weights: Vec<f64> = self.population.individuals()[..self.mu]
            .iter()
            .map(|parent| parent.score())
            .map(|score| score.unwrap_or(0.0))
            .collect();
        let optimize = self.population.optimize();

        for child_idx in self.mu..self.mu + self.nu {
            let tree = match self.recombination {
                Recombination::Default => {
                    parent_trees[random_provider::range(0..parent_trees.len())].clone()
                }
                Recombination::Value => parent_trees[Self::value_pick(&parent_weights, optimize)].clone(),
                Recombination::Random => Self::gene_mix(&parent_trees),
            };

            let child = &mut self.population[child_idx];
            *child.tree_mut() = tree;
            child.invalidate(iteration);
            child.adapt();
        }
    }

    /// Fitness-weighted whole-parent pick. Scores are shifted into a
    /// positive range and inverted when minimizing, so the best parent gets
    /// the largest weight in either direction.
    fn value_pick(scores: &[f64], optimize: Optimize) -> usize {
        let (min, max) = scores.iter().fold((f64::MAX, f64::MIN), |(lo, hi), s| {
            (lo.min(*s), hi.max(*s))
        });
        let span = max - min;
        if span <= 0.0 {
            return random_provider::range(0..scores.len());
        }

        let weights: Vec<f64> = scores
            .iter()
            .map(|score| match optimize {
                Optimize::Minimize => (max - score) / span,
                Optimize::Maximize => (score - min) / span,
            })
            .collect();

        random_provider::weighted_index(&weights)
    }

    /// Per-gene parent pick over the flat per-kind views.
    fn gene_mix(parents: &[ParameterTree]) -> ParameterTree {
        let mut tree = parents[random_provider::range(0..parents.len())].clone();

        let float_views: Vec<Vec<f64>> =
            parents.iter().map(|p| p.streamline_flat::<f64>()).collect();
        let int_views: Vec<Vec<i32>> =
            parents.iter().map(|p| p.streamline_flat::<i32>()).collect();
        let bool_views: Vec<Vec<bool>> =
            parents.iter().map(|p| p.streamline_flat::<bool>()).collect();

        let floats: Vec<f64> = (0..tree.count::<f64>())
            .map(|i| float_views[random_provider::range(0..parents.len())][i])
            .collect();
        let ints: Vec<i32> = (0..tree.count::<i32>())
            .map(|i| int_views[random_provider::range(0..parents.len())][i])
            .collect();
        let bools: Vec<bool> = (0..tree.count::<bool>())
            .map(|i| bool_views[random_provider::range(0..parents.len())][i])
            .collect();

        // same-shape trees: these cannot fail
        let _ = tree.assign_flat(&floats);
        let _ = tree.assign_flat(&ints);
        let _ = tree.assign_flat(&bools);

        tree
    }

    fn rank(&self, indices: &mut Vec<usize>) {
        let optimize = self.population.optimize();
        let individuals = self.population.individuals();

        indices.sort_by(|&a, &b| {
            let (ia, ib) = (&individuals[a], &individuals[b]);
            match (ia.score(), ib.score()) {
                (Some(sa), Some(sb)) => {
                    if optimize.is_better(sa, sb) {
                        std::cmp::Ordering::Less
                    } else if optimize.is_better(sb, sa) {
                        std::cmp::Ordering::Greater
                    } else {
                        ia.generation()
                            .cmp(&ib.generation())
                            .then(a.cmp(&b))
                    }
                }
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.cmp(&b),
            }
        });
    }
}

impl OptimizationAlgorithm for EvolutionaryAlgorithm {
    fn name(&self) -> &'static str {
        "ea"
    }

    fn init(&mut self) -> ConvergeResult<()> {
        if !self.population.is_empty() {
            // restored from a checkpoint: slots and traits are already set
            return Ok(());
        }

        let optimize = self.population.optimize();
        self.population = Population::new(optimize);

        for idx in 0..self.mu + self.nu {
            let mut individual = Individual::new(self.template.clone());
            if idx >= self.mu {
                individual.tree_mut().random_init();
            }
            individual.set_traits(AlgorithmTraits::Ea(EaTraits {
                is_parent: idx < self.mu,
                n_parents: self.mu,
            }));
            self.population.push(individual);
        }

        Ok(())
    }

    fn cycle(&mut self) -> ConvergeResult<f64> {
        self.recombine();
        self.evaluate_dirty()?;

        // rank all slots, then pick parents per the configured scheme
        let mut all: Vec<usize> = (0..self.population.len()).collect();
        self.rank(&mut all);

        // children that did not return from evaluation stay dirty and are
        // skipped; a shortfall is filled from the old (evaluated) parents
        let comma_pick = |all: &[usize], population: &Population, mu: usize| -> Vec<usize> {
            let mut chosen: Vec<usize> = all
                .iter()
                .copied()
                .filter(|&idx| idx >= mu && population[idx].score().is_some())
                .take(mu)
                .collect();

            if chosen.len() < mu {
                for &idx in all.iter().filter(|&&idx| idx < mu) {
                    if chosen.len() == mu {
                        break;
                    }
                    chosen.push(idx);
                }
            }

            chosen
        };

        let chosen: Vec<usize> = match self.sorting {
            Sorting::MuPlusNu => all.iter().copied().take(self.mu).collect(),
            Sorting::MuCommaNu => comma_pick(&all, &self.population, self.mu),
            Sorting::MuNuPretain => {
                let mut chosen = comma_pick(&all, &self.population, self.mu);

                // the best current parent survives unconditionally
                if let Some(&best_parent) = all.iter().find(|&&idx| idx < self.mu) {
                    if !chosen.contains(&best_parent) {
                        chosen.pop();
                        chosen.insert(0, best_parent);
                    }
                }

                chosen
            }
        };

        let mut next: Vec<Individual> = Vec::with_capacity(self.population.len());
        for &idx in &chosen {
            let mut parent = self.population[idx].clone();
            parent.set_traits(AlgorithmTraits::Ea(EaTraits {
                is_parent: true,
                n_parents: self.mu,
            }));
            next.push(parent);
        }
        for idx in 0..self.population.len() {
            if next.len() == self.mu + self.nu {
                break;
            }
            if chosen.contains(&idx) {
                continue;
            }
            let mut child = self.population[idx].clone();
            child.set_traits(AlgorithmTraits::Ea(EaTraits {
                is_parent: false,
                n_parents: self.mu,
            }));
            next.push(child);
        }

        self.population.replace_individuals(next);

        self.population
            .individuals()
            .iter()
            .take(self.mu)
            .filter_map(Individual::score)
            .reduce(|a, b| {
                if self.population.optimize().is_better(a, b) {
                    a
                } else {
                    b
                }
            })
            .ok_or_else(|| converge_err!(Evaluation: "no parent carries a fitness value"))
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
    use converge_core::executor::Completeness;
    use converge_core::problem::{FnProblem, Problem};
    use converge_core::{Command, SerialExecutor};
    use std::sync::Arc;

    /// Evaluates in place but never returns the listed positions, the way a
    /// broker executor under timeout pressure would.
    struct SkippingExecutor {
        problem: Arc<dyn Problem>,
        skip: Vec<usize>,
    }

    impl Executor for SkippingExecutor {
        fn work_on(
            &mut self,
            _iteration: u32,
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
                if self.skip.contains(&idx) {
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
    }

    fn sphere() -> Arc<dyn Problem> {
        let adaptor =
            converge_core::params::GaussianAdaptor::new(0.5, 0.5, 1e-9..10.0, 1, 1.0).unwrap();
        FnProblem::shared(
            ParameterTree::float_vector(4, -5.0..5.0, adaptor),
            |x| x.iter().map(|v| v * v).sum(),
        )
    }

    #[test]
    fn test_gene_mix_draws_every_gene_from_a_parent() {
        random_provider::set_seed(61);

        let problem = sphere();
        let mut one = problem.template();
        let mut two = problem.template();
        one.assign_flat(&[0.0; 4]).unwrap();
        two.assign_flat(&[1.0; 4]).unwrap();

        for _ in 0..50 {
            let mixed = EvolutionaryAlgorithm::gene_mix(&[one.clone(), two.clone()]);
            for value in mixed.streamline_flat::<f64>() {
                assert!(value == 0.0 || value == 1.0);
            }
        }
    }

    #[test]
    fn test_value_pick_prefers_better_parents() {
        random_provider::set_seed(62);

        let scores = [0.0, 10.0, 10.0];
        let mut picks = [0usize; 3];
        for _ in 0..300 {
            picks[EvolutionaryAlgorithm::value_pick(&scores, Optimize::Minimize)] += 1;
        }

        // when minimizing, the lowest score must dominate the draw
        assert!(picks[0] > 250, "picks: {:?}", picks);
    }

    #[test]
    fn test_partial_return_skips_unreturned_children() {
        random_provider::set_seed(63);

        let problem = sphere();
        let skipped = 3;
        let executor = SkippingExecutor {
            problem: Arc::clone(&problem),
            skip: vec![skipped],
        };

        let mut algorithm = EvolutionaryAlgorithm::new(
            problem.template(),
            Optimize::Minimize,
            Box::new(executor),
            8,
            2,
            Recombination::Default,
            Sorting::MuCommaNu,
        )
        .unwrap();

        algorithm.init().unwrap();
        algorithm.population_mut().advance_iteration();
        algorithm.cycle().unwrap();

        // the unreturned child never made it into the parent slots
        for parent in algorithm.population().individuals().iter().take(2) {
            assert!(!parent.is_dirty());
        }
    }

    #[test]
    fn test_pretain_keeps_the_best_parent() {
        random_provider::set_seed(64);

        // the template sits exactly at the optimum, so every adapted child
        // scores strictly worse than the seed parents
        let problem = sphere();
        let mut algorithm = EvolutionaryAlgorithm::new(
            problem.template(),
            Optimize::Minimize,
            Box::new(SerialExecutor::new(Arc::clone(&problem))),
            8,
            2,
            Recombination::Default,
            Sorting::MuNuPretain,
        )
        .unwrap();

        algorithm.init().unwrap();
        algorithm
            .population_mut()
            .individuals_mut()
            .iter_mut()
            .take(2)
            .for_each(|parent| {
                let _ = parent.tree_mut().assign_flat(&[0.0; 4]);
            });

        let iteration = algorithm.population_mut().advance_iteration();
        let best = algorithm.cycle().unwrap();

        assert_eq!(best, 0.0);
        // the retained parent predates this iteration; comma alone would
        // have replaced it
        let retained = &algorithm.population()[0];
        assert!(retained.generation() < iteration);
        assert_eq!(retained.score(), Some(0.0));
    }

    #[test]
    fn test_comma_parents_are_fresh_children() {
        random_provider::set_seed(65);

        let problem = sphere();
        let mut algorithm = EvolutionaryAlgorithm::new(
            problem.template(),
            Optimize::Minimize,
            Box::new(SerialExecutor::new(Arc::clone(&problem))),
            8,
            2,
            Recombination::Random,
            Sorting::MuCommaNu,
        )
        .unwrap();

        algorithm.init().unwrap();
        for _ in 0..5 {
            let iteration = algorithm.population_mut().advance_iteration();
            algorithm.cycle().unwrap();

            for parent in algorithm.population().individuals().iter().take(2) {
                assert_eq!(parent.generation(), iteration);
            }
        }
    }
}
