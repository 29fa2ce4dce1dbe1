use crate::params::ParameterTree;
use crate::problem::Problem;
use converge_error::{ConvergeResult, ensure};
use serde::{Deserialize, Serialize};

/// Evaluation state of an individual. There is deliberately no way to hold a
/// fitness value while dirty: either the recorded score reflects the current
/// parameters (`Clean`) or there is no score at all (`Dirty`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Eval {
    Dirty,
    Clean(f64),
}

impl Eval {
    pub fn score(&self) -> Option<f64> {
        match self {
            Eval::Dirty => None,
            Eval::Clean(score) => Some(*score),
        }
    }
}

/// What a worker is asked to do with a submitted individual.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Adapt,
    Evaluate,
    AdaptAndEvaluate,
}

/// Per-algorithm state attached to an individual at setup time. The owning
/// algorithm picks the variant once and never changes it afterwards; a
/// template that has not been claimed by any algorithm carries `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AlgorithmTraits {
    None,
    Ea(EaTraits),
    Pso(PsoTraits),
    Gd(GdTraits),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EaTraits {
    pub is_parent: bool,
    pub n_parents: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PsoTraits {
    pub neighborhood: usize,
    pub personal_best: Vec<f64>,
    pub personal_best_fitness: Option<f64>,
    pub velocity: Vec<f64>,
    pub position_suppressed: bool,
    /// Swarm-level bests ride on designated members so that a population
    /// snapshot carries them: the neighborhood's local best on the
    /// neighborhood's first member, the global best on member zero. The
    /// stored copies never nest further.
    pub local_best: Option<Box<Individual>>,
    pub global_best: Option<Box<Individual>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GdTraits {
    pub position_in_descent: usize,
}

/// One candidate solution: a parameter tree, its evaluation state, the
/// iteration it was created (or last invalidated) in, and the owning
/// algorithm's traits.
///
/// The dirty flag is the at-most-one-evaluation contract: while `Dirty`,
/// re-evaluation is permitted; while `Clean`, [fitness](Self::fitness) is a
/// read and the user objective is never called.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    tree: ParameterTree,
    eval: Eval,
    generation: u32,
    traits: AlgorithmTraits,
}

impl Individual {
    pub fn new(tree: ParameterTree) -> Self {
        Individual {
            tree,
            eval: Eval::Dirty,
            generation: 0,
            traits: AlgorithmTraits::None,
        }
    }

    pub fn tree(&self) -> &ParameterTree {
        &self.tree
    }

    /// Mutable access to the parameters. Any caller touching the tree may
    /// change what the objective would return, so the recorded fitness is
    /// discarded.
    pub fn tree_mut(&mut self) -> &mut ParameterTree {
        self.eval = Eval::Dirty;
        &mut self.tree
    }

    pub fn score(&self) -> Option<f64> {
        self.eval.score()
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.eval, Eval::Dirty)
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn traits(&self) -> &AlgorithmTraits {
        &self.traits
    }

    pub fn traits_mut(&mut self) -> &mut AlgorithmTraits {
        &mut self.traits
    }

    pub fn set_traits(&mut self, traits: AlgorithmTraits) {
        self.traits = traits;
    }

    pub fn ea_traits(&self) -> Option<&EaTraits> {
        match &self.traits {
            AlgorithmTraits::Ea(t) => Some(t),
            _ => None,
        }
    }

    pub fn pso_traits(&self) -> Option<&PsoTraits> {
        match &self.traits {
            AlgorithmTraits::Pso(t) => Some(t),
            _ => None,
        }
    }

    pub fn pso_traits_mut(&mut self) -> Option<&mut PsoTraits> {
        match &mut self.traits {
            AlgorithmTraits::Pso(t) => Some(t),
            _ => None,
        }
    }

    pub fn gd_traits(&self) -> Option<&GdTraits> {
        match &self.traits {
            AlgorithmTraits::Gd(t) => Some(t),
            _ => None,
        }
    }

    /// Discards the recorded fitness and stamps the individual with the
    /// iteration it was (re)created in.
    pub fn invalidate(&mut self, generation: u32) {
        self.eval = Eval::Dirty;
        self.generation = generation;
    }

    /// Returns the fitness, evaluating the user objective only when dirty.
    /// A failing objective or a non-finite score leaves the individual
    /// dirty.
    pub fn fitness(&mut self, problem: &dyn Problem) -> ConvergeResult<f64> {
        if let Eval::Clean(score) = self.eval {
            return Ok(score);
        }

        let score = problem.eval(&self.tree)?;
        ensure!(
            score.is_finite(),
            Evaluation: "objective returned a non-finite score: {}",
            score
        );

        self.eval = Eval::Clean(score);
        Ok(score)
    }

    /// Runs every adaptor over the tree and marks the individual dirty.
    pub fn adapt(&mut self) {
        self.tree.adapt_all();
        self.eval = Eval::Dirty;
    }

    /// Remote-worker entry point. `Evaluate` on a clean individual returns
    /// immediately. If the individual is still dirty after processing, the
    /// driver must treat the work item as unprocessed.
    pub fn process(&mut self, command: Command, problem: &dyn Problem) -> ConvergeResult<()> {
        match command {
            Command::Adapt => {
                self.adapt();
                Ok(())
            }
            Command::Evaluate => {
                if self.is_dirty() {
                    self.fitness(problem).map(|_| ())
                } else {
                    Ok(())
                }
            }
            Command::AdaptAndEvaluate => {
                self.adapt();
                self.fitness(problem).map(|_| ())
            }
        }
    }
}

impl From<ParameterTree> for Individual {
    fn from(tree: ParameterTree) -> Self {
        Individual::new(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{GaussianAdaptor, ParameterTree};
    use crate::problem::FnProblem;
    use crate::random_provider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sum_problem() -> FnProblem<impl Fn(&[f64]) -> f64 + Send + Sync> {
        let adaptor = GaussianAdaptor::with_sigma(0.5).unwrap();
        FnProblem::new(ParameterTree::float_vector(3, -1.0..1.0, adaptor), |x| {
            x.iter().sum()
        })
    }

    #[test]
    fn test_fitness_clears_dirty() {
        let problem = sum_problem();
        let mut individual = Individual::new(problem.template());

        assert!(individual.is_dirty());
        let score = individual.fitness(&problem).unwrap();
        assert!(!individual.is_dirty());
        assert_eq!(individual.score(), Some(score));
    }

    #[test]
    fn test_fitness_is_idempotent_while_clean() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let adaptor = GaussianAdaptor::with_sigma(0.5).unwrap();
        let problem = FnProblem::new(ParameterTree::float_vector(2, -1.0..1.0, adaptor), |x| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            x.iter().sum()
        });

        let mut individual = Individual::new(problem.template());
        individual.fitness(&problem).unwrap();
        individual.fitness(&problem).unwrap();
        individual.fitness(&problem).unwrap();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_adapt_marks_dirty() {
        random_provider::set_seed(21);
        let problem = sum_problem();
        let mut individual = Individual::new(problem.template());

        individual.fitness(&problem).unwrap();
        individual.adapt();

        assert!(individual.is_dirty());
    }

    #[test]
    fn test_failed_evaluation_stays_dirty() {
        let adaptor = GaussianAdaptor::with_sigma(0.5).unwrap();
        let problem =
            FnProblem::new(ParameterTree::float_vector(2, -1.0..1.0, adaptor), |_| f64::NAN);

        let mut individual = Individual::new(problem.template());
        assert!(individual.fitness(&problem).is_err());
        assert!(individual.is_dirty());
    }

    #[test]
    fn test_process_evaluate_on_clean_is_noop() {
        let problem = sum_problem();
        let mut individual = Individual::new(problem.template());
        individual.fitness(&problem).unwrap();
        let before = individual.clone();

        individual.process(Command::Evaluate, &problem).unwrap();

        assert_eq!(individual, before);
    }

    #[test]
    fn test_process_adapt_and_evaluate() {
        random_provider::set_seed(22);
        let problem = sum_problem();
        let mut individual = Individual::new(problem.template());
        let before = individual.tree().clone();

        individual
            .process(Command::AdaptAndEvaluate, &problem)
            .unwrap();

        assert!(!individual.is_dirty());
        assert_ne!(individual.tree(), &before);

        individual.process(Command::Adapt, &problem).unwrap();
        assert!(individual.is_dirty());
    }

    #[test]
    fn test_tree_mut_discards_score() {
        let problem = sum_problem();
        let mut individual = Individual::new(problem.template());
        individual.fitness(&problem).unwrap();

        individual.tree_mut().assign_flat(&[1.0, 1.0, 1.0]).unwrap();

        assert!(individual.is_dirty());
    }
}
