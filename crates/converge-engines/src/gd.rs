use crate::driver::OptimizationAlgorithm;
use converge_core::executor::{Executor, Status};
use converge_core::params::ParameterTree;
use converge_core::{AlgorithmTraits, GdTraits, Individual, Optimize, Population};
use converge_error::{ConvergeResult, converge_err, ensure};

/// Finite-difference gradient descent from `k` starting points.
///
/// The population holds the `k` parents first, then `k * d` children, one
/// per parent and float dimension. Each cycle rebuilds child `i,j` as parent
/// `i` shifted by `+finite_step` along dimension `j`, evaluates the batch,
/// estimates the forward-difference gradient and steps every parent against
/// it (or along it when maximizing).
pub struct GradientDescent {
    template: ParameterTree,
    population: Population,
    executor: Box<dyn Executor>,
    n_starting_points: usize,
    finite_step: f64,
    step_size: f64,
    dim: usize,
}

impl GradientDescent {
    pub fn new(
        template: ParameterTree,
        optimize: Optimize,
        executor: Box<dyn Executor>,
        n_starting_points: usize,
        finite_step: f64,
        step_size: f64,
    ) -> ConvergeResult<Self> {
        ensure!(n_starting_points >= 1, Config: "n_starting_points must be at least 1");
        ensure!(
            finite_step > 0.0 && finite_step.is_finite(),
            Config: "finite_step must be positive, got {}",
            finite_step
        );
        ensure!(
            step_size > 0.0 && step_size.is_finite(),
            Config: "step_size must be positive, got {}",
            step_size
        );

        let dim = template.count::<f64>();
        ensure!(dim > 0, Config: "gradient descent requires at least one float parameter");

        Ok(GradientDescent {
            template,
            population: Population::new(optimize),
            executor,
            n_starting_points,
            finite_step,
            step_size,
            dim,
        })
    }

    fn child_index(&self, parent: usize, dimension: usize) -> usize {
        self.n_starting_points + parent * self.dim + dimension
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
        let _ = self.executor.drain_old();

        Ok(())
    }

    /// Rebuilds every child as its parent displaced along one dimension.
    fn perturb(&mut self) {
        let iteration = self.population.iteration();

        for parent in 0..self.n_starting_points {
            let base = self.population[parent].tree().streamline_flat::<f64>();
            let parent_tree = self.population[parent].tree().clone();

            for dimension in 0..self.dim {
                let mut shifted = base.clone();
                shifted[dimension] += self.finite_step;

                let idx = self.child_index(parent, dimension);
                let child = &mut self.population[idx];
                *child.tree_mut() = parent_tree.clone();
                let _ = child.tree_mut().assign_flat(&shifted);
                child.invalidate(iteration);
            }
        }
    }

    /// Takes one gradient step per parent. A parent whose own evaluation or
    /// any of whose children went missing this iteration keeps its position
    /// and tries again next cycle.
    fn step(&mut self) -> Option<f64> {
        let iteration = self.population.iteration();
        let sign = self.population.optimize().gradient_sign();
        let mut best: Option<f64> = None;
        let optimize = self.population.optimize();

        for parent in 0..self.n_starting_points {
            let Some(parent_score) = self.population[parent].score() else {
                continue;
            };

            match best {
                Some(known) if !optimize.is_better(parent_score, known) => {}
                _ => best = Some(parent_score),
            }

            let mut gradient = Vec::with_capacity(self.dim);
            for dimension in 0..self.dim {
                let idx = self.child_index(parent, dimension);
                match self.population[idx].score() {
                    Some(child_score) => {
                        gradient.push((child_score - parent_score) / self.finite_step)
                    }
                    None => break,
                }
            }
            if gradient.len() < self.dim {
                continue;
            }

            let position = self.population[parent].tree().streamline_flat::<f64>();
            let stepped: Vec<f64> = position
                .iter()
                .zip(&gradient)
                .map(|(x, g)| x + sign * self.step_size * g)
                .collect();

            let individual = &mut self.population[parent];
            let _ = individual.tree_mut().assign_flat(&stepped);
            individual.invalidate(iteration);
        }

        best
    }
}

impl OptimizationAlgorithm for GradientDescent {
    fn name(&self) -> &'static str {
        "gd"
    }

    fn init(&mut self) -> ConvergeResult<()> {
        if !self.population.is_empty() {
            return Ok(());
        }

        let optimize = self.population.optimize();
        self.population = Population::new(optimize);

        let size = self.n_starting_points * (self.dim + 1);
        for idx in 0..size {
            let mut individual = Individual::new(self.template.clone());
            // the first starting point is the user's template; the other
            // descents start from random positions
            if idx > 0 && idx < self.n_starting_points {
                individual.tree_mut().random_init();
            }
            individual.set_traits(AlgorithmTraits::Gd(GdTraits {
                position_in_descent: idx,
            }));
            self.population.push(individual);
        }

        Ok(())
    }

    fn cycle(&mut self) -> ConvergeResult<f64> {
        self.perturb();
        self.evaluate_dirty()?;

        self.step()
            .ok_or_else(|| converge_err!(Evaluation: "no starting point carries a fitness value"))
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
    use converge_core::SerialExecutor;
    use converge_core::params::GaussianAdaptor;
    use converge_core::problem::{FnProblem, Problem};
    use converge_core::random_provider;
    use std::sync::Arc;

    fn linear_problem(slope: f64) -> Arc<dyn Problem> {
        let adaptor = GaussianAdaptor::with_sigma(0.5).unwrap();
        let mut template = ParameterTree::float_vector(1, -10.0..10.0, adaptor);
        template.assign_flat(&[1.0]).unwrap();

        FnProblem::shared(template, move |x| slope * x[0])
    }

    fn descent(problem: &Arc<dyn Problem>, k: usize, eps: f64, alpha: f64) -> GradientDescent {
        GradientDescent::new(
            problem.template(),
            Optimize::Minimize,
            Box::new(SerialExecutor::new(Arc::clone(problem))),
            k,
            eps,
            alpha,
        )
        .unwrap()
    }

    #[test]
    fn test_gradient_step_on_linear_slope() {
        random_provider::set_seed(81);

        // f(x) = 3x has an exact forward difference of 3 everywhere, so one
        // step from x = 1 lands at 1 - 0.1 * 3
        let problem = linear_problem(3.0);
        let mut algorithm = descent(&problem, 1, 0.01, 0.1);

        algorithm.init().unwrap();
        algorithm.population_mut().advance_iteration();
        let best = algorithm.cycle().unwrap();

        assert_eq!(best, 3.0);

        let position = algorithm.population()[0].tree().streamline_flat::<f64>();
        assert!((position[0] - 0.7).abs() < 1e-9, "stepped to {}", position[0]);
    }

    #[test]
    fn test_population_layout() {
        random_provider::set_seed(82);

        let adaptor = GaussianAdaptor::with_sigma(0.5).unwrap();
        let template = ParameterTree::float_vector(3, -1.0..1.0, adaptor);
        let problem: Arc<dyn Problem> =
            FnProblem::shared(template, |x| x.iter().map(|v| v * v).sum());

        let mut algorithm = descent(&problem, 2, 1e-3, 0.1);
        algorithm.init().unwrap();

        // 2 parents, then 2 * 3 children in parent-major order
        assert_eq!(algorithm.population().len(), 2 * (3 + 1));
        for (idx, individual) in algorithm.population().individuals().iter().enumerate() {
            assert_eq!(individual.gd_traits().unwrap().position_in_descent, idx);
        }
    }

    #[test]
    fn test_children_probe_one_dimension_each() {
        random_provider::set_seed(83);

        let adaptor = GaussianAdaptor::with_sigma(0.5).unwrap();
        let mut template = ParameterTree::float_vector(2, -1.0..1.0, adaptor);
        template.assign_flat(&[0.25, -0.5]).unwrap();
        let problem: Arc<dyn Problem> =
            FnProblem::shared(template, |x| x.iter().map(|v| v * v).sum());

        let mut algorithm = descent(&problem, 1, 1e-3, 0.1);
        algorithm.init().unwrap();
        algorithm.population_mut().advance_iteration();
        algorithm.cycle().unwrap();

        // children still hold the probed positions from this cycle
        let child_x = algorithm.population()[1].tree().streamline_flat::<f64>();
        let child_y = algorithm.population()[2].tree().streamline_flat::<f64>();

        assert!((child_x[0] - 0.251).abs() < 1e-12);
        assert_eq!(child_x[1], -0.5);
        assert_eq!(child_y[0], 0.25);
        assert!((child_y[1] - -0.499).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_steps() {
        let problem = linear_problem(1.0);

        assert!(
            GradientDescent::new(
                problem.template(),
                Optimize::Minimize,
                Box::new(SerialExecutor::new(Arc::clone(&problem))),
                1,
                0.0,
                0.1,
            )
            .is_err()
        );
        assert!(
            GradientDescent::new(
                problem.template(),
                Optimize::Minimize,
                Box::new(SerialExecutor::new(Arc::clone(&problem))),
                0,
                1e-3,
                0.1,
            )
            .is_err()
        );
    }
}
