use crate::params::ParameterTree;
use converge_error::{ConvergeResult, ensure};
use std::sync::Arc;

/// The user objective. Implementations must be cheap to share across worker
/// threads; all candidate state travels in the [ParameterTree] argument, so
/// an objective normally borrows nothing mutable.
///
/// `template` supplies the parameter shape a fresh population is cloned
/// from; `eval` scores one candidate. Non-finite scores are rejected by the
/// caller ([Individual::fitness](crate::Individual::fitness)), so objectives
/// may simply return whatever their math produces.
pub trait Problem: Send + Sync {
    fn template(&self) -> ParameterTree;

    fn eval(&self, tree: &ParameterTree) -> ConvergeResult<f64>;
}

/// Wraps a closure over the streamlined float view of the tree. Most test
/// functions and many real objectives only care about the float parameters,
/// which makes this the shortest way to state a problem:
///
/// ```
/// use converge_core::params::{GaussianAdaptor, ParameterTree};
/// use converge_core::problem::FnProblem;
///
/// let adaptor = GaussianAdaptor::with_sigma(0.5).unwrap();
/// let sphere = FnProblem::new(
///     ParameterTree::float_vector(10, -5.0..5.0, adaptor),
///     |x| x.iter().map(|v| v * v).sum(),
/// );
/// ```
pub struct FnProblem<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    template: ParameterTree,
    f: F,
}

impl<F> FnProblem<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    pub fn new(template: ParameterTree, f: F) -> Self {
        FnProblem { template, f }
    }

    pub fn shared(template: ParameterTree, f: F) -> Arc<Self>
    where
        F: 'static,
    {
        Arc::new(FnProblem::new(template, f))
    }
}

impl<F> Problem for FnProblem<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn template(&self) -> ParameterTree {
        self.template.clone()
    }

    fn eval(&self, tree: &ParameterTree) -> ConvergeResult<f64> {
        let values = tree.streamline_flat::<f64>();
        ensure!(
            values.len() == self.template.count::<f64>(),
            Evaluation: "candidate has {} float parameters, template has {}",
            values.len(),
            self.template.count::<f64>()
        );

        Ok((self.f)(&values))
    }
}
