pub mod checkpoint;
pub mod domain;
pub mod executor;
pub mod individual;
pub mod objective;
pub mod params;
pub mod population;
pub mod problem;

pub use checkpoint::{CheckpointFormat, Checkpointer, SnapshotLabel};
pub use domain::*;
pub use executor::{Completeness, Executor, OldItem, PoolExecutor, SerialExecutor, Status};
pub use individual::{AlgorithmTraits, Command, EaTraits, Eval, GdTraits, Individual, PsoTraits};
pub use objective::Optimize;
pub use params::{
    Adaptor, BitFlipAdaptor, BoolGene, ConstrainedGene, FloatGene, GaussianAdaptor, Gene, IntGene,
    Parameter, ParameterCollection, ParameterKind, ParameterNode, ParameterSet, ParameterTree,
};
pub use population::Population;
pub use problem::{FnProblem, Problem};

pub use converge_error::{ConvergeError, ConvergeResult, ErrorCode};

pub mod prelude {
    pub use super::checkpoint::{CheckpointFormat, Checkpointer, SnapshotLabel};
    pub use super::domain::random_provider;
    pub use super::executor::{Completeness, Executor, PoolExecutor, SerialExecutor, Status};
    pub use super::individual::{AlgorithmTraits, Command, Eval, Individual};
    pub use super::objective::Optimize;
    pub use super::params::{
        Adaptor, BitFlipAdaptor, BoolGene, ConstrainedGene, FloatGene, GaussianAdaptor, Gene,
        IntGene, Parameter, ParameterCollection, ParameterSet, ParameterTree,
    };
    pub use super::population::Population;
    pub use super::problem::{FnProblem, Problem};
}
