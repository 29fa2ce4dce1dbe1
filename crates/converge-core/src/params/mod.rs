pub mod adaptor;
pub mod gene;
pub mod transfer;
pub mod tree;

pub use adaptor::{Adaptor, BitFlipAdaptor, GaussianAdaptor};
pub use gene::{BoolGene, ConstrainedGene, FloatGene, Gene, IntGene, ParameterKind};
pub use tree::{Parameter, ParameterCollection, ParameterNode, ParameterSet, ParameterTree};
