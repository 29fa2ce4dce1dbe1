use super::adaptor::Adaptor;
use super::gene::{Gene, ParameterKind};
use converge_error::{ConvergeResult, ensure};
use serde::{Deserialize, Serialize};

/// One node of the parameter tree.
///
/// Leaves carry genes and the adaptor that perturbs them; interior nodes are
/// [ParameterSet]s whose children are stored in a fixed order so that every
/// traversal of the same tree shape visits genes in the same sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParameterNode {
    /// A single gene with its own adaptor.
    Parameter(Parameter),
    /// An ordered run of same-kind genes sharing one adaptor.
    Collection(ParameterCollection),
    /// An interior grouping node.
    Set(ParameterSet),
}

impl ParameterNode {
    fn collect<T: ParameterKind>(&self, out: &mut Vec<T>) {
        match self {
            ParameterNode::Parameter(p) => {
                if let Some(value) = T::read(&p.gene) {
                    out.push(value);
                }
            }
            ParameterNode::Collection(c) => {
                for gene in &c.genes {
                    if let Some(value) = T::read(gene) {
                        out.push(value);
                    }
                }
            }
            ParameterNode::Set(s) => {
                for child in &s.children {
                    child.collect(out);
                }
            }
        }
    }

    fn collect_bounds<T: ParameterKind>(&self, lower: &mut Vec<T>, upper: &mut Vec<T>) {
        match self {
            ParameterNode::Parameter(p) => {
                if let Some((lo, hi)) = T::init_bounds(&p.gene) {
                    lower.push(lo);
                    upper.push(hi);
                }
            }
            ParameterNode::Collection(c) => {
                for gene in &c.genes {
                    if let Some((lo, hi)) = T::init_bounds(gene) {
                        lower.push(lo);
                        upper.push(hi);
                    }
                }
            }
            ParameterNode::Set(s) => {
                for child in &s.children {
                    child.collect_bounds(lower, upper);
                }
            }
        }
    }

    fn assign<T: ParameterKind>(&mut self, values: &[T], pos: &mut usize) {
        match self {
            ParameterNode::Parameter(p) => {
                if T::read(&p.gene).is_some() {
                    T::write(&mut p.gene, values[*pos]);
                    *pos += 1;
                }
            }
            ParameterNode::Collection(c) => {
                for gene in c.genes.iter_mut() {
                    if T::read(gene).is_some() {
                        T::write(gene, values[*pos]);
                        *pos += 1;
                    }
                }
            }
            ParameterNode::Set(s) => {
                for child in s.children.iter_mut() {
                    child.assign(values, pos);
                }
            }
        }
    }

    fn count<T: ParameterKind>(&self) -> usize {
        match self {
            ParameterNode::Parameter(p) => p.gene.count_of::<T>(),
            ParameterNode::Collection(c) => c.genes.iter().map(Gene::count_of::<T>).sum(),
            ParameterNode::Set(s) => s.children.iter().map(ParameterNode::count::<T>).sum(),
        }
    }

    fn random_init(&mut self) {
        match self {
            ParameterNode::Parameter(p) => p.gene.random_init(),
            ParameterNode::Collection(c) => {
                for gene in c.genes.iter_mut() {
                    gene.random_init();
                }
            }
            ParameterNode::Set(s) => {
                for child in s.children.iter_mut() {
                    child.random_init();
                }
            }
        }
    }

    fn adapt_all(&mut self) {
        match self {
            ParameterNode::Parameter(p) => p.adaptor.adapt(&mut p.gene),
            ParameterNode::Collection(c) => c.adaptor.adapt_vector(&mut c.genes),
            ParameterNode::Set(s) => {
                for child in s.children.iter_mut() {
                    child.adapt_all();
                }
            }
        }
    }
}

impl From<Parameter> for ParameterNode {
    fn from(p: Parameter) -> Self {
        ParameterNode::Parameter(p)
    }
}

impl From<ParameterCollection> for ParameterNode {
    fn from(c: ParameterCollection) -> Self {
        ParameterNode::Collection(c)
    }
}

impl From<ParameterSet> for ParameterNode {
    fn from(s: ParameterSet) -> Self {
        ParameterNode::Set(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub(crate) gene: Gene,
    pub(crate) adaptor: Adaptor,
}

impl Parameter {
    pub fn new(gene: impl Into<Gene>, adaptor: impl Into<Adaptor>) -> Self {
        Parameter {
            gene: gene.into(),
            adaptor: adaptor.into(),
        }
    }

    pub fn gene(&self) -> &Gene {
        &self.gene
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterCollection {
    pub(crate) genes: Vec<Gene>,
    pub(crate) adaptor: Adaptor,
}

impl ParameterCollection {
    pub fn new(genes: Vec<Gene>, adaptor: impl Into<Adaptor>) -> Self {
        ParameterCollection {
            genes,
            adaptor: adaptor.into(),
        }
    }

    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    pub(crate) children: Vec<ParameterNode>,
}

impl ParameterSet {
    pub fn new(children: Vec<ParameterNode>) -> Self {
        ParameterSet { children }
    }

    pub fn push(&mut self, child: impl Into<ParameterNode>) {
        self.children.push(child.into());
    }
}

/// The typed, hierarchical container for one candidate solution's
/// parameters. Algorithms rarely walk the tree directly; they work on the
/// flattened per-kind views produced by [streamline_flat](Self::streamline_flat)
/// and write results back with [assign_flat](Self::assign_flat).
///
/// Traversal order is pre-order over the tree structure and nothing else, so
/// streamline followed by assign is a round-trip identity (modulo the
/// transfer function for constrained genes).
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterTree {
    root: ParameterSet,
}

impl ParameterTree {
    pub fn new(root: ParameterSet) -> Self {
        ParameterTree { root }
    }

    /// A flat tree of `n` unconstrained float genes sharing one adaptor,
    /// initialized to the midpoint of `init`.
    pub fn float_vector(n: usize, init: std::ops::Range<f64>, adaptor: impl Into<Adaptor>) -> Self {
        let mid = (init.start + init.end) * 0.5;
        let genes = (0..n)
            .map(|_| Gene::from(super::FloatGene::new(mid, init.clone())))
            .collect();

        ParameterTree::from(ParameterCollection::new(genes, adaptor))
    }

    /// A flat tree of `n` constrained float genes on `[lo, hi]`.
    pub fn constrained_vector(n: usize, lo: f64, hi: f64, adaptor: impl Into<Adaptor>) -> Self {
        let mid = (lo + hi) * 0.5;
        let genes = (0..n)
            .map(|_| Gene::from(super::ConstrainedGene::new(mid, lo, hi)))
            .collect();

        ParameterTree::from(ParameterCollection::new(genes, adaptor))
    }

    /// A flat tree of `n` integer genes sharing one adaptor.
    pub fn int_vector(n: usize, init: std::ops::Range<i32>, adaptor: impl Into<Adaptor>) -> Self {
        let mid = init.start + (init.end - init.start) / 2;
        let genes = (0..n)
            .map(|_| Gene::from(super::IntGene::new(mid, init.clone())))
            .collect();

        ParameterTree::from(ParameterCollection::new(genes, adaptor))
    }

    /// A flat tree of `n` boolean genes sharing one adaptor.
    pub fn bool_vector(n: usize, adaptor: impl Into<Adaptor>) -> Self {
        let genes = (0..n)
            .map(|_| Gene::from(super::BoolGene::new(false)))
            .collect();

        ParameterTree::from(ParameterCollection::new(genes, adaptor))
    }

    /// Deterministic pre-order extraction of all values of kind `T`.
    pub fn streamline_flat<T: ParameterKind>(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.count::<T>());
        for child in &self.root.children {
            child.collect(&mut out);
        }
        out
    }

    /// Parallel lower/upper init bounds for all genes of kind `T`, in
    /// streamline order.
    pub fn bounds<T: ParameterKind>(&self) -> (Vec<T>, Vec<T>) {
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        for child in &self.root.children {
            child.collect_bounds(&mut lower, &mut upper);
        }
        (lower, upper)
    }

    /// Inverse of [streamline_flat](Self::streamline_flat). The input length
    /// must equal `count::<T>()`; constrained genes store the raw value as
    /// their internal coordinate, folding it into range on read.
    pub fn assign_flat<T: ParameterKind>(&mut self, values: &[T]) -> ConvergeResult<()> {
        let expected = self.count::<T>();
        ensure!(
            values.len() == expected,
            Config: "assign_flat expected {} values of kind {}, got {}",
            expected,
            T::NAME,
            values.len()
        );

        let mut pos = 0;
        for child in self.root.children.iter_mut() {
            child.assign(values, &mut pos);
        }

        Ok(())
    }

    pub fn count<T: ParameterKind>(&self) -> usize {
        self.root.children.iter().map(ParameterNode::count::<T>).sum()
    }

    /// Resample every gene uniformly from its declared init range.
    pub fn random_init(&mut self) {
        for child in self.root.children.iter_mut() {
            child.random_init();
        }
    }

    /// Run every leaf's adaptor over its gene(s).
    pub fn adapt_all(&mut self) {
        for child in self.root.children.iter_mut() {
            child.adapt_all();
        }
    }
}

impl From<ParameterCollection> for ParameterTree {
    fn from(collection: ParameterCollection) -> Self {
        ParameterTree {
            root: ParameterSet::new(vec![ParameterNode::Collection(collection)]),
        }
    }
}

impl From<Parameter> for ParameterTree {
    fn from(parameter: Parameter) -> Self {
        ParameterTree {
            root: ParameterSet::new(vec![ParameterNode::Parameter(parameter)]),
        }
    }
}

impl From<Vec<ParameterNode>> for ParameterTree {
    fn from(children: Vec<ParameterNode>) -> Self {
        ParameterTree {
            root: ParameterSet::new(children),
        }
    }
}
