use super::transfer;
use crate::random_provider;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Range;

/// A [Gene] is a single optimizable value. It is the most basic building
/// block of the parameter tree: every leaf ultimately stores one or more
/// genes, and every algorithm in this library reads and writes candidate
/// solutions through them.
///
/// Genes come in four kinds. The first three are plain values with an
/// initialization range; the fourth, [ConstrainedGene], keeps an
/// unconstrained *internal* value and exposes an *external* value folded
/// into `[lo, hi]` through the reflective [transfer::fold] mapping.
///
/// # Example
/// ```
/// use converge_core::params::{FloatGene, Gene};
///
/// let gene = Gene::from(FloatGene::new(0.5, -1.0..1.0));
/// assert_eq!(gene.count_of::<f64>(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Gene {
    Bool(BoolGene),
    Int(IntGene),
    Float(FloatGene),
    Constrained(ConstrainedGene),
}

impl Gene {
    /// Resample this gene uniformly from its declared init range.
    pub fn random_init(&mut self) {
        match self {
            Gene::Bool(gene) => gene.allele = random_provider::bool(0.5),
            Gene::Int(gene) => gene.allele = random_provider::range(gene.init.clone()),
            Gene::Float(gene) => gene.allele = random_provider::range(gene.init.clone()),
            Gene::Constrained(gene) => {
                gene.internal = random_provider::range(gene.lo..gene.hi);
            }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Gene::Bool(_) => "bool",
            Gene::Int(_) => "int",
            Gene::Float(_) => "float",
            Gene::Constrained(_) => "constrained float",
        }
    }

    /// Number of values of kind `T` this gene contributes to a streamlined
    /// vector (zero or one).
    pub fn count_of<T: ParameterKind>(&self) -> usize {
        T::read(self).map_or(0, |_| 1)
    }
}

impl From<BoolGene> for Gene {
    fn from(gene: BoolGene) -> Self {
        Gene::Bool(gene)
    }
}

impl From<IntGene> for Gene {
    fn from(gene: IntGene) -> Self {
        Gene::Int(gene)
    }
}

impl From<FloatGene> for Gene {
    fn from(gene: FloatGene) -> Self {
        Gene::Float(gene)
    }
}

impl From<ConstrainedGene> for Gene {
    fn from(gene: ConstrainedGene) -> Self {
        Gene::Constrained(gene)
    }
}

impl Display for Gene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gene::Bool(gene) => write!(f, "{}", gene.allele),
            Gene::Int(gene) => write!(f, "{}", gene.allele),
            Gene::Float(gene) => write!(f, "{}", gene.allele),
            Gene::Constrained(gene) => write!(f, "{}", gene.external()),
        }
    }
}

/// A boolean gene. The init range of a coin flip is the coin flip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoolGene {
    pub(crate) allele: bool,
}

impl BoolGene {
    pub fn new(allele: bool) -> Self {
        BoolGene { allele }
    }

    pub fn allele(&self) -> bool {
        self.allele
    }

    pub fn flip(&mut self) {
        self.allele = !self.allele;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntGene {
    pub(crate) allele: i32,
    pub(crate) init: Range<i32>,
}

impl IntGene {
    pub fn new(allele: i32, init: Range<i32>) -> Self {
        IntGene { allele, init }
    }

    pub fn allele(&self) -> i32 {
        self.allele
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatGene {
    pub(crate) allele: f64,
    pub(crate) init: Range<f64>,
}

impl FloatGene {
    pub fn new(allele: f64, init: Range<f64>) -> Self {
        FloatGene { allele, init }
    }

    pub fn allele(&self) -> f64 {
        self.allele
    }
}

/// A floating point gene confined to `[lo, hi]`.
///
/// Mutation operates on the unconstrained `internal` value; the boundary
/// invariant `lo <= external() <= hi` holds by construction because the
/// external value is always read through the fold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstrainedGene {
    pub(crate) internal: f64,
    pub(crate) lo: f64,
    pub(crate) hi: f64,
}

impl ConstrainedGene {
    /// Panics if `lo >= hi`. Bounds are structural, not data, so a bad pair
    /// is a programming error rather than a runtime condition.
    pub fn new(internal: f64, lo: f64, hi: f64) -> Self {
        assert!(lo < hi, "constrained gene requires lo < hi");
        ConstrainedGene { internal, lo, hi }
    }

    pub fn internal(&self) -> f64 {
        self.internal
    }

    pub fn external(&self) -> f64 {
        transfer::fold(self.internal, self.lo, self.hi)
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.lo, self.hi)
    }

    pub(crate) fn shift_internal(&mut self, delta: f64) {
        self.internal += delta;
    }
}

/// Kind-typed access to genes, used by the streamline / assign / bounds /
/// count family on the parameter tree. Implemented for the three primitive
/// allele types; a gene either matches the kind (and yields exactly one
/// value) or is skipped.
pub trait ParameterKind: Copy {
    const NAME: &'static str;

    /// The value this gene contributes to a streamlined vector of kind
    /// `Self`, or `None` when the kinds do not match.
    fn read(gene: &Gene) -> Option<Self>;

    /// Writes a streamlined value back into the gene. Returns `false` when
    /// the kinds do not match. Constrained genes store the raw value as
    /// their internal coordinate, so the stored external value is the
    /// transfer of the input.
    fn write(gene: &mut Gene, value: Self) -> bool;

    /// Lower and upper init bounds of this gene in kind `Self`.
    fn init_bounds(gene: &Gene) -> Option<(Self, Self)>;
}

impl ParameterKind for bool {
    const NAME: &'static str = "bool";

    fn read(gene: &Gene) -> Option<bool> {
        match gene {
            Gene::Bool(g) => Some(g.allele),
            _ => None,
        }
    }

    fn write(gene: &mut Gene, value: bool) -> bool {
        match gene {
            Gene::Bool(g) => {
                g.allele = value;
                true
            }
            _ => false,
        }
    }

    fn init_bounds(gene: &Gene) -> Option<(bool, bool)> {
        match gene {
            Gene::Bool(_) => Some((false, true)),
            _ => None,
        }
    }
}

impl ParameterKind for i32 {
    const NAME: &'static str = "i32";

    fn read(gene: &Gene) -> Option<i32> {
        match gene {
            Gene::Int(g) => Some(g.allele),
            _ => None,
        }
    }

    fn write(gene: &mut Gene, value: i32) -> bool {
        match gene {
            Gene::Int(g) => {
                g.allele = value;
                true
            }
            _ => false,
        }
    }

    fn init_bounds(gene: &Gene) -> Option<(i32, i32)> {
        match gene {
            Gene::Int(g) => Some((g.init.start, g.init.end)),
            _ => None,
        }
    }
}

impl ParameterKind for f64 {
    const NAME: &'static str = "f64";

    fn read(gene: &Gene) -> Option<f64> {
        match gene {
            Gene::Float(g) => Some(g.allele),
            Gene::Constrained(g) => Some(g.external()),
            _ => None,
        }
    }

    fn write(gene: &mut Gene, value: f64) -> bool {
        match gene {
            Gene::Float(g) => {
                g.allele = value;
                true
            }
            Gene::Constrained(g) => {
                g.internal = value;
                true
            }
            _ => false,
        }
    }

    fn init_bounds(gene: &Gene) -> Option<(f64, f64)> {
        match gene {
            Gene::Float(g) => Some((g.init.start, g.init.end)),
            Gene::Constrained(g) => Some((g.lo, g.hi)),
            _ => None,
        }
    }
}
