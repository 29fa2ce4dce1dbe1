use super::gene::Gene;
use crate::random_provider;
use converge_error::{ConvergeResult, ensure};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The mutation operator attached to a parameter leaf, together with its
/// self-adaptive state. Adaptors are part of the genome: they are cloned,
/// checkpointed and shipped to workers along with the genes they perturb.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Adaptor {
    BitFlip(BitFlipAdaptor),
    Gaussian(GaussianAdaptor),
}

impl Adaptor {
    /// Apply one adaption step to a single gene.
    pub fn adapt(&mut self, gene: &mut Gene) {
        match self {
            Adaptor::BitFlip(adaptor) => adaptor.adapt(gene),
            Adaptor::Gaussian(adaptor) => adaptor.adapt(gene),
        }
    }

    /// Apply one adaption step to an ordered gene collection.
    pub fn adapt_vector(&mut self, genes: &mut [Gene]) {
        match self {
            Adaptor::BitFlip(adaptor) => {
                for gene in genes.iter_mut() {
                    adaptor.adapt(gene);
                }
            }
            Adaptor::Gaussian(adaptor) => adaptor.adapt_vector(genes),
        }
    }

    pub fn adapt_prob(&self) -> f64 {
        match self {
            Adaptor::BitFlip(adaptor) => adaptor.adapt_prob,
            Adaptor::Gaussian(adaptor) => adaptor.adapt_prob,
        }
    }
}

impl From<BitFlipAdaptor> for Adaptor {
    fn from(adaptor: BitFlipAdaptor) -> Self {
        Adaptor::BitFlip(adaptor)
    }
}

impl From<GaussianAdaptor> for Adaptor {
    fn from(adaptor: GaussianAdaptor) -> Self {
        Adaptor::Gaussian(adaptor)
    }
}

/// Flips a boolean gene with probability `adapt_prob`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BitFlipAdaptor {
    adapt_prob: f64,
}

impl BitFlipAdaptor {
    pub fn new(adapt_prob: f64) -> ConvergeResult<Self> {
        ensure!(
            (0.0..=1.0).contains(&adapt_prob),
            Adaptor: "adaption probability {} outside [0, 1]",
            adapt_prob
        );

        Ok(BitFlipAdaptor { adapt_prob })
    }

    pub fn adapt(&mut self, gene: &mut Gene) {
        if random_provider::random::<f64>() >= self.adapt_prob {
            return;
        }

        if let Gene::Bool(g) = gene {
            g.flip();
        }
    }
}

/// Gaussian perturbation with a self-adaptive step size.
///
/// The step size `sigma` itself performs a multiplicative random walk: every
/// `adaption_threshold` gated calls it is scaled by `exp(N(0, sigma_sigma))`
/// and clamped back into `sigma_range`. A threshold of zero freezes `sigma`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianAdaptor {
    adapt_prob: f64,
    sigma: f64,
    sigma_sigma: f64,
    sigma_range: Range<f64>,
    adaption_threshold: u32,
    calls: u64,
}

impl GaussianAdaptor {
    pub fn new(
        sigma: f64,
        sigma_sigma: f64,
        sigma_range: Range<f64>,
        adaption_threshold: u32,
        adapt_prob: f64,
    ) -> ConvergeResult<Self> {
        ensure!(
            sigma_range.start <= sigma_range.end,
            Adaptor: "sigma bounds inverted: [{}, {}]",
            sigma_range.start,
            sigma_range.end
        );
        ensure!(
            sigma >= sigma_range.start && sigma <= sigma_range.end,
            Adaptor: "sigma {} outside [{}, {}]",
            sigma,
            sigma_range.start,
            sigma_range.end
        );
        ensure!(
            (0.0..=1.0).contains(&adapt_prob),
            Adaptor: "adaption probability {} outside [0, 1]",
            adapt_prob
        );

        Ok(GaussianAdaptor {
            adapt_prob,
            sigma,
            sigma_sigma,
            sigma_range,
            adaption_threshold,
            calls: 0,
        })
    }

    /// A reasonable general-purpose adaptor: always adapts, moderate step,
    /// slow sigma drift.
    pub fn with_sigma(sigma: f64) -> ConvergeResult<Self> {
        GaussianAdaptor::new(sigma, 0.8, (sigma * 1e-3)..(sigma * 1e3), 0, 1.0)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn adapt(&mut self, gene: &mut Gene) {
        if random_provider::random::<f64>() >= self.adapt_prob {
            return;
        }

        self.calls += 1;
        self.maybe_update_sigma();
        self.perturb(gene, self.sigma);
    }

    /// Vector form: one gated perturbation draw per gene at a working step of
    /// `sigma / sqrt(n)`, and at most one sigma meta-update for the whole
    /// collection.
    pub fn adapt_vector(&mut self, genes: &mut [Gene]) {
        if genes.is_empty() {
            return;
        }

        self.calls += 1;
        self.maybe_update_sigma();

        let sigma = self.sigma / (genes.len() as f64).sqrt();
        for gene in genes.iter_mut() {
            if random_provider::random::<f64>() < self.adapt_prob {
                self.perturb(gene, sigma);
            }
        }
    }

    fn maybe_update_sigma(&mut self) {
        if self.adaption_threshold == 0 || self.calls % self.adaption_threshold as u64 != 0 {
            return;
        }

        let factor = random_provider::gaussian(0.0, self.sigma_sigma).exp();
        self.sigma = (self.sigma * factor).clamp(self.sigma_range.start, self.sigma_range.end);
    }

    fn perturb(&self, gene: &mut Gene, sigma: f64) {
        match gene {
            Gene::Int(g) => {
                let shifted = g.allele as f64 + random_provider::gaussian(0.0, sigma);
                g.allele = shifted.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32;
            }
            Gene::Float(g) => {
                g.allele += random_provider::gaussian(0.0, sigma);
            }
            Gene::Constrained(g) => {
                g.shift_internal(random_provider::gaussian(0.0, sigma));
            }
            Gene::Bool(_) => {}
        }
    }
}
