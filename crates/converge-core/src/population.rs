use crate::individual::Individual;
use crate::objective::Optimize;
use crate::params::ParameterTree;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Index, IndexMut};

/// The ordered collection of individuals an algorithm evolves, together with
/// the run-level bookkeeping: iteration counter, best fitness seen so far,
/// and the stall count feeding stop criteria.
///
/// Ownership is exclusive to the driver thread. Executors and workers only
/// ever see clones of individuals; nothing outside the driver holds a
/// reference into this collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Population {
    individuals: Vec<Individual>,
    iteration: u32,
    best_known: Option<f64>,
    n_stalls: u32,
    optimize: Optimize,
}

impl Population {
    pub fn new(optimize: Optimize) -> Self {
        Population {
            individuals: Vec::new(),
            iteration: 0,
            best_known: None,
            n_stalls: 0,
            optimize,
        }
    }

    /// Fills a population with `size` clones of the template tree. The first
    /// clone keeps the template's values; the rest are randomly initialized
    /// from their declared init ranges.
    pub fn from_template(template: &ParameterTree, size: usize, optimize: Optimize) -> Self {
        let mut individuals = Vec::with_capacity(size);
        for i in 0..size {
            let mut individual = Individual::new(template.clone());
            if i > 0 {
                individual.tree_mut().random_init();
            }
            individuals.push(individual);
        }

        Population {
            individuals,
            iteration: 0,
            best_known: None,
            n_stalls: 0,
            optimize,
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Individual> {
        self.individuals.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Individual> {
        self.individuals.get_mut(index)
    }

    pub fn push(&mut self, individual: Individual) {
        self.individuals.push(individual);
    }

    pub fn truncate(&mut self, len: usize) {
        self.individuals.truncate(len);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Individual> {
        self.individuals.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Individual> {
        self.individuals.iter_mut()
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn individuals_mut(&mut self) -> &mut [Individual] {
        &mut self.individuals
    }

    pub fn replace_individuals(&mut self, individuals: Vec<Individual>) {
        self.individuals = individuals;
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn set_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    pub fn advance_iteration(&mut self) -> u32 {
        self.iteration += 1;
        self.iteration
    }

    pub fn optimize(&self) -> Optimize {
        self.optimize
    }

    pub fn best_known(&self) -> Option<f64> {
        self.best_known
    }

    pub fn n_stalls(&self) -> u32 {
        self.n_stalls
    }

    /// Sorts best-first under the population's optimize direction. Dirty
    /// individuals sort after all clean ones; ties between clean individuals
    /// are broken by age (older generation first) and, the sort being
    /// stable, by position.
    pub fn sort(&mut self) {
        let optimize = self.optimize;
        self.individuals.sort_by(|a, b| {
            match (a.score(), b.score()) {
                (Some(sa), Some(sb)) => {
                    if optimize.is_better(sa, sb) {
                        Ordering::Less
                    } else if optimize.is_better(sb, sa) {
                        Ordering::Greater
                    } else {
                        a.generation().cmp(&b.generation())
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
    }

    /// Index of the best clean individual, if any.
    pub fn best_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, individual) in self.individuals.iter().enumerate() {
            if let Some(score) = individual.score() {
                match best {
                    Some((_, known)) if !self.optimize.is_better(score, known) => {}
                    _ => best = Some((idx, score)),
                }
            }
        }
        best.map(|(idx, _)| idx)
    }

    pub fn best(&self) -> Option<&Individual> {
        self.best_index().map(|idx| &self.individuals[idx])
    }

    /// Folds the iteration's best score into the stall accounting. Returns
    /// true when the score improved on `best_known`.
    pub fn update_stalls(&mut self, best: f64) -> bool {
        match self.best_known {
            Some(known) if !self.optimize.is_better(best, known) => {
                self.n_stalls += 1;
                false
            }
            _ => {
                self.best_known = Some(best);
                self.n_stalls = 0;
                true
            }
        }
    }

    /// Restore semantics for checkpoints: existing slots are overwritten by
    /// the incoming individuals, missing slots are appended.
    pub fn restore_from(&mut self, snapshot: Population) {
        let Population {
            individuals,
            iteration,
            best_known,
            n_stalls,
            optimize,
        } = snapshot;

        self.iteration = iteration;
        self.best_known = best_known;
        self.n_stalls = n_stalls;
        self.optimize = optimize;

        for (slot, incoming) in self.individuals.iter_mut().zip(individuals.iter()) {
            *slot = incoming.clone();
        }
        if individuals.len() > self.individuals.len() {
            self.individuals
                .extend(individuals.into_iter().skip(self.individuals.len()));
        }
    }
}

impl Index<usize> for Population {
    type Output = Individual;

    fn index(&self, index: usize) -> &Self::Output {
        &self.individuals[index]
    }
}

impl IndexMut<usize> for Population {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.individuals[index]
    }
}

impl FromIterator<Individual> for Population {
    fn from_iter<I: IntoIterator<Item = Individual>>(iter: I) -> Self {
        Population {
            individuals: iter.into_iter().collect(),
            iteration: 0,
            best_known: None,
            n_stalls: 0,
            optimize: Optimize::default(),
        }
    }
}
