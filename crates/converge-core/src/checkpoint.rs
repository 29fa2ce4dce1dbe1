use crate::population::Population;
use converge_error::{ConvergeResult, converge_err};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk encoding of a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointFormat {
    /// Human-readable, pretty-printed.
    Text,
    /// Structured single-line document.
    Structured,
    /// Compact binary.
    Binary,
}

impl Default for CheckpointFormat {
    fn default() -> Self {
        CheckpointFormat::Text
    }
}

/// The leading component of a checkpoint file name: the iteration the
/// snapshot was taken at, or `final` for the snapshot written at halt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotLabel {
    Iteration(u32),
    Final,
}

impl Display for SnapshotLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotLabel::Iteration(iteration) => write!(f, "{}", iteration),
            SnapshotLabel::Final => write!(f, "final"),
        }
    }
}

/// Writes periodic durable snapshots of a [Population] and restores them.
///
/// File names encode the snapshot label and the best fitness at save time:
/// `{iteration|final}_{best_fitness}_{base_name}`. Restore is all-or-nothing:
/// any parse failure, including a truncated file, surfaces as a checkpoint
/// error and leaves the target population untouched.
#[derive(Clone, Debug)]
pub struct Checkpointer {
    directory: PathBuf,
    base_name: String,
    format: CheckpointFormat,
}

impl Checkpointer {
    pub fn new(
        directory: impl Into<PathBuf>,
        base_name: impl Into<String>,
        format: CheckpointFormat,
    ) -> Self {
        Checkpointer {
            directory: directory.into(),
            base_name: base_name.into(),
            format,
        }
    }

    pub fn format(&self) -> CheckpointFormat {
        self.format
    }

    pub fn file_name(&self, label: SnapshotLabel, best: Option<f64>) -> String {
        match best {
            Some(best) => format!("{}_{}_{}", label, best, self.base_name),
            None => format!("{}_na_{}", label, self.base_name),
        }
    }

    /// Serializes the population to a new file in the configured directory
    /// and returns the path written.
    pub fn save(&self, population: &Population, label: SnapshotLabel) -> ConvergeResult<PathBuf> {
        fs::create_dir_all(&self.directory)?;

        let bytes = match self.format {
            CheckpointFormat::Text => serde_json::to_vec_pretty(population)
                .map_err(|e| converge_err!(Checkpoint: "serialize failed: {}", e))?,
            CheckpointFormat::Structured => serde_json::to_vec(population)
                .map_err(|e| converge_err!(Checkpoint: "serialize failed: {}", e))?,
            CheckpointFormat::Binary => bincode::serialize(population)
                .map_err(|e| converge_err!(Checkpoint: "serialize failed: {}", e))?,
        };

        let path = self
            .directory
            .join(self.file_name(label, population.best_known()));
        fs::write(&path, bytes)?;

        Ok(path)
    }

    /// Reads a complete population back from `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConvergeResult<Population> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;

        match self.format {
            CheckpointFormat::Text | CheckpointFormat::Structured => {
                serde_json::from_slice(&bytes).map_err(
                    |e| converge_err!(Checkpoint: "{} is not a valid snapshot: {}", path.display(), e),
                )
            }
            CheckpointFormat::Binary => bincode::deserialize(&bytes).map_err(
                |e| converge_err!(Checkpoint: "{} is not a valid snapshot: {}", path.display(), e),
            ),
        }
    }

    /// Loads `path` and merges it into `population`: existing slots are
    /// overwritten, missing slots are appended.
    pub fn restore_into(
        &self,
        path: impl AsRef<Path>,
        population: &mut Population,
    ) -> ConvergeResult<()> {
        let snapshot = self.load(path)?;
        population.restore_from(snapshot);
        Ok(())
    }
}
