// crates/gadget-topology/src/mixing.rs
//
// Mixing-matrix oracles.
//
// Each oracle maps a 0/1 adjacency matrix to pairwise averaging weights B[i][j]
// that respect the topology (B[i][j] = 0 unless j neighbors i, or i == j).
// The engine asks for the matrix at most once per run and caches the result.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use gadget_core::{Adjacency, GadgetError, MixingMatrix, MixingOracle};

/// Which oracle a run uses.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "oracle", rename_all = "kebab-case")]
pub enum OracleKind {
    /// Metropolis-Hastings weights.
    #[default]
    MetropolisHastings,
    /// Uniform weights derived from the maximum degree.
    MaxDegree,
    /// Sinkhorn-Knopp balancing of adjacency plus self-loops.
    Sinkhorn {
        /// Stop when every row and column sum is within this of 1.0.
        #[serde(default = "default_sinkhorn_tolerance")]
        tolerance: f64,
        /// Upper bound on row+column normalisation sweeps.
        #[serde(default = "default_sinkhorn_iterations")]
        max_iterations: u32,
    },
    /// Precomputed matrix read from a JSON file.
    File {
        /// Path to a JSON file holding nested rows or a flat row-major array.
        path: PathBuf,
    },
}

fn default_sinkhorn_tolerance() -> f64 {
    1e-9
}

fn default_sinkhorn_iterations() -> u32 {
    1000
}

impl OracleKind {
    /// Instantiate the configured oracle.
    pub fn into_oracle(self) -> Box<dyn MixingOracle> {
        match self {
            OracleKind::MetropolisHastings => Box::new(MetropolisHastings),
            OracleKind::MaxDegree => Box::new(MaxDegree),
            OracleKind::Sinkhorn {
                tolerance,
                max_iterations,
            } => Box::new(Sinkhorn {
                tolerance,
                max_iterations,
            }),
            OracleKind::File { path } => Box::new(FileOracle::new(path)),
        }
    }
}

/// Put `1 - sum(off-diagonal)` on the diagonal of every row.
fn fill_diagonal(m: &mut MixingMatrix) {
    for i in 0..m.size() {
        let off: f64 = (0..m.size()).filter(|&j| j != i).map(|j| m.get(i, j)).sum();
        m.set(i, i, 1.0 - off);
    }
}

/// Metropolis-Hastings weights: `B_ij = 1 / (1 + max(d_i, d_j))` on each link.
///
/// Doubly stochastic whenever the adjacency is symmetric.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetropolisHastings;

impl MixingOracle for MetropolisHastings {
    fn name(&self) -> &str {
        "metropolis-hastings"
    }

    fn compute(&self, adjacency: &Adjacency) -> Result<MixingMatrix, GadgetError> {
        let n = adjacency.size();
        let degrees: Vec<usize> = (0..n).map(|i| adjacency.degree(i)).collect();
        let mut m = MixingMatrix::zeros(n);
        for i in 0..n {
            for j in 0..n {
                if i != j && adjacency.is_linked(i, j) {
                    m.set(i, j, 1.0 / (1.0 + degrees[i].max(degrees[j]) as f64));
                }
            }
        }
        fill_diagonal(&mut m);
        Ok(m)
    }
}

/// Max-degree weights: `B_ij = 1 / (1 + d_max)` on each link.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxDegree;

impl MixingOracle for MaxDegree {
    fn name(&self) -> &str {
        "max-degree"
    }

    fn compute(&self, adjacency: &Adjacency) -> Result<MixingMatrix, GadgetError> {
        let n = adjacency.size();
        let w = 1.0 / (1.0 + adjacency.max_degree() as f64);
        let mut m = MixingMatrix::zeros(n);
        for i in 0..n {
            for j in 0..n {
                if i != j && adjacency.is_linked(i, j) {
                    m.set(i, j, w);
                }
            }
        }
        fill_diagonal(&mut m);
        Ok(m)
    }
}

/// Sinkhorn-Knopp balancing of `A + I` into a doubly-stochastic matrix.
#[derive(Debug, Clone, Copy)]
pub struct Sinkhorn {
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for Sinkhorn {
    fn default() -> Self {
        Self {
            tolerance: default_sinkhorn_tolerance(),
            max_iterations: default_sinkhorn_iterations(),
        }
    }
}

impl MixingOracle for Sinkhorn {
    fn name(&self) -> &str {
        "sinkhorn"
    }

    fn compute(&self, adjacency: &Adjacency) -> Result<MixingMatrix, GadgetError> {
        let n = adjacency.size();
        let mut m = MixingMatrix::zeros(n);
        for i in 0..n {
            for j in 0..n {
                if i == j || adjacency.is_linked(i, j) {
                    m.set(i, j, 1.0);
                }
            }
        }

        let mut residual = f64::INFINITY;
        for _ in 0..self.max_iterations {
            // Row normalisation
            for i in 0..n {
                let s = m.row_sum(i);
                for j in 0..n {
                    m.set(i, j, m.get(i, j) / s);
                }
            }

            // Column normalisation
            for j in 0..n {
                let s = m.column_sum(j);
                for i in 0..n {
                    m.set(i, j, m.get(i, j) / s);
                }
            }

            residual = (0..n)
                .map(|i| (m.row_sum(i) - 1.0).abs())
                .fold(0.0, f64::max);
            if residual < self.tolerance {
                break;
            }
        }

        if residual >= self.tolerance {
            tracing::warn!(
                residual,
                max_iterations = self.max_iterations,
                "Sinkhorn balancing did not reach tolerance; using near-doubly-stochastic matrix"
            );
        }
        Ok(m)
    }
}

/// On-disk matrix layouts accepted by `FileOracle`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MatrixFile {
    Rows(Vec<Vec<f64>>),
    Flat(Vec<f64>),
}

/// Reads a precomputed mixing matrix (e.g. from an offline fastest-mixing solver).
#[derive(Debug, Clone)]
pub struct FileOracle {
    path: PathBuf,
}

impl FileOracle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MixingOracle for FileOracle {
    fn name(&self) -> &str {
        "file"
    }

    fn compute(&self, adjacency: &Adjacency) -> Result<MixingMatrix, GadgetError> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            GadgetError::MixingOracle(format!("{}: {}", self.path.display(), e))
        })?;
        let parsed: MatrixFile = serde_json::from_str(&text)
            .map_err(|e| GadgetError::MixingOracle(format!("{}: {}", self.path.display(), e)))?;

        let n = adjacency.size();
        let m = match parsed {
            MatrixFile::Rows(rows) => MixingMatrix::from_rows(rows)?,
            MatrixFile::Flat(values) => MixingMatrix::from_flat(n, &values)?,
        };
        m.ensure_size(n)?;

        if m.rows().iter().flatten().any(|&w| w < 0.0 || !w.is_finite()) {
            return Err(GadgetError::MixingOracle(format!(
                "{}: mixing weights must be finite and non-negative",
                self.path.display()
            )));
        }
        if !m.is_row_stochastic(1e-6) {
            tracing::warn!(
                path = %self.path.display(),
                "Mixing matrix rows do not sum to 1; push-sum mass will drift"
            );
        }
        Ok(m)
    }
}
