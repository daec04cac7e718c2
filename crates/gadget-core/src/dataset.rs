// crates/gadget-core/src/dataset.rs
//
// Labeled training examples, SVMlight parsing, and shard partitioning.
//
// Each node trains on a private shard of examples. Examples are immutable once
// loaded; the engine only ever reads them.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GadgetError;

/// Binary class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    /// The `+1` class.
    Positive,
    /// The `-1` class.
    Negative,
}

impl Label {
    /// Numeric value of the label, `+1.0` or `-1.0`.
    pub fn sign(self) -> f64 {
        match self {
            Label::Positive => 1.0,
            Label::Negative => -1.0,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Positive => write!(f, "+1"),
            Label::Negative => write!(f, "-1"),
        }
    }
}

impl FromStr for Label {
    type Err = GadgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+1" | "1" | "1.0" | "+1.0" => Ok(Label::Positive),
            "-1" | "-1.0" => Ok(Label::Negative),
            other => Err(GadgetError::Dataset(format!("invalid label '{}'", other))),
        }
    }
}

/// One labeled example with a sparse feature vector sorted by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub label: Label,
    features: Vec<(u32, f64)>,
}

impl TrainingExample {
    /// Create an example. Features are sorted by index and duplicate indices summed.
    pub fn new(label: Label, features: Vec<(u32, f64)>) -> Self {
        let mut features = features;
        features.sort_by_key(|(dim, _)| *dim);
        let mut merged: Vec<(u32, f64)> = Vec::with_capacity(features.len());
        for (dim, value) in features {
            match merged.last_mut() {
                Some((last, acc)) if *last == dim => *acc += value,
                _ => merged.push((dim, value)),
            }
        }
        Self {
            label,
            features: merged,
        }
    }

    /// Sparse features in ascending index order.
    pub fn features(&self) -> &[(u32, f64)] {
        &self.features
    }

    /// Label as `+1.0` / `-1.0`.
    pub fn y(&self) -> f64 {
        self.label.sign()
    }
}

impl FromStr for TrainingExample {
    type Err = GadgetError;

    /// Parse one SVMlight line: `<label> <index>:<value> ... [# comment]`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let body = line.split('#').next().unwrap_or("");
        let mut tokens = body.split_whitespace();
        let label: Label = tokens
            .next()
            .ok_or_else(|| GadgetError::Dataset("empty line".to_string()))?
            .parse()?;

        let mut features = Vec::new();
        for token in tokens {
            let (dim, value) = token.split_once(':').ok_or_else(|| {
                GadgetError::Dataset(format!("feature '{}' is not <index>:<value>", token))
            })?;
            let dim: u32 = dim
                .parse()
                .map_err(|_| GadgetError::Dataset(format!("invalid feature index '{}'", dim)))?;
            let value: f64 = value
                .parse()
                .map_err(|_| GadgetError::Dataset(format!("invalid feature value '{}'", value)))?;
            features.push((dim, value));
        }

        Ok(TrainingExample::new(label, features))
    }
}

/// Parse SVMlight text into examples, skipping blank and comment-only lines.
pub fn parse_svmlight(text: &str) -> Result<Vec<TrainingExample>, GadgetError> {
    let mut examples = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let example = trimmed.parse::<TrainingExample>().map_err(|e| {
            GadgetError::Dataset(format!("line {}: {}", idx + 1, e))
        })?;
        examples.push(example);
    }
    Ok(examples)
}

/// Read and parse an SVMlight file.
pub fn load_svmlight(path: impl AsRef<Path>) -> Result<Vec<TrainingExample>, GadgetError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| GadgetError::Dataset(format!("{}: {}", path.display(), e)))?;
    parse_svmlight(&text)
}

/// Return lines `start..=end` (1-based, inclusive) of `text`.
///
/// Used to cut a per-experiment training subset out of a larger data file.
pub fn slice_lines(text: &str, start: usize, end: usize) -> Vec<&str> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(n, _)| *n >= start && *n <= end)
        .map(|(_, line)| line)
        .collect()
}

/// How a dataset is split into per-node shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionStrategy {
    /// Equal-size consecutive blocks; the remainder goes to the first nodes.
    #[default]
    Contiguous,
    /// Example `i` goes to node `i % n`.
    RoundRobin,
}

/// Split `examples` into `nodes` shards.
///
/// Returns an error if `nodes` is zero. Shards may be empty when there are
/// fewer examples than nodes.
pub fn partition(
    examples: Vec<TrainingExample>,
    nodes: usize,
    strategy: PartitionStrategy,
) -> Result<Vec<Vec<TrainingExample>>, GadgetError> {
    if nodes == 0 {
        return Err(GadgetError::Dataset(
            "cannot partition data across zero nodes".to_string(),
        ));
    }

    let mut shards: Vec<Vec<TrainingExample>> = vec![Vec::new(); nodes];
    match strategy {
        PartitionStrategy::RoundRobin => {
            for (i, example) in examples.into_iter().enumerate() {
                shards[i % nodes].push(example);
            }
        }
        PartitionStrategy::Contiguous => {
            let base = examples.len() / nodes;
            let extra = examples.len() % nodes;
            let mut iter = examples.into_iter();
            for (node, shard) in shards.iter_mut().enumerate() {
                let size = base + usize::from(node < extra);
                shard.extend(iter.by_ref().take(size));
            }
        }
    }
    Ok(shards)
}
