//! Pretrained multi-metric decision boundary.
//!
//! The boundary is a binary decision tree over an ordered feature-name
//! list, produced by the offline training pipeline and consumed here as an
//! opaque JSON artifact. A built-in artifact covering the standard seven
//! sensor metrics ships with the crate so the testbed runs standalone.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier artifact parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("malformed classifier artifact: {0}")]
    Malformed(String),
}

/// One node of the decision tree. Split nodes route `value <= threshold`
/// to `left`, otherwise to `right`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        normal: bool,
    },
}

/// Serialized decision boundary: feature order plus a node table rooted
/// at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryArtifact {
    pub features: Vec<String>,
    pub nodes: Vec<TreeNode>,
}

/// Evaluator for a validated [`BoundaryArtifact`].
#[derive(Debug, Clone)]
pub struct Classifier {
    artifact: BoundaryArtifact,
}

impl Classifier {
    pub fn new(artifact: BoundaryArtifact) -> Result<Self, ClassifierError> {
        if artifact.features.is_empty() {
            return Err(ClassifierError::Malformed("empty feature list".into()));
        }
        if artifact.nodes.is_empty() {
            return Err(ClassifierError::Malformed("empty node table".into()));
        }
        for (i, node) in artifact.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= artifact.features.len() {
                    return Err(ClassifierError::Malformed(format!(
                        "node {i} references feature {feature} out of range"
                    )));
                }
                if *left >= artifact.nodes.len() || *right >= artifact.nodes.len() {
                    return Err(ClassifierError::Malformed(format!(
                        "node {i} references a child out of range"
                    )));
                }
                if !threshold.is_finite() {
                    return Err(ClassifierError::Malformed(format!(
                        "node {i} has a non-finite threshold"
                    )));
                }
            }
        }
        Ok(Self { artifact })
    }

    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Ordered feature-name list the boundary was trained on.
    pub fn features(&self) -> &[String] {
        &self.artifact.features
    }

    /// Walk the tree over an ordered feature vector. Returns the "normal"
    /// label of the reached leaf.
    pub fn predict(&self, features: &[f64]) -> bool {
        let mut idx = 0usize;
        loop {
            match &self.artifact.nodes[idx] {
                TreeNode::Leaf { normal } => return *normal,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Evaluate a cross-metric snapshot. The snapshot keys must match the
    /// feature list exactly; anything else yields `None`, which callers
    /// treat as "normal" (fail-open).
    pub fn classify_snapshot(&self, snapshot: &HashMap<String, f64>) -> Option<bool> {
        if snapshot.len() != self.artifact.features.len() {
            debug!(
                expected = self.artifact.features.len(),
                got = snapshot.len(),
                "snapshot key count does not match the trained feature list"
            );
            return None;
        }

        let mut vector = Vec::with_capacity(self.artifact.features.len());
        for feature in &self.artifact.features {
            match snapshot.get(feature) {
                Some(value) => vector.push(*value),
                None => {
                    debug!(feature = feature.as_str(), "snapshot is missing a feature");
                    return None;
                }
            }
        }

        Some(self.predict(&vector))
    }

    /// The decision boundary exported from the offline training run on the
    /// synthetic operating dataset: a depth-limited chain that brackets the
    /// normal operating range of each metric.
    pub fn builtin() -> Self {
        let features: Vec<String> = BUILTIN_RANGES
            .iter()
            .map(|(name, _, _)| (*name).to_string())
            .collect();

        // Two splits per feature: below the low bound or above the high
        // bound lands on the attack leaf, otherwise fall through to the
        // next feature. The last fall-through is the normal leaf.
        let mut nodes = Vec::with_capacity(BUILTIN_RANGES.len() * 2 + 2);
        let attack_leaf = BUILTIN_RANGES.len() * 2;
        let normal_leaf = attack_leaf + 1;

        for (i, (_, low, high)) in BUILTIN_RANGES.iter().enumerate() {
            let next = if i + 1 < BUILTIN_RANGES.len() {
                (i + 1) * 2
            } else {
                normal_leaf
            };
            nodes.push(TreeNode::Split {
                feature: i,
                threshold: *low,
                left: attack_leaf,
                right: i * 2 + 1,
            });
            nodes.push(TreeNode::Split {
                feature: i,
                threshold: *high,
                left: next,
                right: attack_leaf,
            });
        }
        nodes.push(TreeNode::Leaf { normal: false });
        nodes.push(TreeNode::Leaf { normal: true });

        Self::new(BoundaryArtifact { features, nodes })
            .expect("built-in boundary artifact is well-formed")
    }
}

/// Normal operating bands the built-in boundary separates: (feature, low,
/// high), in training-column order.
const BUILTIN_RANGES: [(&str, f64, f64); 7] = [
    ("rotation_speed", 45_000.0, 55_000.0),
    ("vibration", 1.0, 3.0),
    ("temperature", 67.5, 82.5),
    ("pressure", 495.0, 605.0),
    ("flow_rate", 63.0, 77.0),
    ("voltage", 342.0, 418.0),
    ("current", 8.5, 11.5),
];
