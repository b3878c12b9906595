// src/models/estimator.rs
use anyhow::{bail, Context, Result};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::features::schema::FeatureSchema;

/// A trained regressor. The registry only ever sees this capability.
pub trait GradeModel: Send + Sync + fmt::Debug {
    /// Scalar prediction for one ordered feature vector.
    fn predict(&self, features: &[f64]) -> Result<f64>;

    fn feature_count(&self) -> usize;

    fn kind(&self) -> &'static str;
}

/// On-disk model document: the columns it was fit against plus the estimator.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub estimator: EstimatorSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum EstimatorSpec {
    Linear(LinearParams),
    TreeEnsemble(TreeEnsembleParams),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LinearParams {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Boosted trees: base score plus every tree's leaf.
    #[default]
    Sum,
    /// Bagged trees: base score plus the mean leaf.
    Mean,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TreeEnsembleParams {
    #[serde(default)]
    pub base_score: f64,
    #[serde(default)]
    pub aggregation: Aggregation,
    pub trees: Vec<TreeParams>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TreeParams {
    /// Node 0 is the root; children always have a larger index than their parent.
    pub nodes: Vec<TreeNode>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        default_left: bool,
    },
    Leaf {
        leaf: f64,
    },
}

impl ModelArtifact {
    /// Linear artifact fit against `schema`.
    pub fn linear(schema: &FeatureSchema, coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            feature_names: schema.names().map(str::to_string).collect(),
            estimator: EstimatorSpec::Linear(LinearParams {
                coefficients,
                intercept,
            }),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to parse model artifact JSON")
    }

    /// Validates the estimator against the declared feature count and builds
    /// the runtime model.
    pub fn into_model(self) -> Result<Box<dyn GradeModel>> {
        let feature_count = self.feature_names.len();
        match self.estimator {
            EstimatorSpec::Linear(params) => Ok(Box::new(LinearModel::new(
                params.coefficients,
                params.intercept,
                feature_count,
            )?)),
            EstimatorSpec::TreeEnsemble(params) => {
                Ok(Box::new(TreeEnsemble::new(params, feature_count)?))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64, feature_count: usize) -> Result<Self> {
        if coefficients.len() != feature_count {
            bail!(
                "linear model has {} coefficients but declares {} features",
                coefficients.len(),
                feature_count
            );
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            bail!("linear model contains non-finite parameters");
        }
        Ok(Self {
            coefficients: Array1::from(coefficients),
            intercept,
        })
    }
}

impl GradeModel for LinearModel {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            bail!(
                "expected {} features, got {}",
                self.coefficients.len(),
                features.len()
            );
        }
        Ok(ArrayView1::from(features).dot(&self.coefficients) + self.intercept)
    }

    fn feature_count(&self) -> usize {
        self.coefficients.len()
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    base_score: f64,
    aggregation: Aggregation,
    trees: Vec<Vec<TreeNode>>,
    feature_count: usize,
}

impl TreeEnsemble {
    pub fn new(params: TreeEnsembleParams, feature_count: usize) -> Result<Self> {
        if params.trees.is_empty() {
            bail!("tree ensemble has no trees");
        }
        for (tree_idx, tree) in params.trees.iter().enumerate() {
            validate_tree(&tree.nodes, feature_count)
                .with_context(|| format!("invalid tree {}", tree_idx))?;
        }
        Ok(Self {
            base_score: params.base_score,
            aggregation: params.aggregation,
            trees: params.trees.into_iter().map(|tree| tree.nodes).collect(),
            feature_count,
        })
    }

    fn predict_tree(nodes: &[TreeNode], features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &nodes[idx] {
                TreeNode::Leaf { leaf } => return *leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = features[*feature];
                    idx = if value.is_nan() {
                        if *default_left {
                            *left
                        } else {
                            *right
                        }
                    } else if value < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

// Children must point forward, which rules out cycles and keeps traversal finite.
fn validate_tree(nodes: &[TreeNode], feature_count: usize) -> Result<()> {
    if nodes.is_empty() {
        bail!("tree has no nodes");
    }
    for (idx, node) in nodes.iter().enumerate() {
        match node {
            TreeNode::Leaf { leaf } => {
                if !leaf.is_finite() {
                    bail!("node {} has a non-finite leaf value", idx);
                }
            }
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                if *feature >= feature_count {
                    bail!(
                        "node {} splits on feature {} but only {} features exist",
                        idx,
                        feature,
                        feature_count
                    );
                }
                if threshold.is_nan() {
                    bail!("node {} has a NaN threshold", idx);
                }
                for child in [*left, *right] {
                    if child <= idx || child >= nodes.len() {
                        bail!("node {} has invalid child index {}", idx, child);
                    }
                }
            }
        }
    }
    Ok(())
}

impl GradeModel for TreeEnsemble {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.feature_count {
            bail!(
                "expected {} features, got {}",
                self.feature_count,
                features.len()
            );
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|nodes| Self::predict_tree(nodes, features))
            .sum();
        let combined = match self.aggregation {
            Aggregation::Sum => total,
            Aggregation::Mean => total / self.trees.len() as f64,
        };
        Ok(self.base_score + combined)
    }

    fn feature_count(&self) -> usize {
        self.feature_count
    }

    fn kind(&self) -> &'static str {
        "tree_ensemble"
    }
}
