use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::sync::Arc;

/// A loaded regression model.
///
/// `feature_names` is the training column order and doubles as the
/// feature schema. `predict` takes one row in that order and returns the
/// model's raw outputs; for the estimators here that is a single value.
pub trait Regressor: Send + Sync {
    fn kind(&self) -> &'static str;
    fn feature_names(&self) -> &[String];
    fn predict(&self, row: &[f32]) -> Result<Vec<f32>>;
}

/// How the bytes of a model artifact are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// JSON document tagged with `"kind"`.
    Json,
    /// TorchScript module plus a `meta.json` sidecar.
    TorchScript,
}

impl ModelFormat {
    /// Decided by extension. For URLs the query and fragment are ignored.
    pub fn detect(locator: &str) -> Self {
        let resource = if crate::loader::has_http_scheme(locator) {
            locator.split(['?', '#']).next().unwrap_or(locator)
        } else {
            locator
        };
        let lower = resource.to_ascii_lowercase();
        if [".pt", ".ts", ".torchscript"]
            .iter()
            .any(|ext| lower.ends_with(ext))
        {
            ModelFormat::TorchScript
        } else {
            ModelFormat::Json
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelDocument {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

/// Decode a JSON model artifact and validate it against its own schema.
pub fn model_from_json(bytes: &[u8]) -> Result<Arc<dyn Regressor>> {
    let doc: ModelDocument =
        serde_json::from_slice(bytes).context("failed to parse model document")?;
    Ok(match doc {
        ModelDocument::Linear(m) => {
            m.validate()?;
            Arc::new(m)
        }
        ModelDocument::TreeEnsemble(m) => {
            m.validate()?;
            Arc::new(m)
        }
    })
}

fn check_row(row: &[f32], expected: usize) -> Result<()> {
    if row.len() != expected {
        bail!(
            "feature length mismatch: got {}, expected {}",
            row.len(),
            expected
        );
    }
    Ok(())
}

// ---------- Linear ----------

#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f32>,
    #[serde(default)]
    pub intercept: f32,
}

impl LinearModel {
    fn validate(&self) -> Result<()> {
        if self.coefficients.len() != self.feature_names.len() {
            bail!(
                "linear model has {} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            );
        }
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, row: &[f32]) -> Result<Vec<f32>> {
        check_row(row, self.coefficients.len())?;
        let dot: f32 = self
            .coefficients
            .iter()
            .zip(row)
            .map(|(c, x)| c * x)
            .sum();
        Ok(vec![dot + self.intercept])
    }
}

// ---------- Gradient-boosted trees ----------

/// Sum of regression trees on top of `base_score`.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsemble {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub base_score: f32,
    pub trees: Vec<Tree>,
}

/// Flat node array; node 0 is the root.
#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        #[serde(default = "default_left")]
        default_left: bool,
    },
    Leaf {
        leaf: f32,
    },
}

fn default_left() -> bool {
    true
}

impl TreeEnsemble {
    fn validate(&self) -> Result<()> {
        let n_features = self.feature_names.len();
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                bail!("tree {} has no nodes", t);
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                if let Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } = *node
                {
                    if feature >= n_features {
                        bail!(
                            "tree {} node {} splits on feature {} of {}",
                            t,
                            i,
                            feature,
                            n_features
                        );
                    }
                    // Children strictly after the parent keeps traversal finite.
                    for child in [left, right] {
                        if child <= i || child >= tree.nodes.len() {
                            bail!("tree {} node {} has invalid child {}", t, i, child);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Tree {
    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { leaf } => return leaf,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let x = row[feature];
                    idx = if x.is_nan() {
                        if default_left {
                            left
                        } else {
                            right
                        }
                    } else if x < threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

impl Regressor for TreeEnsemble {
    fn kind(&self) -> &'static str {
        "tree_ensemble"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, row: &[f32]) -> Result<Vec<f32>> {
        check_row(row, self.feature_names.len())?;
        let sum: f32 = self.trees.iter().map(|t| t.leaf_value(row)).sum();
        Ok(vec![self.base_score + sum])
    }
}

// ---------- TorchScript ----------

#[cfg(feature = "torch")]
pub use torch::TorchScriptModel;

#[cfg(feature = "torch")]
mod torch {
    use super::{check_row, Regressor};
    use anyhow::{bail, Context, Result};
    use parking_lot::Mutex;
    use serde::Deserialize;
    use std::io::Cursor;
    use tch::{kind::Kind, CModule, Device, Tensor};

    #[derive(Deserialize)]
    struct MetaJson {
        feat_list: Vec<String>,
        in_dim: Option<usize>,
    }

    pub struct TorchScriptModel {
        model: Mutex<CModule>,
        device: Device,
        feat_list: Vec<String>,
    }

    impl TorchScriptModel {
        pub fn from_bytes(model_bytes: &[u8], meta_bytes: &[u8]) -> Result<Self> {
            let device = Device::Cpu;

            // meta.json carries the feature ordering
            let meta: MetaJson =
                serde_json::from_slice(meta_bytes).context("failed to parse meta.json")?;
            let feat_list = meta.feat_list;
            let in_dim = meta.in_dim.unwrap_or(feat_list.len());
            if in_dim != feat_list.len() {
                tracing::warn!(
                    "meta.in_dim ({}) != feat_list.len() ({}); using feat_list.len()",
                    in_dim,
                    feat_list.len()
                );
            }

            let model = CModule::load_data_on_device(&mut Cursor::new(model_bytes), device)
                .context("failed to load TorchScript module")?;

            // Probe with a zero row; any non-empty output is accepted
            let dummy = Tensor::zeros([1, feat_list.len() as i64], (Kind::Float, device));
            let t = model.forward_ts(&[dummy])?;
            if t.numel() == 0 {
                bail!("model produced an empty output: {:?}", t.size());
            }

            Ok(Self {
                model: Mutex::new(model),
                device,
                feat_list,
            })
        }
    }

    impl Regressor for TorchScriptModel {
        fn kind(&self) -> &'static str {
            "torchscript"
        }

        fn feature_names(&self) -> &[String] {
            &self.feat_list
        }

        fn predict(&self, row: &[f32]) -> Result<Vec<f32>> {
            check_row(row, self.feat_list.len())?;
            let input = Tensor::from_slice(row)
                .reshape([1, row.len() as i64])
                .to_device(self.device);
            let t = self.model.lock().forward_ts(&[input])?;
            let flat = t.to_kind(Kind::Float).flatten(0, -1);
            Ok(Vec::<f32>::try_from(&flat)?)
        }
    }
}
