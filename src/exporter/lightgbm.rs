//! Parser for LightGBM's text model format (`Booster.save_model`).
//!
//! The file starts with a `tree` line and a header of `key=value` pairs,
//! followed by one `Tree=<n>` block per tree and an `end of trees` marker.
//! Everything after the marker (feature importances, training parameters)
//! is ignored.

use std::collections::HashMap;
use std::str::FromStr;

const DECISION_CATEGORICAL: u8 = 1;
const DECISION_DEFAULT_LEFT: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ModelParseError {
    #[error("not a LightGBM text model (expected a leading 'tree' line)")]
    NotLightGbm,
    #[error("missing key '{key}' in {section}")]
    MissingKey { section: String, key: &'static str },
    #[error("invalid value for '{key}' in {section}: '{value}'")]
    InvalidValue {
        section: String,
        key: &'static str,
        value: String,
    },
    #[error("{section}: {message}")]
    Inconsistent { section: String, message: String },
    #[error("unsupported objective '{0}'")]
    UnsupportedObjective(String),
    #[error("{0} uses linear leaves, which tree ensembles cannot express")]
    LinearTree(String),
    #[error("model contains no trees")]
    NoTrees,
}

/// What the raw ensemble score means.
#[derive(Debug, Clone, PartialEq)]
pub enum Objective {
    /// Binary log-loss; probability is `sigmoid(scale * raw)`.
    Binary { sigmoid: f64 },
    /// Softmax over `num_class` scores.
    Multiclass { num_class: usize },
    /// One-vs-all; each class is an independent sigmoid.
    MulticlassOva { num_class: usize, sigmoid: f64 },
    /// Identity link (L2, L1, huber, quantile, ranking, ...).
    Regression { name: String },
    /// Log link (poisson, gamma, tweedie); prediction is `exp(raw)`.
    ExpRegression { name: String },
}

impl Objective {
    pub fn parse(raw: &str) -> Result<Self, ModelParseError> {
        let mut parts = raw.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let params: HashMap<&str, &str> = parts.filter_map(|p| p.split_once(':')).collect();

        let param_f64 = |key: &'static str, default: f64| -> Result<f64, ModelParseError> {
            match params.get(key) {
                Some(v) => v.parse().map_err(|_| ModelParseError::InvalidValue {
                    section: "objective".to_string(),
                    key,
                    value: v.to_string(),
                }),
                None => Ok(default),
            }
        };
        let num_class = || -> Result<usize, ModelParseError> {
            let value = params.get("num_class").ok_or(ModelParseError::MissingKey {
                section: "objective".to_string(),
                key: "num_class",
            })?;
            match value.parse::<usize>() {
                Ok(count) if count > 0 => Ok(count),
                _ => Err(ModelParseError::InvalidValue {
                    section: "objective".to_string(),
                    key: "num_class",
                    value: value.to_string(),
                }),
            }
        };

        match name {
            "binary" => Ok(Self::Binary {
                sigmoid: param_f64("sigmoid", 1.0)?,
            }),
            "multiclass" | "softmax" => Ok(Self::Multiclass {
                num_class: num_class()?,
            }),
            "multiclassova" | "multiclass_ova" | "ova" | "ovr" => Ok(Self::MulticlassOva {
                num_class: num_class()?,
                sigmoid: param_f64("sigmoid", 1.0)?,
            }),
            "regression" | "regression_l2" | "regression_l1" | "l2" | "l1" | "mean_squared_error"
            | "mse" | "mae" | "rmse" | "huber" | "fair" | "quantile" | "mape" | "lambdarank"
            | "rank_xendcg" => Ok(Self::Regression {
                name: name.to_string(),
            }),
            "poisson" | "gamma" | "tweedie" => Ok(Self::ExpRegression {
                name: name.to_string(),
            }),
            _ => Err(ModelParseError::UnsupportedObjective(raw.to_string())),
        }
    }

    pub fn is_classifier(&self) -> bool {
        matches!(
            self,
            Self::Binary { .. } | Self::Multiclass { .. } | Self::MulticlassOva { .. }
        )
    }

    /// Number of distinct class labels (1 for regression).
    pub fn num_labels(&self) -> usize {
        match self {
            Self::Binary { .. } => 2,
            Self::Multiclass { num_class } | Self::MulticlassOva { num_class, .. } => *num_class,
            Self::Regression { .. } | Self::ExpRegression { .. } => 1,
        }
    }
}

/// A single decision tree. Internal nodes are indexed `0..num_leaves-1`;
/// a negative child `c` points to leaf `!c`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub num_leaves: usize,
    pub split_feature: Vec<usize>,
    pub threshold: Vec<f64>,
    pub decision_type: Vec<u8>,
    pub left_child: Vec<i32>,
    pub right_child: Vec<i32>,
    pub leaf_value: Vec<f64>,
    pub cat_boundaries: Vec<usize>,
    pub cat_threshold: Vec<u32>,
}

/// How an internal node treats a missing input value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingType {
    None,
    Zero,
    NaN,
}

impl Tree {
    pub fn num_internal(&self) -> usize {
        self.num_leaves.saturating_sub(1)
    }

    pub fn is_categorical(&self, node: usize) -> bool {
        self.decision_type[node] & DECISION_CATEGORICAL != 0
    }

    pub fn default_left(&self, node: usize) -> bool {
        self.decision_type[node] & DECISION_DEFAULT_LEFT != 0
    }

    pub fn missing_type(&self, node: usize) -> MissingType {
        match (self.decision_type[node] >> 2) & 3 {
            1 => MissingType::Zero,
            2 => MissingType::NaN,
            _ => MissingType::None,
        }
    }

    /// Categories that send a categorical node to its left child.
    pub fn categories(&self, node: usize) -> Vec<i64> {
        let cat_idx = self.threshold[node] as usize;
        let start = self.cat_boundaries[cat_idx];
        let end = self.cat_boundaries[cat_idx + 1];
        self.cat_threshold[start..end]
            .iter()
            .enumerate()
            .flat_map(|(word_idx, word)| {
                (0..32)
                    .filter(move |bit| word & (1u32 << bit) != 0)
                    .map(move |bit| (word_idx * 32 + bit) as i64)
            })
            .collect()
    }

    fn goes_left(&self, node: usize, features: &[f64]) -> bool {
        let value = features.get(self.split_feature[node]).copied().unwrap_or(f64::NAN);

        if self.is_categorical(node) {
            if value.is_nan() || value < 0.0 {
                return false;
            }
            return self.categories(node).contains(&(value as i64));
        }

        let missing = self.missing_type(node);
        let value = if value.is_nan() && missing != MissingType::NaN {
            0.0
        } else {
            value
        };
        match missing {
            MissingType::Zero if value.abs() <= 1e-35 => self.default_left(node),
            MissingType::NaN if value.is_nan() => self.default_left(node),
            _ => value <= self.threshold[node],
        }
    }

    /// Index of the leaf a feature vector lands in.
    pub fn leaf_index(&self, features: &[f64]) -> usize {
        if self.num_leaves <= 1 {
            return 0;
        }
        let mut node: i32 = 0;
        while node >= 0 {
            let idx = node as usize;
            node = if self.goes_left(idx, features) {
                self.left_child[idx]
            } else {
                self.right_child[idx]
            };
        }
        !node as usize
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        self.leaf_value[self.leaf_index(features)]
    }

    fn validate(&self, section: &str, max_feature_idx: usize) -> Result<(), ModelParseError> {
        let inconsistent = |message: String| ModelParseError::Inconsistent {
            section: section.to_string(),
            message,
        };

        if self.num_leaves == 0 {
            return Err(inconsistent("num_leaves must be at least 1".to_string()));
        }
        if self.leaf_value.len() != self.num_leaves {
            return Err(inconsistent(format!(
                "expected {} leaf values, found {}",
                self.num_leaves,
                self.leaf_value.len()
            )));
        }
        let internal = self.num_internal();
        for (name, len) in [
            ("split_feature", self.split_feature.len()),
            ("threshold", self.threshold.len()),
            ("decision_type", self.decision_type.len()),
            ("left_child", self.left_child.len()),
            ("right_child", self.right_child.len()),
        ] {
            if len != internal {
                return Err(inconsistent(format!(
                    "expected {internal} entries in {name}, found {len}"
                )));
            }
        }

        for node in 0..internal {
            if self.split_feature[node] > max_feature_idx {
                return Err(inconsistent(format!(
                    "node {node} splits on feature {} beyond max_feature_idx {max_feature_idx}",
                    self.split_feature[node]
                )));
            }
            for child in [self.left_child[node], self.right_child[node]] {
                let in_range = if child >= 0 {
                    (child as usize) < internal && child as usize > node
                } else {
                    (!child as usize) < self.num_leaves
                };
                if !in_range {
                    return Err(inconsistent(format!("node {node} has invalid child {child}")));
                }
            }
            if self.is_categorical(node) {
                let cat_idx = self.threshold[node];
                let valid = cat_idx >= 0.0
                    && (cat_idx as usize) + 1 < self.cat_boundaries.len()
                    && self.cat_boundaries[cat_idx as usize + 1] <= self.cat_threshold.len()
                    && self.cat_boundaries[cat_idx as usize]
                        <= self.cat_boundaries[cat_idx as usize + 1];
                if !valid {
                    return Err(inconsistent(format!(
                        "node {node} references missing category set {cat_idx}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightGbmModel {
    pub version: String,
    pub objective: Objective,
    pub num_tree_per_iteration: usize,
    pub max_feature_idx: usize,
    pub feature_names: Vec<String>,
    /// Random-forest mode: the prediction is the mean over iterations.
    pub average_output: bool,
    pub trees: Vec<Tree>,
}

impl LightGbmModel {
    pub fn parse(text: &str) -> Result<Self, ModelParseError> {
        let mut lines = text.lines().map(str::trim);
        if lines.next() != Some("tree") {
            return Err(ModelParseError::NotLightGbm);
        }

        let mut header = Section::new("header".to_string());
        let mut tree_sections: Vec<Section> = Vec::new();

        for line in lines {
            if line == "end of trees" {
                break;
            }
            if line.is_empty() {
                continue;
            }
            if let Some(index) = line.strip_prefix("Tree=") {
                tree_sections.push(Section::new(format!("Tree={index}")));
                continue;
            }
            let target = tree_sections.last_mut().unwrap_or(&mut header);
            match line.split_once('=') {
                Some((key, value)) => {
                    target.values.insert(key.to_string(), value.to_string());
                }
                None => {
                    target.flags.push(line.to_string());
                }
            }
        }

        let objective = Objective::parse(header.get("objective")?)?;
        let max_feature_idx: usize = header.parse("max_feature_idx")?;
        let num_tree_per_iteration: usize = match header.values.get("num_tree_per_iteration") {
            Some(_) => header.parse("num_tree_per_iteration")?,
            None => 1,
        };
        if num_tree_per_iteration == 0 {
            return Err(header.invalid("num_tree_per_iteration", "0"));
        }
        let feature_names = header
            .values
            .get("feature_names")
            .map(|names| names.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let trees = tree_sections
            .iter()
            .map(|section| section.to_tree(max_feature_idx))
            .collect::<Result<Vec<_>, _>>()?;
        if trees.is_empty() {
            return Err(ModelParseError::NoTrees);
        }

        let expected_per_iteration = match objective {
            Objective::Multiclass { num_class } | Objective::MulticlassOva { num_class, .. } => {
                num_class
            }
            _ => 1,
        };
        if num_tree_per_iteration != expected_per_iteration
            || trees.len() % num_tree_per_iteration != 0
        {
            return Err(ModelParseError::Inconsistent {
                section: "header".to_string(),
                message: format!(
                    "{} trees with num_tree_per_iteration={} do not fit objective {:?}",
                    trees.len(),
                    num_tree_per_iteration,
                    objective
                ),
            });
        }

        Ok(Self {
            version: header.values.get("version").cloned().unwrap_or_default(),
            objective,
            num_tree_per_iteration,
            max_feature_idx,
            feature_names,
            average_output: header.flags.iter().any(|f| f == "average_output"),
            trees,
        })
    }

    /// Input width the model was trained on.
    pub fn feature_count(&self) -> usize {
        self.max_feature_idx + 1
    }

    pub fn num_iterations(&self) -> usize {
        self.trees.len() / self.num_tree_per_iteration
    }

    /// Class (or target) slot tree `index` contributes to.
    pub fn tree_class(&self, index: usize) -> usize {
        index % self.num_tree_per_iteration
    }

    /// Raw per-class scores, before the objective's link function.
    pub fn predict_raw(&self, features: &[f64]) -> Vec<f64> {
        let mut scores = vec![0.0; self.num_tree_per_iteration];
        for (index, tree) in self.trees.iter().enumerate() {
            scores[self.tree_class(index)] += tree.predict(features);
        }
        if self.average_output {
            let iterations = self.num_iterations() as f64;
            scores.iter_mut().for_each(|s| *s /= iterations);
        }
        scores
    }
}

struct Section {
    name: String,
    values: HashMap<String, String>,
    flags: Vec<String>,
}

impl Section {
    fn new(name: String) -> Self {
        Self {
            name,
            values: HashMap::new(),
            flags: Vec::new(),
        }
    }

    fn get(&self, key: &'static str) -> Result<&str, ModelParseError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ModelParseError::MissingKey {
                section: self.name.clone(),
                key,
            })
    }

    fn parse<T: FromStr>(&self, key: &'static str) -> Result<T, ModelParseError> {
        let raw = self.get(key)?;
        raw.trim().parse().map_err(|_| self.invalid(key, raw))
    }

    /// Space-separated list; absent or empty keys give an empty list.
    fn list<T: FromStr>(&self, key: &'static str) -> Result<Vec<T>, ModelParseError> {
        match self.values.get(key) {
            Some(raw) => raw
                .split_whitespace()
                .map(|item| item.parse().map_err(|_| self.invalid(key, item)))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    fn invalid(&self, key: &'static str, value: &str) -> ModelParseError {
        ModelParseError::InvalidValue {
            section: self.name.clone(),
            key,
            value: value.to_string(),
        }
    }

    fn to_tree(&self, max_feature_idx: usize) -> Result<Tree, ModelParseError> {
        if self.values.get("is_linear").map(String::as_str) == Some("1") {
            return Err(ModelParseError::LinearTree(self.name.clone()));
        }

        let tree = Tree {
            num_leaves: self.parse("num_leaves")?,
            split_feature: self.list("split_feature")?,
            threshold: self.list("threshold")?,
            decision_type: self.list("decision_type")?,
            left_child: self.list("left_child")?,
            right_child: self.list("right_child")?,
            leaf_value: self.list("leaf_value")?,
            cat_boundaries: self.list("cat_boundaries")?,
            cat_threshold: self.list("cat_threshold")?,
        };
        tree.validate(&self.name, max_feature_idx)?;
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::fixtures;

    #[test]
    fn test_parse_binary_model() {
        let model = LightGbmModel::parse(fixtures::BINARY_93).unwrap();
        assert_eq!(model.objective, Objective::Binary { sigmoid: 1.0 });
        assert_eq!(model.feature_count(), 93);
        assert_eq!(model.trees.len(), 2);
        assert_eq!(model.feature_names.len(), 93);
        assert_eq!(model.feature_names[0], "Column_0");
        assert!(!model.average_output);
    }

    #[test]
    fn test_tree_traversal() {
        let model = LightGbmModel::parse(fixtures::BINARY_93).unwrap();
        let tree = &model.trees[0];

        let mut x = vec![0.0; 93];
        // feature 2 <= 0.5, feature 5 <= 1.25 -> leaf 0
        assert_eq!(tree.leaf_index(&x), 0);
        x[5] = 2.0;
        assert_eq!(tree.leaf_index(&x), 2);
        x[2] = 1.0;
        assert_eq!(tree.leaf_index(&x), 1);

        // NaN on a NaN-missing node follows the default (left) branch
        x[2] = f64::NAN;
        x[5] = 0.0;
        assert_eq!(tree.leaf_index(&x), 0);

        let raw = model.predict_raw(&vec![0.0; 93]);
        assert!((raw[0] - (-0.25 + 0.125)).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_split() {
        let model = LightGbmModel::parse(fixtures::CATEGORICAL).unwrap();
        let tree = &model.trees[0];
        assert!(tree.is_categorical(0));
        assert_eq!(tree.categories(0), vec![1, 3, 33]);

        let mut x = vec![0.0; 4];
        x[1] = 3.0;
        assert_eq!(tree.leaf_index(&x), 0);
        x[1] = 33.0;
        assert_eq!(tree.leaf_index(&x), 0);
        x[1] = 2.0;
        assert_eq!(tree.leaf_index(&x), 1);
        x[1] = f64::NAN;
        assert_eq!(tree.leaf_index(&x), 1);
    }

    #[test]
    fn test_multiclass_trees_map_to_classes() {
        let model = LightGbmModel::parse(fixtures::MULTICLASS_3).unwrap();
        assert_eq!(model.num_iterations(), 1);
        assert_eq!(model.tree_class(2), 2);

        let raw = model.predict_raw(&[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(raw, vec![0.4, 0.3, 0.05]);
    }

    #[test]
    fn test_average_output_divides_by_iterations() {
        let text = fixtures::BINARY_93.replace(
            "objective=binary sigmoid:1",
            "objective=binary sigmoid:1\naverage_output",
        );
        let model = LightGbmModel::parse(&text).unwrap();
        assert!(model.average_output);
        let raw = model.predict_raw(&vec![0.0; 93]);
        assert!((raw[0] - (-0.125 / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_parse_multiclass_objective() {
        let objective = Objective::parse("multiclass num_class:3").unwrap();
        assert_eq!(objective, Objective::Multiclass { num_class: 3 });
        assert_eq!(objective.num_labels(), 3);

        let objective = Objective::parse("binary sigmoid:2.5").unwrap();
        assert_eq!(objective, Objective::Binary { sigmoid: 2.5 });

        assert!(matches!(
            Objective::parse("custom"),
            Err(ModelParseError::UnsupportedObjective(_))
        ));
    }

    #[test]
    fn test_rejects_inconsistent_tree() {
        let text = fixtures::BINARY_93.replace("leaf_value=-0.25 0.1 0.3", "leaf_value=-0.25");
        let err = LightGbmModel::parse(&text).unwrap_err();
        assert!(matches!(err, ModelParseError::Inconsistent { .. }));
    }

    #[test]
    fn test_rejects_zero_trees_per_iteration() {
        let text = fixtures::MULTICLASS_3.replace("num_tree_per_iteration=3", "num_tree_per_iteration=0");
        let err = LightGbmModel::parse(&text).unwrap_err();
        assert!(matches!(
            err,
            ModelParseError::InvalidValue { key: "num_tree_per_iteration", .. }
        ));

        let text = text.replace("multiclass num_class:3", "multiclass num_class:0");
        let err = LightGbmModel::parse(&text).unwrap_err();
        assert!(matches!(err, ModelParseError::InvalidValue { key: "num_class", .. }));
    }

    #[test]
    fn test_rejects_non_model_text() {
        assert!(matches!(
            LightGbmModel::parse("hello"),
            Err(ModelParseError::NotLightGbm)
        ));
    }

    #[test]
    fn test_rejects_linear_trees() {
        let text = fixtures::BINARY_93.replace("is_linear=0", "is_linear=1");
        assert!(matches!(
            LightGbmModel::parse(&text),
            Err(ModelParseError::LinearTree(_))
        ));
    }
}
