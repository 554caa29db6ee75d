//! LightGBM ensemble to ONNX `TreeEnsemble*` graph.

use super::lightgbm::{LightGbmModel, MissingType, Objective, Tree};
use super::onnx::{
    data_type, AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto,
    StringStringEntryProto, TypeProto, ValueInfoProto, IR_VERSION, ML_DOMAIN, ML_OPSET,
    ONNX_OPSET,
};

pub const LABEL_OUTPUT: &str = "label";
pub const PROBABILITY_TENSOR: &str = "probability_tensor";
pub const PROBABILITIES_OUTPUT: &str = "probabilities";
pub const REGRESSION_OUTPUT: &str = "variable";

const BATCH_SYMBOL: &str = "N";

/// Declared graph input: `name: float[N, feature_count]`.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub name: String,
    pub feature_count: usize,
}

impl InputSpec {
    pub fn value_info(&self) -> ValueInfoProto {
        ValueInfoProto::new(
            &self.name,
            TypeProto::tensor(
                data_type::FLOAT,
                &[None, Some(self.feature_count as i64)],
                BATCH_SYMBOL,
            ),
        )
    }
}

/// Flattened node and leaf-weight attributes shared by the classifier and
/// regressor operators.
#[derive(Debug, Default)]
struct EnsembleAttributes {
    tree_ids: Vec<i64>,
    node_ids: Vec<i64>,
    feature_ids: Vec<i64>,
    modes: Vec<&'static str>,
    values: Vec<f32>,
    true_ids: Vec<i64>,
    false_ids: Vec<i64>,
    missing_tracks_true: Vec<i64>,
    weight_tree_ids: Vec<i64>,
    weight_node_ids: Vec<i64>,
    weight_ids: Vec<i64>,
    weights: Vec<f32>,
}

impl EnsembleAttributes {
    fn from_model(model: &LightGbmModel, leaf_scale: f64) -> Self {
        let mut attrs = Self::default();
        for (index, tree) in model.trees.iter().enumerate() {
            let class_id = model.tree_class(index) as i64;
            let mut builder = TreeBuilder {
                attrs: &mut attrs,
                tree,
                tree_id: index as i64,
                class_id,
                leaf_scale,
                next_id: 0,
            };
            let root = if tree.num_leaves <= 1 { -1 } else { 0 };
            builder.emit(root);
        }
        attrs
    }

    fn push_node(
        &mut self,
        tree_id: i64,
        node_id: i64,
        feature: i64,
        mode: &'static str,
        value: f32,
        missing_true: bool,
    ) -> usize {
        self.tree_ids.push(tree_id);
        self.node_ids.push(node_id);
        self.feature_ids.push(feature);
        self.modes.push(mode);
        self.values.push(value);
        self.true_ids.push(0);
        self.false_ids.push(0);
        self.missing_tracks_true.push(missing_true as i64);
        self.modes.len() - 1
    }

    fn node_attributes(&self) -> Vec<AttributeProto> {
        vec![
            AttributeProto::ints("nodes_treeids", self.tree_ids.clone()),
            AttributeProto::ints("nodes_nodeids", self.node_ids.clone()),
            AttributeProto::ints("nodes_featureids", self.feature_ids.clone()),
            AttributeProto::strings("nodes_modes", &self.modes),
            AttributeProto::floats("nodes_values", self.values.clone()),
            AttributeProto::ints("nodes_truenodeids", self.true_ids.clone()),
            AttributeProto::ints("nodes_falsenodeids", self.false_ids.clone()),
            AttributeProto::ints("nodes_missing_value_tracks_true", self.missing_tracks_true.clone()),
            AttributeProto::floats("nodes_hitrates", vec![1.0; self.node_ids.len()]),
        ]
    }

    fn weight_attributes(&self, prefix: &str, id_name: &str) -> Vec<AttributeProto> {
        vec![
            AttributeProto::ints(&format!("{prefix}_treeids"), self.weight_tree_ids.clone()),
            AttributeProto::ints(&format!("{prefix}_nodeids"), self.weight_node_ids.clone()),
            AttributeProto::ints(&format!("{prefix}_{id_name}"), self.weight_ids.clone()),
            AttributeProto::floats(&format!("{prefix}_weights"), self.weights.clone()),
        ]
    }
}

struct TreeBuilder<'a> {
    attrs: &'a mut EnsembleAttributes,
    tree: &'a Tree,
    tree_id: i64,
    class_id: i64,
    leaf_scale: f64,
    next_id: i64,
}

impl TreeBuilder<'_> {
    fn alloc(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Emit the subtree rooted at LightGBM node `node`; returns its ONNX node id.
    fn emit(&mut self, node: i32) -> i64 {
        if node < 0 {
            return self.emit_leaf(!node as usize);
        }
        let idx = node as usize;
        if self.tree.is_categorical(idx) {
            return self.emit_categorical(idx);
        }

        let threshold = self.tree.threshold[idx];
        // NaN inputs follow LightGBM: NaN-missing and zero-missing nodes use
        // the default direction, the rest treat NaN as 0.0.
        let missing_true = match self.tree.missing_type(idx) {
            MissingType::NaN | MissingType::Zero => self.tree.default_left(idx),
            MissingType::None => 0.0 <= threshold,
        };

        let id = self.alloc();
        let slot = self.attrs.push_node(
            self.tree_id,
            id,
            self.tree.split_feature[idx] as i64,
            "BRANCH_LEQ",
            threshold_f32(threshold),
            missing_true,
        );
        let true_id = self.emit(self.tree.left_child[idx]);
        let false_id = self.emit(self.tree.right_child[idx]);
        self.attrs.true_ids[slot] = true_id;
        self.attrs.false_ids[slot] = false_id;
        id
    }

    /// A category set becomes a chain of equality tests. Every hit jumps to
    /// its own copy of the left subtree; the final miss takes the right one.
    fn emit_categorical(&mut self, idx: usize) -> i64 {
        let categories = self.tree.categories(idx);
        if categories.is_empty() {
            return self.emit(self.tree.right_child[idx]);
        }

        let feature = self.tree.split_feature[idx] as i64;
        let chain: Vec<(i64, usize)> = categories
            .iter()
            .map(|&category| {
                let id = self.alloc();
                let slot = self.attrs.push_node(
                    self.tree_id,
                    id,
                    feature,
                    "BRANCH_EQ",
                    category as f32,
                    false,
                );
                (id, slot)
            })
            .collect();

        for (position, &(_, slot)) in chain.iter().enumerate() {
            let true_id = self.emit(self.tree.left_child[idx]);
            self.attrs.true_ids[slot] = true_id;
            let false_id = match chain.get(position + 1) {
                Some(&(next_id, _)) => next_id,
                None => self.emit(self.tree.right_child[idx]),
            };
            self.attrs.false_ids[slot] = false_id;
        }
        chain[0].0
    }

    fn emit_leaf(&mut self, leaf: usize) -> i64 {
        let id = self.alloc();
        self.attrs.push_node(self.tree_id, id, 0, "LEAF", 0.0, false);
        self.attrs.weight_tree_ids.push(self.tree_id);
        self.attrs.weight_node_ids.push(id);
        self.attrs.weight_ids.push(self.class_id);
        self.attrs
            .weights
            .push((self.tree.leaf_value[leaf] * self.leaf_scale) as f32);
        id
    }
}

/// Largest `f32` not above `threshold`, so `x <= t` keeps its meaning for
/// every `f32` input.
pub fn threshold_f32(threshold: f64) -> f32 {
    let narrowed = threshold as f32;
    if !narrowed.is_finite() || f64::from(narrowed) <= threshold {
        return narrowed;
    }
    let bits = narrowed.to_bits();
    if narrowed == 0.0 {
        -f32::from_bits(1)
    } else if narrowed > 0.0 {
        f32::from_bits(bits - 1)
    } else {
        f32::from_bits(bits + 1)
    }
}

/// Build the ONNX model for `model` with the declared input.
///
/// The caller is responsible for checking `input.feature_count` against the
/// model's own width.
pub fn to_onnx(model: &LightGbmModel, input: &InputSpec) -> ModelProto {
    let iterations_scale = if model.average_output {
        1.0 / model.num_iterations() as f64
    } else {
        1.0
    };

    let (nodes, outputs) = match &model.objective {
        Objective::Binary { sigmoid } => classifier_nodes(model, input, "LOGISTIC", sigmoid * iterations_scale),
        Objective::MulticlassOva { sigmoid, .. } => {
            classifier_nodes(model, input, "LOGISTIC", sigmoid * iterations_scale)
        }
        Objective::Multiclass { .. } => classifier_nodes(model, input, "SOFTMAX", iterations_scale),
        Objective::Regression { .. } => regressor_nodes(model, input, false, iterations_scale),
        Objective::ExpRegression { .. } => regressor_nodes(model, input, true, iterations_scale),
    };

    let graph = GraphProto {
        node: nodes,
        name: "LightGBM".to_string(),
        doc_string: String::new(),
        input: vec![input.value_info()],
        output: outputs,
    };

    let mut metadata_props = vec![
        metadata("objective", &format!("{:?}", model.objective)),
        metadata("num_trees", &model.trees.len().to_string()),
    ];
    if !model.version.is_empty() {
        metadata_props.push(metadata("lightgbm_version", &model.version));
    }
    if !model.feature_names.is_empty() {
        metadata_props.push(metadata("feature_names", &model.feature_names.join(",")));
    }

    ModelProto {
        ir_version: IR_VERSION,
        producer_name: env!("CARGO_PKG_NAME").to_string(),
        producer_version: env!("CARGO_PKG_VERSION").to_string(),
        domain: String::new(),
        model_version: 0,
        doc_string: String::new(),
        graph: Some(graph),
        opset_import: vec![
            OperatorSetIdProto {
                domain: String::new(),
                version: ONNX_OPSET,
            },
            OperatorSetIdProto {
                domain: ML_DOMAIN.to_string(),
                version: ML_OPSET,
            },
        ],
        metadata_props,
    }
}

fn classifier_nodes(
    model: &LightGbmModel,
    input: &InputSpec,
    post_transform: &str,
    leaf_scale: f64,
) -> (Vec<NodeProto>, Vec<ValueInfoProto>) {
    let attrs = EnsembleAttributes::from_model(model, leaf_scale);
    let labels: Vec<i64> = (0..model.objective.num_labels() as i64).collect();

    let mut attribute = attrs.node_attributes();
    attribute.extend(attrs.weight_attributes("class", "ids"));
    attribute.push(AttributeProto::ints("classlabels_int64s", labels.clone()));
    attribute.push(AttributeProto::string("post_transform", post_transform));

    let ensemble = NodeProto {
        input: vec![input.name.clone()],
        output: vec![LABEL_OUTPUT.to_string(), PROBABILITY_TENSOR.to_string()],
        name: "LightGbmClassifier".to_string(),
        op_type: "TreeEnsembleClassifier".to_string(),
        attribute,
        domain: ML_DOMAIN.to_string(),
    };
    let zipmap = NodeProto {
        input: vec![PROBABILITY_TENSOR.to_string()],
        output: vec![PROBABILITIES_OUTPUT.to_string()],
        name: "ZipProbabilities".to_string(),
        op_type: "ZipMap".to_string(),
        attribute: vec![AttributeProto::ints("classlabels_int64s", labels)],
        domain: ML_DOMAIN.to_string(),
    };

    let outputs = vec![
        ValueInfoProto::new(
            LABEL_OUTPUT,
            TypeProto::tensor(data_type::INT64, &[None], BATCH_SYMBOL),
        ),
        ValueInfoProto::new(
            PROBABILITIES_OUTPUT,
            TypeProto::sequence(TypeProto::map(
                data_type::INT64,
                TypeProto::tensor(data_type::FLOAT, &[], BATCH_SYMBOL),
            )),
        ),
    ];
    (vec![ensemble, zipmap], outputs)
}

fn regressor_nodes(
    model: &LightGbmModel,
    input: &InputSpec,
    exp_link: bool,
    leaf_scale: f64,
) -> (Vec<NodeProto>, Vec<ValueInfoProto>) {
    let attrs = EnsembleAttributes::from_model(model, leaf_scale);
    let raw_output = if exp_link {
        format!("{REGRESSION_OUTPUT}_raw")
    } else {
        REGRESSION_OUTPUT.to_string()
    };

    let mut attribute = attrs.node_attributes();
    attribute.extend(attrs.weight_attributes("target", "ids"));
    attribute.push(AttributeProto::int("n_targets", 1));
    attribute.push(AttributeProto::string("aggregate_function", "SUM"));
    attribute.push(AttributeProto::string("post_transform", "NONE"));

    let mut nodes = vec![NodeProto {
        input: vec![input.name.clone()],
        output: vec![raw_output.clone()],
        name: "LightGbmRegressor".to_string(),
        op_type: "TreeEnsembleRegressor".to_string(),
        attribute,
        domain: ML_DOMAIN.to_string(),
    }];
    if exp_link {
        nodes.push(NodeProto {
            input: vec![raw_output],
            output: vec![REGRESSION_OUTPUT.to_string()],
            name: "ExpLink".to_string(),
            op_type: "Exp".to_string(),
            attribute: Vec::new(),
            domain: String::new(),
        });
    }

    let outputs = vec![ValueInfoProto::new(
        REGRESSION_OUTPUT,
        TypeProto::tensor(data_type::FLOAT, &[None, Some(1)], BATCH_SYMBOL),
    )];
    (nodes, outputs)
}

fn metadata(key: &str, value: &str) -> StringStringEntryProto {
    StringStringEntryProto {
        key: key.to_string(),
        value: value.to_string(),
    }
}
