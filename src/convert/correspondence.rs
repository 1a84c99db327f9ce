// Copyright 2019-present Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
/// # Foreign checkpoint layouts
pub enum ForeignLayout {
    /// HuggingFace PyTorch BERT (`bert.encoder.layer.0.attention.self.query.weight`)
    #[serde(rename = "huggingface")]
    #[value(name = "huggingface")]
    HuggingFace,
    /// Google TensorFlow BERT (`bert/encoder/layer_0/attention/self/query/kernel`), exported to npz
    #[serde(rename = "tensorflow")]
    #[value(name = "tensorflow")]
    TensorFlow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
/// # Task-specific output head converted after the encoder stack
pub enum OutputHead {
    /// Pooler and next sentence prediction classifier
    NextSentence,
    /// Span start/end classifier for extractive question answering
    ExtractiveQa,
    /// Masked language model prediction head
    MaskedLm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Operation applied to a tensor when it moves between layouts
pub enum TensorTransform {
    /// Copied as is
    Copy,
    /// Matrix stored with swapped row/column convention in the foreign layout
    Transpose,
    /// Segment embedding: the native table carries an extra zero row at index 0
    ReservedRow,
    /// Position embedding: copied, optionally truncated when entering the native layout
    PositionTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Correspondence between a native parameter and its foreign counterpart
pub struct TensorMapping {
    pub native: String,
    pub foreign: String,
    pub transform: TensorTransform,
    /// Optional parameters are skipped when absent from the source store
    pub required: bool,
}

/// Kind of parameter described by a template entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    /// Dense layer weight: input-major in TensorFlow, output-major elsewhere
    Kernel,
    /// Vector or matrix sharing the same orientation in every layout
    Plain,
    SegmentTable,
    PositionTable,
}

/// Template entry: native name, HuggingFace name, TensorFlow name (absent when tied), kind and
/// whether the entry is required
struct Template {
    native: &'static str,
    hugging_face: &'static str,
    tensorflow: Option<&'static str>,
    kind: ParamKind,
    required: bool,
}

const fn entry(
    native: &'static str,
    hugging_face: &'static str,
    tensorflow: &'static str,
    kind: ParamKind,
) -> Template {
    Template {
        native,
        hugging_face,
        tensorflow: Some(tensorflow),
        kind,
        required: true,
    }
}

const fn optional(
    native: &'static str,
    hugging_face: &'static str,
    tensorflow: Option<&'static str>,
    kind: ParamKind,
) -> Template {
    Template {
        native,
        hugging_face,
        tensorflow,
        kind,
        required: false,
    }
}

const EMBEDDINGS: &[Template] = &[
    entry(
        "embedding.word_embedding.weight",
        "bert.embeddings.word_embeddings.weight",
        "bert/embeddings/word_embeddings",
        ParamKind::Plain,
    ),
    entry(
        "embedding.position_embedding.weight",
        "bert.embeddings.position_embeddings.weight",
        "bert/embeddings/position_embeddings",
        ParamKind::PositionTable,
    ),
    entry(
        "embedding.segment_embedding.weight",
        "bert.embeddings.token_type_embeddings.weight",
        "bert/embeddings/token_type_embeddings",
        ParamKind::SegmentTable,
    ),
    entry(
        "embedding.layer_norm.gamma",
        "bert.embeddings.LayerNorm.weight",
        "bert/embeddings/LayerNorm/gamma",
        ParamKind::Plain,
    ),
    entry(
        "embedding.layer_norm.beta",
        "bert.embeddings.LayerNorm.bias",
        "bert/embeddings/LayerNorm/beta",
        ParamKind::Plain,
    ),
];

/// Per-layer suffixes, prefixed with `encoder.transformer.{i}.`, `bert.encoder.layer.{i}.` and
/// `bert/encoder/layer_{i}/` respectively.
const ENCODER_LAYER: &[Template] = &[
    entry(
        "self_attn.linear_layers.0.weight",
        "attention.self.query.weight",
        "attention/self/query/kernel",
        ParamKind::Kernel,
    ),
    entry(
        "self_attn.linear_layers.0.bias",
        "attention.self.query.bias",
        "attention/self/query/bias",
        ParamKind::Plain,
    ),
    entry(
        "self_attn.linear_layers.1.weight",
        "attention.self.key.weight",
        "attention/self/key/kernel",
        ParamKind::Kernel,
    ),
    entry(
        "self_attn.linear_layers.1.bias",
        "attention.self.key.bias",
        "attention/self/key/bias",
        ParamKind::Plain,
    ),
    entry(
        "self_attn.linear_layers.2.weight",
        "attention.self.value.weight",
        "attention/self/value/kernel",
        ParamKind::Kernel,
    ),
    entry(
        "self_attn.linear_layers.2.bias",
        "attention.self.value.bias",
        "attention/self/value/bias",
        ParamKind::Plain,
    ),
    entry(
        "self_attn.final_linear.weight",
        "attention.output.dense.weight",
        "attention/output/dense/kernel",
        ParamKind::Kernel,
    ),
    entry(
        "self_attn.final_linear.bias",
        "attention.output.dense.bias",
        "attention/output/dense/bias",
        ParamKind::Plain,
    ),
    entry(
        "layer_norm_1.gamma",
        "attention.output.LayerNorm.weight",
        "attention/output/LayerNorm/gamma",
        ParamKind::Plain,
    ),
    entry(
        "layer_norm_1.beta",
        "attention.output.LayerNorm.bias",
        "attention/output/LayerNorm/beta",
        ParamKind::Plain,
    ),
    entry(
        "feed_forward.linear_1.weight",
        "intermediate.dense.weight",
        "intermediate/dense/kernel",
        ParamKind::Kernel,
    ),
    entry(
        "feed_forward.linear_1.bias",
        "intermediate.dense.bias",
        "intermediate/dense/bias",
        ParamKind::Plain,
    ),
    entry(
        "feed_forward.linear_2.weight",
        "output.dense.weight",
        "output/dense/kernel",
        ParamKind::Kernel,
    ),
    entry(
        "feed_forward.linear_2.bias",
        "output.dense.bias",
        "output/dense/bias",
        ParamKind::Plain,
    ),
    entry(
        "layer_norm_2.gamma",
        "output.LayerNorm.weight",
        "output/LayerNorm/gamma",
        ParamKind::Plain,
    ),
    entry(
        "layer_norm_2.beta",
        "output.LayerNorm.bias",
        "output/LayerNorm/beta",
        ParamKind::Plain,
    ),
];

const NEXT_SENTENCE_HEAD: &[Template] = &[
    entry(
        "target.nsp_linear_1.weight",
        "bert.pooler.dense.weight",
        "bert/pooler/dense/kernel",
        ParamKind::Kernel,
    ),
    entry(
        "target.nsp_linear_1.bias",
        "bert.pooler.dense.bias",
        "bert/pooler/dense/bias",
        ParamKind::Plain,
    ),
    // TensorFlow stores the classifier output-major already
    optional(
        "target.nsp_linear_2.weight",
        "cls.seq_relationship.weight",
        Some("cls/seq_relationship/output_weights"),
        ParamKind::Plain,
    ),
    optional(
        "target.nsp_linear_2.bias",
        "cls.seq_relationship.bias",
        Some("cls/seq_relationship/output_bias"),
        ParamKind::Plain,
    ),
];

const EXTRACTIVE_QA_HEAD: &[Template] = &[
    entry(
        "output_layer.weight",
        "qa_outputs.weight",
        "cls/squad/output_weights",
        ParamKind::Plain,
    ),
    entry(
        "output_layer.bias",
        "qa_outputs.bias",
        "cls/squad/output_bias",
        ParamKind::Plain,
    ),
];

const MASKED_LM_HEAD: &[Template] = &[
    entry(
        "target.mlm_linear_1.weight",
        "cls.predictions.transform.dense.weight",
        "cls/predictions/transform/dense/kernel",
        ParamKind::Kernel,
    ),
    entry(
        "target.mlm_linear_1.bias",
        "cls.predictions.transform.dense.bias",
        "cls/predictions/transform/dense/bias",
        ParamKind::Plain,
    ),
    entry(
        "target.layer_norm.gamma",
        "cls.predictions.transform.LayerNorm.weight",
        "cls/predictions/transform/LayerNorm/gamma",
        ParamKind::Plain,
    ),
    entry(
        "target.layer_norm.beta",
        "cls.predictions.transform.LayerNorm.bias",
        "cls/predictions/transform/LayerNorm/beta",
        ParamKind::Plain,
    ),
    // TensorFlow ties the decoder to the word embeddings
    optional(
        "target.mlm_linear_2.weight",
        "cls.predictions.decoder.weight",
        None,
        ParamKind::Plain,
    ),
    optional(
        "target.mlm_linear_2.bias",
        "cls.predictions.bias",
        Some("cls/predictions/output_bias"),
        ParamKind::Plain,
    ),
];

impl OutputHead {
    fn templates(&self) -> &'static [Template] {
        match self {
            OutputHead::NextSentence => NEXT_SENTENCE_HEAD,
            OutputHead::ExtractiveQa => EXTRACTIVE_QA_HEAD,
            OutputHead::MaskedLm => MASKED_LM_HEAD,
        }
    }
}

impl ForeignLayout {
    fn layer_prefix(&self, layer: usize) -> String {
        match self {
            ForeignLayout::HuggingFace => format!("bert.encoder.layer.{}.", layer),
            ForeignLayout::TensorFlow => format!("bert/encoder/layer_{}/", layer),
        }
    }

    fn name<'a>(&self, template: &'a Template) -> Option<&'a str> {
        match self {
            ForeignLayout::HuggingFace => Some(template.hugging_face),
            ForeignLayout::TensorFlow => template.tensorflow,
        }
    }

    fn transform(&self, kind: ParamKind) -> TensorTransform {
        match (self, kind) {
            (ForeignLayout::TensorFlow, ParamKind::Kernel) => TensorTransform::Transpose,
            (_, ParamKind::Kernel) | (_, ParamKind::Plain) => TensorTransform::Copy,
            (_, ParamKind::SegmentTable) => TensorTransform::ReservedRow,
            (_, ParamKind::PositionTable) => TensorTransform::PositionTable,
        }
    }
}

/// # Structural correspondence between the native and a foreign layout
/// Generated from the embedding, encoder layer and head templates for a given number of layers.
/// Both conversion directions read the same table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerCorrespondence {
    layout: ForeignLayout,
    head: OutputHead,
    layers_num: usize,
    mappings: Vec<TensorMapping>,
}

impl LayerCorrespondence {
    /// Builds the table for `layers_num` transformer blocks.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_uer::convert::{ForeignLayout, LayerCorrespondence, OutputHead, TensorTransform};
    ///
    /// let table =
    ///     LayerCorrespondence::new(ForeignLayout::TensorFlow, OutputHead::NextSentence, 12);
    /// let query = table
    ///     .find_native("encoder.transformer.3.self_attn.linear_layers.0.weight")
    ///     .unwrap();
    /// assert_eq!(query.foreign, "bert/encoder/layer_3/attention/self/query/kernel");
    /// assert_eq!(query.transform, TensorTransform::Transpose);
    /// ```
    pub fn new(layout: ForeignLayout, head: OutputHead, layers_num: usize) -> LayerCorrespondence {
        let mut mappings = Vec::with_capacity(
            EMBEDDINGS.len() + layers_num * ENCODER_LAYER.len() + head.templates().len(),
        );
        let mut push = |template: &Template, native: String, foreign: String| {
            mappings.push(TensorMapping {
                native,
                foreign,
                transform: layout.transform(template.kind),
                required: template.required,
            })
        };

        for template in EMBEDDINGS {
            if let Some(foreign) = layout.name(template) {
                push(template, template.native.to_string(), foreign.to_string());
            }
        }
        for layer in 0..layers_num {
            let foreign_prefix = layout.layer_prefix(layer);
            for template in ENCODER_LAYER {
                if let Some(foreign) = layout.name(template) {
                    push(
                        template,
                        format!("encoder.transformer.{}.{}", layer, template.native),
                        format!("{}{}", foreign_prefix, foreign),
                    );
                }
            }
        }
        for template in head.templates() {
            if let Some(foreign) = layout.name(template) {
                push(template, template.native.to_string(), foreign.to_string());
            }
        }

        LayerCorrespondence {
            layout,
            head,
            layers_num,
            mappings,
        }
    }

    pub fn layout(&self) -> ForeignLayout {
        self.layout
    }

    pub fn head(&self) -> OutputHead {
        self.head
    }

    pub fn layers_num(&self) -> usize {
        self.layers_num
    }

    pub fn mappings(&self) -> &[TensorMapping] {
        &self.mappings
    }

    pub fn find_native(&self, native: &str) -> Option<&TensorMapping> {
        self.mappings.iter().find(|mapping| mapping.native == native)
    }

    pub fn find_foreign(&self, foreign: &str) -> Option<&TensorMapping> {
        self.mappings
            .iter()
            .find(|mapping| mapping.foreign == foreign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_size_follows_layer_count() {
        let table =
            LayerCorrespondence::new(ForeignLayout::HuggingFace, OutputHead::ExtractiveQa, 2);
        assert_eq!(table.mappings().len(), 5 + 2 * 16 + 2);
        assert_eq!(table.layers_num(), 2);

        let natives: HashSet<&str> = table.mappings().iter().map(|m| m.native.as_str()).collect();
        let foreigns: HashSet<&str> = table.mappings().iter().map(|m| m.foreign.as_str()).collect();
        assert_eq!(natives.len(), table.mappings().len());
        assert_eq!(foreigns.len(), table.mappings().len());
        assert!(table
            .find_native("encoder.transformer.2.layer_norm_2.beta")
            .is_none());
    }

    #[test]
    fn hugging_face_never_transposes() {
        let table = LayerCorrespondence::new(ForeignLayout::HuggingFace, OutputHead::MaskedLm, 3);
        assert!(table
            .mappings()
            .iter()
            .all(|m| m.transform != TensorTransform::Transpose));

        let segment = table
            .find_foreign("bert.embeddings.token_type_embeddings.weight")
            .unwrap();
        assert_eq!(segment.native, "embedding.segment_embedding.weight");
        assert_eq!(segment.transform, TensorTransform::ReservedRow);

        let decoder = table.find_native("target.mlm_linear_2.weight").unwrap();
        assert_eq!(decoder.foreign, "cls.predictions.decoder.weight");
        assert!(!decoder.required);
    }

    #[test]
    fn tensorflow_transposes_kernels_only() {
        let table =
            LayerCorrespondence::new(ForeignLayout::TensorFlow, OutputHead::NextSentence, 1);
        let transposed: Vec<&str> = table
            .mappings()
            .iter()
            .filter(|m| m.transform == TensorTransform::Transpose)
            .map(|m| m.foreign.as_str())
            .collect();
        assert_eq!(
            transposed,
            vec![
                "bert/encoder/layer_0/attention/self/query/kernel",
                "bert/encoder/layer_0/attention/self/key/kernel",
                "bert/encoder/layer_0/attention/self/value/kernel",
                "bert/encoder/layer_0/attention/output/dense/kernel",
                "bert/encoder/layer_0/intermediate/dense/kernel",
                "bert/encoder/layer_0/output/dense/kernel",
                "bert/pooler/dense/kernel",
            ]
        );
        let classifier = table
            .find_foreign("cls/seq_relationship/output_weights")
            .unwrap();
        assert_eq!(classifier.transform, TensorTransform::Copy);
    }

    #[test]
    fn tensorflow_has_no_tied_decoder_entry() {
        let table = LayerCorrespondence::new(ForeignLayout::TensorFlow, OutputHead::MaskedLm, 0);
        assert!(table.find_native("target.mlm_linear_2.weight").is_none());
        assert_eq!(
            table.find_native("target.mlm_linear_2.bias").unwrap().foreign,
            "cls/predictions/output_bias"
        );
    }
}
