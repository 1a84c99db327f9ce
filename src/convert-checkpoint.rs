// Copyright 2019-present, Laurent Mazare.
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

use clap::Parser;
use rust_uer::common::logging::init_logging;
use rust_uer::convert::{
    CheckpointConverter, ConversionConfig, Direction, FallbackPolicy, ForeignLayout, OutputHead,
    DEFAULT_UNKNOWN_TOKEN,
};
use rust_uer::{Config, UerError};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Fallback {
    UnknownToken,
    Zeros,
}

/// Convert BERT checkpoints between the native layout and HuggingFace / TensorFlow layouts
#[derive(Parser, Debug)]
#[command(name = "convert-checkpoint")]
struct Args {
    /// Source checkpoint (.ot, .npz or .safetensors)
    #[arg(long)]
    input_model_path: PathBuf,

    /// Destination checkpoint (.ot, .npz or .safetensors)
    #[arg(long)]
    output_model_path: PathBuf,

    /// JSON conversion configuration, exclusive with the conversion flags below
    #[arg(
        long,
        conflicts_with_all = [
            "layers_num",
            "layout",
            "head",
            "direction",
            "max_position_embeddings",
            "old_vocab_path",
            "new_vocab_path",
            "fallback",
            "unknown_token",
        ]
    )]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 12)]
    layers_num: usize,

    #[arg(long, value_enum, default_value = "huggingface")]
    layout: ForeignLayout,

    #[arg(long, value_enum, default_value = "next-sentence")]
    head: OutputHead,

    #[arg(long, value_enum, default_value = "to-native")]
    direction: Direction,

    /// Position embedding rows kept (defaults to 512 for TensorFlow checkpoints)
    #[arg(long)]
    max_position_embeddings: Option<i64>,

    /// Vocabulary of the source checkpoint
    #[arg(long, requires = "new_vocab_path")]
    old_vocab_path: Option<PathBuf>,

    /// Vocabulary of the converted checkpoint
    #[arg(long, requires = "old_vocab_path")]
    new_vocab_path: Option<PathBuf>,

    /// Initialization of embedding rows for new tokens
    #[arg(long, value_enum, default_value = "unknown-token")]
    fallback: Fallback,

    /// Unknown token used by the `unknown-token` fallback
    #[arg(long, default_value = DEFAULT_UNKNOWN_TOKEN)]
    unknown_token: String,
}

impl Args {
    fn conversion_config(&self) -> Result<ConversionConfig, UerError> {
        if let Some(config_path) = &self.config {
            return Ok(ConversionConfig::from_file(config_path)?.with_default_position_limit());
        }
        let fallback = match self.fallback {
            Fallback::UnknownToken => FallbackPolicy::UnknownToken(self.unknown_token.clone()),
            Fallback::Zeros => FallbackPolicy::Zeros,
        };
        Ok(ConversionConfig {
            layers_num: self.layers_num,
            layout: self.layout,
            head: self.head,
            direction: self.direction,
            max_position_embeddings: self.max_position_embeddings,
            old_vocab_path: self.old_vocab_path.clone(),
            new_vocab_path: self.new_vocab_path.clone(),
            fallback,
        }
        .with_default_position_limit())
    }
}

pub fn main() -> Result<(), UerError> {
    init_logging(None);
    let args = Args::parse();

    let config = args.conversion_config()?;
    tracing::info!(?config, "converting checkpoint");
    let converter = CheckpointConverter::new(config)?;
    converter.convert(&args.input_model_path, &args.output_model_path)?;

    Ok(())
}
