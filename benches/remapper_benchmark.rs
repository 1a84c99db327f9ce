#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};
use rust_uer::convert::{
    CheckpointRemapper, Direction, ForeignLayout, OutputHead, ParameterStore, RemapConfig,
    TensorTransform,
};
use tch::kind::Kind;
use tch::{Device, Tensor};

const HIDDEN: i64 = 256;

fn create_native_store(remapper: &CheckpointRemapper) -> ParameterStore {
    let mut store = ParameterStore::new();
    for mapping in remapper.correspondence().mappings() {
        let shape: Vec<i64> = match mapping.transform {
            TensorTransform::Transpose => vec![HIDDEN, HIDDEN],
            TensorTransform::ReservedRow => vec![3, HIDDEN],
            TensorTransform::PositionTable => vec![512, HIDDEN],
            TensorTransform::Copy if mapping.native.ends_with("word_embedding.weight") => {
                vec![21128, HIDDEN]
            }
            TensorTransform::Copy => vec![HIDDEN],
        };
        store.insert(
            mapping.native.clone(),
            Tensor::rand(shape.as_slice(), (Kind::Float, Device::Cpu)),
        );
    }
    store
}

fn bench_remapper(c: &mut Criterion) {
    //    Set-up a 12 layers TensorFlow layout remapper
    let remapper = CheckpointRemapper::new(RemapConfig {
        layout: ForeignLayout::TensorFlow,
        head: OutputHead::ExtractiveQa,
        layers_num: 12,
        max_position_embeddings: None,
    });
    let native = create_native_store(&remapper);
    let foreign = remapper
        .remap(&native, Direction::NativeToForeign)
        .unwrap();

    c.bench_function("Remap TensorFlow to native (12 layers)", |b| {
        b.iter(|| remapper.remap(black_box(&foreign), Direction::ForeignToNative))
    });
    c.bench_function("Remap native to TensorFlow (12 layers)", |b| {
        b.iter(|| remapper.remap(black_box(&native), Direction::NativeToForeign))
    });
}

criterion_group! {
name = benches;
config = Criterion::default().sample_size(20);
targets = bench_remapper
}

criterion_main!(benches);
