use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use stitchline_core::{Event, OrderedMirror};
use stitchline_testkit::fixtures::{added, batch, event_doc, modified, removed};
use stitchline_testkit::generators::{RemoteModel, ScriptOp};

fn initial_load(c: &mut Criterion) {
    let docs = batch(
        (0..1_000)
            .map(|i| added(i, event_doc(&format!("e{}", i), "Knit Night")))
            .collect(),
    );

    c.bench_function("initial_load_1000", |b| {
        b.iter_batched(
            || docs.clone().decode::<Event>(),
            |decoded| {
                let mut mirror = OrderedMirror::new();
                mirror.apply_batch(decoded).unwrap();
                black_box(mirror.len())
            },
            BatchSize::SmallInput,
        )
    });
}

fn churn(c: &mut Criterion) {
    let mut model = RemoteModel::new();
    let seed: Vec<ScriptOp> = (0..500)
        .map(|i| ScriptOp::Insert {
            at: i,
            name: "Crochet Circle".into(),
            malformed: false,
        })
        .collect();
    let initial = model.apply(&seed);

    let update = batch(vec![
        modified(0, 499, event_doc("evt-0001", "Moved")),
        removed(250, event_doc("evt-0251", "Gone")),
        added(0, event_doc("fresh", "Fresh")),
    ]);

    c.bench_function("mixed_batch_on_500", |b| {
        b.iter_batched(
            || {
                let mut mirror = OrderedMirror::<Event>::new();
                mirror.apply_batch(initial.clone().decode()).unwrap();
                (mirror, update.clone().decode::<Event>())
            },
            |(mut mirror, decoded)| {
                mirror.apply_batch(decoded).unwrap();
                black_box(mirror.len())
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, initial_load, churn);
criterion_main!(benches);
