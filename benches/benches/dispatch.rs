// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for value resolution, the set path and watcher dispatch.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use reparam::{ClassBuilder, Depends, ParamClass, ParamDecl, Parameterized, Value};

fn chain(depth: usize) -> ParamClass {
    let mut cls = ClassBuilder::new("C0")
        .param("x", ParamDecl::number().default(1.0).bounds(0.0, 1.0e9))
        .build()
        .unwrap();
    for i in 1..depth {
        cls = ClassBuilder::new(&format!("C{i}"))
            .base(&cls)
            .build()
            .unwrap();
    }
    cls
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    let obj = chain(1).instance().with("x", 2.0).build().unwrap();
    group.bench_function("instance_value", |b| b.iter(|| black_box(obj.get("x"))));

    for depth in [1_usize, 8, 32] {
        let obj = chain(depth).instance().build().unwrap();
        group.bench_function(BenchmarkId::new("class_default", depth), |b| {
            b.iter(|| black_box(obj.get("x")))
        });
    }

    group.finish();
}

fn watched(watchers: i32) -> Parameterized {
    let obj = chain(1).instance().build().unwrap();
    for precedence in 0..watchers {
        obj.watcher(["x"])
            .precedence(precedence)
            .call(|events| {
                black_box(events.len());
                Ok(())
            })
            .unwrap();
    }
    obj
}

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");

    for watchers in [0_i32, 1, 16] {
        let obj = watched(watchers);
        let mut next = 0.0;
        group.bench_function(BenchmarkId::new("watchers", watchers), |b| {
            b.iter(|| {
                next += 1.0;
                obj.set("x", black_box(next)).unwrap();
            })
        });
    }

    let obj = watched(16);
    group.bench_function("unchanged", |b| {
        b.iter(|| obj.set("x", black_box(1.0)).unwrap())
    });

    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    let names: Vec<String> = (0..16).map(|i| format!("p{i}")).collect();
    let mut builder = ClassBuilder::new("Wide");
    for name in &names {
        builder = builder.param(name, ParamDecl::integer());
    }
    let cls = builder
        .method("sum", Depends::on(names.iter().map(String::as_str)).watch(), |obj| {
            black_box(obj.get("p0")?);
            Ok(())
        })
        .build()
        .unwrap();

    group.bench_function("batched_16", |b| {
        b.iter_batched(
            || cls.instance().build().unwrap(),
            |obj| {
                obj.update(names.iter().map(|n| (n.as_str(), Value::Int(1))))
                    .unwrap();
                black_box(obj);
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("unbatched_16", |b| {
        b.iter_batched(
            || cls.instance().build().unwrap(),
            |obj| {
                for name in &names {
                    obj.set(name, 1).unwrap();
                }
                black_box(obj);
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_rebind(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebind");

    let inner = ClassBuilder::new("Inner")
        .param("a", ParamDecl::integer())
        .build()
        .unwrap();
    let outer = ClassBuilder::new("Outer")
        .param("sub", ParamDecl::instance_of(&inner))
        .method("follow", Depends::on(["sub.a"]).watch(), |_| Ok(()))
        .build()
        .unwrap();
    let first = inner.instance().build().unwrap();
    let second = inner.instance().with("a", 1).build().unwrap();
    let obj = outer
        .instance()
        .with("sub", first.clone())
        .build()
        .unwrap();

    let mut flip = false;
    group.bench_function("replace_sub_object", |b| {
        b.iter(|| {
            flip = !flip;
            let sub = if flip { &second } else { &first };
            obj.set("sub", sub.clone()).unwrap();
        })
    });

    group.bench_function("nested_set", |b| {
        let mut next = 0;
        b.iter(|| {
            next += 1;
            first.set("a", black_box(next)).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_get, bench_set, bench_update, bench_rebind);
criterion_main!(benches);
