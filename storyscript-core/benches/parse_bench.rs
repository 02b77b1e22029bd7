use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use storyscript_core::{generate, parse};

fn make_script(labels: usize) -> String {
    let mut buf = String::with_capacity(labels * 400);
    buf.push_str("define e = Character(\"艾琳\")\n\n");

    for i in 0..labels {
        buf.push_str(&format!("label scene_{i}:\n"));
        buf.push_str(&format!("    scene bg{i} with fade\n"));
        buf.push_str("    show eileen happy at center with dissolve\n");
        buf.push_str(&format!("    play music \"bgm{i}.ogg\" volume 0.8 loop\n"));
        buf.push_str(&format!("    e \"Hello world {i}\"\n"));
        buf.push_str(&format!("    $ visits += {i}\n"));
        buf.push_str(&format!("    if visits > {i}:\n"));
        buf.push_str("        menu:\n");
        buf.push_str(&format!("            \"第{i}个选择\":\n"));
        buf.push_str(&format!("                jump scene_{}\n", i + 1));
        buf.push_str("            \"留下\":\n");
        buf.push_str("                pass\n");
        buf.push_str("    else:\n");
        buf.push_str("        \"Nothing happens.\"\n");
        buf.push_str(&format!("    custom_statement {i} with odd syntax\n"));
        buf.push_str("    return\n");
    }

    buf.push_str("label end:\n    stop music fadeout 1.0\n    return\n");
    buf
}

fn bench_full(c: &mut Criterion) {
    let src = make_script(1_000);
    let ast = parse(&src, None).ast;
    let mut group = c.benchmark_group("storyscript");
    group.sample_size(10);
    group.bench_function("parse 1k labels", |b| {
        b.iter(|| parse(black_box(&src), None))
    });
    group.bench_function("generate 1k labels", |b| {
        b.iter(|| generate(black_box(&ast)))
    });
    group.bench_function("parse+generate 1k labels", |b| {
        b.iter(|| generate(&parse(black_box(&src), None).ast))
    });
    group.finish();
}

criterion_group!(benches, bench_full);
criterion_main!(benches);
