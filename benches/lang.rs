use std::fs;
use std::io;

use criterion::{criterion_group, criterion_main, Criterion};
use lox_interpreter::Interpreter;

pub fn lang(c: &mut Criterion) {
    for entry in fs::read_dir("benches/lang").unwrap() {
        let path = entry.unwrap().path();
        let source = fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("could not read bench file: {}", path.display()));
        let name = path.file_stem().unwrap().to_string_lossy().to_string();
        c.bench_function(&name, |b| {
            b.iter(|| Interpreter::new(io::sink()).run(&source).unwrap())
        });
    }
}

criterion_group!(benches, lang);
criterion_main!(benches);
