//! Token reading and writing benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ivio::{GlobalContext, Input, Output, WriteOptions};

const POINTS: usize = 10_000;

fn ascii_points() -> Vec<u8> {
    let mut out = Output::new(GlobalContext::shared());
    out.write_str("Coordinate3 { point [\n");
    for i in 0..POINTS {
        let v = i as f32 * 0.25;
        out.write_f32(v);
        out.write_char(b' ');
        out.write_f32(-v);
        out.write_char(b' ');
        out.write_f32(1.0);
        out.write_str(",\n");
    }
    out.write_str("] }\n");
    out.buffer().to_vec()
}

fn binary_points() -> Vec<u8> {
    let mut out = Output::with_options(GlobalContext::shared(), WriteOptions::new().binary());
    out.write_str("Coordinate3");
    out.write_u32((POINTS * 3) as u32);
    let values: Vec<f32> = (0..POINTS * 3).map(|i| i as f32 * 0.5).collect();
    out.write_binary_f32s(&values);
    out.buffer().to_vec()
}

fn read_ascii_floats(c: &mut Criterion) {
    let data = ascii_points();
    c.bench_function("read_ascii_floats", |b| {
        b.iter(|| {
            let mut input = Input::new(GlobalContext::shared());
            input.set_buffer(black_box(data.clone())).unwrap();
            input.read_name(true);
            input.read_char(true);
            input.read_name(true);
            input.read_char(true);
            let mut sum = 0.0f32;
            for _ in 0..POINTS {
                for _ in 0..3 {
                    sum += input.read_f32().unwrap_or(0.0);
                }
                input.read_char(true);
            }
            sum
        })
    });
}

fn read_binary_floats(c: &mut Criterion) {
    let data = binary_points();
    c.bench_function("read_binary_floats", |b| {
        b.iter(|| {
            let mut input = Input::new(GlobalContext::shared());
            input.set_buffer(black_box(data.clone())).unwrap();
            input.read_name(true);
            let count = input.read_u32().unwrap_or(0) as usize;
            let mut values = vec![0.0f32; count];
            input.read_binary_f32s(&mut values);
            values
        })
    });
}

fn write_ascii_floats(c: &mut Criterion) {
    c.bench_function("write_ascii_floats", |b| b.iter(|| black_box(ascii_points())));
}

criterion_group!(benches, read_ascii_floats, read_binary_floats, write_ascii_floats);
criterion_main!(benches);
