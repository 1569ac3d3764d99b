use criterion::{Criterion, black_box, criterion_group, criterion_main};
use recode::Handle;

fn bench_convert(c: &mut Criterion) {
    let text = "あいうえお".repeat(200);
    let mut to_cp932 = Handle::open("CP932", "UTF-8").unwrap();
    let cp932 = to_cp932.convert(text.as_bytes()).unwrap();
    let mut to_utf8 = Handle::open("UTF-8", "CP932").unwrap();

    c.bench_function("utf8_to_cp932_3k", |b| {
        b.iter(|| to_cp932.convert_borrowed(black_box(text.as_bytes())).unwrap().len())
    });

    c.bench_function("cp932_to_utf8_2k", |b| {
        b.iter(|| to_utf8.convert_borrowed(black_box(cp932.as_slice())).unwrap().len())
    });

    c.bench_function("utf8_to_cp932_copying", |b| {
        b.iter(|| to_cp932.convert(black_box(text.as_bytes())).unwrap())
    });
}

criterion_group!(benches, bench_convert);
criterion_main!(benches);
