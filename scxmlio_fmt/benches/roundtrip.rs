use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use scxmlio_fmt::*;

const MICROWAVE: &str = include_str!("../tests/assets/microwave.scxml");
const HISTORY: &str = include_str!("../tests/assets/history.scxml");
const INVOKE: &str = include_str!("../tests/assets/invoke.scxml");

#[inline(always)]
fn chain(len: usize) -> String {
    let mut source =
        String::from(r#"<scxml xmlns="http://www.w3.org/2005/07/scxml" version="1.0">"#);
    for idx in 0..len {
        source.push_str(&format!(
            r#"<state id="s{idx}"><onentry><log expr="{idx}"/></onentry><transition event="next" target="s{}"/></state>"#,
            (idx + 1) % len
        ));
    }
    source.push_str("</scxml>");
    source
}

fn sources() -> Vec<(String, &'static str)> {
    vec![
        (MICROWAVE.to_string(), "microwave"),
        (HISTORY.to_string(), "history"),
        (INVOKE.to_string(), "invoke"),
        (chain(1000), "chain of 1000 states"),
    ]
}

fn read(c: &mut Criterion) {
    for (source, name) in sources().iter() {
        c.bench_with_input(BenchmarkId::new("parse", name), source, |b, source| {
            b.iter(|| parse_str(source, None).unwrap());
        });
    }
}

fn print(c: &mut Criterion) {
    for (source, name) in sources().iter() {
        let document = parse_str(source, None).unwrap();
        c.bench_with_input(BenchmarkId::new("write", name), &document, |b, document| {
            b.iter(|| write(document).unwrap());
        });
    }
}

criterion_group!(benches, read, print);
criterion_main!(benches);
