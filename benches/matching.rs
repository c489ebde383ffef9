use criterion::{black_box, criterion_group, criterion_main, Criterion};
use morphogen::{
    Element, Graph, Grammar, MatchConfig, Mapping, Production, ProductionOption, StepLimits,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A ring of `n` vertices with a pendant vertex on every third one.
fn ring_host(n: u32) -> Graph {
    let mut g = Graph::new();
    let vertices: Vec<_> = (0..n)
        .map(|_| g.add(Element::vertex()).unwrap())
        .collect();
    for i in 0..n as usize {
        let a = vertices[i];
        let b = vertices[(i + 1) % n as usize];
        g.add(Element::edge(Some(a), Some(b))).unwrap();
    }
    for i in (0..n as usize).step_by(3) {
        let pendant = g.add(Element::vertex().with_attr("leaf", true)).unwrap();
        g.add(Element::edge(Some(vertices[i]), Some(pendant)))
            .unwrap();
    }
    g
}

fn path_pattern(len: u32) -> Graph {
    let mut g = Graph::new();
    let vertices: Vec<_> = (0..len)
        .map(|_| g.add(Element::vertex()).unwrap())
        .collect();
    for pair in vertices.windows(2) {
        g.add(Element::edge(Some(pair[0]), Some(pair[1]))).unwrap();
    }
    g
}

fn bench_matching(c: &mut Criterion) {
    let host = ring_host(60);
    let pattern = path_pattern(4);
    c.bench_function("match_path4_in_ring60", |b| {
        b.iter(|| {
            let matches = black_box(&host)
                .find_matches(black_box(&pattern), &MatchConfig::default())
                .unwrap();
            black_box(matches)
        })
    });
}

fn bench_derivation(c: &mut Criterion) {
    let mut host = Graph::new();
    let v = host.add(Element::vertex()).unwrap();
    host.add(Element::edge(Some(v), None)).unwrap();

    let mut mother = Graph::new();
    let m1 = mother.add(Element::vertex()).unwrap();
    let me = mother.add(Element::edge(Some(m1), None)).unwrap();
    let mut daughter = Graph::new();
    let d1 = daughter.add(Element::vertex()).unwrap();
    let d2 = daughter.add(Element::vertex()).unwrap();
    let de1 = daughter.add(Element::edge(Some(d1), None)).unwrap();
    daughter.add(Element::edge(Some(d1), Some(d2))).unwrap();
    let mapping: Mapping = [(m1, d1), (me, de1)].into_iter().collect();
    let option = ProductionOption::new(&mother, mapping, daughter);
    let grammar = Grammar::new(vec![Production::new(mother, vec![option])]);

    c.bench_function("derive_20_steps", |b| {
        b.iter(|| {
            let mut rng = ChaCha8Rng::seed_from_u64(17);
            let steps = grammar
                .apply(black_box(&host), &StepLimits::total(20), &mut rng)
                .unwrap();
            black_box(steps)
        })
    });
}

criterion_group!(benches, bench_matching, bench_derivation);
criterion_main!(benches);
