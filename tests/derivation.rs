//! End-to-end derivation scenarios through the public API.

use morphogen::{
    persist, Element, Env, Graph, Grammar, MatchConditions, MatchConfig, Mapping, Production,
    ProductionOption, StepLimits,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

#[test]
fn deletion_of_a_matched_vertex() {
    // host: a single vertex; rule: single-vertex mother, empty daughter
    let mut host = Graph::new();
    host.add(Element::vertex()).unwrap();

    let mut mother = Graph::new();
    mother.add(Element::vertex()).unwrap();
    let option = ProductionOption::new(&mother, Mapping::new(), Graph::new());
    let grammar = Grammar::new(vec![Production::new(mother, vec![option])]);

    let steps = grammar
        .apply(&host, &StepLimits::total(1), &mut seeded(0))
        .unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].len(), 0);
    assert_eq!(host.len(), 1, "host must stay untouched");
}

#[test]
fn growth_from_a_dangling_edge() {
    let mut host = Graph::new();
    let v1 = host.add(Element::vertex()).unwrap();
    host.add(Element::edge(Some(v1), None)).unwrap();

    let mut mother = Graph::new();
    let m1 = mother.add(Element::vertex()).unwrap();
    let me = mother.add(Element::edge(Some(m1), None)).unwrap();

    let mut daughter = Graph::new();
    let d1 = daughter.add(Element::vertex()).unwrap();
    let d2 = daughter.add(Element::vertex()).unwrap();
    let de1 = daughter.add(Element::edge(Some(d1), None)).unwrap();
    daughter.add(Element::edge(Some(d1), Some(d2))).unwrap();

    let mapping: Mapping = [(m1, d1), (me, de1)].into_iter().collect();
    let option = ProductionOption::new(&mother, mapping, daughter.clone());
    let grammar = Grammar::new(vec![Production::new(mother, vec![option])]);

    let steps = grammar
        .apply(&host, &StepLimits::total(1), &mut seeded(1))
        .unwrap();
    let result = &steps[0];
    assert_eq!(result.vertex_count(), 2);
    assert_eq!(result.edge_count(), 2);
    assert!(result.is_isomorphic_to(&daughter).unwrap());
    // the new structure hangs off the surviving copy of v1
    assert!(result.contains(v1));
    assert_eq!(
        result.element(v1).unwrap().incident_edges().count(),
        2,
        "both edges must attach to the kept vertex"
    );
}

#[test]
fn eval_mode_attribute_condition_picks_one_vertex() {
    let mut host = Graph::new();
    let hit = host.add(Element::vertex().with_attr("a", 1)).unwrap();
    host.add(Element::vertex().with_attr("a", 2)).unwrap();

    let mut pattern = Graph::new();
    let pv = pattern
        .add(Element::vertex().with_attr("a", "a == 1"))
        .unwrap();

    let config = MatchConfig {
        eval_attrs: true,
        ..Default::default()
    };
    let matches = host.find_matches(&pattern, &config).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].get(pv), Some(hit));
}

#[test]
fn priority_zero_wins_across_seeds() {
    for seed in 0..25 {
        let mut host = Graph::new();
        host.add(Element::vertex()).unwrap();

        let produce = |mark: &str, priority: i32| {
            let mut mother = Graph::new();
            let m1 = mother.add(Element::vertex()).unwrap();
            let mut daughter = Graph::new();
            let d1 = daughter.add(Element::vertex().with_attr("mark", mark)).unwrap();
            let mapping: Mapping = [(m1, d1)].into_iter().collect();
            let option = ProductionOption::new(&mother, mapping, daughter);
            Production::new(mother, vec![option]).with_priority(priority)
        };
        let grammar = Grammar::new(vec![produce("slow", 1), produce("fast", 0)]);

        let steps = grammar
            .apply(&host, &StepLimits::total(1), &mut seeded(seed))
            .unwrap();
        let (_, element) = steps[0].elements().next().unwrap();
        assert_eq!(element.get_str("mark"), Some("fast"));
    }
}

#[test]
fn no_op_production_yields_isomorphic_graph() {
    let mut host = Graph::new();
    let v1 = host.add(Element::vertex().with_attr("label", "a")).unwrap();
    let v2 = host.add(Element::vertex()).unwrap();
    let e = host.add(Element::edge(Some(v1), Some(v2))).unwrap();
    host.add(Element::edge(Some(v2), None)).unwrap();
    host.add(Element::face([v1, v2], [e])).unwrap();

    let mut mother = Graph::new();
    let m1 = mother.add(Element::vertex().with_attr("label", "a")).unwrap();
    mother.add(Element::vertex()).unwrap();
    let (daughter, mapping) = mother.copy_with_mapping();
    let option = ProductionOption::new(&mother, mapping, daughter);
    let production = Production::new(mother, vec![option.clone()]);

    let matches = production.find_matches(&host).unwrap();
    assert!(!matches.is_empty());
    let result = production
        .apply(&host, &option, &matches[0], &Env::new())
        .unwrap();
    assert!(result.is_isomorphic_to(&host).unwrap());
    let _ = m1;
}

#[test]
fn derivation_is_deterministic_under_a_seed() {
    // host with three dangling growth sites; rule with two weighted
    // options marking differently, so both the match pick and the option
    // pick consume randomness
    let mut host = Graph::new();
    for _ in 0..3 {
        let v = host.add(Element::vertex()).unwrap();
        host.add(Element::edge(Some(v), None)).unwrap();
    }

    let build_grammar = || {
        let mut mother = Graph::new();
        let m1 = mother.add(Element::vertex()).unwrap();
        let me = mother.add(Element::edge(Some(m1), None)).unwrap();

        let build_option = |mark: &str, weight: u32| {
            let mut daughter = Graph::new();
            let d1 = daughter.add(Element::vertex()).unwrap();
            let d2 = daughter
                .add(Element::vertex().with_attr("mark", mark))
                .unwrap();
            let de1 = daughter.add(Element::edge(Some(d1), None)).unwrap();
            daughter.add(Element::edge(Some(d1), Some(d2))).unwrap();
            let mapping: Mapping = [(m1, d1), (me, de1)].into_iter().collect();
            ProductionOption::new(&mother, mapping, daughter).with_weight(weight)
        };
        let options = vec![build_option("left", 2), build_option("right", 1)];
        Grammar::new(vec![Production::new(mother.clone(), options)])
    };

    let fingerprint = |seed: u64| -> Vec<String> {
        let grammar = build_grammar();
        let steps = grammar
            .apply(&host, &StepLimits::total(6), &mut seeded(seed))
            .unwrap();
        steps
            .iter()
            .map(|g| {
                let mut marks: Vec<&str> = g
                    .elements()
                    .filter_map(|(_, el)| el.get_str("mark"))
                    .collect();
                marks.sort_unstable();
                format!("{}v{}e:{}", g.vertex_count(), g.edge_count(), marks.join(","))
            })
            .collect()
    };

    assert_eq!(fingerprint(1234), fingerprint(1234));
    assert_eq!(fingerprint(1234).len(), 6);
}

#[test]
fn matching_is_sound_on_embedded_patterns() {
    // embed a labelled path a-b-c inside a larger host
    let mut host = Graph::new();
    let a = host.add(Element::vertex().with_attr("l", "a")).unwrap();
    let b = host.add(Element::vertex().with_attr("l", "b")).unwrap();
    let c = host.add(Element::vertex().with_attr("l", "c")).unwrap();
    host.add(Element::edge(Some(a), Some(b))).unwrap();
    host.add(Element::edge(Some(b), Some(c))).unwrap();
    let extra = host.add(Element::vertex()).unwrap();
    host.add(Element::edge(Some(c), Some(extra))).unwrap();

    let mut pattern = Graph::new();
    let pa = pattern.add(Element::vertex().with_attr("l", "a")).unwrap();
    let pb = pattern.add(Element::vertex().with_attr("l", "b")).unwrap();
    let pc = pattern.add(Element::vertex().with_attr("l", "c")).unwrap();
    pattern.add(Element::edge(Some(pa), Some(pb))).unwrap();
    pattern.add(Element::edge(Some(pb), Some(pc))).unwrap();

    let matches = host.find_matches(&pattern, &MatchConfig::default()).unwrap();
    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!(m.get(pa), Some(a));
    assert_eq!(m.get(pb), Some(b));
    assert_eq!(m.get(pc), Some(c));
    // injective and adjacency-preserving by construction of the asserts
    assert_eq!(m.len(), 5);
}

#[test]
fn serialization_round_trip_composes_with_derivation() {
    let mut host = Graph::new();
    let v = host.add(Element::vertex().with_attr("n", 0)).unwrap();
    host.add(Element::edge(Some(v), None)).unwrap();

    // the growth site stays on the matched vertex, whose counter climbs;
    // the eval condition keeps the rule off the counter-less tip vertices
    let mut mother = Graph::new();
    let m1 = mother.add(Element::vertex().with_attr("n", "n >= 0")).unwrap();
    let me = mother.add(Element::edge(Some(m1), None)).unwrap();
    let mut daughter = Graph::new();
    let d1 = daughter
        .add(Element::vertex().with_attr("n", "old.n + 1"))
        .unwrap();
    let d2 = daughter.add(Element::vertex()).unwrap();
    let de1 = daughter.add(Element::edge(Some(d1), None)).unwrap();
    daughter.add(Element::edge(Some(d1), Some(d2))).unwrap();
    let mapping: Mapping = [(m1, d1), (me, de1)].into_iter().collect();
    let option = ProductionOption::new(&mother, mapping, daughter);
    let production = Production::new(mother, vec![option]).with_conditions(MatchConditions {
        eval_attrs: true,
        ..Default::default()
    });
    let grammar = Grammar::new(vec![production]);

    // round-trip both the host and the grammar before running
    let host = persist::graph_from_json(&persist::graph_to_json(&host).unwrap()).unwrap();
    let grammar =
        persist::grammar_from_json(&persist::grammar_to_json(&grammar).unwrap()).unwrap();

    let steps = grammar
        .apply(&host, &StepLimits::total(2), &mut seeded(5))
        .unwrap();
    assert_eq!(steps.len(), 2);
    let final_graph = &steps[1];
    assert_eq!(final_graph.vertex_count(), 3);
    let n = final_graph
        .element(v)
        .and_then(|el| el.get_f64("n"))
        .unwrap();
    assert_eq!(n, 2.0);
}

#[test]
fn generations_age_across_steps() {
    let mut host = Graph::new();
    let v = host.add(Element::vertex()).unwrap();
    host.add(Element::edge(Some(v), None)).unwrap();

    let mut mother = Graph::new();
    let m1 = mother.add(Element::vertex()).unwrap();
    let me = mother.add(Element::edge(Some(m1), None)).unwrap();
    let mut daughter = Graph::new();
    let d1 = daughter.add(Element::vertex()).unwrap();
    let d2 = daughter.add(Element::vertex()).unwrap();
    let de1 = daughter.add(Element::edge(Some(d1), Some(d2))).unwrap();
    daughter.add(Element::edge(Some(d2), None)).unwrap();
    let mapping: Mapping = [(m1, d1), (me, de1)].into_iter().collect();
    let option = ProductionOption::new(&mother, mapping, daughter);
    let grammar = Grammar::new(vec![Production::new(mother, vec![option])]);

    let steps = grammar
        .apply(&host, &StepLimits::total(3), &mut seeded(11))
        .unwrap();
    assert_eq!(steps[2].max_generation(), 3);
    // the original vertex is still generation 0
    assert_eq!(steps[2].element(v).unwrap().generation, 0);
}
