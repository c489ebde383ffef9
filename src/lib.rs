//! A graph-grammar derivation engine for generative modeling.
//!
//! The engine stores an attributed graph of vertices, edges and faces,
//! matches rewrite-rule patterns against it by constrained subgraph
//! isomorphism, and rewrites matched regions through a five-level
//! application hierarchy, driven by a prioritized, weighted, randomized
//! derivation loop.
//!
//! ```
//! use morphogen::{Element, Graph, Grammar, Mapping, Production, ProductionOption, StepLimits};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! // host: one vertex with a dangling edge to grow from
//! let mut host = Graph::new();
//! let v = host.add(Element::vertex()).unwrap();
//! host.add(Element::edge(Some(v), None)).unwrap();
//!
//! // rule: a dangling edge sprouts a new vertex carrying its own
//! // dangling edge, so the rule keeps applying
//! let mut mother = Graph::new();
//! let m = mother.add(Element::vertex()).unwrap();
//! let me = mother.add(Element::edge(Some(m), None)).unwrap();
//! let mut daughter = Graph::new();
//! let d = daughter.add(Element::vertex()).unwrap();
//! let tip = daughter.add(Element::vertex()).unwrap();
//! let de = daughter.add(Element::edge(Some(d), Some(tip))).unwrap();
//! daughter.add(Element::edge(Some(tip), None)).unwrap();
//! let mapping: Mapping = [(m, d), (me, de)].into_iter().collect();
//!
//! let option = ProductionOption::new(&mother, mapping, daughter);
//! let grammar = Grammar::new(vec![Production::new(mother, vec![option])]);
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(7);
//! let steps = grammar.apply(&host, &StepLimits::total(5), &mut rng).unwrap();
//! assert_eq!(steps.last().unwrap().vertex_count(), 6);
//! ```

pub mod error;
pub mod expr;
pub mod geometry;
pub mod grammar;
pub mod graph;
pub mod hierarchy;
pub mod mapping;
pub mod matcher;
pub mod persist;
pub mod production;

pub use error::{EngineError, Result};
pub use expr::{Env, Expr, ExprError, Value};
pub use geometry::{PointSummary, Vec2};
pub use grammar::{Grammar, StepLimits};
pub use graph::{Element, ElementId, ElementKind, Graph, IterOrder, Rewire, Topology};
pub use hierarchy::{Hierarchy, Level};
pub use mapping::Mapping;
pub use matcher::{find_matches, MatchConfig};
pub use production::{
    MatchConditions, Production, ProductionOption, VarScope, VariableDef, VectorDef,
};
