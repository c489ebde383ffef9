//! Graph elements: vertices, edges, and faces with attribute maps.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::expr::{Env, Expr, ExprError, Value};
use crate::geometry::Vec2;

/// Reserved attribute keys.
pub const ATTR_X: &str = "x";
pub const ATTR_Y: &str = "y";
pub const ATTR_DIRECTED: &str = "directed";
pub const ATTR_NEW_X: &str = "new_x";
pub const ATTR_NEW_Y: &str = "new_y";
pub const ATTR_NEW_POS: &str = ".new_pos";

/// Meta attributes (rendering hints and similar) start with a dot and are
/// ignored by matching and recomputation.
pub fn is_meta_key(key: &str) -> bool {
    key.starts_with('.')
}

/// Keys excluded from attribute matching: coordinates and meta attributes.
pub fn is_match_exempt(key: &str) -> bool {
    key == ATTR_X || key == ATTR_Y || is_meta_key(key)
}

/// Stable handle into a graph's element arena.
///
/// Ids are assigned monotonically per graph and never reused within one, so
/// they double as serialization identities.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ElementId(u32);

impl ElementId {
    pub fn from_raw(raw: u32) -> Self {
        ElementId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of a graph element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Vertex,
    Edge,
    Face,
}

/// Structural data of an element; the kind set is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    Vertex {
        /// Incident edges, in insertion order.
        edges: IndexSet<ElementId>,
    },
    Edge {
        /// Either endpoint may be absent: a dangling edge.
        vertex1: Option<ElementId>,
        vertex2: Option<ElementId>,
    },
    Face {
        vertices: IndexSet<ElementId>,
        edges: IndexSet<ElementId>,
    },
}

pub type AttrMap = IndexMap<String, serde_json::Value>;

/// An attributed graph element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub topology: Topology,
    pub attrs: AttrMap,
    /// Derivation-step age tag; 0 for root elements.
    pub generation: u64,
}

impl Element {
    pub fn vertex() -> Self {
        Element {
            topology: Topology::Vertex {
                edges: IndexSet::new(),
            },
            attrs: AttrMap::new(),
            generation: 0,
        }
    }

    pub fn edge(vertex1: Option<ElementId>, vertex2: Option<ElementId>) -> Self {
        Element {
            topology: Topology::Edge { vertex1, vertex2 },
            attrs: AttrMap::new(),
            generation: 0,
        }
    }

    pub fn face(
        vertices: impl IntoIterator<Item = ElementId>,
        edges: impl IntoIterator<Item = ElementId>,
    ) -> Self {
        Element {
            topology: Topology::Face {
                vertices: vertices.into_iter().collect(),
                edges: edges.into_iter().collect(),
            },
            attrs: AttrMap::new(),
            generation: 0,
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn with_position(self, x: f64, y: f64) -> Self {
        self.with_attr(ATTR_X, x).with_attr(ATTR_Y, y)
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    pub fn kind(&self) -> ElementKind {
        match self.topology {
            Topology::Vertex { .. } => ElementKind::Vertex,
            Topology::Edge { .. } => ElementKind::Edge,
            Topology::Face { .. } => ElementKind::Face,
        }
    }

    pub fn is_vertex(&self) -> bool {
        self.kind() == ElementKind::Vertex
    }

    pub fn is_edge(&self) -> bool {
        self.kind() == ElementKind::Edge
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.attrs.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.attrs.get(key).and_then(|v| v.as_bool())
    }

    /// Position from the `x`/`y` attributes, if both are present.
    pub fn position(&self) -> Option<Vec2> {
        Some(Vec2::new(self.get_f64(ATTR_X)?, self.get_f64(ATTR_Y)?))
    }

    /// True for edges carrying a truthy `directed` attribute.
    pub fn is_directed(&self) -> bool {
        self.get_bool(ATTR_DIRECTED).unwrap_or(false)
    }

    /// Incident edges of a vertex; empty for other kinds.
    pub fn incident_edges(&self) -> impl Iterator<Item = ElementId> + '_ {
        match &self.topology {
            Topology::Vertex { edges } => Some(edges.iter().copied()),
            _ => None,
        }
        .into_iter()
        .flatten()
    }

    /// Endpoints of an edge as `(vertex1, vertex2)`.
    pub fn endpoints(&self) -> (Option<ElementId>, Option<ElementId>) {
        match self.topology {
            Topology::Edge { vertex1, vertex2 } => (vertex1, vertex2),
            _ => (None, None),
        }
    }

    /// Directly connected elements: incident edges for a vertex, present
    /// endpoints for an edge, the boundary for a face.
    pub fn neighbour_refs(&self) -> Vec<ElementId> {
        match &self.topology {
            Topology::Vertex { edges } => edges.iter().copied().collect(),
            Topology::Edge { vertex1, vertex2 } => {
                vertex1.iter().chain(vertex2.iter()).copied().collect()
            }
            Topology::Face { vertices, edges } => {
                vertices.iter().chain(edges.iter()).copied().collect()
            }
        }
    }

    /// Test whether this element can stand in for `pattern`.
    ///
    /// Every non-exempt attribute key on the pattern must be present here.
    /// In literal mode the values must be equal. In eval mode a string
    /// pattern value is parsed as an expression and evaluated with this
    /// element's attributes bound as plain names; a boolean result decides
    /// the match, any other result falls back to literal comparison (plain
    /// labels are data, not formulas). Coordinates and `.`-prefixed keys are
    /// never compared.
    pub fn matches(&self, pattern: &Element, eval_attrs: bool) -> Result<bool> {
        CompiledPattern::of(pattern, eval_attrs).matches(self)
    }
}

/// A pattern element with its attribute conditions parsed once.
///
/// Matching a pattern against many candidates re-reads every condition;
/// compiling up front keeps the expression parser out of the search loop.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    kind: ElementKind,
    /// Key, literal pattern value, and the parsed condition where the value
    /// is an eval-mode string that parses.
    conditions: Vec<(String, serde_json::Value, Option<Expr>)>,
}

impl CompiledPattern {
    pub fn of(pattern: &Element, eval_attrs: bool) -> Self {
        let conditions = pattern
            .attrs
            .iter()
            .filter(|(key, _)| !is_match_exempt(key))
            .map(|(key, value)| {
                let expr = match value {
                    serde_json::Value::String(source) if eval_attrs => {
                        Expr::parse(source).ok()
                    }
                    _ => None,
                };
                (key.clone(), value.clone(), expr)
            })
            .collect();
        CompiledPattern {
            kind: pattern.kind(),
            conditions,
        }
    }

    /// Decide whether `candidate` satisfies every compiled condition.
    ///
    /// A parsed condition that evaluates to a boolean decides its key; one
    /// that references an attribute the candidate lacks, or yields a
    /// non-boolean, falls back to literal comparison. Other evaluation
    /// failures propagate.
    pub fn matches(&self, candidate: &Element) -> Result<bool> {
        if candidate.kind() != self.kind {
            return Ok(false);
        }
        let mut env: Option<Env> = None;
        for (key, literal, expr) in &self.conditions {
            let candidate_value = match candidate.attrs.get(key) {
                Some(value) => value,
                None => return Ok(false),
            };
            if let Some(expr) = expr {
                let env = env.get_or_insert_with(|| {
                    let mut env = Env::new();
                    env.bind_attrs("", &candidate.attrs);
                    env
                });
                match expr.eval(env) {
                    Ok(Value::Bool(holds)) => {
                        if !holds {
                            return Ok(false);
                        }
                        continue;
                    }
                    Ok(_) | Err(ExprError::UnknownVariable(_)) => {}
                    Err(err) => return Err(EngineError::Expr(err)),
                }
            }
            if candidate_value != literal {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_matching_subset_semantics() {
        let host = Element::vertex().with_attr("a", 1).with_attr("b", 2);
        let pattern = Element::vertex().with_attr("a", 1);
        assert!(host.matches(&pattern, false).unwrap());
        // pattern demanding more than the candidate has
        assert!(!pattern.matches(&host, false).unwrap());
        // differing value
        let other = Element::vertex().with_attr("a", 3);
        assert!(!other.matches(&pattern, false).unwrap());
        // empty pattern matches everything of the same kind
        assert!(host.matches(&Element::vertex(), false).unwrap());
    }

    #[test]
    fn test_matching_requires_same_kind() {
        let vertex = Element::vertex().with_attr("a", 1);
        let edge = Element::edge(None, None).with_attr("a", 1);
        assert!(!vertex.matches(&edge, false).unwrap());
        assert!(!edge.matches(&vertex, false).unwrap());
    }

    #[test]
    fn test_matching_exempts_coordinates_and_meta_keys() {
        let host = Element::vertex().with_attr("label", "a");
        let pattern = Element::vertex()
            .with_attr("label", "a")
            .with_position(4.0, 5.0)
            .with_attr(".render_hint", "circle");
        assert!(host.matches(&pattern, false).unwrap());
    }

    #[test]
    fn test_eval_mode_binds_candidate_attributes() {
        let pattern = Element::vertex().with_attr("a", "a == 1");
        let yes = Element::vertex().with_attr("a", 1);
        let no = Element::vertex().with_attr("a", 2);
        assert!(yes.matches(&pattern, true).unwrap());
        assert!(!no.matches(&pattern, true).unwrap());
        // without eval mode the condition string is an ordinary value
        assert!(!yes.matches(&pattern, false).unwrap());
    }

    #[test]
    fn test_eval_mode_plain_labels_compare_literally() {
        let pattern = Element::vertex().with_attr("label", "a");
        let yes = Element::vertex().with_attr("label", "a");
        let no = Element::vertex().with_attr("label", "b");
        assert!(yes.matches(&pattern, true).unwrap());
        assert!(!no.matches(&pattern, true).unwrap());
    }

    #[test]
    fn test_compiled_pattern_reused_across_candidates() {
        let pattern = Element::vertex().with_attr("a", "a < 3");
        let compiled = CompiledPattern::of(&pattern, true);
        assert!(compiled.matches(&Element::vertex().with_attr("a", 1)).unwrap());
        assert!(!compiled.matches(&Element::vertex().with_attr("a", 5)).unwrap());
        // a candidate without the key never matches
        assert!(!compiled.matches(&Element::vertex()).unwrap());
    }

    #[test]
    fn test_directed_flag_and_position() {
        let edge = Element::edge(None, None).with_attr(ATTR_DIRECTED, true);
        assert!(edge.is_directed());
        assert!(!Element::edge(None, None).is_directed());

        let vertex = Element::vertex().with_position(1.0, -2.0);
        assert_eq!(vertex.position(), Some(Vec2::new(1.0, -2.0)));
        assert_eq!(Element::vertex().position(), None);
    }

    #[test]
    fn test_neighbour_refs() {
        let v1 = ElementId::from_raw(1);
        let v2 = ElementId::from_raw(2);
        let edge = Element::edge(Some(v1), None);
        assert_eq!(edge.neighbour_refs(), vec![v1]);
        let full = Element::edge(Some(v1), Some(v2));
        assert_eq!(full.neighbour_refs(), vec![v1, v2]);
    }
}
