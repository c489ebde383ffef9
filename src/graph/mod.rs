//! The attributed graph: an arena of vertices, edges, and faces with a
//! maintained edge/vertex reciprocity invariant.

mod element;

pub use element::{
    is_match_exempt, is_meta_key, AttrMap, CompiledPattern, Element, ElementId, ElementKind,
    Topology, ATTR_DIRECTED, ATTR_NEW_POS, ATTR_NEW_X, ATTR_NEW_Y, ATTR_X, ATTR_Y,
};

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::error::{EngineError, Result};
use crate::mapping::Mapping;
use crate::matcher::{self, MatchConfig};

/// Set of element ids exempted from consistency enforcement during
/// multi-phase rewrites.
pub type IdSet = FxHashSet<ElementId>;

/// Decision returned by a [`Graph::rewire`] resolver for one neighbour
/// reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewire {
    /// Leave the reference as it is.
    Keep,
    /// Point the reference at another element.
    To(ElementId),
    /// Remove the reference; for an edge endpoint this leaves the edge
    /// dangling.
    Detach,
}

/// Order of whole-graph element iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterOrder {
    /// A single connected traversal: vertices and edges interleaved so every
    /// element after the first connects to an earlier one, faces appended at
    /// the end. Disconnected remainders re-anchor on the next unvisited
    /// element.
    Connected,
    /// All vertices, then all edges, then all faces, in insertion order.
    Vef,
}

/// A graph made out of vertices, edges and faces.
///
/// Elements live in an insertion-ordered arena keyed by [`ElementId`].
/// Invariant at rest: every present edge endpoint belongs to the graph and
/// lists the edge in its incident set, and vice versa.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    elements: IndexMap<ElementId, Element>,
    vertices: IndexSet<ElementId>,
    edges: IndexSet<ElementId>,
    faces: IndexSet<ElementId>,
    next_id: u32,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Element access ====================

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    /// Set one attribute on an element.
    pub fn set_attr(
        &mut self,
        id: ElementId,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> Result<()> {
        let element = self
            .elements
            .get_mut(&id)
            .ok_or_else(|| EngineError::Argument(format!("no element {id} in graph")))?;
        element.set_attr(key, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn vertices(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.vertices.iter().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.edges.iter().copied()
    }

    pub fn faces(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.faces.iter().copied()
    }

    /// All elements with their ids, in insertion order.
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.elements.iter().map(|(id, el)| (*id, el))
    }

    /// Highest generation tag among present elements, 0 when empty.
    pub fn max_generation(&self) -> u64 {
        self.elements
            .values()
            .map(|el| el.generation)
            .max()
            .unwrap_or(0)
    }

    // ==================== Mutation ====================

    /// Add an element, maintaining reciprocity with its referenced
    /// neighbours. The element's generation is stamped to the current
    /// maximum generation among present elements (0 for a root element).
    pub fn add(&mut self, element: Element) -> Result<ElementId> {
        self.add_tolerant(element, &IdSet::default())
    }

    /// Like [`Graph::add`], but references to elements in `ignore` may be
    /// absent from the graph without raising `IncongruentGraphState`. Used
    /// while grafting groups of mutually referencing elements.
    pub fn add_tolerant(&mut self, mut element: Element, ignore: &IdSet) -> Result<ElementId> {
        element.generation = self.max_generation();
        let id = self.allocate_id();
        self.insert_with_id(id, element, ignore)?;
        Ok(id)
    }

    /// Reserve a fresh id without inserting anything yet.
    pub(crate) fn allocate_id(&mut self) -> ElementId {
        let id = ElementId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a pre-built element under a reserved or externally assigned
    /// id, preserving its generation tag.
    pub(crate) fn insert_with_id(
        &mut self,
        id: ElementId,
        element: Element,
        ignore: &IdSet,
    ) -> Result<()> {
        if self.elements.contains_key(&id) {
            return Err(EngineError::Argument(format!(
                "element id {id} is already occupied"
            )));
        }
        if id.raw() >= self.next_id {
            self.next_id = id.raw() + 1;
        }
        match &element.topology {
            Topology::Vertex { edges } => {
                for &edge_id in edges {
                    match self.elements.get(&edge_id) {
                        Some(edge) => {
                            let (v1, v2) = edge.endpoints();
                            if v1 != Some(id) && v2 != Some(id) && !ignore.contains(&edge_id) {
                                return Err(EngineError::IncongruentGraphState(format!(
                                    "vertex {id} lists edge {edge_id} which does not \
                                     reference it back"
                                )));
                            }
                        }
                        None if ignore.contains(&edge_id) => {}
                        None => {
                            return Err(EngineError::IncongruentGraphState(format!(
                                "vertex {id} lists edge {edge_id} which is not in the graph"
                            )));
                        }
                    }
                }
                self.vertices.insert(id);
            }
            Topology::Edge { vertex1, vertex2 } => {
                for vertex_id in [*vertex1, *vertex2].into_iter().flatten() {
                    match self.elements.get_mut(&vertex_id) {
                        Some(vertex) => match &mut vertex.topology {
                            Topology::Vertex { edges } => {
                                edges.insert(id);
                            }
                            _ => {
                                return Err(EngineError::Argument(format!(
                                    "edge {id} endpoint {vertex_id} is not a vertex"
                                )));
                            }
                        },
                        None if ignore.contains(&vertex_id) => {}
                        None => {
                            return Err(EngineError::IncongruentGraphState(format!(
                                "edge {id} endpoint {vertex_id} is not in the graph"
                            )));
                        }
                    }
                }
                self.edges.insert(id);
            }
            Topology::Face { vertices, edges } => {
                for &member in vertices.iter().chain(edges.iter()) {
                    if !self.elements.contains_key(&member) && !ignore.contains(&member) {
                        return Err(EngineError::IncongruentGraphState(format!(
                            "face {id} references {member} which is not in the graph"
                        )));
                    }
                }
                self.faces.insert(id);
            }
        }
        self.elements.insert(id, element);
        Ok(())
    }

    /// Remove an element, maintaining reciprocity: a removed vertex leaves
    /// its surviving incident edges dangling, a removed edge disappears
    /// from endpoint incident sets and face boundaries.
    pub fn discard(&mut self, id: ElementId) -> Result<Element> {
        self.discard_tolerant(id, &IdSet::default())
    }

    /// Like [`Graph::discard`], but stale references to elements in
    /// `ignore` are tolerated (they are expected to be mid-removal).
    pub fn discard_tolerant(&mut self, id: ElementId, ignore: &IdSet) -> Result<Element> {
        let element = self
            .elements
            .shift_remove(&id)
            .ok_or_else(|| EngineError::Argument(format!("no element {id} in graph")))?;
        match element.kind() {
            ElementKind::Vertex => {
                self.vertices.shift_remove(&id);
            }
            ElementKind::Edge => {
                self.edges.shift_remove(&id);
            }
            ElementKind::Face => {
                self.faces.shift_remove(&id);
            }
        }
        match &element.topology {
            Topology::Vertex { edges } => {
                for &edge_id in edges {
                    match self.elements.get_mut(&edge_id) {
                        Some(edge) => {
                            if let Topology::Edge { vertex1, vertex2 } = &mut edge.topology {
                                if *vertex1 == Some(id) {
                                    *vertex1 = None;
                                }
                                if *vertex2 == Some(id) {
                                    *vertex2 = None;
                                }
                            }
                        }
                        None if ignore.contains(&edge_id) => {}
                        None => {
                            return Err(EngineError::IncongruentGraphState(format!(
                                "vertex {id} listed edge {edge_id} which is not in the graph"
                            )));
                        }
                    }
                }
            }
            Topology::Edge { vertex1, vertex2 } => {
                for vertex_id in [*vertex1, *vertex2].into_iter().flatten() {
                    match self.elements.get_mut(&vertex_id) {
                        Some(vertex) => {
                            if let Topology::Vertex { edges } = &mut vertex.topology {
                                edges.shift_remove(&id);
                            }
                        }
                        None if ignore.contains(&vertex_id) => {}
                        None => {
                            return Err(EngineError::IncongruentGraphState(format!(
                                "edge {id} referenced vertex {vertex_id} which is not in \
                                 the graph"
                            )));
                        }
                    }
                }
            }
            Topology::Face { .. } => {}
        }
        // Scrub the removed element out of face boundaries.
        let face_ids: Vec<ElementId> = self.faces.iter().copied().collect();
        for face_id in face_ids {
            if let Some(face) = self.elements.get_mut(&face_id) {
                if let Topology::Face { vertices, edges } = &mut face.topology {
                    vertices.shift_remove(&id);
                    edges.shift_remove(&id);
                }
            }
        }
        trace!(%id, "discarded element");
        Ok(element)
    }

    /// Rewire one element's neighbour references through a resolver.
    ///
    /// This is a low-level tool for multi-phase rewrites: it does not
    /// update the other side of the connection, so callers are expected to
    /// re-establish reciprocity before the graph is next at rest.
    pub fn rewire(
        &mut self,
        id: ElementId,
        mut resolver: impl FnMut(ElementId) -> Rewire,
    ) -> Result<()> {
        let topology = self
            .elements
            .get(&id)
            .ok_or_else(|| EngineError::Argument(format!("no element {id} in graph")))?
            .topology
            .clone();
        let new_topology = match topology {
            Topology::Vertex { edges } => {
                let mut rewired = IndexSet::new();
                for edge_id in edges {
                    match resolver(edge_id) {
                        Rewire::Keep => {
                            rewired.insert(edge_id);
                        }
                        Rewire::To(target) => {
                            self.expect_kind(target, ElementKind::Edge)?;
                            rewired.insert(target);
                        }
                        Rewire::Detach => {}
                    }
                }
                Topology::Vertex { edges: rewired }
            }
            Topology::Edge { vertex1, vertex2 } => {
                let mut resolve_endpoint = |endpoint: Option<ElementId>| -> Result<_> {
                    match endpoint {
                        None => Ok(None),
                        Some(vertex_id) => match resolver(vertex_id) {
                            Rewire::Keep => Ok(Some(vertex_id)),
                            Rewire::To(target) => {
                                self.expect_kind(target, ElementKind::Vertex)?;
                                Ok(Some(target))
                            }
                            Rewire::Detach => Ok(None),
                        },
                    }
                };
                let vertex1 = resolve_endpoint(vertex1)?;
                let vertex2 = resolve_endpoint(vertex2)?;
                Topology::Edge { vertex1, vertex2 }
            }
            Topology::Face { vertices, edges } => {
                let mut rewired_vertices = IndexSet::new();
                for vertex_id in vertices {
                    match resolver(vertex_id) {
                        Rewire::Keep => {
                            rewired_vertices.insert(vertex_id);
                        }
                        Rewire::To(target) => {
                            rewired_vertices.insert(target);
                        }
                        Rewire::Detach => {}
                    }
                }
                let mut rewired_edges = IndexSet::new();
                for edge_id in edges {
                    match resolver(edge_id) {
                        Rewire::Keep => {
                            rewired_edges.insert(edge_id);
                        }
                        Rewire::To(target) => {
                            rewired_edges.insert(target);
                        }
                        Rewire::Detach => {}
                    }
                }
                Topology::Face {
                    vertices: rewired_vertices,
                    edges: rewired_edges,
                }
            }
        };
        if let Some(element) = self.elements.get_mut(&id) {
            element.topology = new_topology;
        }
        Ok(())
    }

    /// A wrong-kind rewire target that is already in the graph is a
    /// programming error; targets not yet inserted cannot be checked.
    fn expect_kind(&self, id: ElementId, kind: ElementKind) -> Result<()> {
        if let Some(element) = self.elements.get(&id) {
            if element.kind() != kind {
                return Err(EngineError::Argument(format!(
                    "rewire target {id} is a {:?}, expected {kind:?}",
                    element.kind()
                )));
            }
        }
        Ok(())
    }

    // ==================== Queries ====================

    /// Elements directly connected to `id` and present in the graph.
    pub fn neighbours(&self, id: ElementId) -> Result<Vec<ElementId>> {
        let element = self
            .elements
            .get(&id)
            .ok_or_else(|| EngineError::Argument(format!("no element {id} in graph")))?;
        Ok(element
            .neighbour_refs()
            .into_iter()
            .filter(|n| self.elements.contains_key(n))
            .collect())
    }

    /// Elements adjacent to, but not contained in, the given subgraph.
    ///
    /// On a full graph this is empty; on a matched region it is the
    /// frontier into the rest of the host.
    pub fn subgraph_neighbours(&self, members: &[ElementId]) -> Vec<ElementId> {
        let inside: FxHashSet<ElementId> = members.iter().copied().collect();
        let mut frontier = IndexSet::new();
        for &id in members {
            if let Some(element) = self.elements.get(&id) {
                for neighbour in element.neighbour_refs() {
                    if self.elements.contains_key(&neighbour) && !inside.contains(&neighbour) {
                        frontier.insert(neighbour);
                    }
                }
            }
        }
        frontier.into_iter().collect()
    }

    /// Element ids in the requested iteration order.
    pub fn element_list(&self, order: IterOrder) -> Vec<ElementId> {
        match order {
            IterOrder::Vef => self
                .vertices
                .iter()
                .chain(self.edges.iter())
                .chain(self.faces.iter())
                .copied()
                .collect(),
            IterOrder::Connected => self.connected_order(),
        }
    }

    fn connected_order(&self) -> Vec<ElementId> {
        let mut visited: IndexSet<ElementId> = IndexSet::new();
        loop {
            let anchor = self
                .vertices
                .iter()
                .chain(self.edges.iter())
                .copied()
                .find(|id| !visited.contains(id));
            let anchor = match anchor {
                Some(id) => id,
                None => break,
            };
            visited.insert(anchor);
            // Grow the component: scan already-visited elements, most
            // recent first, for a connecting unvisited neighbour.
            'grow: loop {
                for index in (0..visited.len()).rev() {
                    let current = visited[index];
                    let element = &self.elements[&current];
                    for neighbour in element.neighbour_refs() {
                        if let Some(next) = self.elements.get(&neighbour) {
                            if next.kind() != ElementKind::Face && !visited.contains(&neighbour)
                            {
                                visited.insert(neighbour);
                                continue 'grow;
                            }
                        }
                    }
                }
                break;
            }
        }
        let mut order: Vec<ElementId> = visited.into_iter().collect();
        order.extend(self.faces.iter().copied());
        order
    }

    // ==================== Copy & integrity ====================

    /// Structural copy preserving ids, together with the identity
    /// correspondence from this graph to the copy.
    pub fn copy_with_mapping(&self) -> (Graph, Mapping) {
        let copy = self.clone();
        let mapping = self.elements.keys().map(|id| (*id, *id)).collect();
        (copy, mapping)
    }

    /// Validate the full reciprocity invariant.
    ///
    /// Elements in `ignore` (and references to them) are exempt; used
    /// mid-rewrite. A violation is fatal and signals a rule-authoring or
    /// engine bug.
    pub fn check_integrity(&self, ignore: &IdSet) -> Result<()> {
        for (&id, element) in &self.elements {
            if ignore.contains(&id) {
                continue;
            }
            match &element.topology {
                Topology::Edge { vertex1, vertex2 } => {
                    for vertex_id in [*vertex1, *vertex2].into_iter().flatten() {
                        if ignore.contains(&vertex_id) {
                            continue;
                        }
                        let reciprocal = self.elements.get(&vertex_id).is_some_and(|vertex| {
                            matches!(
                                &vertex.topology,
                                Topology::Vertex { edges } if edges.contains(&id)
                            )
                        });
                        if !reciprocal {
                            return Err(EngineError::IncongruentGraphState(format!(
                                "edge {id} references vertex {vertex_id} without a \
                                 reciprocal incident entry"
                            )));
                        }
                    }
                }
                Topology::Vertex { edges } => {
                    for &edge_id in edges {
                        if ignore.contains(&edge_id) {
                            continue;
                        }
                        let reciprocal = self.elements.get(&edge_id).is_some_and(|edge| {
                            let (v1, v2) = edge.endpoints();
                            v1 == Some(id) || v2 == Some(id)
                        });
                        if !reciprocal {
                            return Err(EngineError::IncongruentGraphState(format!(
                                "vertex {id} lists edge {edge_id} without a reciprocal \
                                 endpoint"
                            )));
                        }
                    }
                }
                Topology::Face { vertices, edges } => {
                    for &member in vertices.iter().chain(edges.iter()) {
                        if !ignore.contains(&member) && !self.elements.contains_key(&member) {
                            return Err(EngineError::IncongruentGraphState(format!(
                                "face {id} references missing element {member}"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // ==================== Matching ====================

    /// All mappings of `pattern` into this graph. See [`matcher`].
    pub fn find_matches(&self, pattern: &Graph, config: &MatchConfig) -> Result<Vec<Mapping>> {
        matcher::find_matches(self, pattern, config)
    }

    /// True when the two graphs have equal element counts per kind and at
    /// least one full structural match exists.
    pub fn is_isomorphic_to(&self, other: &Graph) -> Result<bool> {
        if self.vertex_count() != other.vertex_count()
            || self.edge_count() != other.edge_count()
            || self.face_count() != other.face_count()
        {
            return Ok(false);
        }
        if self.is_empty() {
            return Ok(true);
        }
        let matches = self.find_matches(other, &MatchConfig::default())?;
        Ok(!matches.is_empty())
    }
}
