//! The five-level production application hierarchy and the rewrite itself.
//!
//! One application spans five graphs:
//! `Result (R) - Host (H) - Mother (M) - Daughter (D) - Copy (C)`,
//! linked by four invertible correspondences. R is the mutable copy of H
//! that becomes the step's output; C is a fresh copy of D whose elements
//! are grafted into R. [`Hierarchy::map`] walks the chain hop by hop; a
//! missing link is how deleted (M-only) and newly introduced (D-only)
//! elements announce themselves.

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::expr::{Env, Expr, ExprError, Value};
use crate::geometry::{PointSummary, Vec2};
use crate::graph::{
    is_meta_key, Element, ElementId, Graph, IdSet, Rewire, Topology, ATTR_NEW_POS,
    ATTR_NEW_X, ATTR_NEW_Y, ATTR_X, ATTR_Y,
};
use crate::mapping::Mapping;
use crate::production::{Production, ProductionOption, VarScope, VectorDef};

/// The five levels, ordered Result to Copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Result,
    Host,
    Mother,
    Daughter,
    Copy,
}

impl Level {
    fn rank(self) -> u8 {
        match self {
            Level::Result => 0,
            Level::Host => 1,
            Level::Mother => 2,
            Level::Daughter => 3,
            Level::Copy => 4,
        }
    }
}

/// The four correspondences of one production application.
#[derive(Debug)]
pub struct Hierarchy {
    /// H to R (identity by construction, ids are preserved on copy).
    host_to_result: Mapping,
    /// M to H, from the match.
    mother_to_host: Mapping,
    /// M to D, from the option.
    mother_to_daughter: Mapping,
    /// D to C (identity by construction).
    daughter_to_copy: Mapping,
}

impl Hierarchy {
    pub fn new(
        host_to_result: Mapping,
        mother_to_host: Mapping,
        mother_to_daughter: Mapping,
        daughter_to_copy: Mapping,
    ) -> Self {
        Hierarchy {
            host_to_result,
            mother_to_host,
            mother_to_daughter,
            daughter_to_copy,
        }
    }

    /// Follow the chain of correspondences from `from` to `to`, one hop at
    /// a time. `None` means the element has no counterpart at the target
    /// level, which is a meaningful signal rather than an error.
    pub fn map(&self, element: ElementId, from: Level, to: Level) -> Option<ElementId> {
        let mut current = element;
        let mut rank = from.rank();
        let target = to.rank();
        while rank < target {
            current = match rank {
                0 => self.host_to_result.get_inverse(current)?,
                1 => self.mother_to_host.get_inverse(current)?,
                2 => self.mother_to_daughter.get(current)?,
                _ => self.daughter_to_copy.get(current)?,
            };
            rank += 1;
        }
        while rank > target {
            current = match rank {
                1 => self.host_to_result.get(current)?,
                2 => self.mother_to_host.get(current)?,
                3 => self.mother_to_daughter.get_inverse(current)?,
                _ => self.daughter_to_copy.get_inverse(current)?,
            };
            rank -= 1;
        }
        Some(current)
    }
}

/// Apply `option` of `production` to `host` at the match `mother_to_host`,
/// returning a fresh result graph. The host itself is never mutated.
///
/// Phases run in strict order so the reciprocity invariant holds at every
/// intermediate state the next phase observes:
/// 1. sever dropped edge/vertex connections,
/// 2. delete `to_remove` images,
/// 3. graft `to_add` copies under fresh ids, with placement and
///    generation stamping,
/// 4. re-point kept edges and faces at their daughter-prescribed
///    neighbours,
/// 5. recompute attributes from daughter expressions,
/// 6. validate integrity.
pub fn apply_production(
    host: &Graph,
    production: &Production,
    option: &ProductionOption,
    mother_to_host: &Mapping,
    run_env: &Env,
) -> Result<Graph> {
    let (mut result, host_to_result) = host.copy_with_mapping();
    let (copy, daughter_to_copy) = option.daughter.copy_with_mapping();
    let hierarchy = Hierarchy::new(
        host_to_result,
        mother_to_host.clone(),
        option.mapping.clone(),
        daughter_to_copy,
    );

    let map_required = |element: ElementId, from: Level, to: Level| -> Result<ElementId> {
        hierarchy.map(element, from, to).ok_or_else(|| {
            EngineError::IncongruentGraphState(format!(
                "element {element} has no counterpart along {from:?} -> {to:?}"
            ))
        })
    };

    // Generation stamp for grafted elements.
    let matched_generation = mother_to_host
        .images()
        .filter_map(|id| host.element(id).map(|el| el.generation))
        .max()
        .unwrap_or_else(|| host.max_generation());
    let new_generation = matched_generation + 1;

    // Phase 1: sever connections the daughter drops between kept elements.
    for &(mother_edge, mother_vertex) in option.edge_conns_to_remove() {
        let result_edge = map_required(mother_edge, Level::Mother, Level::Result)?;
        let result_vertex = map_required(mother_vertex, Level::Mother, Level::Result)?;
        result.rewire(result_edge, |id| {
            if id == result_vertex {
                Rewire::Detach
            } else {
                Rewire::Keep
            }
        })?;
        result.rewire(result_vertex, |id| {
            if id == result_edge {
                Rewire::Detach
            } else {
                Rewire::Keep
            }
        })?;
    }

    // Phase 2: delete removed elements, tolerating references among them.
    let removed: Vec<ElementId> = option
        .to_remove()
        .iter()
        .map(|&m| map_required(m, Level::Mother, Level::Result))
        .collect::<Result<_>>()?;
    let removed_set: IdSet = removed.iter().copied().collect();
    for &id in &removed {
        result.discard_tolerant(id, &removed_set)?;
    }

    // Phase 3: graft the copies of new elements under fresh result ids.
    let mut grafted: FxHashMap<ElementId, ElementId> = FxHashMap::default();
    for &daughter_id in option.to_add() {
        let copy_id = map_required(daughter_id, Level::Daughter, Level::Copy)?;
        grafted.insert(copy_id, result.allocate_id());
    }
    // Insertion tolerates references to other not-yet-inserted copies and
    // to kept elements whose own connections are re-pointed in phase 4.
    let mut tolerated: IdSet = grafted.values().copied().collect();
    for &daughter_id in option.to_change() {
        tolerated.insert(map_required(daughter_id, Level::Daughter, Level::Result)?);
    }

    let host_points = summary_points(host, mother_to_host.images());
    let mother_points = summary_points(&production.mother, production.mother.vertices());
    let daughter_points = summary_points(&option.daughter, option.daughter.vertices());
    let host_summary = PointSummary::of(&host_points);
    let mother_summary = PointSummary::of(&mother_points);
    let daughter_summary = PointSummary::of(&daughter_points);

    // Resolve a copy-level reference into the result graph.
    let resolve = |reference: ElementId| -> Option<ElementId> {
        if let Some(&fresh) = grafted.get(&reference) {
            return Some(fresh);
        }
        let target = hierarchy.map(reference, Level::Copy, Level::Result)?;
        if removed_set.contains(&target) {
            return None;
        }
        Some(target)
    };

    let geometric = !host_points.is_empty();
    for &daughter_id in option.to_add() {
        let copy_id = map_required(daughter_id, Level::Daughter, Level::Copy)?;
        let mut element = copy
            .element(copy_id)
            .ok_or_else(|| {
                EngineError::IncongruentGraphState(format!(
                    "copy graph lost element {copy_id}"
                ))
            })?
            .clone();
        element.topology = resolve_topology(&element.topology, &resolve);
        if element.is_vertex() && geometric {
            let placed = place_vertex(
                element.position(),
                &host_summary,
                &mother_summary,
                &daughter_summary,
            );
            element.set_attr(ATTR_X, placed.x);
            element.set_attr(ATTR_Y, placed.y);
        }
        element.generation = new_generation;
        result.insert_with_id(grafted[&copy_id], element, &tolerated)?;
    }

    // Phase 4: point kept edges and faces at their daughter-prescribed
    // neighbours. Vertex incident sets follow through edge reciprocity.
    for &daughter_id in option.to_change() {
        let result_id = map_required(daughter_id, Level::Daughter, Level::Result)?;
        let daughter_element = option.daughter.element(daughter_id).ok_or_else(|| {
            EngineError::IncongruentGraphState(format!(
                "daughter graph lost element {daughter_id}"
            ))
        })?;
        match &daughter_element.topology {
            Topology::Edge { vertex1, vertex2 } => {
                // Daughter ids double as copy ids, the copy preserves them.
                let new1 = vertex1.and_then(|v| resolve(v));
                let new2 = vertex2.and_then(|v| resolve(v));
                repoint_edge(&mut result, result_id, new1, new2)?;
            }
            Topology::Face { vertices, edges } => {
                let new_vertices: IndexSet<ElementId> =
                    vertices.iter().filter_map(|&v| resolve(v)).collect();
                let new_edges: IndexSet<ElementId> =
                    edges.iter().filter_map(|&e| resolve(e)).collect();
                if let Some(face) = result.element_mut(result_id) {
                    face.topology = Topology::Face {
                        vertices: new_vertices,
                        edges: new_edges,
                    };
                }
            }
            Topology::Vertex { .. } => {}
        }
    }

    // Phase 5: recompute attributes.
    let mut base_env = run_env.clone();
    bind_vectors(&mut base_env, production, host, mother_to_host)?;
    for variable in &option.variables {
        if variable.scope == VarScope::OncePerApplication {
            let value = variable.expr.eval(&base_env)?;
            base_env.bind(variable.name.clone(), value);
        }
    }
    for &daughter_id in option.to_change().iter().chain(option.to_add()) {
        let result_id = match hierarchy.map(daughter_id, Level::Daughter, Level::Result) {
            Some(id) => id,
            None => {
                let copy_id = map_required(daughter_id, Level::Daughter, Level::Copy)?;
                grafted[&copy_id]
            }
        };
        let mut env = base_env.clone();
        if let Some(host_id) = hierarchy.map(daughter_id, Level::Daughter, Level::Host) {
            if let Some(old) = host.element(host_id) {
                env.bind_attrs("old", &old.attrs);
            }
        }
        if let Some(requirements) = option.requirements.get(&daughter_id) {
            for (name, &mother_id) in requirements {
                let host_id = mother_to_host.get(mother_id).ok_or_else(|| {
                    EngineError::Argument(format!(
                        "requirement '{name}' references unmatched element {mother_id}"
                    ))
                })?;
                if let Some(source) = host.element(host_id) {
                    env.bind_attrs(name, &source.attrs);
                }
            }
        }
        let daughter_element = option.daughter.element(daughter_id).ok_or_else(|| {
            EngineError::IncongruentGraphState(format!(
                "daughter graph lost element {daughter_id}"
            ))
        })?;
        recompute_attrs(&mut result, result_id, daughter_element, &env)?;
    }

    // Phase 6: the result must be consistent or the rule set is broken.
    result.check_integrity(&IdSet::default())?;
    debug!(
        removed = removed.len(),
        added = option.to_add().len(),
        changed = option.to_change().len(),
        result_size = result.len(),
        "applied production option"
    );
    Ok(result)
}

fn summary_points(
    graph: &Graph,
    ids: impl Iterator<Item = ElementId>,
) -> Vec<Vec2> {
    ids.filter_map(|id| graph.element(id).and_then(|el| el.position()))
        .collect()
}

/// Transplant a daughter-space position into host space: scale the
/// barycenter-relative offset by the host/mother extent ratio, rotate by
/// the difference of principal orientations, translate to the host
/// barycenter. A vertex with no daughter position lands on the host
/// barycenter.
fn place_vertex(
    daughter_pos: Option<Vec2>,
    host: &PointSummary,
    mother: &PointSummary,
    daughter: &PointSummary,
) -> Vec2 {
    let offset = match daughter_pos {
        Some(pos) => pos - daughter.barycenter,
        None => Vec2::default(),
    };
    let scale = if host.extent > f64::EPSILON && mother.extent > f64::EPSILON {
        host.extent / mother.extent
    } else {
        1.0
    };
    let angle = host.orientation - mother.orientation;
    host.barycenter + offset.scale(scale).rotate(angle)
}

/// Map a not-yet-inserted element's references; unresolved references are
/// dropped (a dangling endpoint for edges).
fn resolve_topology(
    topology: &Topology,
    resolve: impl Fn(ElementId) -> Option<ElementId>,
) -> Topology {
    match topology {
        Topology::Vertex { edges } => Topology::Vertex {
            edges: edges.iter().filter_map(|&e| resolve(e)).collect(),
        },
        Topology::Edge { vertex1, vertex2 } => Topology::Edge {
            vertex1: vertex1.and_then(&resolve),
            vertex2: vertex2.and_then(&resolve),
        },
        Topology::Face { vertices, edges } => Topology::Face {
            vertices: vertices.iter().filter_map(|&v| resolve(v)).collect(),
            edges: edges.iter().filter_map(|&e| resolve(e)).collect(),
        },
    }
}

/// Re-point an edge's endpoints, keeping both sides of the connection in
/// step.
fn repoint_edge(
    result: &mut Graph,
    edge_id: ElementId,
    new1: Option<ElementId>,
    new2: Option<ElementId>,
) -> Result<()> {
    let (old1, old2) = result
        .element(edge_id)
        .ok_or_else(|| {
            EngineError::IncongruentGraphState(format!("result graph lost edge {edge_id}"))
        })?
        .endpoints();
    for old in [old1, old2].into_iter().flatten() {
        if Some(old) != new1 && Some(old) != new2 {
            if let Some(vertex) = result.element_mut(old) {
                if let Topology::Vertex { edges } = &mut vertex.topology {
                    edges.shift_remove(&edge_id);
                }
            }
        }
    }
    for new in [new1, new2].into_iter().flatten() {
        match result.element_mut(new) {
            Some(vertex) => {
                if let Topology::Vertex { edges } = &mut vertex.topology {
                    edges.insert(edge_id);
                }
            }
            None => {
                return Err(EngineError::IncongruentGraphState(format!(
                    "edge {edge_id} re-pointed at missing vertex {new}"
                )));
            }
        }
    }
    if let Some(edge) = result.element_mut(edge_id) {
        edge.topology = Topology::Edge {
            vertex1: new1,
            vertex2: new2,
        };
    }
    Ok(())
}

/// Named vectors over matched host geometry, bound as `Vec2` values.
fn bind_vectors(
    env: &mut Env,
    production: &Production,
    host: &Graph,
    mother_to_host: &Mapping,
) -> Result<()> {
    for (name, def) in &production.vectors {
        let value = vector_value(def, host, mother_to_host).map_err(|detail| {
            EngineError::Argument(format!("vector '{name}': {detail}"))
        })?;
        env.bind(name.clone(), Value::Vec2(value));
    }
    Ok(())
}

fn vector_value(
    def: &VectorDef,
    host: &Graph,
    mother_to_host: &Mapping,
) -> std::result::Result<Vec2, String> {
    let position = |mother_id: ElementId| -> std::result::Result<Vec2, String> {
        let host_id = mother_to_host
            .get(mother_id)
            .ok_or_else(|| format!("element {mother_id} is not matched"))?;
        host.element(host_id)
            .and_then(|el| el.position())
            .ok_or_else(|| format!("matched element {host_id} has no position"))
    };
    let from = position(def.from)?;
    match def.to {
        Some(to) => Ok(position(to)? - from),
        None => Ok(from),
    }
}

/// Write the daughter's attributes onto the result element, evaluating
/// string values as expressions. Strings that fail to parse, or bare
/// names without a binding, are copied verbatim (labels are data); other
/// evaluation failures abort the run. `new_x`/`new_y` and `.new_pos` redirect into the
/// coordinate attributes; `x`/`y` themselves are daughter-space sketch
/// coordinates and never copied; remaining reserved keys are copied
/// untouched.
fn recompute_attrs(
    result: &mut Graph,
    result_id: ElementId,
    daughter_element: &Element,
    env: &Env,
) -> Result<()> {
    for (key, raw) in &daughter_element.attrs {
        match key.as_str() {
            ATTR_X | ATTR_Y => continue,
            ATTR_NEW_X | ATTR_NEW_Y => {
                let num = coordinate_value(key, raw, env)?.as_num()?;
                let target = if key == ATTR_NEW_X { ATTR_X } else { ATTR_Y };
                result.set_attr(result_id, target, num)?;
                continue;
            }
            ATTR_NEW_POS => {
                let pos = coordinate_value(key, raw, env)?.as_vec2()?;
                result.set_attr(result_id, ATTR_X, pos.x)?;
                result.set_attr(result_id, ATTR_Y, pos.y)?;
                continue;
            }
            _ => {}
        }
        if is_meta_key(key) {
            result.set_attr(result_id, key, raw.clone())?;
            continue;
        }
        match raw {
            serde_json::Value::String(source) => match evaluate(source, env)? {
                Some(value) => result.set_attr(result_id, key, value.to_json())?,
                None => result.set_attr(result_id, key, raw.clone())?,
            },
            other => result.set_attr(result_id, key, other.clone())?,
        }
    }
    Ok(())
}

/// A coordinate-writing attribute must produce a usable value, literal or
/// evaluated; there is no fallback for it.
fn coordinate_value(key: &str, raw: &serde_json::Value, env: &Env) -> Result<Value> {
    match raw {
        serde_json::Value::String(source) => evaluate(source, env)?.ok_or_else(|| {
            EngineError::Argument(format!("attribute '{key}': '{source}' does not evaluate"))
        }),
        other => Ok(Value::from_json(other)),
    }
}

/// Evaluate one attribute source. `Ok(None)` requests the literal
/// fallback: strings that do not parse, and bare identifiers with no
/// binding, are labels rather than formulas. An unknown identifier inside
/// a composite expression is a genuine error and aborts the run.
fn evaluate(source: &str, env: &Env) -> Result<Option<Value>> {
    let expr = match Expr::parse(source) {
        Ok(expr) => expr,
        Err(_) => return Ok(None),
    };
    match expr.eval(env) {
        Ok(value) => Ok(Some(value)),
        Err(ExprError::UnknownVariable(_)) if expr.is_bare_var() => Ok(None),
        Err(err) => Err(err.into()),
    }
}
