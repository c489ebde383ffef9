//! Subgraph monomorphism search.
//!
//! Finds every injective, adjacency-preserving embedding of a pattern graph
//! into a host graph. The host may carry extra structure; attribute
//! comparison follows the subset semantics of
//! [`Element::matches`](crate::graph::Element::matches).

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::Result;
use crate::graph::{CompiledPattern, ElementId, ElementKind, Graph, IterOrder, Topology};
use crate::mapping::Mapping;

/// Knobs for one matching run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchConfig {
    /// Treat string attribute values on the pattern as boolean conditions
    /// evaluated against the candidate.
    pub eval_attrs: bool,
    /// Require candidate vertices to preserve the pattern's relative
    /// left/right and top/bottom ordering.
    pub geometric_order: bool,
}

/// All mappings of `pattern` into `host`.
///
/// The search is a backtracking walk over the pattern in connected order:
/// each task extends a partial mapping by one pattern element, drawing
/// candidates from the frontier of the already-mapped host region. Results
/// are deduplicated by mapping equality. Exponential in the worst case.
pub fn find_matches(host: &Graph, pattern: &Graph, config: &MatchConfig) -> Result<Vec<Mapping>> {
    let order = pattern.element_list(IterOrder::Connected);
    if order.is_empty() {
        return Ok(vec![Mapping::new()]);
    }
    // Attribute conditions parse once, outside the candidate loops.
    let compiled: FxHashMap<ElementId, CompiledPattern> = pattern
        .elements()
        .map(|(id, el)| (id, CompiledPattern::of(el, config.eval_attrs)))
        .collect();
    let anchor = order[0];
    let anchor_pattern = compiled.get(&anchor).ok_or_else(|| {
        crate::error::EngineError::Argument(format!("pattern element {anchor} missing"))
    })?;

    let mut results: Vec<Mapping> = Vec::new();
    for (host_id, host_element) in host.elements() {
        if !anchor_pattern.matches(host_element)? {
            continue;
        }
        let mut seed = Mapping::new();
        seed.insert(anchor, host_id);
        search(host, pattern, &compiled, &order, config, seed, 1, &mut results)?;
    }
    debug!(
        matches = results.len(),
        pattern_size = pattern.len(),
        host_size = host.len(),
        "pattern matching finished"
    );
    Ok(results)
}

/// Depth-first extension of one partial mapping.
#[allow(clippy::too_many_arguments)]
fn search(
    host: &Graph,
    pattern: &Graph,
    compiled: &FxHashMap<ElementId, CompiledPattern>,
    order: &[ElementId],
    config: &MatchConfig,
    mapping: Mapping,
    index: usize,
    results: &mut Vec<Mapping>,
) -> Result<()> {
    if index == order.len() {
        if check_matching(host, pattern, compiled, &mapping)? && !results.contains(&mapping) {
            results.push(mapping);
        }
        return Ok(());
    }
    let target_id = order[index];
    let target = match pattern.element(target_id) {
        Some(el) => el,
        None => return Ok(()),
    };
    let images: Vec<ElementId> = mapping.images().collect();
    let has_mapped_neighbour = target
        .neighbour_refs()
        .iter()
        .any(|q| mapping.contains(*q));
    // Faces are never listed in a vertex's or edge's references, so the
    // frontier cannot reach them; face targets always scan the host's
    // faces. Other connecting elements draw candidates from the mapped
    // region's frontier, and a re-anchored component (no mapped neighbour)
    // falls back to a full scan.
    let candidates: Vec<ElementId> = if target.kind() == ElementKind::Face {
        host.faces().collect()
    } else if has_mapped_neighbour {
        host.subgraph_neighbours(&images)
    } else {
        host.elements().map(|(id, _)| id).collect()
    };
    for candidate_id in candidates {
        if mapping.contains_image(candidate_id) {
            continue;
        }
        let candidate = match host.element(candidate_id) {
            Some(el) => el,
            None => continue,
        };
        let conditions = match compiled.get(&target_id) {
            Some(conditions) => conditions,
            None => continue,
        };
        if !conditions.matches(candidate)? {
            continue;
        }
        if !adjacency_compatible(host, pattern, &mapping, target_id, candidate_id) {
            continue;
        }
        if config.geometric_order
            && !geometric_order_holds(host, pattern, &mapping, target_id, candidate_id)
        {
            continue;
        }
        let mut extended = mapping.clone();
        extended.insert(target_id, candidate_id);
        search(host, pattern, compiled, order, config, extended, index + 1, results)?;
    }
    Ok(())
}

/// Check that mapping `target -> candidate` preserves every adjacency the
/// pattern requires between `target` and its already-mapped neighbours,
/// including endpoint roles of directed edges.
fn adjacency_compatible(
    host: &Graph,
    pattern: &Graph,
    mapping: &Mapping,
    target_id: ElementId,
    candidate_id: ElementId,
) -> bool {
    let target = match pattern.element(target_id) {
        Some(el) => el,
        None => return false,
    };
    let candidate = match host.element(candidate_id) {
        Some(el) => el,
        None => return false,
    };
    match &target.topology {
        Topology::Edge { vertex1, vertex2 } => {
            let (c1, c2) = candidate.endpoints();
            if target.is_directed() {
                // Role-preserving: vertex1 maps onto vertex1, vertex2 onto
                // vertex2. A dangling pattern endpoint constrains nothing.
                for (pattern_end, candidate_end) in [(vertex1, c1), (vertex2, c2)] {
                    if let Some(image) = pattern_end.and_then(|p| mapping.get(p)) {
                        if candidate_end != Some(image) {
                            return false;
                        }
                    }
                }
            } else {
                let image1 = vertex1.and_then(|p| mapping.get(p));
                let image2 = vertex2.and_then(|p| mapping.get(p));
                let fits = |a: Option<ElementId>, b: Option<ElementId>| {
                    a.map_or(true, |x| c1 == Some(x)) && b.map_or(true, |x| c2 == Some(x))
                };
                if !fits(image1, image2) && !fits(image2, image1) {
                    return false;
                }
            }
        }
        Topology::Vertex { edges } => {
            for &pattern_edge in edges {
                let image = match mapping.get(pattern_edge) {
                    Some(image) => image,
                    None => continue,
                };
                let host_edge = match host.element(image) {
                    Some(el) => el,
                    None => return false,
                };
                let (c1, c2) = host_edge.endpoints();
                let pattern_edge_el = match pattern.element(pattern_edge) {
                    Some(el) => el,
                    None => return false,
                };
                let (p1, p2) = pattern_edge_el.endpoints();
                if pattern_edge_el.is_directed() {
                    let role1 = p1 == Some(target_id) && c1 == Some(candidate_id);
                    let role2 = p2 == Some(target_id) && c2 == Some(candidate_id);
                    if !role1 && !role2 {
                        return false;
                    }
                } else if c1 != Some(candidate_id) && c2 != Some(candidate_id) {
                    return false;
                }
            }
        }
        Topology::Face { vertices, edges } => {
            let (candidate_vertices, candidate_edges) = match &candidate.topology {
                Topology::Face { vertices, edges } => (vertices, edges),
                _ => return false,
            };
            for &member in vertices {
                if let Some(image) = mapping.get(member) {
                    if !candidate_vertices.contains(&image) {
                        return false;
                    }
                }
            }
            for &member in edges {
                if let Some(image) = mapping.get(member) {
                    if !candidate_edges.contains(&image) {
                        return false;
                    }
                }
            }
        }
    }
    true
}

/// Relative-order constraint between the candidate and the already mapped,
/// positioned pattern vertices adjacent to the target through its incident
/// edges. Non-adjacent pattern pairs impose no order, and a zero difference
/// on an axis in the pattern leaves that axis unconstrained.
fn geometric_order_holds(
    host: &Graph,
    pattern: &Graph,
    mapping: &Mapping,
    target_id: ElementId,
    candidate_id: ElementId,
) -> bool {
    let target = match pattern.element(target_id) {
        Some(el) => el,
        None => return true,
    };
    let target_pos = target.position();
    let candidate_pos = host.element(candidate_id).and_then(|el| el.position());
    let (target_pos, candidate_pos) = match (target_pos, candidate_pos) {
        (Some(t), Some(c)) => (t, c),
        _ => return true,
    };
    let mut adjacent: FxHashSet<ElementId> = FxHashSet::default();
    for edge_id in target.incident_edges() {
        if let Some(edge) = pattern.element(edge_id) {
            let (a, b) = edge.endpoints();
            for v in [a, b].into_iter().flatten() {
                if v != target_id {
                    adjacent.insert(v);
                }
            }
        }
    }
    for (pattern_id, host_id) in mapping.iter() {
        if !adjacent.contains(&pattern_id) {
            continue;
        }
        let other_pos = pattern.element(pattern_id).and_then(|el| el.position());
        let other_image_pos = host.element(host_id).and_then(|el| el.position());
        let (other_pos, other_image_pos) = match (other_pos, other_image_pos) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        for (pattern_delta, host_delta) in [
            (target_pos.x - other_pos.x, candidate_pos.x - other_image_pos.x),
            (target_pos.y - other_pos.y, candidate_pos.y - other_image_pos.y),
        ] {
            if pattern_delta > 0.0 && host_delta <= 0.0 {
                return false;
            }
            if pattern_delta < 0.0 && host_delta >= 0.0 {
                return false;
            }
        }
    }
    true
}

/// Final full-adjacency validation of a complete mapping.
fn check_matching(
    host: &Graph,
    pattern: &Graph,
    compiled: &FxHashMap<ElementId, CompiledPattern>,
    mapping: &Mapping,
) -> Result<bool> {
    for (pattern_id, host_id) in mapping.iter() {
        let conditions = match compiled.get(&pattern_id) {
            Some(conditions) => conditions,
            None => return Ok(false),
        };
        let host_element = match host.element(host_id) {
            Some(el) => el,
            None => return Ok(false),
        };
        if !conditions.matches(host_element)? {
            return Ok(false);
        }
        if !adjacency_compatible(host, pattern, mapping, pattern_id, host_id) {
            return Ok(false);
        }
    }
    Ok(true)
}
