//! Serialization of graphs, productions, and grammars.
//!
//! Elements cross-reference each other by id, so records carry raw ids and
//! deserialization rebuilds the arena through the same insertion API the
//! core uses, which re-validates reference consistency. Vertex incident
//! sets are derived from edges and not stored.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::grammar::Grammar;
use crate::graph::{AttrMap, Element, ElementId, Graph, IdSet, Topology};
use crate::mapping::Mapping;
use crate::production::{
    MatchConditions, Production, ProductionOption, VarScope, VectorDef,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexRecord {
    pub id: u32,
    #[serde(default)]
    pub attrs: AttrMap,
    #[serde(default)]
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: u32,
    pub vertex1: Option<u32>,
    pub vertex2: Option<u32>,
    #[serde(default)]
    pub attrs: AttrMap,
    #[serde(default)]
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRecord {
    pub id: u32,
    pub vertices: Vec<u32>,
    pub edges: Vec<u32>,
    #[serde(default)]
    pub attrs: AttrMap,
    #[serde(default)]
    pub generation: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphRecord {
    pub vertices: Vec<VertexRecord>,
    pub edges: Vec<EdgeRecord>,
    #[serde(default)]
    pub faces: Vec<FaceRecord>,
}

impl GraphRecord {
    pub fn of(graph: &Graph) -> GraphRecord {
        let mut record = GraphRecord::default();
        for (id, element) in graph.elements() {
            match &element.topology {
                Topology::Vertex { .. } => record.vertices.push(VertexRecord {
                    id: id.raw(),
                    attrs: element.attrs.clone(),
                    generation: element.generation,
                }),
                Topology::Edge { vertex1, vertex2 } => record.edges.push(EdgeRecord {
                    id: id.raw(),
                    vertex1: vertex1.map(ElementId::raw),
                    vertex2: vertex2.map(ElementId::raw),
                    attrs: element.attrs.clone(),
                    generation: element.generation,
                }),
                Topology::Face { vertices, edges } => record.faces.push(FaceRecord {
                    id: id.raw(),
                    vertices: vertices.iter().map(|v| v.raw()).collect(),
                    edges: edges.iter().map(|e| e.raw()).collect(),
                    attrs: element.attrs.clone(),
                    generation: element.generation,
                }),
            }
        }
        record
    }

    /// Rebuild the graph, preserving ids. Dangling and cross references
    /// are validated by the insertion path.
    pub fn restore(&self) -> Result<Graph> {
        let mut graph = Graph::new();
        let ignore = IdSet::default();
        for vertex in &self.vertices {
            let element = Element {
                topology: Topology::Vertex {
                    edges: IndexSet::new(),
                },
                attrs: vertex.attrs.clone(),
                generation: vertex.generation,
            };
            graph.insert_with_id(ElementId::from_raw(vertex.id), element, &ignore)?;
        }
        for edge in &self.edges {
            let element = Element {
                topology: Topology::Edge {
                    vertex1: edge.vertex1.map(ElementId::from_raw),
                    vertex2: edge.vertex2.map(ElementId::from_raw),
                },
                attrs: edge.attrs.clone(),
                generation: edge.generation,
            };
            graph.insert_with_id(ElementId::from_raw(edge.id), element, &ignore)?;
        }
        for face in &self.faces {
            let element = Element {
                topology: Topology::Face {
                    vertices: face.vertices.iter().copied().map(ElementId::from_raw).collect(),
                    edges: face.edges.iter().copied().map(ElementId::from_raw).collect(),
                },
                attrs: face.attrs.clone(),
                generation: face.generation,
            };
            graph.insert_with_id(ElementId::from_raw(face.id), element, &ignore)?;
        }
        Ok(graph)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementRecord {
    pub daughter: u32,
    pub name: String,
    pub mother: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub source: String,
    pub scope: VarScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionRecord {
    pub daughter: GraphRecord,
    /// Mother id to daughter id pairs.
    pub mapping: Vec<(u32, u32)>,
    pub weight: u32,
    #[serde(default)]
    pub requirements: Vec<RequirementRecord>,
    #[serde(default)]
    pub variables: Vec<VariableRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub name: String,
    pub from: u32,
    pub to: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub mother: GraphRecord,
    pub options: Vec<OptionRecord>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub vectors: Vec<VectorRecord>,
    #[serde(default)]
    pub conditions: MatchConditions,
}

impl ProductionRecord {
    pub fn of(production: &Production) -> ProductionRecord {
        let options = production
            .options
            .iter()
            .map(|option| OptionRecord {
                daughter: GraphRecord::of(&option.daughter),
                mapping: option
                    .mapping
                    .iter()
                    .map(|(m, d)| (m.raw(), d.raw()))
                    .collect(),
                weight: option.weight,
                requirements: option
                    .requirements
                    .iter()
                    .flat_map(|(&daughter, named)| {
                        named.iter().map(move |(name, &mother)| RequirementRecord {
                            daughter: daughter.raw(),
                            name: name.clone(),
                            mother: mother.raw(),
                        })
                    })
                    .collect(),
                variables: option
                    .variables
                    .iter()
                    .map(|v| VariableRecord {
                        name: v.name.clone(),
                        source: v.source.clone(),
                        scope: v.scope,
                    })
                    .collect(),
            })
            .collect();
        ProductionRecord {
            mother: GraphRecord::of(&production.mother),
            options,
            priority: production.priority,
            vectors: production
                .vectors
                .iter()
                .map(|(name, def)| VectorRecord {
                    name: name.clone(),
                    from: def.from.raw(),
                    to: def.to.map(ElementId::raw),
                })
                .collect(),
            conditions: production.conditions,
        }
    }

    pub fn restore(&self) -> Result<Production> {
        let mother = self.mother.restore()?;
        let mut options = Vec::with_capacity(self.options.len());
        for record in &self.options {
            let daughter = record.daughter.restore()?;
            let mapping: Mapping = record
                .mapping
                .iter()
                .map(|&(m, d)| (ElementId::from_raw(m), ElementId::from_raw(d)))
                .collect();
            for &(m, d) in &record.mapping {
                if !mother.contains(ElementId::from_raw(m)) {
                    return Err(EngineError::Argument(format!(
                        "mapping references unknown mother element #{m}"
                    )));
                }
                if !daughter.contains(ElementId::from_raw(d)) {
                    return Err(EngineError::Argument(format!(
                        "mapping references unknown daughter element #{d}"
                    )));
                }
            }
            let mut option =
                ProductionOption::new(&mother, mapping, daughter).with_weight(record.weight);
            for requirement in &record.requirements {
                option = option.with_requirement(
                    ElementId::from_raw(requirement.daughter),
                    requirement.name.clone(),
                    ElementId::from_raw(requirement.mother),
                );
            }
            for variable in &record.variables {
                option =
                    option.with_variable(variable.name.clone(), &variable.source, variable.scope)?;
            }
            options.push(option);
        }
        let mut production = Production::new(mother, options)
            .with_priority(self.priority)
            .with_conditions(self.conditions);
        for vector in &self.vectors {
            production = production.with_vector(
                vector.name.clone(),
                VectorDef {
                    from: ElementId::from_raw(vector.from),
                    to: vector.to.map(ElementId::from_raw),
                },
            );
        }
        Ok(production)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrammarRecord {
    pub productions: Vec<ProductionRecord>,
    #[serde(default)]
    pub global_vars: Vec<(String, String)>,
}

impl GrammarRecord {
    pub fn of(grammar: &Grammar) -> GrammarRecord {
        GrammarRecord {
            productions: grammar.productions.iter().map(ProductionRecord::of).collect(),
            global_vars: grammar
                .global_var_sources()
                .map(|(name, source)| (name.to_string(), source.to_string()))
                .collect(),
        }
    }

    pub fn restore(&self) -> Result<Grammar> {
        let productions = self
            .productions
            .iter()
            .map(ProductionRecord::restore)
            .collect::<Result<Vec<_>>>()?;
        let mut grammar = Grammar::new(productions);
        for (name, source) in &self.global_vars {
            grammar = grammar.with_global_var(name.clone(), source)?;
        }
        Ok(grammar)
    }
}

/// JSON convenience wrappers.
pub fn graph_to_json(graph: &Graph) -> Result<String> {
    serde_json::to_string_pretty(&GraphRecord::of(graph))
        .map_err(|e| EngineError::Argument(format!("graph serialization failed: {e}")))
}

pub fn graph_from_json(json: &str) -> Result<Graph> {
    let record: GraphRecord = serde_json::from_str(json)
        .map_err(|e| EngineError::Argument(format!("graph deserialization failed: {e}")))?;
    record.restore()
}

pub fn grammar_to_json(grammar: &Grammar) -> Result<String> {
    serde_json::to_string_pretty(&GrammarRecord::of(grammar))
        .map_err(|e| EngineError::Argument(format!("grammar serialization failed: {e}")))
}

pub fn grammar_from_json(json: &str) -> Result<Grammar> {
    let record: GrammarRecord = serde_json::from_str(json)
        .map_err(|e| EngineError::Argument(format!("grammar deserialization failed: {e}")))?;
    record.restore()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> Graph {
        let mut g = Graph::new();
        let v1 = g
            .add(Element::vertex().with_attr("label", "root").with_position(1.0, 2.0))
            .unwrap();
        let v2 = g.add(Element::vertex()).unwrap();
        let e1 = g.add(Element::edge(Some(v1), Some(v2)).with_attr("directed", true)).unwrap();
        g.add(Element::edge(Some(v2), None)).unwrap();
        g.add(Element::face([v1, v2], [e1])).unwrap();
        g.element_mut(v2).unwrap().generation = 3;
        g
    }

    #[test]
    fn test_graph_round_trip_preserves_everything() {
        let graph = sample_graph();
        let json = graph_to_json(&graph).unwrap();
        let restored = graph_from_json(&json).unwrap();

        assert_eq!(restored.len(), graph.len());
        assert!(restored.is_isomorphic_to(&graph).unwrap());
        // identity correspondence: ids are preserved, attributes equal
        for (id, element) in graph.elements() {
            let other = restored.element(id).unwrap();
            assert_eq!(other.attrs, element.attrs);
            assert_eq!(other.generation, element.generation);
            assert_eq!(other.endpoints(), element.endpoints());
        }
        restored.check_integrity(&IdSet::default()).unwrap();
    }

    #[test]
    fn test_restore_rejects_edge_to_missing_vertex() {
        let record = GraphRecord {
            vertices: vec![],
            edges: vec![EdgeRecord {
                id: 0,
                vertex1: Some(7),
                vertex2: None,
                attrs: AttrMap::new(),
                generation: 0,
            }],
            faces: vec![],
        };
        assert!(record.restore().is_err());
    }

    #[test]
    fn test_restore_rejects_duplicate_ids() {
        let vertex = VertexRecord {
            id: 1,
            attrs: AttrMap::new(),
            generation: 0,
        };
        let record = GraphRecord {
            vertices: vec![vertex.clone(), vertex],
            edges: vec![],
            faces: vec![],
        };
        assert!(record.restore().is_err());
    }

    #[test]
    fn test_grammar_round_trip() {
        let mut mother = Graph::new();
        let m1 = mother.add(Element::vertex()).unwrap();
        let m2 = mother.add(Element::vertex()).unwrap();
        mother.add(Element::edge(Some(m1), Some(m2))).unwrap();

        let (daughter, mapping) = mother.copy_with_mapping();
        let option = ProductionOption::new(&mother, mapping, daughter)
            .with_weight(3)
            .with_requirement(ElementId::from_raw(0), "anchor", m2)
            .with_variable("wobble", "base * 0.5", VarScope::OncePerRun)
            .unwrap();
        let production = Production::new(mother, vec![option])
            .with_priority(2)
            .with_vector(
                "axis",
                VectorDef {
                    from: m1,
                    to: Some(m2),
                },
            );
        let grammar = Grammar::new(vec![production])
            .with_global_var("base", "4")
            .unwrap();

        let json = grammar_to_json(&grammar).unwrap();
        let restored = grammar_from_json(&json).unwrap();

        assert_eq!(restored.productions.len(), 1);
        let production = &restored.productions[0];
        assert_eq!(production.priority, 2);
        assert_eq!(production.vectors.len(), 1);
        assert_eq!(production.options[0].weight, 3);
        assert_eq!(production.options[0].variables[0].source, "base * 0.5");
        assert_eq!(
            production.options[0].requirements[&ElementId::from_raw(0)]["anchor"],
            m2
        );
        assert!(production
            .mother
            .is_isomorphic_to(&grammar.productions[0].mother)
            .unwrap());
    }

    #[test]
    fn test_restore_rejects_mapping_to_unknown_element() {
        let mut mother = Graph::new();
        mother.add(Element::vertex()).unwrap();
        let production = Production::new(mother, vec![]);
        let mut record = ProductionRecord::of(&production);
        record.options.push(OptionRecord {
            daughter: GraphRecord::default(),
            mapping: vec![(99, 0)],
            weight: 1,
            requirements: vec![],
            variables: vec![],
        });
        assert!(record.restore().is_err());
    }
}
