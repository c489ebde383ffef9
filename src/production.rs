//! Rewrite rules: a mother pattern, weighted daughter options, and the
//! matching conditions under which a rule fires.

use indexmap::IndexMap;
use rand::Rng;

use crate::error::{EngineError, Result};
use crate::expr::{Env, Expr};
use crate::graph::{ElementId, Graph, IterOrder};
use crate::hierarchy;
use crate::mapping::Mapping;
use crate::matcher::MatchConfig;

/// When a named variable expression is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VarScope {
    /// Once at the start of a derivation run, shared by every application.
    OncePerRun,
    /// Freshly for each application of the owning option.
    OncePerApplication,
}

/// A named expression computed into the attribute-recompute environment.
/// The source text is kept for serialization.
#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: String,
    pub source: String,
    pub expr: Expr,
    pub scope: VarScope,
}

/// A named geometric vector over matched mother elements.
///
/// With both ends set, the value is `pos(image(to)) - pos(image(from))`;
/// with only `from`, the value is that element's position as a point.
#[derive(Debug, Clone)]
pub struct VectorDef {
    pub from: ElementId,
    pub to: Option<ElementId>,
}

/// Condition flags applied when matching a production's mother pattern.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct MatchConditions {
    /// String attribute values on the mother are boolean conditions.
    pub eval_attrs: bool,
    /// Matches must preserve relative vertex ordering.
    pub geometric_order: bool,
    /// Restrict the match pick to the oldest matched subgraphs.
    pub oldest_generation: bool,
}

impl MatchConditions {
    pub(crate) fn match_config(&self) -> MatchConfig {
        MatchConfig {
            eval_attrs: self.eval_attrs,
            geometric_order: self.geometric_order,
        }
    }
}

/// One daughter graph with its mother correspondence and selection weight.
///
/// The element partition driving the rewrite is derived once at
/// construction:
/// - `to_remove`: mother elements with no daughter image,
/// - `to_change`: daughter images of mapped mother elements,
/// - `to_add`: daughter elements that are nobody's image,
/// - `edge_conns_to_remove`: kept edge endpoints whose adjacency the
///   daughter drops, severed explicitly before any deletion.
#[derive(Debug, Clone)]
pub struct ProductionOption {
    pub daughter: Graph,
    /// Mother to daughter.
    pub mapping: Mapping,
    pub weight: u32,
    /// Per daughter element: name to mother element whose matched host
    /// counterpart is exposed under that name during attribute recompute.
    pub requirements: IndexMap<ElementId, IndexMap<String, ElementId>>,
    pub variables: Vec<VariableDef>,
    pub(crate) to_remove: Vec<ElementId>,
    pub(crate) to_change: Vec<ElementId>,
    pub(crate) to_add: Vec<ElementId>,
    /// `(mother edge, mother endpoint vertex)` pairs to sever.
    pub(crate) edge_conns_to_remove: Vec<(ElementId, ElementId)>,
}

impl ProductionOption {
    pub fn new(mother: &Graph, mapping: Mapping, daughter: Graph) -> Self {
        let mut to_remove = Vec::new();
        let mut to_change = Vec::new();
        for mother_id in mother.element_list(IterOrder::Vef) {
            match mapping.get(mother_id) {
                Some(daughter_id) => to_change.push(daughter_id),
                None => to_remove.push(mother_id),
            }
        }
        let to_add: Vec<ElementId> = daughter
            .element_list(IterOrder::Vef)
            .into_iter()
            .filter(|id| !mapping.contains_image(*id))
            .collect();
        let edge_conns_to_remove = severed_connections(mother, &mapping, &daughter);
        ProductionOption {
            daughter,
            mapping,
            weight: 1,
            requirements: IndexMap::new(),
            variables: Vec::new(),
            to_remove,
            to_change,
            to_add,
            edge_conns_to_remove,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Expose the host element matched by `mother_id` under `name` while
    /// recomputing attributes of `daughter_id`.
    pub fn with_requirement(
        mut self,
        daughter_id: ElementId,
        name: impl Into<String>,
        mother_id: ElementId,
    ) -> Self {
        self.requirements
            .entry(daughter_id)
            .or_default()
            .insert(name.into(), mother_id);
        self
    }

    /// Add a named variable computed from `source` at the given scope.
    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        source: &str,
        scope: VarScope,
    ) -> Result<Self> {
        self.variables.push(VariableDef {
            name: name.into(),
            source: source.to_string(),
            expr: Expr::parse(source)?,
            scope,
        });
        Ok(self)
    }

    pub(crate) fn to_remove(&self) -> &[ElementId] {
        &self.to_remove
    }

    pub(crate) fn to_change(&self) -> &[ElementId] {
        &self.to_change
    }

    pub(crate) fn to_add(&self) -> &[ElementId] {
        &self.to_add
    }

    pub(crate) fn edge_conns_to_remove(&self) -> &[(ElementId, ElementId)] {
        &self.edge_conns_to_remove
    }
}

/// Kept edge endpoints whose adjacency disappears in the daughter.
fn severed_connections(
    mother: &Graph,
    mapping: &Mapping,
    daughter: &Graph,
) -> Vec<(ElementId, ElementId)> {
    let mut severed = Vec::new();
    for mother_edge in mother.edges() {
        let daughter_edge = match mapping.get(mother_edge) {
            Some(id) => id,
            None => continue,
        };
        let edge = match mother.element(mother_edge) {
            Some(el) => el,
            None => continue,
        };
        let (d1, d2) = daughter
            .element(daughter_edge)
            .map(|el| el.endpoints())
            .unwrap_or((None, None));
        let (m1, m2) = edge.endpoints();
        for mother_vertex in [m1, m2].into_iter().flatten() {
            let daughter_vertex = match mapping.get(mother_vertex) {
                Some(id) => id,
                None => continue,
            };
            if d1 != Some(daughter_vertex) && d2 != Some(daughter_vertex) {
                severed.push((mother_edge, mother_vertex));
            }
        }
    }
    severed
}

/// A production: mother pattern, weighted options, priority, named
/// vectors, and matching conditions.
#[derive(Debug, Clone)]
pub struct Production {
    pub mother: Graph,
    pub options: Vec<ProductionOption>,
    /// Lower priorities run first.
    pub priority: i32,
    pub vectors: IndexMap<String, VectorDef>,
    pub conditions: MatchConditions,
}

impl Production {
    pub fn new(mother: Graph, options: Vec<ProductionOption>) -> Self {
        Production {
            mother,
            options,
            priority: 0,
            vectors: IndexMap::new(),
            conditions: MatchConditions::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_vector(mut self, name: impl Into<String>, def: VectorDef) -> Self {
        self.vectors.insert(name.into(), def);
        self
    }

    pub fn with_conditions(mut self, conditions: MatchConditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn total_weight(&self) -> u64 {
        self.options.iter().map(|o| u64::from(o.weight)).sum()
    }

    /// All matches of the mother in the host under this production's
    /// conditions.
    pub fn find_matches(&self, host: &Graph) -> Result<Vec<Mapping>> {
        host.find_matches(&self.mother, &self.conditions.match_config())
    }

    /// Pick an option by weighted random choice, weight as relative
    /// frequency.
    pub fn select_option(&self, rng: &mut impl Rng) -> Result<usize> {
        let total = self.total_weight();
        if total == 0 {
            return Err(EngineError::Argument(
                "production has no option with positive weight".to_string(),
            ));
        }
        let mut roll = rng.random_range(0..total);
        for (index, option) in self.options.iter().enumerate() {
            let weight = u64::from(option.weight);
            if roll < weight {
                return Ok(index);
            }
            roll -= weight;
        }
        // total > 0 guarantees the loop returns
        Err(EngineError::Argument(
            "weighted option selection fell through".to_string(),
        ))
    }

    /// Apply one option at one match, producing a fresh result graph.
    /// `run_env` carries global and once-per-run variables.
    pub fn apply(
        &self,
        host: &Graph,
        option: &ProductionOption,
        mother_to_host: &Mapping,
        run_env: &Env,
    ) -> Result<Graph> {
        hierarchy::apply_production(host, self, option, mother_to_host, run_env)
    }
}

/// A no-op option: daughter is a structural copy of the mother under the
/// identity-by-copy mapping. Applying it leaves the host isomorphic.
pub fn identity_option(mother: &Graph) -> ProductionOption {
    let (daughter, mapping) = mother.copy_with_mapping();
    ProductionOption::new(mother, mapping, daughter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Element;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn dangling_mother() -> (Graph, ElementId, ElementId) {
        let mut mother = Graph::new();
        let m1 = mother.add(Element::vertex()).unwrap();
        let me = mother.add(Element::edge(Some(m1), None)).unwrap();
        (mother, m1, me)
    }

    #[test]
    fn test_partition_of_deleting_option() {
        let mut mother = Graph::new();
        let m1 = mother.add(Element::vertex()).unwrap();
        let option = ProductionOption::new(&mother, Mapping::new(), Graph::new());
        assert_eq!(option.to_remove(), &[m1]);
        assert!(option.to_change().is_empty());
        assert!(option.to_add().is_empty());
    }

    #[test]
    fn test_partition_of_growing_option() {
        let (mother, m1, me) = dangling_mother();

        let mut daughter = Graph::new();
        let d1 = daughter.add(Element::vertex()).unwrap();
        let d2 = daughter.add(Element::vertex()).unwrap();
        let de1 = daughter.add(Element::edge(Some(d1), None)).unwrap();
        let de2 = daughter.add(Element::edge(Some(d1), Some(d2))).unwrap();

        let mapping: Mapping = [(m1, d1), (me, de1)].into_iter().collect();
        let option = ProductionOption::new(&mother, mapping, daughter);

        assert!(option.to_remove().is_empty());
        assert_eq!(option.to_change(), &[d1, de1]);
        assert_eq!(option.to_add(), &[d2, de2]);
        assert!(option.edge_conns_to_remove().is_empty());
    }

    #[test]
    fn test_severed_connection_detection() {
        // mother: v1 -e- v2; daughter keeps all three but detaches the
        // edge from v2's image
        let mut mother = Graph::new();
        let m1 = mother.add(Element::vertex()).unwrap();
        let m2 = mother.add(Element::vertex()).unwrap();
        let me = mother.add(Element::edge(Some(m1), Some(m2))).unwrap();

        let mut daughter = Graph::new();
        let d1 = daughter.add(Element::vertex()).unwrap();
        let d2 = daughter.add(Element::vertex()).unwrap();
        let de = daughter.add(Element::edge(Some(d1), None)).unwrap();

        let mapping: Mapping = [(m1, d1), (m2, d2), (me, de)].into_iter().collect();
        let option = ProductionOption::new(&mother, mapping, daughter);

        assert_eq!(option.edge_conns_to_remove(), &[(me, m2)]);
    }

    #[test]
    fn test_identity_option_changes_everything_adds_nothing() {
        let (mother, ..) = dangling_mother();
        let option = identity_option(&mother);
        assert!(option.to_remove().is_empty());
        assert!(option.to_add().is_empty());
        assert_eq!(option.to_change().len(), mother.len());
        assert!(option.edge_conns_to_remove().is_empty());
    }

    #[test]
    fn test_weighted_option_selection_respects_weights() {
        let (mother, ..) = dangling_mother();
        let heavy = identity_option(&mother).with_weight(9);
        let light = identity_option(&mother).with_weight(1);
        let production = Production::new(mother, vec![heavy, light]);

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut picks = [0usize; 2];
        for _ in 0..200 {
            picks[production.select_option(&mut rng).unwrap()] += 1;
        }
        assert!(picks[0] > picks[1]);
        assert!(picks[1] > 0, "light option never picked in 200 draws");
    }

    #[test]
    fn test_zero_total_weight_is_an_error() {
        let (mother, ..) = dangling_mother();
        let option = identity_option(&mother).with_weight(0);
        let production = Production::new(mother, vec![option]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(production.select_option(&mut rng).is_err());
    }

    #[test]
    fn test_variable_parse_failure_propagates() {
        let (mother, ..) = dangling_mother();
        let result =
            identity_option(&mother).with_variable("n", "1 +", VarScope::OncePerRun);
        assert!(result.is_err());
    }
}
