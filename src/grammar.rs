//! The derivation loop: prioritized, weighted, randomized application of
//! productions until caps are hit or nothing matches.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::error::Result;
use crate::expr::{Env, Expr};
use crate::graph::Graph;
use crate::mapping::Mapping;
use crate::production::{Production, VarScope};

/// Step caps for one derivation run. A cap of 0 means unlimited.
#[derive(Debug, Clone, Default)]
pub struct StepLimits {
    /// Cap on the total number of steps.
    pub all: u64,
    /// Per-priority caps.
    pub per_priority: IndexMap<i32, u64>,
}

impl StepLimits {
    pub fn total(all: u64) -> Self {
        StepLimits {
            all,
            per_priority: IndexMap::new(),
        }
    }

    pub fn with_priority_cap(mut self, priority: i32, cap: u64) -> Self {
        self.per_priority.insert(priority, cap);
        self
    }

    fn priority_exhausted(&self, priority: i32, used: u64) -> bool {
        match self.per_priority.get(&priority) {
            Some(&cap) if cap > 0 => used >= cap,
            _ => false,
        }
    }
}

/// Age profile of one match's host elements, used for the
/// oldest-generation selection policy. Ordered by weighted-average
/// generation, ties broken lexicographically on per-generation counts.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSummary {
    average: f64,
    /// `(generation, count)` pairs, ascending by generation.
    counts: Vec<(u64, usize)>,
}

impl GenerationSummary {
    pub fn of(host: &Graph, mapping: &Mapping) -> Self {
        let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
        let mut sum = 0u64;
        let mut n = 0usize;
        for image in mapping.images() {
            if let Some(element) = host.element(image) {
                *counts.entry(element.generation).or_insert(0) += 1;
                sum += element.generation;
                n += 1;
            }
        }
        let average = if n == 0 { 0.0 } else { sum as f64 / n as f64 };
        GenerationSummary {
            average,
            counts: counts.into_iter().collect(),
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        self.average
            .total_cmp(&other.average)
            .then_with(|| self.counts.cmp(&other.counts))
    }
}

/// Indices of the matches whose generation summary is minimal, the
/// "oldest" region of the host. Pure; the caller picks among them.
pub fn oldest_generation_pool(host: &Graph, matches: &[Mapping]) -> Vec<usize> {
    let summaries: Vec<GenerationSummary> = matches
        .iter()
        .map(|m| GenerationSummary::of(host, m))
        .collect();
    let minimum = match summaries
        .iter()
        .min_by(|a, b| a.compare(b))
        .cloned()
    {
        Some(min) => min,
        None => return Vec::new(),
    };
    summaries
        .iter()
        .enumerate()
        .filter(|(_, s)| s.compare(&minimum) == Ordering::Equal)
        .map(|(index, _)| index)
        .collect()
}

/// A grammar: productions grouped by priority plus globally scoped
/// variables, driving successive derivation steps over a host graph.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    pub productions: Vec<Production>,
    /// Name, source text, and parsed expression, evaluated once per run
    /// in order.
    global_vars: Vec<(String, String, Expr)>,
}

impl Grammar {
    pub fn new(productions: Vec<Production>) -> Self {
        Grammar {
            productions,
            global_vars: Vec::new(),
        }
    }

    /// Add a global variable computed once per [`Grammar::apply`] call.
    pub fn with_global_var(mut self, name: impl Into<String>, source: &str) -> Result<Self> {
        self.global_vars
            .push((name.into(), source.to_string(), Expr::parse(source)?));
        Ok(self)
    }

    /// Global variable names and source texts, in evaluation order.
    pub fn global_var_sources(&self) -> impl Iterator<Item = (&str, &str)> {
        self.global_vars
            .iter()
            .map(|(name, source, _)| (name.as_str(), source.as_str()))
    }

    /// Run the derivation loop and return the sequence of step results,
    /// oldest first. The host itself is never mutated; an empty sequence
    /// means no production applied.
    ///
    /// Each iteration scans priority groups ascending, shuffles the group,
    /// takes the first production with at least one match, picks an option
    /// by weight and a match uniformly (restricted to the oldest matched
    /// regions when the production asks for it), and applies.
    pub fn apply(
        &self,
        host: &Graph,
        limits: &StepLimits,
        rng: &mut impl Rng,
    ) -> Result<Vec<Graph>> {
        let run_env = self.run_environment()?;
        let option_envs = self.option_environments(&run_env)?;

        let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (index, production) in self.productions.iter().enumerate() {
            groups.entry(production.priority).or_default().push(index);
        }

        let mut results: Vec<Graph> = Vec::new();
        let mut total = 0u64;
        let mut used: FxHashMap<i32, u64> = FxHashMap::default();
        loop {
            if limits.all > 0 && total >= limits.all {
                break;
            }
            let current = results.last().unwrap_or(host);
            let mut chosen: Option<(i32, usize, Vec<Mapping>)> = None;
            'scan: for (&priority, members) in &groups {
                if limits.priority_exhausted(priority, used.get(&priority).copied().unwrap_or(0))
                {
                    continue;
                }
                let mut order = members.clone();
                order.shuffle(rng);
                for production_index in order {
                    let matches = self.productions[production_index].find_matches(current)?;
                    if !matches.is_empty() {
                        chosen = Some((priority, production_index, matches));
                        break 'scan;
                    }
                }
            }
            let (priority, production_index, matches) = match chosen {
                Some(found) => found,
                None => {
                    debug!(steps = total, "derivation terminal, no production matches");
                    break;
                }
            };
            let production = &self.productions[production_index];
            let option_index = production.select_option(rng)?;
            let option = &production.options[option_index];

            let pool: Vec<usize> = if production.conditions.oldest_generation {
                oldest_generation_pool(current, &matches)
            } else {
                (0..matches.len()).collect()
            };
            let pick = pool[rng.random_range(0..pool.len())];
            let env = &option_envs[&(production_index, option_index)];
            let next = production.apply(current, option, &matches[pick], env)?;
            debug!(
                step = total + 1,
                priority,
                production = production_index,
                option = option_index,
                matches = matches.len(),
                "derivation step applied"
            );
            results.push(next);
            total += 1;
            *used.entry(priority).or_insert(0) += 1;
        }
        info!(steps = results.len(), "derivation run finished");
        Ok(results)
    }

    /// Global variables, evaluated in declaration order; later ones can
    /// reference earlier ones.
    fn run_environment(&self) -> Result<Env> {
        let mut env = Env::new();
        for (name, _, expr) in &self.global_vars {
            let value = expr.eval(&env)?;
            env.bind(name.clone(), value);
        }
        Ok(env)
    }

    /// Per-option environments carrying globals plus the option's
    /// once-per-run variables.
    fn option_environments(
        &self,
        run_env: &Env,
    ) -> Result<FxHashMap<(usize, usize), Env>> {
        let mut envs = FxHashMap::default();
        for (production_index, production) in self.productions.iter().enumerate() {
            for (option_index, option) in production.options.iter().enumerate() {
                let mut env = run_env.clone();
                for variable in &option.variables {
                    if variable.scope == VarScope::OncePerRun {
                        let value = variable.expr.eval(&env)?;
                        env.bind(variable.name.clone(), value);
                    }
                }
                envs.insert((production_index, option_index), env);
            }
        }
        Ok(envs)
    }
}
