//! Similarity primitives (§4.1, C1): weighted Jaccard over method sets,
//! Levenshtein distance, name-token similarity, and execution-time
//! similarity. All functions here are deterministic and pure.

use std::collections::HashSet;

/// Fully-qualified production-method name prefixes treated as framework code
/// (Glossary: "Framework method").
const FRAMEWORK_PREFIXES: &[&str] = &[
    "system.",
    "microsoft.",
    "nunit.",
    "xunit.",
    "moq.",
    "autofixture.",
    "fluentassertions.",
    "newtonsoft.",
    "castle.",
];

/// Per-method weighting inputs for the weighted-Jaccard overlap (§4.1).
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedMethod {
    /// Fully-qualified production method id/name.
    pub id: String,
    /// How deep in the call chain this method was reached (`>= 1`).
    pub call_depth: u32,
    /// Baseline importance weight for this production method.
    pub production_weight: f64,
}

impl WeightedMethod {
    pub fn new(id: impl Into<String>, call_depth: u32, production_weight: f64) -> Self {
        Self {
            id: id.into(),
            call_depth: call_depth.max(1),
            production_weight,
        }
    }
}

/// Tunables for weighted Jaccard. `framework_factor` is the multiplier
/// applied to methods matching [`FRAMEWORK_PREFIXES`] — framework-internal
/// calls are real coverage but a weak coupling signal between two tests, so
/// they're down-weighted rather than excluded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JaccardWeights {
    pub decay_factor: f64,
    pub framework_factor: f64,
}

impl Default for JaccardWeights {
    fn default() -> Self {
        Self {
            decay_factor: 0.85,
            framework_factor: 0.1,
        }
    }
}

fn is_framework_method(name: &str) -> bool {
    let lower = name.to_lowercase();
    FRAMEWORK_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// `decay(d) = decayFactor^(d-1)`.
fn depth_decay(call_depth: u32, decay_factor: f64) -> f64 {
    decay_factor.powi(call_depth.saturating_sub(1) as i32)
}

/// Complexity factor: 1.2 generics, 1.1 constructors, 0.7 property
/// accessors, 1.15 async-suffixed, combined multiplicatively and clamped to
/// `[0.1, 2.0]`.
fn complexity_factor(name: &str) -> f64 {
    let mut factor = 1.0;
    if name.contains('<') && name.contains('>') {
        factor *= 1.2;
    }
    if name.ends_with(".ctor") || name.ends_with(".cctor") {
        factor *= 1.1;
    }
    let short_name = name.rsplit(['.', ':']).next().unwrap_or(name);
    if short_name.starts_with("get_") || short_name.starts_with("set_") {
        factor *= 0.7;
    }
    if name.ends_with("Async") || name.ends_with("async") {
        factor *= 1.15;
    }
    factor.clamp(0.1, 2.0)
}

fn method_weight(m: &WeightedMethod, weights: JaccardWeights) -> f64 {
    let framework_factor = if is_framework_method(&m.id) {
        weights.framework_factor
    } else {
        1.0
    };
    m.production_weight
        * framework_factor
        * depth_decay(m.call_depth, weights.decay_factor)
        * complexity_factor(&m.id)
}

/// Weighted Jaccard overlap between two weighted method sets (§4.1, §8
/// "Symmetry"). Methods are matched by `id` (case-insensitive); when the
/// same id appears in both sets with different depths/weights, the entry
/// from `a` is used for the intersection weight (the two sides describe the
/// same production method, so their weights should already agree in
/// practice).
pub fn weighted_jaccard(a: &[WeightedMethod], b: &[WeightedMethod], weights: JaccardWeights) -> f64 {
    use std::collections::HashMap;

    let a_map: HashMap<String, &WeightedMethod> =
        a.iter().map(|m| (m.id.to_lowercase(), m)).collect();
    let b_map: HashMap<String, &WeightedMethod> =
        b.iter().map(|m| (m.id.to_lowercase(), m)).collect();

    if a_map.is_empty() && b_map.is_empty() {
        return 1.0;
    }

    let mut intersection_weight = 0.0;
    let mut union_weight = 0.0;

    let all_keys: HashSet<&String> = a_map.keys().chain(b_map.keys()).collect();
    for key in all_keys {
        let in_a = a_map.get(key);
        let in_b = b_map.get(key);
        let w = match (in_a, in_b) {
            (Some(m), Some(_)) => method_weight(m, weights),
            (Some(m), None) => method_weight(m, weights),
            (None, Some(m)) => method_weight(m, weights),
            (None, None) => 0.0,
        };
        union_weight += w;
        if in_a.is_some() && in_b.is_some() {
            intersection_weight += w;
        }
    }

    if union_weight <= 0.0 {
        return 0.0;
    }

    (intersection_weight / union_weight).clamp(0.0, 1.0)
}

/// Levenshtein edit distance over Unicode scalar values. Standard DP; used
/// only for suggestion ranking (§4.1, §4.7).
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());

    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m]
}

/// Tokenize by `.`, `_`, `-`, and space; discard tokens of length `<= 2`;
/// case-insensitive.
fn tokenize_name(name: &str) -> HashSet<String> {
    name.split(['.', '_', '-', ' '])
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() > 2)
        .collect()
}

/// Case-insensitive set Jaccard over name tokens (§4.1).
pub fn name_token_similarity(a: &str, b: &str) -> f64 {
    let ta = tokenize_name(a);
    let tb = tokenize_name(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// `sqrt(min/max)` for `t1, t2 > 0`; both zero maps to 1, exactly one zero
/// maps to 0 (§4.1).
pub fn execution_time_similarity(t1: f64, t2: f64) -> f64 {
    if t1 == 0.0 && t2 == 0.0 {
        return 1.0;
    }
    if t1 == 0.0 || t2 == 0.0 {
        return 0.0;
    }
    (t1.min(t2) / t1.max(t2)).sqrt()
}
