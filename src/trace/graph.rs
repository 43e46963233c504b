//! Caller graph: callee name → set of calling methods, plus the upward
//! ascent that finds the outermost originating method.
//!
//! The graph has two phases. [`CallerGraph`] accepts concurrent `add_edge`
//! calls from extraction workers. [`CallerGraph::freeze`] consumes it and
//! yields a read-only [`CallerIndex`]; ascent only works on the frozen index,
//! so reads can never interleave with writes.

use std::collections::{BTreeSet, HashMap, HashSet};

use dashmap::DashMap;
use serde::Serialize;

use super::types::MethodIdentity;

/// Code-behind files conventionally host the UI event handlers.
pub const CODE_BEHIND_SUFFIX: &str = ".aspx.cs";

static NO_CALLERS: BTreeSet<MethodIdentity> = BTreeSet::new();

// ─── Accumulation phase ─────────────────────────────────────────────

/// Concurrently writable caller graph used during extraction.
///
/// Callee side is keyed by bare method name (overload targets are not
/// resolved); caller side is a full [`MethodIdentity`].
#[derive(Debug, Default)]
pub struct CallerGraph {
    callers: DashMap<String, BTreeSet<MethodIdentity>>,
}

impl CallerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `caller` invokes a method named `callee`.
    /// Returns false when the edge was already present.
    pub fn add_edge(&self, callee: &str, caller: MethodIdentity) -> bool {
        if let Some(mut set) = self.callers.get_mut(callee) {
            return set.insert(caller);
        }
        self.callers.entry(callee.to_string()).or_default().insert(caller)
    }

    /// Snapshot of the callers recorded so far (empty for unknown names).
    pub fn callers_of(&self, callee: &str) -> BTreeSet<MethodIdentity> {
        self.callers
            .get(callee)
            .map(|set| set.value().clone())
            .unwrap_or_default()
    }

    /// Number of distinct callee names.
    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }

    /// End the accumulation phase.
    pub fn freeze(self) -> CallerIndex {
        CallerIndex {
            callers: self.callers.into_iter().collect(),
        }
    }
}

// ─── Resolution phase ───────────────────────────────────────────────

/// Read-only caller graph used during resolution.
#[derive(Debug, Default)]
pub struct CallerIndex {
    callers: HashMap<String, BTreeSet<MethodIdentity>>,
}

impl CallerIndex {
    pub fn callers_of(&self, callee: &str) -> &BTreeSet<MethodIdentity> {
        self.callers.get(callee).unwrap_or(&NO_CALLERS)
    }

    /// Number of distinct callee names.
    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }

    /// Total number of (callee, caller) edges.
    pub fn edge_count(&self) -> usize {
        self.callers.values().map(BTreeSet::len).sum()
    }
}

/// Result of ascending from one method.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Ascent {
    /// Visited methods, starting method first.
    pub chain: Vec<MethodIdentity>,
    /// Outermost method reached.
    pub top_level: MethodIdentity,
    /// Whether the ascent stopped on a re-visited method.
    pub cycle: bool,
}

/// Walk callers upward from `start` until a method with no known caller,
/// or until a method is reached a second time.
///
/// At each step only one caller is followed: callers in another file are
/// preferred over same-file helpers, code-behind callers are preferred
/// among those, and remaining ties go to the smallest `(file, name)`.
pub fn resolve_ascent(start: &MethodIdentity, index: &CallerIndex) -> Ascent {
    let mut visited: HashSet<MethodIdentity> = HashSet::new();
    let mut chain = Vec::new();
    let mut current = start.clone();

    loop {
        if !visited.insert(current.clone()) {
            return Ascent { chain, top_level: current, cycle: true };
        }
        chain.push(current.clone());

        match choose_caller(&current, index.callers_of(&current.name)) {
            Some(next) => current = next.clone(),
            None => return Ascent { chain, top_level: current, cycle: false },
        }
    }
}

/// Shorthand for `resolve_ascent(start, index).top_level`.
pub fn resolve_top_level(start: &MethodIdentity, index: &CallerIndex) -> MethodIdentity {
    resolve_ascent(start, index).top_level
}

fn choose_caller<'a>(
    current: &MethodIdentity,
    callers: &'a BTreeSet<MethodIdentity>,
) -> Option<&'a MethodIdentity> {
    let cross_file: Vec<&MethodIdentity> = callers.iter()
        .filter(|c| c.file != current.file)
        .collect();
    let candidates = if cross_file.is_empty() {
        callers.iter().collect()
    } else {
        cross_file
    };

    candidates.iter()
        .find(|c| is_code_behind(&c.file))
        .or_else(|| candidates.first())
        .copied()
}

/// Case-insensitive check for the `.aspx.cs` suffix.
pub fn is_code_behind(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(CODE_BEHIND_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(name: &str, file: &str) -> MethodIdentity {
        MethodIdentity::new(name, file)
    }

    fn index_of(edges: &[(&str, MethodIdentity)]) -> CallerIndex {
        let graph = CallerGraph::new();
        for (callee, caller) in edges {
            graph.add_edge(callee, caller.clone());
        }
        graph.freeze()
    }

    #[test]
    fn test_add_edge_is_idempotent() {
        let graph = CallerGraph::new();
        assert!(graph.add_edge("Save", m("Button_Click", "a.aspx.cs")));
        assert!(!graph.add_edge("Save", m("Button_Click", "a.aspx.cs")));
        assert_eq!(graph.callers_of("Save").len(), 1);
    }

    #[test]
    fn test_same_name_different_file_is_distinct_caller() {
        let graph = CallerGraph::new();
        graph.add_edge("Save", m("Load", "a.cs"));
        graph.add_edge("Save", m("Load", "b.cs"));
        assert_eq!(graph.callers_of("Save").len(), 2);
    }

    #[test]
    fn test_callers_of_unknown_is_empty() {
        let graph = CallerGraph::new();
        assert!(graph.callers_of("Nothing").is_empty());
        assert!(graph.freeze().callers_of("Nothing").is_empty());
    }

    #[test]
    fn test_concurrent_add_edge_loses_nothing() {
        let graph = CallerGraph::new();
        std::thread::scope(|s| {
            for t in 0..8 {
                let graph = &graph;
                s.spawn(move || {
                    for i in 0..200 {
                        graph.add_edge("Shared", m(&format!("M{}", i), &format!("f{}.cs", t)));
                    }
                });
            }
        });
        let index = graph.freeze();
        assert_eq!(index.callers_of("Shared").len(), 8 * 200);
        assert_eq!(index.edge_count(), 8 * 200);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_no_callers_is_top_level() {
        let index = index_of(&[]);
        let start = m("Submit_Click", "page.aspx.cs");
        let ascent = resolve_ascent(&start, &index);
        assert_eq!(ascent.top_level, start);
        assert_eq!(ascent.chain, vec![start]);
        assert!(!ascent.cycle);
    }

    #[test]
    fn test_linear_chain() {
        let index = index_of(&[
            ("Helper", m("Submit_Click", "page.aspx.cs")),
            ("Fetch", m("Helper", "page.aspx.cs")),
        ]);
        let ascent = resolve_ascent(&m("Fetch", "page.aspx.cs"), &index);
        assert_eq!(ascent.top_level, m("Submit_Click", "page.aspx.cs"));
        assert_eq!(ascent.chain.len(), 3);
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let index = index_of(&[
            ("A", m("B", "f.cs")),
            ("B", m("A", "f.cs")),
        ]);
        for start in [m("A", "f.cs"), m("B", "f.cs")] {
            let ascent = resolve_ascent(&start, &index);
            assert!(ascent.cycle);
            assert!(ascent.top_level == m("A", "f.cs") || ascent.top_level == m("B", "f.cs"));
        }
    }

    #[test]
    fn test_self_recursion_terminates() {
        let index = index_of(&[("Retry", m("Retry", "f.cs"))]);
        let ascent = resolve_ascent(&m("Retry", "f.cs"), &index);
        assert_eq!(ascent.top_level, m("Retry", "f.cs"));
        assert!(ascent.cycle);
    }

    #[test]
    fn test_prefers_caller_in_different_file() {
        let index = index_of(&[
            ("X", m("Y", "F1.cs")),
            ("X", m("Z", "F2.cs")),
        ]);
        assert_eq!(resolve_top_level(&m("X", "F1.cs"), &index), m("Z", "F2.cs"));
    }

    #[test]
    fn test_falls_back_to_same_file_callers() {
        let index = index_of(&[("X", m("Y", "F1.cs"))]);
        assert_eq!(resolve_top_level(&m("X", "F1.cs"), &index), m("Y", "F1.cs"));
    }

    #[test]
    fn test_prefers_code_behind_caller() {
        let index = index_of(&[
            ("Fetch", m("Run", "a/Service.cs")),
            ("Fetch", m("Btn_Click", "z/Page.ASPX.CS")),
        ]);
        assert_eq!(resolve_top_level(&m("Fetch", "lib/Api.cs"), &index), m("Btn_Click", "z/Page.ASPX.CS"));
    }

    #[test]
    fn test_tie_break_is_smallest_file() {
        let index = index_of(&[
            ("Fetch", m("Run", "b/Service.cs")),
            ("Fetch", m("Go", "a/Worker.cs")),
        ]);
        assert_eq!(resolve_top_level(&m("Fetch", "lib/Api.cs"), &index), m("Go", "a/Worker.cs"));
    }

    #[test]
    fn test_is_code_behind() {
        assert!(is_code_behind("Default.aspx.cs"));
        assert!(is_code_behind(r"C:\Portal\Orders.Aspx.Cs"));
        assert!(!is_code_behind("Default.aspx"));
        assert!(!is_code_behind("Service.cs"));
    }

    proptest! {
        /// Ascent always terminates and ends on a method it visited or on the start.
        #[test]
        fn ascent_terminates_on_random_graphs(
            edges in proptest::collection::vec((0usize..6, 0usize..6, 0usize..3), 0..40),
            start in 0usize..6,
        ) {
            let graph = CallerGraph::new();
            for (callee, caller, file) in &edges {
                graph.add_edge(&format!("M{}", callee), m(&format!("M{}", caller), &format!("f{}.cs", file)));
            }
            let index = graph.freeze();
            let start = m(&format!("M{}", start), "f0.cs");
            let ascent = resolve_ascent(&start, &index);
            prop_assert!(ascent.chain.len() <= 6 * 3 + 1);
            prop_assert!(ascent.chain.contains(&ascent.top_level));
        }

        /// Adding every edge twice yields the same index as adding it once.
        #[test]
        fn duplicate_edges_do_not_change_index(
            edges in proptest::collection::vec((0usize..5, 0usize..5), 0..30),
        ) {
            let once = CallerGraph::new();
            let twice = CallerGraph::new();
            for (callee, caller) in &edges {
                let callee = format!("M{}", callee);
                let caller = m(&format!("M{}", caller), "f.cs");
                once.add_edge(&callee, caller.clone());
                twice.add_edge(&callee, caller.clone());
                twice.add_edge(&callee, caller);
            }
            let (once, twice) = (once.freeze(), twice.freeze());
            prop_assert_eq!(once.edge_count(), twice.edge_count());
            for i in 0..5 {
                let name = format!("M{}", i);
                prop_assert_eq!(once.callers_of(&name), twice.callers_of(&name));
            }
        }
    }
}
