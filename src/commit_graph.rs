//! Commit DAG traversal: an arena of parsed commits keyed by fingerprint
//! with a per-commit flag bitset, date- and topo-ordered walking, merge-base
//! computation, and bisection midpoint selection — grounded on `commit.c`'s
//! `paint_down_to_common`/`get_merge_bases`/`mark_parents_uninteresting`.

use std::collections::{HashMap, HashSet};

use crate::{errors::GitError, hash::Fingerprint, internal::object::commit::Commit};

/// Bits a revision walk or merge-base computation attaches to a commit.
/// The first seven mirror the ones `rev-list`/`describe` expose to callers;
/// the last four (`PARENT1` on) are private to the merge-base algorithm.
pub mod flags {
    pub const UNINTERESTING: u32 = 1 << 0;
    pub const SEEN: u32 = 1 << 1;
    pub const BOUNDARY: u32 = 1 << 2;
    pub const TREECHANGE: u32 = 1 << 3;
    pub const TREESAME: u32 = 1 << 4;
    pub const CHILD_SHOWN: u32 = 1 << 5;
    pub const SHOWN: u32 = 1 << 6;

    pub(super) const PARENT1: u32 = 1 << 7;
    pub(super) const PARENT2: u32 = 1 << 8;
    pub(super) const STALE: u32 = 1 << 9;
    pub(super) const RESULT: u32 = 1 << 10;
}

/// `info/grafts`-style parent overrides: a commit's real parent list, as
/// read from its object, can be replaced wholesale by a grafted one so
/// history can be presented as shallower or differently shaped than the
/// stored objects actually record.
#[derive(Debug, Default, Clone)]
pub struct GraftTable {
    overrides: HashMap<Fingerprint, Vec<Fingerprint>>,
}

impl GraftTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `info/grafts` lines: `"<commit> <parent1> <parent2> ..."`,
    /// one per line, blank lines and `#`-prefixed comments ignored.
    pub fn parse(content: &str) -> Result<Self, GitError> {
        let mut overrides = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let commit = parts
                .next()
                .ok_or_else(|| GitError::Malformed("empty graft line".to_string()))?
                .parse::<Fingerprint>()
                .map_err(GitError::Malformed)?;
            let parents = parts
                .map(|p| p.parse::<Fingerprint>().map_err(GitError::Malformed))
                .collect::<Result<Vec<_>, _>>()?;
            overrides.insert(commit, parents);
        }
        Ok(Self { overrides })
    }

    pub fn parents_of(&self, commit: Fingerprint, real_parents: &[Fingerprint]) -> Vec<Fingerprint> {
        self.overrides
            .get(&commit)
            .cloned()
            .unwrap_or_else(|| real_parents.to_vec())
    }
}

/// `shallow` file: one fingerprint per line naming a commit whose parents
/// were deliberately not fetched. Represented as a [`GraftTable`] whose
/// override is always the empty parent list, per §4.5's grafts-as-shallow-
/// boundaries note.
#[derive(Debug, Default, Clone)]
pub struct ShallowFile {
    grafts: GraftTable,
}

impl ShallowFile {
    pub fn parse(content: &str) -> Result<Self, GitError> {
        let mut overrides = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let commit = line.parse::<Fingerprint>().map_err(GitError::Malformed)?;
            overrides.insert(commit, Vec::new());
        }
        Ok(Self { grafts: GraftTable { overrides } })
    }

    pub fn is_shallow(&self, commit: Fingerprint) -> bool {
        self.grafts.overrides.contains_key(&commit)
    }

    /// Hand the boundary list over as the graft table a [`CommitGraph`]
    /// actually consults; a commit's real parents are simply never asked
    /// for once it's listed here.
    pub fn into_graft_table(self) -> GraftTable {
        self.grafts
    }
}

/// Arena of parsed commits keyed by fingerprint, with per-commit flag
/// storage the walker and merge-base algorithm mutate in place.
#[derive(Debug, Default)]
pub struct CommitGraph {
    commits: HashMap<Fingerprint, Commit>,
    bits: HashMap<Fingerprint, u32>,
    grafts: GraftTable,
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grafts(grafts: GraftTable) -> Self {
        Self {
            grafts,
            ..Self::default()
        }
    }

    pub fn insert(&mut self, commit: Commit) -> Fingerprint {
        let id = commit.id;
        self.commits.insert(id, commit);
        self.bits.entry(id).or_insert(0);
        id
    }

    pub fn get(&self, id: Fingerprint) -> Option<&Commit> {
        self.commits.get(&id)
    }

    pub fn contains(&self, id: Fingerprint) -> bool {
        self.commits.contains_key(&id)
    }

    pub fn flags(&self, id: Fingerprint) -> u32 {
        *self.bits.get(&id).unwrap_or(&0)
    }

    pub fn set_flags(&mut self, id: Fingerprint, bits: u32) {
        *self.bits.entry(id).or_insert(0) |= bits;
    }

    pub fn clear_flags(&mut self, id: Fingerprint, bits: u32) {
        if let Some(f) = self.bits.get_mut(&id) {
            *f &= !bits;
        }
    }

    pub fn has_all_flags(&self, id: Fingerprint, bits: u32) -> bool {
        self.flags(id) & bits == bits
    }

    /// Effective parent list, with any graft override applied.
    pub fn parents(&self, id: Fingerprint) -> Vec<Fingerprint> {
        match self.commits.get(&id) {
            Some(c) => self.grafts.parents_of(id, &c.parent_commit_ids),
            None => Vec::new(),
        }
    }

    fn timestamp(&self, id: Fingerprint) -> i64 {
        self.commits.get(&id).map(|c| c.author.timestamp).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// Newest-author-timestamp first.
    Date,
    /// Children strictly before their parents.
    Topo,
    /// Parents strictly before their children (topo, reversed).
    ReverseTopo,
}

/// A bounded revision walk: one or more starting points, plus zero or more
/// excluded (`hide`) starting points whose entire history is removed from
/// the result and flagged `UNINTERESTING`.
pub struct RevWalk<'g> {
    graph: &'g mut CommitGraph,
    order: WalkOrder,
    roots: Vec<Fingerprint>,
    excluded_roots: Vec<Fingerprint>,
}

impl<'g> RevWalk<'g> {
    pub fn new(graph: &'g mut CommitGraph, order: WalkOrder) -> Self {
        Self {
            graph,
            order,
            roots: Vec::new(),
            excluded_roots: Vec::new(),
        }
    }

    pub fn push(&mut self, id: Fingerprint) {
        self.graph.set_flags(id, flags::SEEN);
        self.roots.push(id);
    }

    pub fn hide(&mut self, id: Fingerprint) {
        self.graph.set_flags(id, flags::SEEN | flags::UNINTERESTING);
        self.excluded_roots.push(id);
    }

    fn excluded_closure(&self) -> HashSet<Fingerprint> {
        let mut excluded = HashSet::new();
        let mut stack = self.excluded_roots.clone();
        while let Some(id) = stack.pop() {
            if !excluded.insert(id) {
                continue;
            }
            stack.extend(self.graph.parents(id));
        }
        excluded
    }

    fn reachable_closure(&self, excluded: &HashSet<Fingerprint>) -> HashSet<Fingerprint> {
        let mut closure = HashSet::new();
        let mut stack = self.roots.clone();
        while let Some(id) = stack.pop() {
            if excluded.contains(&id) || !closure.insert(id) {
                continue;
            }
            stack.extend(self.graph.parents(id));
        }
        closure
    }

    /// Run the walk and mutate the graph's `UNINTERESTING`/`BOUNDARY`/`SEEN`
    /// flags for every commit touched, returning the interesting commits in
    /// the requested order.
    pub fn walk(&mut self) -> Vec<Fingerprint> {
        let excluded = self.excluded_closure();
        for &id in &excluded {
            self.graph.set_flags(id, flags::UNINTERESTING | flags::SEEN);
        }
        let closure = self.reachable_closure(&excluded);
        for &id in &closure {
            self.graph.set_flags(id, flags::SEEN);
            let is_boundary = self
                .graph
                .parents(id)
                .iter()
                .any(|p| excluded.contains(p) && !closure.contains(p));
            if is_boundary {
                self.graph.set_flags(id, flags::BOUNDARY);
            }
        }

        match self.order {
            WalkOrder::Date => self.walk_date(&closure),
            WalkOrder::Topo => self.walk_topo(&closure),
            WalkOrder::ReverseTopo => {
                let mut v = self.walk_topo(&closure);
                v.reverse();
                v
            }
        }
    }

    fn walk_date(&self, closure: &HashSet<Fingerprint>) -> Vec<Fingerprint> {
        let mut items: Vec<Fingerprint> = closure.iter().copied().collect();
        items.sort_by(|a, b| self.graph.timestamp(*b).cmp(&self.graph.timestamp(*a)).then(a.cmp(b)));
        items
    }

    /// Kahn's algorithm over the closure, where an edge runs from a commit
    /// to its parent: a node becomes ready once every child within the
    /// closure has already been emitted, so children always precede
    /// parents in the output.
    fn walk_topo(&self, closure: &HashSet<Fingerprint>) -> Vec<Fingerprint> {
        let mut remaining_children: HashMap<Fingerprint, usize> =
            closure.iter().map(|&id| (id, 0)).collect();
        for &id in closure {
            for p in self.graph.parents(id) {
                if closure.contains(&p) {
                    *remaining_children.get_mut(&p).unwrap() += 1;
                }
            }
        }

        let mut ready: Vec<Fingerprint> = closure
            .iter()
            .copied()
            .filter(|id| remaining_children[id] == 0)
            .collect();
        ready.sort_by_key(|id| std::cmp::Reverse(self.graph.timestamp(*id)));

        let mut out = Vec::with_capacity(closure.len());
        while let Some(id) = ready.pop() {
            out.push(id);
            for p in self.graph.parents(id) {
                if let Some(count) = remaining_children.get_mut(&p) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(p);
                    }
                }
            }
        }
        out
    }
}

/// Merge bases of exactly two commits, via the two-coloring walk: paint
/// `one`'s ancestry `PARENT1`, `two`'s ancestry `PARENT2`, and every commit
/// that ends up painted both is a candidate common ancestor. A candidate
/// that is itself an ancestor of another candidate is stale and dropped.
pub fn merge_bases_two(graph: &CommitGraph, one: Fingerprint, two: Fingerprint) -> Vec<Fingerprint> {
    use flags::{PARENT1, PARENT2, RESULT};

    let mut paint: HashMap<Fingerprint, u32> = HashMap::new();
    let mut queue: Vec<Fingerprint> = vec![one, two];
    paint.insert(one, PARENT1);
    *paint.entry(two).or_insert(0) |= PARENT2;

    let mut results = Vec::new();
    // Process in date order so a common ancestor is recognized before its
    // own ancestors are queued, matching the C original's priority queue.
    while !queue.is_empty() {
        queue.sort_by_key(|id| graph.timestamp(*id));
        let id = queue.pop().unwrap();
        let my_flags = *paint.get(&id).unwrap_or(&0);

        if my_flags & (PARENT1 | PARENT2) == (PARENT1 | PARENT2) && my_flags & RESULT == 0 {
            *paint.get_mut(&id).unwrap() |= RESULT;
            results.push(id);
        }

        for p in graph.parents(id) {
            let existing = *paint.get(&p).unwrap_or(&0);
            let propagated = existing | (my_flags & (PARENT1 | PARENT2));
            if propagated != existing {
                paint.insert(p, propagated);
                queue.push(p);
            }
        }
    }

    strip_stale_bases(graph, results)
}

/// Drop any candidate base that is itself reachable from another candidate
/// base — it doesn't bound the merge any tighter than the other one does.
fn strip_stale_bases(graph: &CommitGraph, candidates: Vec<Fingerprint>) -> Vec<Fingerprint> {
    let candidate_set: HashSet<Fingerprint> = candidates.iter().copied().collect();
    let mut stale = HashSet::new();
    for &base in &candidates {
        let mut stack = graph.parents(base);
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if candidate_set.contains(&id) {
                stale.insert(id);
            }
            stack.extend(graph.parents(id));
        }
    }
    candidates.into_iter().filter(|c| !stale.contains(c)).collect()
}

/// Merge bases of an arbitrary number of commits, folded pairwise: the
/// bases of `[a, b, c]` are the union of `merge_bases_two` applied between
/// the running result set and each subsequent commit.
pub fn merge_bases(graph: &CommitGraph, commits: &[Fingerprint]) -> Vec<Fingerprint> {
    let Some((&first, rest)) = commits.split_first() else {
        return Vec::new();
    };
    let mut bases = vec![first];
    for &next in rest {
        let mut union = HashSet::new();
        for &b in &bases {
            union.extend(merge_bases_two(graph, b, next));
        }
        bases = union.into_iter().collect();
    }
    bases
}

/// `true` if `ancestor` is reachable from `descendant` by following parent
/// edges (a commit is its own ancestor).
pub fn is_ancestor(graph: &CommitGraph, ancestor: Fingerprint, descendant: Fingerprint) -> bool {
    if ancestor == descendant {
        return true;
    }
    let mut stack = vec![descendant];
    let mut seen = HashSet::new();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if id == ancestor {
            return true;
        }
        stack.extend(graph.parents(id));
    }
    false
}

/// Pick the commit reachable from `bad` (excluding anything reachable from
/// `good`) whose own ancestor count within that set is closest to half —
/// the commit that best bisects the remaining history.
/// `git describe`'s core: walk `start`'s ancestry and report the nearest
/// reachable tag as `<tag>-<N>-g<fingerprint>`, `N` the number of commits
/// since the tag. Tags are supplied as a fingerprint-to-name map (the
/// caller resolves `refs/tags/*` via a ref store); an exact tag hit
/// reports the bare name with no suffix, matching `describe.c`.
pub fn describe(graph: &mut CommitGraph, start: Fingerprint, tags: &HashMap<Fingerprint, String>) -> Option<String> {
    if let Some(name) = tags.get(&start) {
        return Some(name.clone());
    }
    let mut walker = RevWalk::new(graph, WalkOrder::Topo);
    walker.push(start);
    let order = walker.walk();
    for (distance, commit) in order.into_iter().enumerate() {
        if let Some(name) = tags.get(&commit) {
            return Some(format!("{name}-{distance}-g{}", &start.to_hex()[..7]));
        }
    }
    None
}

pub fn bisect_midpoint(graph: &CommitGraph, bad: Fingerprint, good: &[Fingerprint]) -> Option<Fingerprint> {
    let mut excluded = HashSet::new();
    for &g in good {
        let mut stack = vec![g];
        while let Some(id) = stack.pop() {
            if excluded.insert(id) {
                stack.extend(graph.parents(id));
            }
        }
    }

    let mut candidates = HashSet::new();
    let mut stack = vec![bad];
    while let Some(id) = stack.pop() {
        if excluded.contains(&id) || !candidates.insert(id) {
            continue;
        }
        stack.extend(graph.parents(id));
    }

    if candidates.is_empty() {
        return None;
    }

    let total = candidates.len();
    let mut ancestor_counts: HashMap<Fingerprint, usize> = HashMap::new();
    for &c in &candidates {
        let mut count = 0usize;
        let mut stack = vec![c];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if id != c && candidates.contains(&id) {
                count += 1;
            }
            stack.extend(graph.parents(id));
        }
        ancestor_counts.insert(c, count);
    }

    let target = (total.saturating_sub(1)) / 2;
    candidates.into_iter().min_by_key(|c| {
        let count = ancestor_counts[c];
        (count as isize - target as isize).unsigned_abs()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::object::signature::{Signature, SignatureType};

    fn sig(n: i64) -> Signature {
        Signature::new(SignatureType::Author, "a".to_string(), "a@example.com".to_string(), n, 0)
    }

    fn make_commit(tree_seed: &[u8], parents: Vec<Fingerprint>, seed: i64) -> Commit {
        Commit::new(sig(seed), sig(seed), Fingerprint::of_bytes(tree_seed), parents, &format!("c{seed}"))
    }

    /// Builds: root -> a -> b -> c (linear chain).
    fn linear_chain(graph: &mut CommitGraph) -> Vec<Fingerprint> {
        let root = graph.insert(make_commit(b"t0", vec![], 0));
        let a = graph.insert(make_commit(b"t1", vec![root], 1));
        let b = graph.insert(make_commit(b"t2", vec![a], 2));
        let c = graph.insert(make_commit(b"t3", vec![b], 3));
        vec![root, a, b, c]
    }

    #[test]
    fn topo_order_respects_parent_child_edges() {
        let mut graph = CommitGraph::new();
        let chain = linear_chain(&mut graph);
        let mut walk = RevWalk::new(&mut graph, WalkOrder::Topo);
        walk.push(*chain.last().unwrap());
        let order = walk.walk();
        assert_eq!(order, vec![chain[3], chain[2], chain[1], chain[0]]);
    }

    #[test]
    fn hide_excludes_ancestor_history() {
        let mut graph = CommitGraph::new();
        let chain = linear_chain(&mut graph);
        let mut walk = RevWalk::new(&mut graph, WalkOrder::Topo);
        walk.push(chain[3]);
        walk.hide(chain[1]);
        let order = walk.walk();
        assert_eq!(order, vec![chain[3], chain[2]]);
    }

    #[test]
    fn merge_base_of_diverged_branches() {
        let mut graph = CommitGraph::new();
        let root = graph.insert(make_commit(b"t0", vec![], 0));
        let base = graph.insert(make_commit(b"t1", vec![root], 1));
        let left = graph.insert(make_commit(b"t2", vec![base], 2));
        let right = graph.insert(make_commit(b"t3", vec![base], 3));
        let bases = merge_bases_two(&graph, left, right);
        assert_eq!(bases, vec![base]);
    }

    #[test]
    fn merge_base_of_ancestor_and_descendant_is_the_ancestor() {
        let mut graph = CommitGraph::new();
        let chain = linear_chain(&mut graph);
        let bases = merge_bases_two(&graph, chain[1], chain[3]);
        assert_eq!(bases, vec![chain[1]]);
    }

    #[test]
    fn independent_roots_have_no_merge_base() {
        let mut graph = CommitGraph::new();
        let a = graph.insert(make_commit(b"ta", vec![], 10));
        let b = graph.insert(make_commit(b"tb", vec![], 20));
        assert!(merge_bases_two(&graph, a, b).is_empty());
    }

    #[test]
    fn is_ancestor_checks_reachability() {
        let mut graph = CommitGraph::new();
        let chain = linear_chain(&mut graph);
        assert!(is_ancestor(&graph, chain[0], chain[3]));
        assert!(!is_ancestor(&graph, chain[3], chain[0]));
    }

    #[test]
    fn graft_table_overrides_parents() {
        // Build the real chain once to learn the child's fingerprint, then
        // graft it to look rootless in a fresh graph carrying that table.
        let mut plain = CommitGraph::new();
        let root = plain.insert(make_commit(b"t0", vec![], 0));
        let child_commit = make_commit(b"t1", vec![root], 1);
        let child = child_commit.id;

        let grafts = GraftTable::parse(&format!("{}\n", child.to_hex())).unwrap();
        let mut grafted = CommitGraph::with_grafts(grafts);
        grafted.insert(child_commit);

        assert!(grafted.parents(child).is_empty());
    }

    #[test]
    fn bisect_picks_the_commit_closest_to_the_middle() {
        let mut graph = CommitGraph::new();
        let chain = linear_chain(&mut graph);
        // Candidates are {a, b, c}; `b` has exactly one candidate ancestor
        // (`a`), bisecting the three-commit range most evenly.
        let mid = bisect_midpoint(&graph, chain[3], &[chain[0]]);
        assert_eq!(mid, Some(chain[2]));
    }

    #[test]
    fn shallow_file_grafts_empty_parents() {
        let root = Fingerprint::of_bytes(b"boundary");
        let shallow = ShallowFile::parse(&format!("{}\n", root.to_hex())).unwrap();
        assert!(shallow.is_shallow(root));
        let grafts = shallow.into_graft_table();
        assert!(grafts.parents_of(root, &[Fingerprint::of_bytes(b"hidden-parent")]).is_empty());
    }

    #[test]
    fn describe_reports_exact_tag_with_no_suffix() {
        let mut graph = CommitGraph::new();
        let chain = linear_chain(&mut graph);
        let mut tags = HashMap::new();
        tags.insert(chain[1], "v1.0".to_string());
        assert_eq!(describe(&mut graph, chain[1], &tags), Some("v1.0".to_string()));
    }

    #[test]
    fn describe_counts_commits_since_the_nearest_tag() {
        let mut graph = CommitGraph::new();
        let chain = linear_chain(&mut graph);
        let mut tags = HashMap::new();
        tags.insert(chain[1], "v1.0".to_string());
        let described = describe(&mut graph, chain[3], &tags).unwrap();
        assert_eq!(described, format!("v1.0-2-g{}", &chain[3].to_hex()[..7]));
    }

    #[test]
    fn describe_finds_nothing_without_a_reachable_tag() {
        let mut graph = CommitGraph::new();
        let chain = linear_chain(&mut graph);
        assert_eq!(describe(&mut graph, chain[3], &HashMap::new()), None);
    }

    /// Property 3 (merge-base symmetry): for any linear chain, the merge
    /// base of its two ends doesn't depend on argument order.
    fn linear_chain_of(len: u8) -> (CommitGraph, Vec<Fingerprint>) {
        let len = (len % 12) as usize;
        let mut graph = CommitGraph::new();
        let mut chain = vec![graph.insert(make_commit(b"t0", vec![], 0))];
        for i in 1..=len {
            let prev = *chain.last().unwrap();
            let seed = format!("t{i}");
            chain.push(graph.insert(make_commit(seed.as_bytes(), vec![prev], i as i64)));
        }
        (graph, chain)
    }

    quickcheck::quickcheck! {
        fn merge_base_of_linear_chain_is_order_independent(len: u8) -> bool {
            let (graph, chain) = linear_chain_of(len);
            let a = *chain.first().unwrap();
            let b = *chain.last().unwrap();
            merge_bases_two(&graph, a, b) == merge_bases_two(&graph, b, a)
        }

        fn merge_base_of_linear_chain_is_the_older_end(len: u8) -> bool {
            let (graph, chain) = linear_chain_of(len);
            let oldest = *chain.first().unwrap();
            let newest = *chain.last().unwrap();
            merge_bases_two(&graph, oldest, newest) == vec![oldest]
        }
    }
}
