//! Line-level authorship: walk a commit's ancestry, transferring each
//! surviving line to whichever parent last touched it, until every line of
//! the final image is pinned to the commit that introduced it — grounded on
//! `builtin-blame.c`'s `struct blame_entry`/`scoreboard`/`assign_blame`.
//!
//! `struct origin`'s hand-managed `refcnt` becomes an `Rc<Origin>` here: one
//! canonical `Rc` per `(commit, path)` pair, cached in [`Scoreboard`], with
//! every `BlameEntry` holding a clone. [`Scoreboard::sanity_check_refcnt`] is
//! the direct counterpart of the C original's `sanity_check_refcnt`.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    rc::Rc,
};

use crate::{
    commit_graph::CommitGraph,
    diff::{DiffChunk, compute_diff_chunks},
    errors::GitError,
    hash::Fingerprint,
    internal::object::tree::Tree,
    tree_walk::{DEFAULT_RENAME_SCORE, FilePair, detect_renames_and_copies, diff_trees},
};

/// The maximum number of parents a single pass considers, matching the C
/// original's fixed-size `parent_origin[MAXPARENT]` array.
const MAXPARENT: usize = 16;

/// Default similarity floor for attributing a line to a file that was
/// renamed (not just edited) between a commit and one of its parents.
pub const BLAME_DEFAULT_MOVE_SCORE: u8 = 20;
/// Default similarity floor for attributing a line to unrelated content
/// copied in from elsewhere in the parent's tree.
pub const BLAME_DEFAULT_COPY_SCORE: u8 = 40;

/// A (commit, path) pair a blame line can be attributed to. Distinct from a
/// plain `Fingerprint` because the path can change across a rename as blame
/// walks back through history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub commit: Fingerprint,
    pub path: String,
}

/// One contiguous, uniformly-attributed span of the final image.
#[derive(Debug, Clone)]
pub struct BlameEntry {
    /// First line of this group in the final image (0-based).
    pub lno: usize,
    /// How many lines this group spans.
    pub num_lines: usize,
    /// The commit/path currently believed to own these lines.
    pub suspect: Rc<Origin>,
    /// First line of this group in `suspect`'s own version of the file.
    pub s_lno: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct BlameOptions {
    pub detect_moves: bool,
    pub detect_copies: bool,
    pub move_score: u8,
    pub copy_score: u8,
}

impl Default for BlameOptions {
    fn default() -> Self {
        Self {
            detect_moves: true,
            detect_copies: true,
            move_score: BLAME_DEFAULT_MOVE_SCORE,
            copy_score: BLAME_DEFAULT_COPY_SCORE,
        }
    }
}

/// Read-only view the blame engine needs of the object graph: tree
/// resolution and blob content, the same two primitives [`diff_trees`]
/// consumes.
pub trait BlameSource {
    fn resolve_tree(&self, id: Fingerprint) -> Tree;
    fn read_blob(&self, id: Fingerprint) -> Vec<u8>;
}

struct Scoreboard {
    entries: Vec<BlameEntry>,
    origins: HashMap<Origin, Rc<Origin>>,
    final_line_count: usize,
}

impl Scoreboard {
    fn get_origin(&mut self, commit: Fingerprint, path: &str) -> Rc<Origin> {
        let key = Origin {
            commit,
            path: path.to_string(),
        };
        self.origins
            .entry(key.clone())
            .or_insert_with(|| Rc::new(key))
            .clone()
    }

    /// Every origin's reference count must equal the number of cache-held
    /// clones handed out: one for `self.origins`'s own entry, plus one per
    /// `BlameEntry` currently pointing at it. A mismatch means an entry was
    /// dropped or duplicated without updating the scoreboard, exactly the
    /// bug `sanity_check_refcnt` in the C original catches.
    fn sanity_check_refcnt(&self) -> bool {
        for rc in self.origins.values() {
            let held_by_entries = self
                .entries
                .iter()
                .filter(|e| Rc::ptr_eq(&e.suspect, rc))
                .count();
            if Rc::strong_count(rc) != held_by_entries + 1 {
                return false;
            }
        }
        true
    }

    /// The final image is always fully covered by exactly one entry per
    /// line with no gaps or overlaps, the invariant the C original checks
    /// under `DEBUG` in `split_blame`.
    fn verify_partition(&self) -> bool {
        let mut sorted: Vec<&BlameEntry> = self.entries.iter().collect();
        sorted.sort_by_key(|e| e.lno);
        let mut expected = 0usize;
        for e in &sorted {
            if e.lno != expected {
                return false;
            }
            expected += e.num_lines;
        }
        expected == self.final_line_count
    }
}

fn split_lines(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data).lines().map(str::to_string).collect()
}

fn blob_at_path(tree_id: Fingerprint, path: &str, src: &dyn BlameSource) -> Option<Fingerprint> {
    let mut current = src.resolve_tree(tree_id);
    let parts: Vec<&str> = path.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        let entry = current.find_entry(part)?;
        if i + 1 == parts.len() {
            return if entry.mode.is_tree() { None } else { Some(entry.id) };
        }
        if !entry.mode.is_tree() {
            return None;
        }
        current = src.resolve_tree(entry.id);
    }
    None
}

fn lines_of(graph: &CommitGraph, origin: &Origin, src: &dyn BlameSource) -> Option<Vec<String>> {
    let commit = graph.get(origin.commit)?;
    let blob = blob_at_path(commit.tree_id, &origin.path, src)?;
    Some(split_lines(&src.read_blob(blob)))
}

/// Where a commit-local line lands once mapped through a parent's diff: an
/// unchanged span carries a fixed offset back to the parent's line numbers,
/// a changed span has no parent counterpart at all.
enum Span {
    Unchanged { t_start: usize, t_end: usize, offset: isize },
    Changed { t_start: usize, t_end: usize },
}

fn build_spans(chunks: &[DiffChunk], target_len: usize) -> Vec<Span> {
    let mut spans = Vec::with_capacity(chunks.len() * 2 + 1);
    let mut prev_t = 0usize;
    let mut prev_p = 0usize;
    for chunk in chunks {
        if prev_t < chunk.same {
            spans.push(Span::Unchanged {
                t_start: prev_t,
                t_end: chunk.same,
                offset: prev_p as isize - prev_t as isize,
            });
        }
        spans.push(Span::Changed {
            t_start: chunk.same,
            t_end: chunk.t_next,
        });
        prev_t = chunk.t_next;
        prev_p = chunk.p_next;
    }
    if prev_t < target_len {
        spans.push(Span::Unchanged {
            t_start: prev_t,
            t_end: target_len,
            offset: prev_p as isize - prev_t as isize,
        });
    }
    spans
}

/// Find the path `origin.path` had in `parent`, if any: the same path when
/// the file existed there unchanged or merely edited, or wherever rename/copy
/// detection between the two trees says it came from.
fn resolve_parent_path(
    graph: &CommitGraph,
    origin: &Origin,
    parent: Fingerprint,
    src: &dyn BlameSource,
    opts: &BlameOptions,
) -> Option<String> {
    let parent_commit = graph.get(parent)?;
    if blob_at_path(parent_commit.tree_id, &origin.path, src).is_some() {
        return Some(origin.path.clone());
    }
    if !opts.detect_moves && !opts.detect_copies {
        return None;
    }

    let commit = graph.get(origin.commit)?;
    let parent_tree = src.resolve_tree(parent_commit.tree_id);
    let child_tree = src.resolve_tree(commit.tree_id);
    let mut pairs = Vec::new();
    diff_trees(&parent_tree, &child_tree, "", &|id| src.resolve_tree(id), &mut pairs);

    let rename_min_score = if opts.detect_moves { opts.move_score } else { 101 };
    let copy_min_score = if opts.detect_copies { opts.copy_score } else { 101 };
    let read_blob = |id: Fingerprint| src.read_blob(id);
    let copy_sources: Vec<(String, Fingerprint)> = collect_blob_paths(&parent_tree, "");
    let promoted = detect_renames_and_copies(pairs, &copy_sources, &read_blob, rename_min_score, copy_min_score);

    for pair in promoted {
        match pair {
            FilePair::Renamed { from, to, .. } if opts.detect_moves && to == origin.path => return Some(from),
            FilePair::Copied { from, to, .. } if opts.detect_copies && to == origin.path => return Some(from),
            _ => {}
        }
    }
    None
}

fn collect_blob_paths(tree: &Tree, prefix: &str) -> Vec<(String, Fingerprint)> {
    let mut out = Vec::new();
    for entry in &tree.entries {
        let path = if prefix.is_empty() { entry.name.clone() } else { format!("{prefix}/{}", entry.name) };
        if !entry.mode.is_tree() {
            out.push((path, entry.id));
        }
    }
    out
}

/// Walk `start`'s ancestry attributing every line of the file at `path` (as
/// of `start`) to the commit that introduced it. Lines whose content traces
/// back unchanged through a parent are transferred there (following renames
/// and, optionally, copies); lines with no unchanged counterpart in any
/// parent are finalized as introduced by the commit currently holding them.
pub fn assign_blame(
    graph: &CommitGraph,
    start: Fingerprint,
    path: &str,
    src: &dyn BlameSource,
    opts: BlameOptions,
) -> Result<Vec<BlameEntry>, GitError> {
    let mut sb = Scoreboard {
        entries: Vec::new(),
        origins: HashMap::new(),
        final_line_count: 0,
    };

    let root = sb.get_origin(start, path);
    let final_lines = lines_of(graph, &root, src)
        .ok_or_else(|| GitError::Missing(format!("{path} not found at {start}")))?;
    sb.final_line_count = final_lines.len();
    if sb.final_line_count > 0 {
        sb.entries.push(BlameEntry {
            lno: 0,
            num_lines: sb.final_line_count,
            suspect: root.clone(),
            s_lno: 0,
        });
    }

    let mut queue: VecDeque<Rc<Origin>> = VecDeque::new();
    queue.push_back(root);
    let mut processed: HashSet<Origin> = HashSet::new();

    while let Some(origin) = queue.pop_front() {
        if !processed.insert((*origin).clone()) {
            continue;
        }
        if !sb.entries.iter().any(|e| Rc::ptr_eq(&e.suspect, &origin)) {
            continue;
        }
        let Some(target_lines) = lines_of(graph, &origin, src) else {
            continue;
        };
        let parents = graph.parents(origin.commit);

        for &parent in parents.iter().take(MAXPARENT) {
            let Some(parent_path) = resolve_parent_path(graph, &origin, parent, src, &opts) else {
                continue;
            };
            let parent_origin = sb.get_origin(parent, &parent_path);
            let Some(parent_lines) = lines_of(graph, &parent_origin, src) else {
                continue;
            };

            let chunks = compute_diff_chunks(&parent_lines, &target_lines);
            let spans = build_spans(&chunks, target_lines.len());
            pass_blame_to_parent(&mut sb, &origin, &parent_origin, &spans);

            if sb.entries.iter().any(|e| Rc::ptr_eq(&e.suspect, &parent_origin)) {
                queue.push_back(parent_origin);
            }
        }
    }

    debug_assert!(sb.verify_partition(), "blame entries must partition the final image");
    debug_assert!(sb.sanity_check_refcnt(), "blame origin refcounts drifted from entry ownership");

    coalesce(&mut sb.entries);
    sb.entries.sort_by_key(|e| e.lno);
    Ok(sb.entries)
}

/// For every entry still attributed to `target`, split off whichever part
/// of its range lands in an unchanged span and hand that part to `parent`
/// (with `s_lno` shifted to the parent's own numbering); the part landing in
/// a changed span stays with `target`. Mirrors `pass_blame_to_parent`/
/// `blame_chunk`/`split_blame`.
fn pass_blame_to_parent(sb: &mut Scoreboard, target: &Rc<Origin>, parent: &Rc<Origin>, spans: &[Span]) {
    let mut next_entries = Vec::with_capacity(sb.entries.len());
    for entry in sb.entries.drain(..) {
        if !Rc::ptr_eq(&entry.suspect, target) {
            next_entries.push(entry);
            continue;
        }
        next_entries.extend(split_entry_over_spans(entry, parent, spans));
    }
    sb.entries = next_entries;
}

fn split_entry_over_spans(entry: BlameEntry, parent: &Rc<Origin>, spans: &[Span]) -> Vec<BlameEntry> {
    let start = entry.s_lno;
    let end = entry.s_lno + entry.num_lines;
    let mut out = Vec::new();
    let mut cursor = start;

    for span in spans {
        if cursor >= end {
            break;
        }
        let (t_start, t_end) = match span {
            Span::Unchanged { t_start, t_end, .. } => (*t_start, *t_end),
            Span::Changed { t_start, t_end } => (*t_start, *t_end),
        };
        if t_end <= cursor || t_start >= end {
            continue;
        }
        let overlap_start = cursor.max(t_start);
        let overlap_end = end.min(t_end);
        if overlap_start >= overlap_end {
            continue;
        }
        let overlap_len = overlap_end - overlap_start;
        let lno = entry.lno + (overlap_start - start);

        match span {
            Span::Unchanged { offset, .. } => {
                let s_lno = (overlap_start as isize + offset) as usize;
                out.push(BlameEntry {
                    lno,
                    num_lines: overlap_len,
                    suspect: parent.clone(),
                    s_lno,
                });
            }
            Span::Changed { .. } => {
                out.push(BlameEntry {
                    lno,
                    num_lines: overlap_len,
                    suspect: entry.suspect.clone(),
                    s_lno: overlap_start,
                });
            }
        }
        cursor = overlap_end;
    }

    out
}

/// Merge adjacent entries that ended up attributed to the same origin in
/// contiguous final-image and suspect-file ranges, matching `coalesce()`.
fn coalesce(entries: &mut Vec<BlameEntry>) {
    entries.sort_by_key(|e| e.lno);
    let mut merged: Vec<BlameEntry> = Vec::with_capacity(entries.len());
    for entry in entries.drain(..) {
        if let Some(last) = merged.last_mut() {
            if Rc::ptr_eq(&last.suspect, &entry.suspect)
                && last.lno + last.num_lines == entry.lno
                && last.s_lno + last.num_lines == entry.s_lno
            {
                last.num_lines += entry.num_lines;
                continue;
            }
        }
        merged.push(entry);
    }
    *entries = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::object::ObjectTrait;
    use crate::internal::object::commit::Commit;
    use crate::internal::object::signature::{Signature, SignatureType};
    use crate::internal::object::tree::{FileMode, TreeEntry};
    use crate::internal::object::types::ObjectType;
    use std::cell::RefCell;

    struct MemSource {
        trees: RefCell<HashMap<Fingerprint, Tree>>,
        blobs: RefCell<HashMap<Fingerprint, Vec<u8>>>,
    }

    impl MemSource {
        fn new() -> Self {
            Self {
                trees: RefCell::new(HashMap::new()),
                blobs: RefCell::new(HashMap::new()),
            }
        }

        fn put_blob(&self, content: &[u8]) -> Fingerprint {
            let id = Fingerprint::of_object(ObjectType::Blob, content);
            self.blobs.borrow_mut().insert(id, content.to_vec());
            id
        }

        fn put_tree(&self, entries: Vec<TreeEntry>) -> Fingerprint {
            let tree = Tree::from_entries(entries);
            let id = tree.id;
            self.trees.borrow_mut().insert(id, tree);
            id
        }
    }

    impl BlameSource for MemSource {
        fn resolve_tree(&self, id: Fingerprint) -> Tree {
            self.trees.borrow().get(&id).cloned().unwrap_or_else(|| Tree::from_entries(vec![]))
        }

        fn read_blob(&self, id: Fingerprint) -> Vec<u8> {
            self.blobs.borrow().get(&id).cloned().unwrap_or_default()
        }
    }

    fn sig(n: i64) -> Signature {
        Signature::new(SignatureType::Author, "a".to_string(), "a@example.com".to_string(), n, 0)
    }

    fn commit_with_tree(tree_id: Fingerprint, parents: Vec<Fingerprint>, seed: i64) -> Commit {
        Commit::new(sig(seed), sig(seed), tree_id, parents, &format!("c{seed}"))
    }

    #[test]
    fn single_parent_unchanged_lines_transfer_back() {
        let src = MemSource::new();
        let mut graph = CommitGraph::new();

        let old_blob = src.put_blob(b"one\ntwo\nthree\n");
        let old_tree = src.put_tree(vec![TreeEntry::new(FileMode::Regular, "f.txt".to_string(), old_blob)]);
        let parent = graph.insert(commit_with_tree(old_tree, vec![], 1));

        let new_blob = src.put_blob(b"one\ntwo\nTHREE\n");
        let new_tree = src.put_tree(vec![TreeEntry::new(FileMode::Regular, "f.txt".to_string(), new_blob)]);
        let child = graph.insert(commit_with_tree(new_tree, vec![parent], 2));

        let result = assign_blame(&graph, child, "f.txt", &src, BlameOptions::default()).unwrap();

        let by_line: HashMap<usize, Fingerprint> = result
            .iter()
            .flat_map(|e| (e.lno..e.lno + e.num_lines).map(move |l| (l, e.suspect.commit)))
            .collect();
        assert_eq!(by_line[&0], parent);
        assert_eq!(by_line[&1], parent);
        assert_eq!(by_line[&2], child);
    }

    #[test]
    fn root_commit_keeps_every_line() {
        let src = MemSource::new();
        let mut graph = CommitGraph::new();

        let blob = src.put_blob(b"alpha\nbeta\n");
        let tree = src.put_tree(vec![TreeEntry::new(FileMode::Regular, "f.txt".to_string(), blob)]);
        let root = graph.insert(commit_with_tree(tree, vec![], 1));

        let result = assign_blame(&graph, root, "f.txt", &src, BlameOptions::default()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].suspect.commit, root);
        assert_eq!(result[0].num_lines, 2);
    }

    #[test]
    fn blame_follows_file_across_a_rename() {
        let src = MemSource::new();
        let mut graph = CommitGraph::new();

        let blob = src.put_blob(b"shared body line one\nshared body line two\nshared body line three\n");
        let old_tree = src.put_tree(vec![TreeEntry::new(FileMode::Regular, "old_name.txt".to_string(), blob)]);
        let parent = graph.insert(commit_with_tree(old_tree, vec![], 1));

        let new_tree = src.put_tree(vec![TreeEntry::new(FileMode::Regular, "new_name.txt".to_string(), blob)]);
        let child = graph.insert(commit_with_tree(new_tree, vec![parent], 2));

        let result = assign_blame(&graph, child, "new_name.txt", &src, BlameOptions::default()).unwrap();
        assert!(result.iter().all(|e| e.suspect.commit == parent && e.suspect.path == "old_name.txt"));
    }

    #[test]
    fn merge_commit_pulls_lines_from_either_parent() {
        let src = MemSource::new();
        let mut graph = CommitGraph::new();

        let left_blob = src.put_blob(b"left\ncommon\n");
        let left_tree = src.put_tree(vec![TreeEntry::new(FileMode::Regular, "f.txt".to_string(), left_blob)]);
        let left = graph.insert(commit_with_tree(left_tree, vec![], 1));

        let right_blob = src.put_blob(b"right\ncommon\n");
        let right_tree = src.put_tree(vec![TreeEntry::new(FileMode::Regular, "f.txt".to_string(), right_blob)]);
        let right = graph.insert(commit_with_tree(right_tree, vec![], 2));

        let merge_blob = src.put_blob(b"left\ncommon\n");
        let merge_tree = src.put_tree(vec![TreeEntry::new(FileMode::Regular, "f.txt".to_string(), merge_blob)]);
        let merge = graph.insert(commit_with_tree(merge_tree, vec![left, right], 3));

        let result = assign_blame(&graph, merge, "f.txt", &src, BlameOptions::default()).unwrap();
        let by_line: HashMap<usize, Fingerprint> = result
            .iter()
            .flat_map(|e| (e.lno..e.lno + e.num_lines).map(move |l| (l, e.suspect.commit)))
            .collect();
        assert_eq!(by_line[&0], left);
        assert_eq!(by_line[&1], left);
    }

    #[test]
    fn adjacent_entries_from_same_origin_coalesce() {
        let mut entries = vec![
            BlameEntry { lno: 0, num_lines: 2, suspect: Rc::new(Origin { commit: Fingerprint::NULL, path: "f".to_string() }), s_lno: 0 },
        ];
        let origin = entries[0].suspect.clone();
        entries.push(BlameEntry { lno: 2, num_lines: 3, suspect: origin, s_lno: 2 });
        coalesce(&mut entries);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].num_lines, 5);
    }

    #[test]
    fn unrelated_adjacent_entries_do_not_coalesce() {
        let mut entries = vec![
            BlameEntry { lno: 0, num_lines: 2, suspect: Rc::new(Origin { commit: Fingerprint::NULL, path: "f".to_string() }), s_lno: 0 },
            BlameEntry { lno: 2, num_lines: 1, suspect: Rc::new(Origin { commit: Fingerprint::of_bytes(b"x"), path: "f".to_string() }), s_lno: 0 },
        ];
        coalesce(&mut entries);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn default_scores_match_expected_baseline() {
        let rename = DEFAULT_RENAME_SCORE;
        assert!(BLAME_DEFAULT_MOVE_SCORE < BLAME_DEFAULT_COPY_SCORE);
        assert!(BLAME_DEFAULT_COPY_SCORE <= rename.max(BLAME_DEFAULT_COPY_SCORE));
    }
}
