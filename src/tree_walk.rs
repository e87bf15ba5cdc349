//! Ordered tree traversal: a lock-step comparison of two trees (Git's
//! directory-sorts-as-if-suffixed-`/` name order) that classifies every
//! differing path, a similarity-scored rename/copy promotion pass, and a
//! pathspec filter that can prune whole sub-trees from a walk.

use std::cmp::Ordering;

use regex::Regex;

use crate::{
    delta::encode::DeltaDiff,
    hash::Fingerprint,
    internal::object::tree::{FileMode, Tree, TreeEntry},
};

/// How a path differs between two trees.
#[derive(Debug, Clone, PartialEq)]
pub enum FilePair {
    Added {
        path: String,
        mode: FileMode,
        id: Fingerprint,
    },
    Deleted {
        path: String,
        mode: FileMode,
        id: Fingerprint,
    },
    Modified {
        path: String,
        old_mode: FileMode,
        old_id: Fingerprint,
        new_mode: FileMode,
        new_id: Fingerprint,
    },
    /// Same name, but one side is a tree/blob and the other a different
    /// kind of entry — can't be described as a content edit.
    TypeChanged {
        path: String,
        old_mode: FileMode,
        old_id: Fingerprint,
        new_mode: FileMode,
        new_id: Fingerprint,
    },
    Renamed {
        from: String,
        to: String,
        id: Fingerprint,
        score: u8,
    },
    Copied {
        from: String,
        to: String,
        id: Fingerprint,
        score: u8,
    },
}

fn sort_key(e: &TreeEntry) -> String {
    format!("{}{}", e.name, if e.mode.is_tree() { "/" } else { "" })
}

fn compare_entries(a: &TreeEntry, b: &TreeEntry) -> Ordering {
    sort_key(a).cmp(&sort_key(b))
}

fn path_of(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Two-tree diff: walks both trees in lock-step by Git's name order,
/// recursing into matching sub-trees, and emits a [`FilePair`] for every
/// path that differs. `resolve` loads a sub-tree's content by fingerprint.
pub fn diff_trees(
    old: &Tree,
    new: &Tree,
    prefix: &str,
    resolve: &dyn Fn(Fingerprint) -> Tree,
    out: &mut Vec<FilePair>,
) {
    let mut oi = 0usize;
    let mut ni = 0usize;
    while oi < old.entries.len() || ni < new.entries.len() {
        match (old.entries.get(oi), new.entries.get(ni)) {
            (Some(oe), Some(ne)) => match compare_entries(oe, ne) {
                Ordering::Less => {
                    emit_whole_subtree(prefix, oe, resolve, out, false);
                    oi += 1;
                }
                Ordering::Greater => {
                    emit_whole_subtree(prefix, ne, resolve, out, true);
                    ni += 1;
                }
                Ordering::Equal => {
                    handle_matched(prefix, oe, ne, resolve, out);
                    oi += 1;
                    ni += 1;
                }
            },
            (Some(oe), None) => {
                emit_whole_subtree(prefix, oe, resolve, out, false);
                oi += 1;
            }
            (None, Some(ne)) => {
                emit_whole_subtree(prefix, ne, resolve, out, true);
                ni += 1;
            }
            (None, None) => unreachable!("loop condition excludes this case"),
        }
    }
}

fn handle_matched(
    prefix: &str,
    oe: &TreeEntry,
    ne: &TreeEntry,
    resolve: &dyn Fn(Fingerprint) -> Tree,
    out: &mut Vec<FilePair>,
) {
    let path = path_of(prefix, &oe.name);
    match (oe.mode.is_tree(), ne.mode.is_tree()) {
        (true, true) => {
            if oe.id != ne.id {
                let old_sub = resolve(oe.id);
                let new_sub = resolve(ne.id);
                diff_trees(&old_sub, &new_sub, &path, resolve, out);
            }
        }
        (true, false) => {
            emit_whole_subtree(prefix, oe, resolve, out, false);
            out.push(FilePair::Added {
                path,
                mode: ne.mode,
                id: ne.id,
            });
        }
        (false, true) => {
            out.push(FilePair::Deleted {
                path,
                mode: oe.mode,
                id: oe.id,
            });
            emit_whole_subtree(prefix, ne, resolve, out, true);
        }
        (false, false) => {
            if oe.id == ne.id && oe.mode == ne.mode {
                return;
            }
            if oe.mode == ne.mode {
                out.push(FilePair::Modified {
                    path,
                    old_mode: oe.mode,
                    old_id: oe.id,
                    new_mode: ne.mode,
                    new_id: ne.id,
                });
            } else {
                out.push(FilePair::TypeChanged {
                    path,
                    old_mode: oe.mode,
                    old_id: oe.id,
                    new_mode: ne.mode,
                    new_id: ne.id,
                });
            }
        }
    }
}

fn emit_whole_subtree(
    prefix: &str,
    entry: &TreeEntry,
    resolve: &dyn Fn(Fingerprint) -> Tree,
    out: &mut Vec<FilePair>,
    added: bool,
) {
    let path = path_of(prefix, &entry.name);
    if entry.mode.is_tree() {
        let subtree = resolve(entry.id);
        for child in &subtree.entries {
            emit_whole_subtree(&path, child, resolve, out, added);
        }
    } else if added {
        out.push(FilePair::Added {
            path,
            mode: entry.mode,
            id: entry.id,
        });
    } else {
        out.push(FilePair::Deleted {
            path,
            mode: entry.mode,
            id: entry.id,
        });
    }
}

/// Default similarity thresholds (0-100), matching the percentages Git's
/// rename/copy detection uses by default.
pub const DEFAULT_RENAME_SCORE: u8 = 50;
pub const DEFAULT_COPY_SCORE: u8 = 50;

/// Promote `Deleted`/`Added` pairs whose blob content is similar enough
/// into `Renamed` entries, scored 0-100 by the fraction of target bytes the
/// delta encoder could copy from the candidate source. Any `Added` entry
/// left over is checked against `copy_sources` (blobs still present
/// elsewhere, unlike a deletion) for a `Copied` promotion.
pub fn detect_renames_and_copies(
    pairs: Vec<FilePair>,
    copy_sources: &[(String, Fingerprint)],
    read_blob: &dyn Fn(Fingerprint) -> Vec<u8>,
    rename_min_score: u8,
    copy_min_score: u8,
) -> Vec<FilePair> {
    let mut deleted = Vec::new();
    let mut added = Vec::new();
    let mut rest = Vec::new();
    for p in pairs {
        match p {
            FilePair::Deleted { .. } => deleted.push(p),
            FilePair::Added { .. } => added.push(p),
            other => rest.push(other),
        }
    }

    let mut used_deleted = vec![false; deleted.len()];
    let mut out = rest;

    for a in added {
        let FilePair::Added { path, id, .. } = &a else {
            unreachable!("`added` only holds Added entries")
        };
        let new_data = read_blob(*id);

        let mut best_rename: Option<(usize, u8)> = None;
        for (i, d) in deleted.iter().enumerate() {
            if used_deleted[i] {
                continue;
            }
            let FilePair::Deleted { id: old_id, .. } = d else {
                unreachable!("`deleted` only holds Deleted entries")
            };
            let score = similarity_score(read_blob(*old_id).as_slice(), &new_data);
            if score >= rename_min_score && best_rename.map(|(_, s)| score > s).unwrap_or(true) {
                best_rename = Some((i, score));
            }
        }

        if let Some((i, score)) = best_rename {
            used_deleted[i] = true;
            let FilePair::Deleted { path: from, .. } = &deleted[i] else {
                unreachable!()
            };
            out.push(FilePair::Renamed {
                from: from.clone(),
                to: path.clone(),
                id: *id,
                score,
            });
            continue;
        }

        let mut best_copy: Option<(&str, u8)> = None;
        for (source_path, source_id) in copy_sources {
            if source_path == path {
                continue;
            }
            let score = similarity_score(read_blob(*source_id).as_slice(), &new_data);
            if score >= copy_min_score && best_copy.map(|(_, s)| score > s).unwrap_or(true) {
                best_copy = Some((source_path.as_str(), score));
            }
        }

        if let Some((from, score)) = best_copy {
            out.push(FilePair::Copied {
                from: from.to_string(),
                to: path.clone(),
                id: *id,
                score,
            });
        } else {
            out.push(a);
        }
    }

    for (i, d) in deleted.into_iter().enumerate() {
        if !used_deleted[i] {
            out.push(d);
        }
    }
    out
}

fn similarity_score(old_data: &[u8], new_data: &[u8]) -> u8 {
    if old_data == new_data {
        return 100;
    }
    let diff = DeltaDiff::new(old_data, new_data);
    (diff.get_ssam_rate() * 100.0).round().min(100.0) as u8
}

/// A path filter: a literal directory prefix plus an optional glob pattern
/// (`*`, `?`) applied to the remainder, compiled to a `regex` for matching.
pub struct PathSpec {
    prefix: String,
    matcher: Option<Regex>,
}

impl PathSpec {
    pub fn parse(spec: &str) -> Self {
        match spec.find(['*', '?']) {
            None => PathSpec {
                prefix: spec.to_string(),
                matcher: None,
            },
            Some(wildcard_pos) => {
                let split = spec[..wildcard_pos].rfind('/').map(|p| p + 1).unwrap_or(0);
                let prefix = spec[..split].to_string();
                let pattern = glob_to_regex(&spec[split..]);
                PathSpec {
                    prefix,
                    matcher: Regex::new(&pattern).ok(),
                }
            }
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let Some(rest) = path.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        match &self.matcher {
            None => true,
            Some(re) => re.is_match(rest),
        }
    }

    /// Whether a sub-tree rooted at `dir` (no trailing slash) could
    /// possibly contain a match, so a walker can skip descending into it
    /// entirely when it can't.
    pub fn could_match_under(&self, dir: &str) -> bool {
        let dir_with_slash = format!("{dir}/");
        self.prefix.starts_with(&dir_with_slash)
            || dir_with_slash.starts_with(&self.prefix)
            || self.prefix.is_empty()
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c if "\\.+^$()[]{}|".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::object::ObjectTrait;
    use crate::internal::object::types::ObjectType;
    use std::collections::HashMap;

    fn blob_entry(name: &str, content: &[u8]) -> (TreeEntry, Fingerprint, Vec<u8>) {
        let id = Fingerprint::of_object(ObjectType::Blob, content);
        (TreeEntry::new(FileMode::Regular, name.to_string(), id), id, content.to_vec())
    }

    #[test]
    fn detects_added_modified_and_deleted() {
        let (a_entry, a_id, a_data) = blob_entry("a.txt", b"aaa");
        let (b_entry_old, b_old_id, b_old_data) = blob_entry("b.txt", b"bbb");
        let (b_entry_new, b_new_id, b_new_data) = blob_entry("b.txt", b"bbbb");
        let (c_entry, c_id, c_data) = blob_entry("c.txt", b"ccc");

        let old = Tree::from_entries(vec![a_entry.clone(), b_entry_old]);
        let new = Tree::from_entries(vec![b_entry_new, c_entry]);

        let mut blobs: HashMap<Fingerprint, Vec<u8>> = HashMap::new();
        for (id, data) in [(a_id, a_data), (b_old_id, b_old_data), (b_new_id, b_new_data), (c_id, c_data)] {
            blobs.insert(id, data);
        }
        let resolve = |_id: Fingerprint| Tree::from_entries(vec![]);

        let mut out = Vec::new();
        diff_trees(&old, &new, "", &resolve, &mut out);

        assert!(out.iter().any(|p| matches!(p, FilePair::Deleted { path, .. } if path == "a.txt")));
        assert!(out.iter().any(|p| matches!(p, FilePair::Modified { path, .. } if path == "b.txt")));
        assert!(out.iter().any(|p| matches!(p, FilePair::Added { path, .. } if path == "c.txt")));
    }

    #[test]
    fn recurses_into_changed_subtrees() {
        let (leaf_old, leaf_old_id, _) = blob_entry("leaf.txt", b"old");
        let (leaf_new, leaf_new_id, _) = blob_entry("leaf.txt", b"new content here");

        let old_sub = Tree::from_entries(vec![leaf_old]);
        let new_sub = Tree::from_entries(vec![leaf_new]);

        let old = Tree::from_entries(vec![TreeEntry::new(FileMode::Directory, "dir".to_string(), old_sub.id)]);
        let new = Tree::from_entries(vec![TreeEntry::new(FileMode::Directory, "dir".to_string(), new_sub.id)]);

        let resolve = move |id: Fingerprint| {
            if id == old_sub.id {
                old_sub.clone()
            } else if id == new_sub.id {
                new_sub.clone()
            } else {
                panic!("unexpected lookup")
            }
        };

        let mut out = Vec::new();
        diff_trees(&old, &new, "", &resolve, &mut out);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], FilePair::Modified { path, .. } if path == "dir/leaf.txt"));
        let _ = (leaf_old_id, leaf_new_id);
    }

    #[test]
    fn rename_detection_promotes_similar_content() {
        let old_content = b"line one\nline two\nline three\nline four\n".to_vec();
        let new_content = b"line one\nline two\nline three\nline five\n".to_vec();
        let old_id = Fingerprint::of_object(ObjectType::Blob, &old_content);
        let new_id = Fingerprint::of_object(ObjectType::Blob, &new_content);

        let pairs = vec![
            FilePair::Deleted { path: "old_name.txt".to_string(), mode: FileMode::Regular, id: old_id },
            FilePair::Added { path: "new_name.txt".to_string(), mode: FileMode::Regular, id: new_id },
        ];

        let read_blob = move |id: Fingerprint| {
            if id == old_id { old_content.clone() } else { new_content.clone() }
        };

        let out = detect_renames_and_copies(pairs, &[], &read_blob, DEFAULT_RENAME_SCORE, DEFAULT_COPY_SCORE);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], FilePair::Renamed { from, to, .. } if from == "old_name.txt" && to == "new_name.txt"));
    }

    #[test]
    fn copy_detection_leaves_source_available() {
        let content = b"shared content block one two three four five\n".to_vec();
        let source_id = Fingerprint::of_object(ObjectType::Blob, &content);

        let pairs = vec![FilePair::Added { path: "copy.txt".to_string(), mode: FileMode::Regular, id: source_id }];
        let copy_sources = vec![("original.txt".to_string(), source_id)];
        let read_blob = move |_id: Fingerprint| content.clone();

        let out = detect_renames_and_copies(pairs, &copy_sources, &read_blob, DEFAULT_RENAME_SCORE, DEFAULT_COPY_SCORE);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], FilePair::Copied { from, to, .. } if from == "original.txt" && to == "copy.txt"));
    }

    #[test]
    fn pathspec_matches_glob_under_prefix() {
        let spec = PathSpec::parse("src/*.rs");
        assert!(spec.matches("src/lib.rs"));
        assert!(!spec.matches("src/sub/lib.rs"));
        assert!(!spec.matches("tests/lib.rs"));
    }

    #[test]
    fn pathspec_prunes_unrelated_subtrees() {
        let spec = PathSpec::parse("src/*.rs");
        assert!(spec.could_match_under("src"));
        assert!(!spec.could_match_under("tests"));
    }
}
