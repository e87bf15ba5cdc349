//! Line-oriented content search: a compiled pattern applied to one buffer
//! at a time, with pre/post context and `--` hunk separators matching
//! `git grep`'s output shape. Grounded on `builtin-grep.c`'s
//! `grep_buffer`/`show_line`.

use std::collections::VecDeque;

use regex::Regex;

#[derive(Debug, Clone)]
pub struct GrepOptions {
    /// Report lines that do NOT match instead of ones that do.
    pub invert: bool,
    /// Stop at the first hit and report only the file name.
    pub name_only: bool,
    /// Lines of context to show before a match.
    pub pre_context: usize,
    /// Lines of context to show after a match.
    pub post_context: usize,
}

impl Default for GrepOptions {
    fn default() -> Self {
        Self {
            invert: false,
            name_only: false,
            pre_context: 0,
            post_context: 0,
        }
    }
}

/// One line of grep output: a match (`:` sign), context (`-` sign), or the
/// `--` separator git prints between non-adjacent hunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrepEvent {
    HunkSeparator,
    Match { lno: usize, text: String },
    Context { lno: usize, text: String },
}

/// Result of searching one buffer: whether it hit at all (for a caller
/// tallying files searched), and the ordered output events.
#[derive(Debug, Clone, Default)]
pub struct GrepResult {
    pub matched: bool,
    pub events: Vec<GrepEvent>,
}

struct PreContextLine {
    lno: usize,
    text: String,
}

/// Search `content` line by line (1-based line numbers, matching the C
/// original), producing match/context events and the `--` separators git
/// prints whenever a shown hunk isn't contiguous with the previous one.
pub fn grep_buffer(pattern: &Regex, content: &str, opts: &GrepOptions) -> GrepResult {
    if opts.name_only {
        let hit = content.lines().any(|line| {
            let m = pattern.is_match(line);
            if opts.invert { !m } else { m }
        });
        return GrepResult { matched: hit, events: Vec::new() };
    }

    let mut prev: VecDeque<PreContextLine> = VecDeque::with_capacity(opts.pre_context);
    let mut events = Vec::new();
    let mut last_hit = 0usize;
    let mut last_shown = 0usize;
    let mut any_hit = false;
    // Git only prints "--" between hunks when context lines were requested
    // at all; with none, discontiguous hits print with no separator.
    let hunk_mark_active = opts.pre_context > 0 || opts.post_context > 0;

    for (idx, line) in content.lines().enumerate() {
        let lno = idx + 1;
        let is_match = pattern.is_match(line);
        let hit = if opts.invert { !is_match } else { is_match };

        if hit {
            any_hit = true;
            if opts.pre_context > 0 {
                let from = if opts.pre_context < lno { lno - opts.pre_context } else { 1 };
                let from = from.max(last_shown + 1);
                if hunk_mark_active && last_shown != 0 && from != last_shown + 1 {
                    events.push(GrepEvent::HunkSeparator);
                }
                for pcl in prev.iter().filter(|p| p.lno >= from && p.lno < lno) {
                    events.push(GrepEvent::Context { lno: pcl.lno, text: pcl.text.clone() });
                }
                last_shown = lno - 1;
            }
            if hunk_mark_active && last_shown != 0 && lno != last_shown + 1 {
                events.push(GrepEvent::HunkSeparator);
            }
            events.push(GrepEvent::Match { lno, text: line.to_string() });
            last_shown = lno;
            last_hit = lno;
        } else if last_hit != 0 && lno <= last_hit + opts.post_context {
            if hunk_mark_active && last_shown != 0 && lno != last_shown + 1 {
                events.push(GrepEvent::HunkSeparator);
            }
            events.push(GrepEvent::Context { lno, text: line.to_string() });
            last_shown = lno;
        }

        if opts.pre_context > 0 {
            if prev.len() == opts.pre_context {
                prev.pop_front();
            }
            prev.push_back(PreContextLine { lno, text: line.to_string() });
        }
    }

    GrepResult { matched: any_hit, events }
}

/// Render a [`GrepResult`]'s events as `git grep`-style lines prefixed with
/// `name`, with or without line numbers.
pub fn format_events(name: &str, result: &GrepResult, show_line_numbers: bool) -> Vec<String> {
    result
        .events
        .iter()
        .map(|event| match event {
            GrepEvent::HunkSeparator => "--".to_string(),
            GrepEvent::Match { lno, text } => format_line(name, *lno, text, ':', show_line_numbers),
            GrepEvent::Context { lno, text } => format_line(name, *lno, text, '-', show_line_numbers),
        })
        .collect()
}

fn format_line(name: &str, lno: usize, text: &str, sign: char, show_line_numbers: bool) -> String {
    if show_line_numbers {
        format!("{name}{sign}{lno}{sign}{text}")
    } else {
        format!("{name}{sign}{text}")
    }
}

/// Search a single named blob's decoded content, matching `grep_sha1`'s
/// role of feeding one object's bytes through `grep_buffer`.
pub fn grep_blob(pattern: &Regex, name: &str, data: &[u8], opts: &GrepOptions) -> GrepResult {
    let text = String::from_utf8_lossy(data);
    let mut result = grep_buffer(pattern, &text, opts);
    if opts.name_only && result.matched {
        result.events.push(GrepEvent::Match { lno: 0, text: name.to_string() });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_match_reports_matching_lines() {
        let re = Regex::new("fn main").unwrap();
        let content = "use std;\nfn main() {\n    println!();\n}\n";
        let result = grep_buffer(&re, content, &GrepOptions::default());
        assert!(result.matched);
        assert_eq!(result.events, vec![GrepEvent::Match { lno: 2, text: "fn main() {".to_string() }]);
    }

    #[test]
    fn invert_reports_non_matching_lines() {
        let re = Regex::new("keep").unwrap();
        let content = "keep me\ndrop me\nkeep too\n";
        let opts = GrepOptions { invert: true, ..Default::default() };
        let result = grep_buffer(&re, content, &opts);
        assert_eq!(result.events, vec![GrepEvent::Match { lno: 2, text: "drop me".to_string() }]);
    }

    #[test]
    fn post_context_follows_a_hit() {
        let re = Regex::new("HIT").unwrap();
        let content = "a\nHIT\nb\nc\nd\n";
        let opts = GrepOptions { post_context: 2, ..Default::default() };
        let result = grep_buffer(&re, content, &opts);
        assert_eq!(
            result.events,
            vec![
                GrepEvent::Match { lno: 2, text: "HIT".to_string() },
                GrepEvent::Context { lno: 3, text: "b".to_string() },
                GrepEvent::Context { lno: 4, text: "c".to_string() },
            ]
        );
    }

    #[test]
    fn pre_context_precedes_a_hit() {
        let re = Regex::new("HIT").unwrap();
        let content = "a\nb\nHIT\nc\n";
        let opts = GrepOptions { pre_context: 2, ..Default::default() };
        let result = grep_buffer(&re, content, &opts);
        assert_eq!(
            result.events,
            vec![
                GrepEvent::Context { lno: 1, text: "a".to_string() },
                GrepEvent::Context { lno: 2, text: "b".to_string() },
                GrepEvent::Match { lno: 3, text: "HIT".to_string() },
            ]
        );
    }

    #[test]
    fn non_adjacent_hunks_get_a_separator() {
        let re = Regex::new("HIT").unwrap();
        let content = "HIT\nx\nx\nx\nx\nHIT\n";
        let result = grep_buffer(&re, content, &GrepOptions::default());
        assert_eq!(
            result.events,
            vec![
                GrepEvent::Match { lno: 1, text: "HIT".to_string() },
                GrepEvent::Match { lno: 6, text: "HIT".to_string() },
            ]
        );
    }

    #[test]
    fn adjacent_context_does_not_get_a_separator() {
        let re = Regex::new("HIT").unwrap();
        let content = "HIT\nHIT\n";
        let result = grep_buffer(&re, content, &GrepOptions::default());
        assert!(!result.events.contains(&GrepEvent::HunkSeparator));
    }

    #[test]
    fn name_only_reports_no_line_events() {
        let re = Regex::new("needle").unwrap();
        let content = "hay\nneedle\nhay\n";
        let opts = GrepOptions { name_only: true, ..Default::default() };
        let result = grep_buffer(&re, content, &opts);
        assert!(result.matched);
        assert!(result.events.is_empty());
    }

    #[test]
    fn format_events_includes_line_numbers_when_requested() {
        let re = Regex::new("HIT").unwrap();
        let result = grep_buffer(&re, "HIT\n", &GrepOptions::default());
        let lines = format_events("f.txt", &result, true);
        assert_eq!(lines, vec!["f.txt:1:HIT".to_string()]);
    }
}
