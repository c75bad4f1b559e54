//! Lexical complexity walker for languages without a bundled grammar
//!
//! Strips comments line by line, then finds function heads and decision
//! keywords with regular expressions. A function's span runs from its head
//! to the next head (or end of file), which is coarse but stable.

use super::{mean_complexity, Language};
use crate::models::MetricRecord;
use regex::Regex;
use std::sync::OnceLock;

struct LexicalSpec {
    line_comments: &'static [&'static str],
    block_comment: Option<(&'static str, &'static str)>,
    function_head: &'static Regex,
    decision: &'static Regex,
}

static PHP_FUNCTION: OnceLock<Regex> = OnceLock::new();
static PHP_DECISION: OnceLock<Regex> = OnceLock::new();
static RUBY_FUNCTION: OnceLock<Regex> = OnceLock::new();
static RUBY_DECISION: OnceLock<Regex> = OnceLock::new();
static ANY_FUNCTION: OnceLock<Regex> = OnceLock::new();
static ANY_DECISION: OnceLock<Regex> = OnceLock::new();

fn spec_for(language: Option<Language>) -> LexicalSpec {
    match language {
        Some(Language::Php) => LexicalSpec {
            line_comments: &["//", "#"],
            block_comment: Some(("/*", "*/")),
            function_head: PHP_FUNCTION
                .get_or_init(|| Regex::new(r"\bfunction\b").expect("valid regex")),
            decision: PHP_DECISION.get_or_init(|| {
                Regex::new(r"\b(if|elseif|while|for|foreach|case|catch)\b|&&|\|\||\?\?")
                    .expect("valid regex")
            }),
        },
        Some(Language::Ruby) => LexicalSpec {
            line_comments: &["#"],
            block_comment: Some(("=begin", "=end")),
            function_head: RUBY_FUNCTION
                .get_or_init(|| Regex::new(r"^\s*def\b").expect("valid regex")),
            decision: RUBY_DECISION.get_or_init(|| {
                Regex::new(r"\b(if|elsif|unless|while|until|for|when|rescue)\b|&&|\|\|")
                    .expect("valid regex")
            }),
        },
        _ => LexicalSpec {
            line_comments: &["//", "#"],
            block_comment: Some(("/*", "*/")),
            function_head: ANY_FUNCTION.get_or_init(|| {
                Regex::new(r"\b(function|def|func|fn|sub)\b").expect("valid regex")
            }),
            decision: ANY_DECISION.get_or_init(|| {
                Regex::new(r"\b(if|elif|elsif|elseif|while|for|foreach|case|catch)\b|&&|\|\|")
                    .expect("valid regex")
            }),
        },
    }
}

/// Measure source text without a parser. Never fails.
pub fn analyze(source: &str, language: Option<Language>) -> MetricRecord {
    let spec = spec_for(language);
    let lines = strip_comments(source, &spec);

    let heads: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| spec.function_head.is_match(line))
        .map(|(i, _)| i)
        .collect();

    let complexities: Vec<u32> = heads
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = heads.get(n + 1).copied().unwrap_or(lines.len());
            let decisions: usize = lines[start..end]
                .iter()
                .map(|line| spec.decision.find_iter(line).count())
                .sum();
            1 + decisions as u32
        })
        .collect();

    let nloc = lines.len();
    MetricRecord {
        loc: nloc,
        sloc: nloc,
        cyclomatic_complexity: mean_complexity(&complexities, nloc),
        halstead_volume: 0.0,
    }
}

/// Non-empty code lines with comments removed.
fn strip_comments(source: &str, spec: &LexicalSpec) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_block = false;

    for raw in source.lines() {
        let mut line = raw.to_string();

        if let Some((open, close)) = spec.block_comment {
            if in_block {
                match line.find(close) {
                    Some(pos) => {
                        line = line[pos + close.len()..].to_string();
                        in_block = false;
                    }
                    None => continue,
                }
            }
            while let Some(start) = line.find(open) {
                match line[start + open.len()..].find(close) {
                    Some(rel) => {
                        let end = start + open.len() + rel + close.len();
                        line.replace_range(start..end, " ");
                    }
                    None => {
                        line.truncate(start);
                        in_block = true;
                        break;
                    }
                }
            }
        }

        if let Some(pos) = spec
            .line_comments
            .iter()
            .filter_map(|marker| line.find(marker))
            .min()
        {
            line.truncate(pos);
        }

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_php_functions() {
        let source = r#"<?php
// helpers
function greet($name) {
    if ($name && strlen($name) > 0) {
        return "Hello " . $name;
    }
    return "Hello";
}

/* a block
   comment */
function noop() {
    return null;
}
"#;
        let record = analyze(source, Some(Language::Php));
        // greet = 1 + if + && = 3, noop = 1
        assert_eq!(record.cyclomatic_complexity, 2.0);
        assert_eq!(record.loc, 10);
        assert_eq!(record.loc, record.sloc);
        assert_eq!(record.halstead_volume, 0.0);
    }

    #[test]
    fn test_ruby_functions() {
        let source = "# comment\ndef check(x)\n  return 1 if x\n  0\nend\n";
        let record = analyze(source, Some(Language::Ruby));
        assert_eq!(record.loc, 4);
        assert_eq!(record.cyclomatic_complexity, 2.0);
    }

    #[test]
    fn test_plain_text_without_functions() {
        let record = analyze("hello world\n", None);
        assert_eq!(record.loc, 1);
        assert_eq!(record.cyclomatic_complexity, 1.0);
    }

    #[test]
    fn test_comment_only_is_empty() {
        let record = analyze("// nothing\n# here\n", None);
        assert!(record.is_empty());
        assert_eq!(record.cyclomatic_complexity, 0.0);
    }
}
