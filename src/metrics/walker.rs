//! Generic multi-language complexity walker
//!
//! Error-tolerant: tree-sitter always produces a tree, so broken input still
//! yields line counts and whatever functions could be recognised. Each
//! language is described by a [`WalkSpec`] table instead of a bespoke parser.

use super::{code_lines, mean_complexity, walk_tree, ExtractError, Language};
use crate::models::MetricRecord;
use tree_sitter::{Node, Parser};

/// Node kinds that matter for one language.
struct WalkSpec {
    /// Nodes that start a new function-level complexity scope
    functions: &'static [&'static str],
    /// Nodes that each add one independent path
    decisions: &'static [&'static str],
    /// Operator tokens inside `binary_expression` that add one path
    logical_operators: &'static [&'static str],
}

const C_LOGICAL: &[&str] = &["&&", "||"];

fn spec_for(language: Language) -> WalkSpec {
    match language {
        Language::Python => WalkSpec {
            functions: &["function_definition", "async_function_definition"],
            decisions: &[
                "if_statement",
                "elif_clause",
                "while_statement",
                "for_statement",
                "except_clause",
                "boolean_operator",
                "conditional_expression",
                "if_clause",
                "case_clause",
            ],
            logical_operators: &[],
        },
        Language::JavaScript | Language::TypeScript | Language::Tsx => WalkSpec {
            functions: &[
                "function_declaration",
                "generator_function_declaration",
                "function_expression",
                "arrow_function",
                "method_definition",
            ],
            decisions: &[
                "if_statement",
                "while_statement",
                "for_statement",
                "for_in_statement",
                "do_statement",
                "switch_case",
                "catch_clause",
                "ternary_expression",
            ],
            logical_operators: &["&&", "||", "??"],
        },
        Language::Java => WalkSpec {
            functions: &["method_declaration", "constructor_declaration"],
            decisions: &[
                "if_statement",
                "while_statement",
                "for_statement",
                "enhanced_for_statement",
                "do_statement",
                "catch_clause",
                "switch_block_statement_group",
                "switch_rule",
                "ternary_expression",
            ],
            logical_operators: C_LOGICAL,
        },
        Language::C => WalkSpec {
            functions: &["function_definition"],
            decisions: &[
                "if_statement",
                "while_statement",
                "for_statement",
                "do_statement",
                "case_statement",
                "conditional_expression",
            ],
            logical_operators: C_LOGICAL,
        },
        Language::Cpp => WalkSpec {
            functions: &["function_definition"],
            decisions: &[
                "if_statement",
                "while_statement",
                "for_statement",
                "for_range_loop",
                "do_statement",
                "case_statement",
                "catch_clause",
                "conditional_expression",
            ],
            logical_operators: C_LOGICAL,
        },
        Language::CSharp => WalkSpec {
            functions: &[
                "method_declaration",
                "constructor_declaration",
                "local_function_statement",
            ],
            decisions: &[
                "if_statement",
                "while_statement",
                "for_statement",
                "foreach_statement",
                "do_statement",
                "catch_clause",
                "switch_section",
                "conditional_expression",
            ],
            logical_operators: &["&&", "||", "??"],
        },
        Language::Go => WalkSpec {
            functions: &["function_declaration", "method_declaration", "func_literal"],
            decisions: &[
                "if_statement",
                "for_statement",
                "expression_case",
                "type_case",
                "communication_case",
            ],
            logical_operators: C_LOGICAL,
        },
        Language::Rust => WalkSpec {
            functions: &["function_item", "closure_expression"],
            decisions: &[
                "if_expression",
                "while_expression",
                "for_expression",
                "loop_expression",
                "match_arm",
            ],
            logical_operators: C_LOGICAL,
        },
        // No grammar: handled by the lexical walker
        Language::Php | Language::Ruby => WalkSpec {
            functions: &[],
            decisions: &[],
            logical_operators: &[],
        },
    }
}

/// Walk source in a grammar-backed language.
pub fn analyze(source: &str, language: Language) -> Result<MetricRecord, ExtractError> {
    let grammar = language
        .grammar()
        .ok_or_else(|| ExtractError::Parser(format!("no grammar bundled for {language}")))?;

    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| ExtractError::Parser(format!("failed to set {language} language: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ExtractError::Parser(format!("{language} parse returned no tree")))?;

    let root = tree.root_node();
    let spec = spec_for(language);
    let nloc = code_lines(&root);

    let mut complexities = Vec::new();
    collect_functions(&root, &spec, &mut complexities);

    Ok(MetricRecord {
        loc: nloc,
        sloc: nloc,
        cyclomatic_complexity: mean_complexity(&complexities, nloc),
        halstead_volume: 0.0,
    })
}

fn collect_functions(root: &Node, spec: &WalkSpec, out: &mut Vec<u32>) {
    walk_tree(*root, |node| {
        if spec.functions.contains(&node.kind()) {
            out.push(function_complexity(node, spec));
        }
        true
    });
}

/// 1 + decision points, not descending into nested functions.
fn function_complexity(func: &Node, spec: &WalkSpec) -> u32 {
    let mut complexity = 1;
    walk_tree(*func, |node| {
        if node.id() == func.id() {
            return true;
        }
        let kind = node.kind();
        if spec.functions.contains(&kind) {
            return false;
        }
        if spec.decisions.contains(&kind) {
            complexity += 1;
        } else if kind == "binary_expression" {
            complexity += node
                .children(&mut node.walk())
                .filter(|child| spec.logical_operators.contains(&child.kind()))
                .count() as u32;
        }
        true
    });
    complexity
}
