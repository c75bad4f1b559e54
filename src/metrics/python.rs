//! Syntax-aware Python analyzer using tree-sitter
//!
//! Unlike the generic walker this path refuses trees with syntax errors, so
//! a successful result means the whole artifact parsed as Python.

use super::{code_lines, mean_complexity, walk_tree, ExtractError};
use crate::models::MetricRecord;
use std::collections::HashSet;
use tree_sitter::{Node, Parser};

/// Analyze Python source.
pub fn analyze(source: &str) -> Result<MetricRecord, ExtractError> {
    let mut parser = Parser::new();
    let language = tree_sitter_python::LANGUAGE;
    parser
        .set_language(&language.into())
        .map_err(|e| ExtractError::Parser(format!("failed to set Python language: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ExtractError::Parser("Python parse returned no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(ExtractError::Syntax {
            line: first_error_line(&root).unwrap_or(1),
        });
    }

    let source_bytes = source.as_bytes();
    let sloc = code_lines(&root);

    let mut complexities = Vec::new();
    collect_function_complexities(&root, &mut complexities);

    Ok(MetricRecord {
        loc: source.lines().count(),
        sloc,
        cyclomatic_complexity: mean_complexity(&complexities, sloc),
        halstead_volume: halstead_volume(&root, source_bytes),
    })
}

/// True when `source` parses as Python and is more than a lone name or
/// literal (`asdf`, `"text"`, `42`).
pub fn looks_like_code(source: &str) -> bool {
    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .is_err()
    {
        return false;
    }
    let Some(tree) = parser.parse(source, None) else {
        return false;
    };

    let root = tree.root_node();
    if root.has_error() {
        return false;
    }

    let statements: Vec<Node> = root
        .named_children(&mut root.walk())
        .filter(|n| n.kind() != "comment")
        .collect();

    match statements.as_slice() {
        [stmt] if stmt.kind() == "expression_statement" => {
            let exprs: Vec<Node> = stmt.named_children(&mut stmt.walk()).collect();
            !matches!(exprs.as_slice(), [expr] if is_lone_atom(expr))
        }
        _ => true,
    }
}

fn is_lone_atom(node: &Node) -> bool {
    let mut node = *node;
    loop {
        match node.kind() {
            "identifier" | "string" | "concatenated_string" | "integer" | "float" | "true"
            | "false" | "none" | "ellipsis" => return true,
            "parenthesized_expression" => {
                let inner: Vec<Node> = node.named_children(&mut node.walk()).collect();
                match inner.as_slice() {
                    [only] => node = *only,
                    _ => return false,
                }
            }
            _ => return false,
        }
    }
}

/// 1-based line of the first ERROR or MISSING node.
fn first_error_line(root: &Node) -> Option<usize> {
    let mut line = None;
    walk_tree(*root, |node| {
        if line.is_some() || !node.has_error() && !node.is_missing() {
            return false;
        }
        if node.is_error() || node.is_missing() {
            line = Some(node.start_position().row + 1);
            return false;
        }
        true
    });
    line
}

fn is_function(node: &Node) -> bool {
    matches!(
        node.kind(),
        "function_definition" | "async_function_definition"
    )
}

/// Record the complexity of every function, methods and nested functions included.
fn collect_function_complexities(root: &Node, out: &mut Vec<u32>) {
    walk_tree(*root, |node| {
        if is_function(node) {
            out.push(calculate_complexity(node));
        }
        true
    });
}

/// Cyclomatic complexity of one function; nested functions are scored separately.
fn calculate_complexity(func: &Node) -> u32 {
    let mut complexity = 1;
    walk_tree(*func, |node| {
        if node.id() == func.id() {
            return true;
        }
        if is_function(node) {
            return false;
        }
        match node.kind() {
            "if_statement" | "elif_clause" | "while_statement" | "for_statement" => {
                complexity += 1;
            }
            "except_clause" => {
                complexity += 1;
            }
            // Each 'and'/'or'
            "boolean_operator" => {
                complexity += 1;
            }
            "conditional_expression" => {
                complexity += 1;
            }
            // Comprehension filters
            "if_clause" => {
                complexity += 1;
            }
            "case_clause" => {
                complexity += 1;
            }
            _ => {}
        }
        true
    });
    complexity
}

/// Operator and operand tallies for Halstead metrics.
#[derive(Default)]
struct HalsteadCounts<'a> {
    operators: HashSet<&'a str>,
    operands: HashSet<&'a str>,
    total_operators: usize,
    total_operands: usize,
}

impl<'a> HalsteadCounts<'a> {
    fn operator(&mut self, text: &'a str) {
        self.operators.insert(text);
        self.total_operators += 1;
    }

    fn operand(&mut self, text: &'a str) {
        self.operands.insert(text);
        self.total_operands += 1;
    }

    /// Volume = N * log2(η)
    fn volume(&self) -> f64 {
        let vocabulary = self.operators.len() + self.operands.len();
        if vocabulary == 0 {
            return 0.0;
        }
        let length = self.total_operators + self.total_operands;
        length as f64 * (vocabulary as f64).log2()
    }
}

/// Halstead volume over operator expressions.
///
/// Operators are the tokens of binary, boolean, comparison, unary and
/// augmented-assignment expressions; operands are the expressions they join.
fn halstead_volume(root: &Node, source: &[u8]) -> f64 {
    let mut counts = HalsteadCounts::default();
    walk_tree(*root, |node| {
        match node.kind() {
            "binary_operator" | "boolean_operator" | "augmented_assignment" => {
                if let Some(op) = node.child_by_field_name("operator") {
                    counts.operator(text_of(&op, source));
                }
                for field in ["left", "right"] {
                    if let Some(operand) = node.child_by_field_name(field) {
                        counts.operand(text_of(&operand, source));
                    }
                }
            }
            "comparison_operator" => {
                for child in node.children(&mut node.walk()) {
                    if child.is_named() {
                        counts.operand(text_of(&child, source));
                    } else {
                        counts.operator(text_of(&child, source));
                    }
                }
            }
            "unary_operator" => {
                if let Some(op) = node.child_by_field_name("operator") {
                    counts.operator(text_of(&op, source));
                }
                if let Some(arg) = node.child_by_field_name("argument") {
                    counts.operand(text_of(&arg, source));
                }
            }
            "not_operator" => {
                counts.operator("not");
                if let Some(arg) = node.child_by_field_name("argument") {
                    counts.operand(text_of(&arg, source));
                }
            }
            _ => {}
        }

        true
    });
    counts.volume()
}

fn text_of<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}
