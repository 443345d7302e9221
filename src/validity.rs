//! Python 3 rules the tree-sitter grammar does not enforce.
//!
//! The grammar is permissive: it still parses Python 2 `print`/`exec`
//! statements, accepts parameter lists in any order and recovers from
//! indentation mistakes without an ERROR node. The compiler rejects all of
//! these, so a tree that breaks one of the rules below is not valid source.

use tree_sitter::Node;

/// A rule broken by otherwise well-formed syntax. Positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Violation {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Violation {
    fn at(node: Node, message: impl Into<String>) -> Self {
        let position = node.start_position();
        Self {
            line: position.row + 1,
            column: position.column + 1,
            message: message.into(),
        }
    }
}

/// First violation in document order, if any.
pub(crate) fn first_violation(root: Node, source: &str) -> Option<Violation> {
    visit(root, source)
}

fn visit(node: Node, source: &str) -> Option<Violation> {
    let found = match node.kind() {
        "print_statement" => Some(Violation::at(node, "Python 2 print statement")),
        "exec_statement" => Some(Violation::at(node, "Python 2 exec statement")),
        "parameters" | "lambda_parameters" => check_parameters(node),
        "block" => check_block(node, source),
        "module" => check_module(node, source),
        _ => None,
    };
    if found.is_some() {
        return found;
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = visit(child, source) {
            return Some(found);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Param {
    Plain,
    Default,
    Star { bare: bool },
    DoubleStar,
    Slash,
    Tuple,
}

fn classify(param: Node) -> Option<Param> {
    let class = match param.kind() {
        "identifier" => Param::Plain,
        "default_parameter" | "typed_default_parameter" => Param::Default,
        "list_splat_pattern" => Param::Star { bare: false },
        "dictionary_splat_pattern" => Param::DoubleStar,
        "keyword_separator" => Param::Star { bare: true },
        "positional_separator" => Param::Slash,
        "tuple_pattern" => Param::Tuple,
        // `*args: T` and `**kw: T` wrap the splat
        "typed_parameter" => match param.named_child(0).map(|n| n.kind()) {
            Some("list_splat_pattern") => Param::Star { bare: false },
            Some("dictionary_splat_pattern") => Param::DoubleStar,
            _ => Param::Plain,
        },
        _ => return None,
    };
    Some(class)
}

fn check_parameters(params: Node) -> Option<Violation> {
    let mut count = 0usize;
    let mut seen_default = false;
    let mut seen_star = false;
    let mut seen_slash = false;
    let mut seen_double_star = false;
    let mut bare_star: Option<Node> = None;

    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let Some(class) = classify(param) else {
            continue;
        };
        if seen_double_star {
            return Some(Violation::at(
                param,
                "arguments cannot follow var-keyword argument",
            ));
        }
        match class {
            Param::Plain => {
                if seen_default && !seen_star {
                    return Some(Violation::at(
                        param,
                        "non-default argument follows default argument",
                    ));
                }
                bare_star = None;
            }
            Param::Default => {
                seen_default = seen_default || !seen_star;
                bare_star = None;
            }
            Param::Star { bare } => {
                if seen_star {
                    return Some(Violation::at(param, "* argument may appear only once"));
                }
                seen_star = true;
                if bare {
                    bare_star = Some(param);
                }
            }
            Param::DoubleStar => {
                if let Some(star) = bare_star {
                    return Some(Violation::at(star, "named arguments must follow bare *"));
                }
                seen_double_star = true;
            }
            Param::Slash => {
                if count == 0 {
                    return Some(Violation::at(param, "at least one argument must precede /"));
                }
                if seen_slash {
                    return Some(Violation::at(param, "/ may appear only once"));
                }
                if seen_star {
                    return Some(Violation::at(param, "/ must be ahead of *"));
                }
                seen_slash = true;
            }
            Param::Tuple => {
                return Some(Violation::at(
                    param,
                    "tuple parameter unpacking is not supported",
                ));
            }
        }
        count += 1;
    }

    bare_star.map(|star| Violation::at(star, "named arguments must follow bare *"))
}

fn check_block(block: Node, source: &str) -> Option<Violation> {
    let statements = statements(block);
    let Some(first) = statements.first().copied() else {
        return Some(Violation::at(block, "expected an indented block"));
    };
    // `def f(): return 1` keeps its body on the header line
    if !starts_line(first, source) {
        return None;
    }

    let header_width = block
        .parent()
        .map(|header| indent_width(leading_whitespace(line_prefix(header, source))))
        .unwrap_or(0);
    let body_width = indent_width(line_prefix(first, source));
    if body_width <= header_width {
        return Some(Violation::at(first, "expected an indented block"));
    }

    for statement in statements.iter().skip(1).copied() {
        if !starts_line(statement, source) {
            continue;
        }
        let width = indent_width(line_prefix(statement, source));
        if width > body_width {
            return Some(Violation::at(statement, "unexpected indent"));
        }
        if width < body_width {
            return Some(Violation::at(
                statement,
                "unindent does not match any outer indentation level",
            ));
        }
    }
    None
}

fn check_module(module: Node, source: &str) -> Option<Violation> {
    let mut previous: Option<Node> = None;
    for statement in statements(module) {
        if starts_line(statement, source) && indent_width(line_prefix(statement, source)) > 0 {
            // Indented text after a block is a dedent to a level that never existed
            let message = if previous.is_some_and(ends_with_block) {
                "unindent does not match any outer indentation level"
            } else {
                "unexpected indent"
            };
            return Some(Violation::at(statement, message));
        }
        previous = Some(statement);
    }
    None
}

fn statements(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let statements = node
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    statements
}

fn ends_with_block(statement: Node) -> bool {
    let mut current = statement;
    loop {
        if current.kind() == "block" {
            return true;
        }
        let count = current.named_child_count();
        match count.checked_sub(1).and_then(|last| current.named_child(last)) {
            Some(last) => current = last,
            None => return false,
        }
    }
}

/// Source text between the start of the node's line and the node.
fn line_prefix<'a>(node: Node, source: &'a str) -> &'a str {
    let start = node.start_byte();
    let line_start = start.saturating_sub(node.start_position().column);
    source.get(line_start..start).unwrap_or("")
}

fn starts_line(node: Node, source: &str) -> bool {
    line_prefix(node, source).chars().all(is_indent_char)
}

fn leading_whitespace(prefix: &str) -> &str {
    let end = prefix
        .char_indices()
        .find(|(_, c)| !is_indent_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(prefix.len());
    &prefix[..end]
}

fn is_indent_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Indentation width with tabs advancing to the next multiple of eight.
fn indent_width(indent: &str) -> usize {
    indent.chars().fold(0, |width, c| match c {
        '\t' => (width / 8 + 1) * 8,
        '\x0c' => 0,
        _ => width + 1,
    })
}
