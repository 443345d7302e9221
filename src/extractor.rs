//! Structural extraction of top-level Python declarations.
//!
//! Source text is parsed with tree-sitter's Python grammar. Only statements
//! directly under the module are inspected; anything nested inside a function
//! or class body is implementation detail and ignored.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

use crate::error::{ApiDeltaError, Result};
use crate::snapshot::Snapshot;
use crate::validity;

const FUNCTION_DEFINITION: &str = "function_definition";
const CLASS_DEFINITION: &str = "class_definition";
const DECORATED_DEFINITION: &str = "decorated_definition";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Function,
    Class,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Class => "class",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named function or class defined at module level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Parameter names in order; `*args`/`**kwargs` keep their stars and the
    /// bare `*` and `/` markers appear as-is. Always empty for classes.
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub docstring: Option<String>,
    /// 1-based line of the `def` or `class` keyword.
    pub line: usize,
}

impl Declaration {
    pub fn function(name: impl Into<String>, parameters: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind: DeclarationKind::Function,
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            return_type: None,
            docstring: None,
            line: 1,
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DeclarationKind::Class,
            parameters: Vec::new(),
            return_type: None,
            docstring: None,
            line: 1,
        }
    }

    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Human-readable signature, e.g. `get_user(user_id) -> dict` or `class UserProfile`.
    pub fn signature(&self) -> String {
        match self.kind {
            DeclarationKind::Class => format!("class {}", self.name),
            DeclarationKind::Function => {
                let mut sig = format!("{}({})", self.name, self.parameters.join(", "));
                if let Some(ref ret) = self.return_type {
                    sig.push_str(" -> ");
                    sig.push_str(ret);
                }
                sig
            }
        }
    }
}

/// Declarations of one snapshot, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuralSummary {
    declarations: BTreeMap<String, Declaration>,
}

impl StructuralSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a declaration. A later declaration with the same name replaces
    /// the earlier one, matching Python's rebinding semantics.
    pub fn insert(&mut self, declaration: Declaration) -> Option<Declaration> {
        self.declarations
            .insert(declaration.name.clone(), declaration)
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.declarations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl FromIterator<Declaration> for StructuralSummary {
    fn from_iter<I: IntoIterator<Item = Declaration>>(iter: I) -> Self {
        let mut summary = StructuralSummary::new();
        for declaration in iter {
            summary.insert(declaration);
        }
        summary
    }
}

/// Extract the top-level declarations of a snapshot.
///
/// An absent snapshot yields an empty summary. Text that is not valid Python 3
/// fails with [`ApiDeltaError::Parse`] pointing at the first syntax error.
pub fn extract(snapshot: &Snapshot) -> Result<StructuralSummary> {
    let Some(source) = snapshot.content() else {
        return Ok(StructuralSummary::new());
    };

    let parse_error = |line: usize, column: usize, message: String| ApiDeltaError::Parse {
        path: snapshot.path().to_string(),
        revision: snapshot.revision().to_string(),
        line,
        column,
        message,
    };

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| {
            ApiDeltaError::Configuration(format!("Python grammar is unusable: {}", e))
        })?;

    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| parse_error(1, 1, "parser produced no syntax tree".to_string()))?;
    let root = tree.root_node();

    if let Some(bad) = first_syntax_error(root) {
        let position = bad.start_position();
        return Err(parse_error(
            position.row + 1,
            position.column + 1,
            describe_syntax_error(bad, source),
        ));
    }
    if let Some(violation) = validity::first_violation(root, source) {
        return Err(parse_error(violation.line, violation.column, violation.message));
    }

    let mut summary = StructuralSummary::new();
    let mut cursor = root.walk();
    for statement in root.named_children(&mut cursor) {
        let definition = match statement.kind() {
            DECORATED_DEFINITION => statement.child_by_field_name("definition"),
            FUNCTION_DEFINITION | CLASS_DEFINITION => Some(statement),
            _ => None,
        };
        if let Some(declaration) = definition.and_then(|node| declaration(node, source)) {
            summary.insert(declaration);
        }
    }
    Ok(summary)
}

fn declaration(node: Node, source: &str) -> Option<Declaration> {
    let kind = match node.kind() {
        FUNCTION_DEFINITION => DeclarationKind::Function,
        CLASS_DEFINITION => DeclarationKind::Class,
        _ => return None,
    };
    let name = text(node.child_by_field_name("name")?, source)?.to_string();

    let (parameters, return_type) = match kind {
        DeclarationKind::Function => (
            node.child_by_field_name("parameters")
                .map(|params| parameter_names(params, source))
                .unwrap_or_default(),
            node.child_by_field_name("return_type")
                .and_then(|ret| text(ret, source))
                .map(collapse_whitespace),
        ),
        DeclarationKind::Class => (Vec::new(), None),
    };

    let docstring = node
        .child_by_field_name("body")
        .and_then(|body| docstring(body, source));

    Some(Declaration {
        name,
        kind,
        parameters,
        return_type,
        docstring,
        line: node.start_position().row + 1,
    })
}

fn parameter_names(params: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let name = match param.kind() {
            "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                text(param, source).map(compact)
            }
            // First child is the name (possibly starred); the annotation follows.
            "typed_parameter" => param.named_child(0).and_then(|n| text(n, source)).map(compact),
            "default_parameter" | "typed_default_parameter" => param
                .child_by_field_name("name")
                .and_then(|n| text(n, source))
                .map(compact),
            "keyword_separator" => Some("*".to_string()),
            "positional_separator" => Some("/".to_string()),
            _ => None,
        };
        if let Some(name) = name {
            names.push(name);
        }
    }
    names
}

/// The docstring is the first statement of the body when it is a plain
/// string literal. f-strings and bytes literals do not count.
fn docstring(body: Node, source: &str) -> Option<String> {
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }
    let literal = first.named_child(0)?;
    let raw = match literal.kind() {
        "string" => string_value(text(literal, source)?)?,
        "concatenated_string" => {
            let mut joined = String::new();
            let mut parts = literal.walk();
            for part in literal.named_children(&mut parts) {
                if part.kind() != "string" {
                    continue;
                }
                joined.push_str(&string_value(text(part, source)?)?);
            }
            joined
        }
        _ => return None,
    };
    clean_docstring(&raw)
}

/// Value of a string literal from its source text: prefix and quotes
/// stripped, escape sequences decoded unless the literal is raw.
fn string_value(literal: &str) -> Option<String> {
    let quote_start = literal.find(['"', '\''])?;
    let prefix = literal[..quote_start].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let quoted = &literal[quote_start..];
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if quoted.len() >= 2 * quote.len() && quoted.starts_with(quote) && quoted.ends_with(quote)
        {
            let body = &quoted[quote.len()..quoted.len() - quote.len()];
            return Some(if prefix.contains('r') {
                body.to_string()
            } else {
                unescape(body)
            });
        }
    }
    None
}

/// Decode backslash escapes. Unknown or malformed escapes, and `\N{...}`
/// names, are kept as written.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escape) = chars.next() else {
            out.push('\\');
            break;
        };
        match escape {
            // Line continuation
            '\n' => {}
            '\r' => {
                chars.next_if_eq(&'\n');
            }
            '\\' | '\'' | '"' => out.push(escape),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = escape.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                match char::from_u32(value) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('\\');
                        out.push_str(&format!("{:o}", value));
                    }
                }
            }
            'x' | 'u' | 'U' => {
                let width = match escape {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let mut digits = String::with_capacity(width);
                while digits.len() < width {
                    match chars.next_if(char::is_ascii_hexdigit) {
                        Some(digit) => digits.push(digit),
                        None => break,
                    }
                }
                let decoded = (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('\\');
                        out.push(escape);
                        out.push_str(&digits);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

/// Normalise docstring indentation the way `inspect.cleandoc` does:
/// the first line loses leading whitespace, the rest lose their common
/// indent, and blank lines at either end are dropped.
fn clean_docstring(raw: &str) -> Option<String> {
    let expanded: Vec<String> = raw.lines().map(expand_tabs).collect();
    let lines: Vec<&str> = expanded.iter().map(String::as_str).collect();
    let indent = |line: &str| line.chars().take_while(|c| c.is_whitespace()).count();

    let margin = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| indent(line))
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    if let Some(first) = lines.first() {
        cleaned.push(first.trim().to_string());
    }
    for line in lines.iter().skip(1) {
        let strip = margin.min(indent(line));
        let rest: String = line.chars().skip(strip).collect();
        cleaned.push(rest.trim_end().to_string());
    }

    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    let leading_blank = cleaned.iter().take_while(|l| l.is_empty()).count();
    let doc = cleaned[leading_blank..].join("\n");

    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

/// Replace tabs with spaces up to the next multiple of eight columns.
fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0usize;
    for c in line.chars() {
        if c == '\t' {
            let pad = 8 - column % 8;
            out.extend(std::iter::repeat_n(' ', pad));
            column += pad;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}

fn first_syntax_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_syntax_error(child) {
            return Some(found);
        }
    }
    None
}

fn describe_syntax_error(node: Node, source: &str) -> String {
    if node.is_missing() {
        return format!("missing `{}`", node.kind());
    }
    let snippet: String = text(node, source)
        .and_then(|t| t.lines().next())
        .unwrap_or("")
        .trim()
        .chars()
        .take(40)
        .collect();
    if snippet.is_empty() {
        "invalid syntax".to_string()
    } else {
        format!("invalid syntax near `{}`", snippet)
    }
}

fn text<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    node.utf8_text(source.as_bytes()).ok()
}

fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Revision;

    fn summarize(source: &str) -> StructuralSummary {
        let snapshot = Snapshot::present("mod.py", Revision::Current, source.to_string());
        extract(&snapshot).unwrap()
    }

    #[test]
    fn test_absent_snapshot_is_empty() {
        let snapshot = Snapshot::absent("mod.py", Revision::at("HEAD"));
        assert!(extract(&snapshot).unwrap().is_empty());
    }

    #[test]
    fn test_empty_source_is_empty() {
        assert!(summarize("").is_empty());
        assert!(summarize("# only a comment\nx = 1\n").is_empty());
    }

    #[test]
    fn test_functions_and_classes() {
        let summary = summarize(
            r#"
def get_user(user_id: int):
    """Retrieves user details by ID."""
    return {"id": user_id}

def list_users():
    """Lists all users."""
    return []

class UserProfile:
    """Represents a user profile."""
    def __init__(self, user_id):
        self.user_id = user_id
"#,
        );

        assert_eq!(summary.len(), 3);
        let get_user = summary.get("get_user").unwrap();
        assert_eq!(get_user.kind, DeclarationKind::Function);
        assert_eq!(get_user.parameters, vec!["user_id"]);
        assert_eq!(get_user.docstring.as_deref(), Some("Retrieves user details by ID."));
        assert_eq!(get_user.line, 2);

        let profile = summary.get("UserProfile").unwrap();
        assert_eq!(profile.kind, DeclarationKind::Class);
        assert!(profile.parameters.is_empty());
        assert_eq!(profile.docstring.as_deref(), Some("Represents a user profile."));
        assert_eq!(profile.line, 10);
    }

    #[test]
    fn test_nested_declarations_ignored() {
        let summary = summarize(
            "def outer():\n    def inner():\n        pass\n    class Local:\n        pass\n\nclass Outer:\n    def method(self):\n        pass\n",
        );
        let names: Vec<&str> = summary.names().collect();
        assert_eq!(names, vec!["Outer", "outer"]);
    }

    #[test]
    fn test_decorated_and_async() {
        let summary = summarize(
            "import functools\n\n@functools.cache\ndef cached(n):\n    return n\n\nasync def fetch(url, *, timeout=10):\n    pass\n\n@dataclass\nclass Point:\n    x: int\n",
        );
        assert_eq!(summary.get("cached").unwrap().parameters, vec!["n"]);
        assert_eq!(summary.get("cached").unwrap().line, 4);
        assert_eq!(
            summary.get("fetch").unwrap().parameters,
            vec!["url", "*", "timeout"]
        );
        assert_eq!(summary.get("Point").unwrap().kind, DeclarationKind::Class);
    }

    #[test]
    fn test_parameter_forms() {
        let summary = summarize(
            "def f(a, b: int, c=1, d: str = 'x', /, e=2, *args: int, g, **kwargs) -> dict[str, int]:\n    pass\n",
        );
        let f = summary.get("f").unwrap();
        assert_eq!(
            f.parameters,
            vec!["a", "b", "c", "d", "/", "e", "*args", "g", "**kwargs"]
        );
        assert_eq!(f.return_type.as_deref(), Some("dict[str, int]"));
        assert_eq!(f.signature(), "f(a, b, c, d, /, e, *args, g, **kwargs) -> dict[str, int]");
    }

    #[test]
    fn test_last_definition_wins() {
        let summary = summarize("def f(a):\n    pass\n\ndef f(a, b):\n    pass\n");
        assert_eq!(summary.len(), 1);
        assert_eq!(summary.get("f").unwrap().parameters, vec!["a", "b"]);
        assert_eq!(summary.get("f").unwrap().line, 4);
    }

    #[test]
    fn test_multiline_docstring_cleaned() {
        let summary = summarize(
            "def binary_search(arr, target):\n    \"\"\"\n    Performs binary search.\n\n    Returns:\n        int: index or -1.\n    \"\"\"\n    return -1\n",
        );
        assert_eq!(
            summary.get("binary_search").unwrap().docstring.as_deref(),
            Some("Performs binary search.\n\nReturns:\n    int: index or -1.")
        );
    }

    #[test]
    fn test_docstring_variants() {
        let summary = summarize(
            "def a():\n    # leading comment\n    'single quoted'\n\ndef b():\n    f\"not {a} doc\"\n\ndef c():\n    x = 1\n    \"too late\"\n\ndef d():\n    r'''raw doc'''\n",
        );
        assert_eq!(summary.get("a").unwrap().docstring.as_deref(), Some("single quoted"));
        assert_eq!(summary.get("b").unwrap().docstring, None);
        assert_eq!(summary.get("c").unwrap().docstring, None);
        assert_eq!(summary.get("d").unwrap().docstring.as_deref(), Some("raw doc"));
    }

    #[test]
    fn test_syntax_error_position() {
        let snapshot = Snapshot::present(
            "broken.py",
            Revision::at("abc"),
            "def ok():\n    pass\n\ndef broken(:\n    pass\n".to_string(),
        );
        match extract(&snapshot).unwrap_err() {
            ApiDeltaError::Parse {
                path,
                revision,
                line,
                ..
            } => {
                assert_eq!(path, "broken.py");
                assert_eq!(revision, "abc");
                assert_eq!(line, 4);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_string_value() {
        assert_eq!(string_value("\"\"\"doc\"\"\"").as_deref(), Some("doc"));
        assert_eq!(string_value("'x'").as_deref(), Some("x"));
        assert_eq!(string_value("u'x'").as_deref(), Some("x"));
        assert_eq!(string_value("\"\"").as_deref(), Some(""));
        assert_eq!(string_value("b'x'"), None);
        assert_eq!(string_value("F'x'"), None);
    }

    #[test]
    fn test_python2_and_misordered_sources_rejected() {
        let cases = [
            ("def f():\npass\n", "expected an indented block"),
            ("class C:\n    pass\n  x = 1\n", "unindent does not match"),
            ("print \"hello\"\n\ndef f():\n    pass\n", "print statement"),
            ("def f(a=1, b):\n    pass\n", "non-default argument"),
            ("def f(**kw, a):\n    pass\n", "var-keyword"),
        ];
        for (source, expected) in cases {
            let snapshot = Snapshot::present("legacy.py", Revision::at("v0"), source.to_string());
            match extract(&snapshot) {
                Err(ApiDeltaError::Parse { message, .. }) => {
                    assert!(message.contains(expected), "{:?}: {}", source, message)
                }
                other => panic!("expected parse error for {:?}, got {:?}", source, other),
            }
        }
    }

    #[test]
    fn test_indented_first_statement_rejected() {
        let snapshot = Snapshot::present(
            "m.py",
            Revision::Current,
            "  def f():\n      pass\n".to_string(),
        );
        assert!(extract(&snapshot).unwrap_err().is_parse());
    }

    #[test]
    fn test_escaped_docstring_matches_literal_text() {
        let escaped = summarize("def greet():\n    \"\"\"Say hello to the caf\\u00e9.\"\"\"\n");
        let literal = summarize("def greet():\n    \"\"\"Say hello to the café.\"\"\"\n");
        assert_eq!(
            escaped.get("greet").unwrap().docstring.as_deref(),
            Some("Say hello to the café.")
        );
        assert!(crate::delta::diff(&escaped, &literal).is_empty());

        let split = summarize("def f():\n    \"First line.\\n\\nDetails.\"\n");
        assert_eq!(
            split.get("f").unwrap().docstring.as_deref(),
            Some("First line.\n\nDetails.")
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"tab\there"), "tab\there");
        assert_eq!(unescape(r"\x41\101\u00e9\U0001F600"), "AAé😀");
        assert_eq!(unescape(r#"\\ \' \""#), r#"\ ' ""#);
        assert_eq!(unescape("joined \\\nline"), "joined line");
        assert_eq!(unescape(r"\d+ \N{BULLET} \xZZ"), r"\d+ \N{BULLET} \xZZ");
        assert_eq!(string_value(r"r'\n stays'").as_deref(), Some(r"\n stays"));
    }

    #[test]
    fn test_clean_docstring_expands_tabs_by_column() {
        // Both lines sit at column 8 once tabs are expanded to tab stops
        assert_eq!(
            clean_docstring("Summary.\n\tfirst\n    \tsecond").as_deref(),
            Some("Summary.\nfirst\nsecond")
        );
        assert_eq!(expand_tabs("ab\tc"), "ab      c");
        assert_eq!(expand_tabs("\t\tx"), format!("{}x", " ".repeat(16)));
    }

    #[test]
    fn test_clean_docstring_blank() {
        assert_eq!(clean_docstring("   \n   \n"), None);
        assert_eq!(clean_docstring("  one line  ").as_deref(), Some("one line"));
    }

    #[test]
    fn test_summary_serializes_as_map() {
        let summary: StructuralSummary =
            vec![Declaration::function("f", &["a"]).with_return_type("int")]
                .into_iter()
                .collect();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["f"]["kind"], "function");
        assert_eq!(json["f"]["parameters"][0], "a");
        assert_eq!(json["f"]["return_type"], "int");
    }
}
