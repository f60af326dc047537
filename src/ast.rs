//! Host-language adaptor (spec §4's parser-adaptor boundary, §9 Design Note
//! on dynamic dispatch and arena identity).
//!
//! A [`TranslationUnit`] owns its `tree_sitter::Tree` and source text.
//! Everything downstream addresses statements by `(translation unit, local
//! index)` rather than holding `tree_sitter::Node` references, so caches can
//! key on that pair without fighting the tree's borrow lifetime — two
//! windows that happen to share a statement share its cache entry; two
//! statements with identical text but different positions never collide,
//! because their indices differ.
//!
//! Node-kind dispatch is a sum type ([`Emission`]) with an exhaustive match
//! in [`classify`]; anything not recognized falls through to the `Recurse`
//! arm, so unsupported syntax degrades to "walk the children" instead of
//! panicking or silently dropping subtrees.

use std::collections::HashSet;

use tree_sitter::{Node, Parser, Tree};

use crate::errors::{Error, Result};
use crate::span::Span;
use crate::token::{is_assert_name, is_mock_name, ControlFlowKind, KeywordKind, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMode {
    /// Literals become placeholders; identifiers keep their spelling.
    LiteralOnly,
    /// Literals become placeholders; variable/field identifiers are also
    /// anonymized to `VAR`/`FIELD`.
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Method,
    Constructor,
    StaticInitializer,
    InstanceInitializer,
    Lambda,
}

#[derive(Debug, Clone)]
pub struct Callable {
    pub name: String,
    pub owner_path: Vec<String>,
    pub kind: CallableKind,
    pub is_test: bool,
    /// Half-open range into `TranslationUnit::statements`.
    pub stmt_range: (usize, usize),
    body_byte_range: (usize, usize),
}

#[derive(Debug, Clone, Copy)]
pub struct StmtMeta {
    pub start_byte: usize,
    pub end_byte: usize,
    pub span: Span,
    pub callable_idx: usize,
}

pub struct TranslationUnit {
    pub path: String,
    pub source: String,
    tree: Tree,
    pub callables: Vec<Callable>,
    pub statements: Vec<StmtMeta>,
}

impl std::fmt::Debug for TranslationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationUnit")
            .field("path", &self.path)
            .field("callables", &self.callables.len())
            .field("statements", &self.statements.len())
            .finish()
    }
}

impl TranslationUnit {
    /// Resolves a statement's syntax node by its recorded byte range.
    ///
    /// The range was captured from an actual statement node during
    /// extraction, so `descendant_for_byte_range` normally returns that
    /// exact node. If it doesn't — the tree was edited out from under us,
    /// or the recorded range no longer addresses a node — that is spec
    /// §7's `StructuralError`: "a statement lacks a source range", locally
    /// fatal to the statement/sequence touching it, never to the whole run.
    pub(crate) fn stmt_node(&self, idx: usize) -> Result<Node<'_>> {
        let meta = &self.statements[idx];
        self.tree
            .root_node()
            .descendant_for_byte_range(meta.start_byte, meta.end_byte)
            .ok_or_else(|| {
                Error::Structural(format!(
                    "statement {idx} in '{}' has no resolvable source range ({}..{})",
                    self.path, meta.start_byte, meta.end_byte
                ))
            })
    }

    pub fn stmt_span(&self, idx: usize) -> Span {
        self.statements[idx].span
    }
}

pub fn parse_translation_unit(path: &str, source: &str) -> Result<TranslationUnit> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|_| Error::TreeSitterLanguage)?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::TreeSitterParse(path.to_string()))?;

    let mut tu = TranslationUnit {
        path: path.to_string(),
        source: source.to_string(),
        tree,
        callables: Vec::new(),
        statements: Vec::new(),
    };

    let root = tu.tree.root_node();
    let mut owner_path = Vec::new();
    let mut callables = Vec::new();
    collect_callables(root, &tu.source, &mut owner_path, &mut callables);
    tu.callables = callables;

    let mut statements = Vec::new();
    for (idx, callable) in tu.callables.iter_mut().enumerate() {
        let start = statements.len();
        collect_statements(
            body_block_of(callable, &tu.tree, &tu.source),
            &tu.source,
            idx,
            &mut statements,
        );
        callable.stmt_range = (start, statements.len());
    }
    tu.statements = statements;

    Ok(tu)
}

/// Re-locates a callable's body block via its recorded byte range; avoided
/// storing `Node` directly on `Callable` to keep it `'static`-friendly.
fn body_block_of<'a>(callable: &Callable, tree: &'a Tree, _source: &str) -> Node<'a> {
    tree.root_node()
        .descendant_for_byte_range(callable.body_byte_range.0, callable.body_byte_range.1)
        .unwrap_or_else(|| tree.root_node())
}

// -- callable discovery ------------------------------------------------

fn collect_callables(
    node: Node,
    source: &str,
    owner_path: &mut Vec<String>,
    out: &mut Vec<Callable>,
) {
    let kind = node.kind();
    match kind {
        "class_declaration" | "interface_declaration" | "enum_declaration"
        | "annotation_type_declaration" | "record_declaration" => {
            let name = node
                .child_by_field_name("name")
                .map(|n| text_of(n, source))
                .unwrap_or_else(|| "<anonymous>".to_string());
            owner_path.push(name);
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for member in body.named_children(&mut cursor) {
                    if member.kind() == "block" {
                        push_callable(
                            member,
                            "<init>".to_string(),
                            CallableKind::InstanceInitializer,
                            false,
                            owner_path,
                            out,
                        );
                    } else {
                        collect_callables(member, source, owner_path, out);
                    }
                }
            }
            owner_path.pop();
        }
        "method_declaration" => {
            if let Some(body) = node.child_by_field_name("body") {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| text_of(n, source))
                    .unwrap_or_default();
                let is_test = has_test_annotation(node, source) || name.starts_with("test");
                push_callable(
                    body,
                    name,
                    CallableKind::Method,
                    is_test,
                    owner_path,
                    out,
                );
            }
            walk_nested_bodies(node, source, owner_path, out);
        }
        "constructor_declaration" => {
            if let Some(body) = node.child_by_field_name("body") {
                let name = owner_path.last().cloned().unwrap_or_default();
                push_callable(body, name, CallableKind::Constructor, false, owner_path, out);
            }
            walk_nested_bodies(node, source, owner_path, out);
        }
        "static_initializer" => {
            if let Some(body) = node.named_child(0).filter(|n| n.kind() == "block") {
                push_callable(
                    body,
                    "<clinit>".to_string(),
                    CallableKind::StaticInitializer,
                    false,
                    owner_path,
                    out,
                );
            }
        }
        "lambda_expression" => {
            if let Some(body) = node.child_by_field_name("body").filter(|n| n.kind() == "block") {
                push_callable(body, "<lambda>".to_string(), CallableKind::Lambda, false, owner_path, out);
            }
            walk_nested_bodies(node, source, owner_path, out);
        }
        "object_creation_expression" => {
            if let Some(anon_body) = node.child_by_field_name("body") {
                owner_path.push("<anonymous>".to_string());
                let mut cursor = anon_body.walk();
                for member in anon_body.named_children(&mut cursor) {
                    if member.kind() == "block" {
                        push_callable(
                            member,
                            "<init>".to_string(),
                            CallableKind::InstanceInitializer,
                            false,
                            owner_path,
                            out,
                        );
                    } else {
                        collect_callables(member, source, owner_path, out);
                    }
                }
                owner_path.pop();
            }
            walk_nested_bodies(node, source, owner_path, out);
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_callables(child, source, owner_path, out);
            }
        }
    }
}

/// After registering a callable's own body, its body is still walked for
/// nested callables (a lambda defined inside a method, a local class, an
/// anonymous class constructed inline) — each becomes an independent
/// container, never merged into its enclosing callable's statement list.
fn walk_nested_bodies(node: Node, source: &str, owner_path: &mut Vec<String>, out: &mut Vec<Callable>) {
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            collect_callables(child, source, owner_path, out);
        }
    }
}

fn push_callable(
    body: Node,
    name: String,
    kind: CallableKind,
    is_test: bool,
    owner_path: &[String],
    out: &mut Vec<Callable>,
) {
    out.push(Callable {
        name,
        owner_path: owner_path.to_vec(),
        kind,
        is_test,
        stmt_range: (0, 0),
        body_byte_range: (body.start_byte(), body.end_byte()),
    });
}

fn has_test_annotation(method_decl: Node, source: &str) -> bool {
    if let Some(modifiers) = method_decl.child_by_field_name("modifiers") {
        let mut cursor = modifiers.walk();
        for m in modifiers.named_children(&mut cursor) {
            if matches!(m.kind(), "marker_annotation" | "annotation") {
                let text = text_of(m, source);
                if text.contains("Test") {
                    return true;
                }
            }
        }
    }
    false
}

fn collect_statements(body: Node, source: &str, callable_idx: usize, out: &mut Vec<StmtMeta>) {
    let _ = source;
    let mut cursor = body.walk();
    for stmt in body.named_children(&mut cursor) {
        out.push(StmtMeta {
            start_byte: stmt.start_byte(),
            end_byte: stmt.end_byte(),
            span: span_of(stmt),
            callable_idx,
        });
    }
}

fn span_of(node: Node) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start_line: start.row,
        start_col: start.column,
        end_line: end.row,
        end_col: end.column,
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
    }
}

fn text_of<'a>(node: Node, source: &'a str) -> String {
    node.utf8_text(source.as_bytes())
        .unwrap_or_default()
        .to_string()
}

// -- node classification -------------------------------------------------

enum Emission<'a> {
    Token {
        kind: TokenKind,
        text: String,
        is_decl: bool,
        children: Vec<Node<'a>>,
    },
    Multi(Vec<Emission<'a>>),
    Recurse,
}

fn classify<'a>(node: Node<'a>, source: &str) -> Emission<'a> {
    let kind = node.kind();
    match kind {
        "method_invocation" => {
            let name_node = node.child_by_field_name("name");
            let text = name_node.map(|n| text_of(n, source)).unwrap_or_default();
            let token_kind = if is_assert_name(&text) {
                TokenKind::Assert(text.clone())
            } else if is_mock_name(&text) {
                TokenKind::Mock(text.clone())
            } else {
                TokenKind::MethodCall(text.clone())
            };
            let mut children = Vec::new();
            if let Some(object) = node.child_by_field_name("object") {
                children.push(object);
            }
            if let Some(args) = node.child_by_field_name("arguments") {
                children.push(args);
            }
            Emission::Token {
                kind: token_kind,
                text,
                is_decl: false,
                children,
            }
        }
        "field_access" => {
            let field_node = node.child_by_field_name("field");
            let text = field_node.map(|n| text_of(n, source)).unwrap_or_default();
            let mut children = Vec::new();
            if let Some(object) = node.child_by_field_name("object") {
                children.push(object);
            }
            Emission::Token {
                kind: TokenKind::Field,
                text,
                is_decl: false,
                children,
            }
        }
        "variable_declarator" => {
            let name_node = node.child_by_field_name("name");
            let text = name_node.map(|n| text_of(n, source)).unwrap_or_default();
            let mut children = Vec::new();
            if let Some(value) = node.child_by_field_name("value") {
                children.push(value);
            }
            Emission::Token {
                kind: TokenKind::Var,
                text,
                is_decl: true,
                children,
            }
        }
        "formal_parameter" | "spread_parameter" => {
            let mut parts = Vec::new();
            if let Some(ty) = node.child_by_field_name("type") {
                parts.push(leaf_type(ty, source));
            }
            if let Some(name) = node.child_by_field_name("name") {
                parts.push(Emission::Token {
                    kind: TokenKind::Var,
                    text: text_of(name, source),
                    is_decl: true,
                    children: Vec::new(),
                });
            }
            Emission::Multi(parts)
        }
        "catch_formal_parameter" => {
            let mut parts = Vec::new();
            if let Some(ty) = node.child_by_field_name("type") {
                parts.push(leaf_type(ty, source));
            }
            if let Some(name) = node.child_by_field_name("name") {
                parts.push(Emission::Token {
                    kind: TokenKind::Var,
                    text: text_of(name, source),
                    is_decl: true,
                    children: Vec::new(),
                });
            }
            Emission::Multi(parts)
        }
        "type_identifier" | "generic_type" | "scoped_type_identifier" | "array_type"
        | "integral_type" | "floating_point_type" | "boolean_type" | "void_type" => {
            leaf_type(node, source)
        }
        "string_literal" => literal(TokenKind::StringLit, node, source),
        "character_literal" => literal(TokenKind::CharLit, node, source),
        "null_literal" => literal(TokenKind::NullLit, node, source),
        "true" | "false" => literal(TokenKind::BoolLit, node, source),
        "decimal_integer_literal" | "hex_integer_literal" | "octal_integer_literal"
        | "binary_integer_literal" => {
            let text = text_of(node, source);
            let is_long = text.ends_with('L') || text.ends_with('l');
            literal(
                if is_long {
                    TokenKind::LongLit
                } else {
                    TokenKind::IntLit
                },
                node,
                source,
            )
        }
        "decimal_floating_point_literal" | "hex_floating_point_literal" => {
            literal(TokenKind::DoubleLit, node, source)
        }
        "if_statement" => control_flow(ControlFlowKind::If, node),
        "for_statement" => control_flow(ControlFlowKind::For, node),
        "enhanced_for_statement" => control_flow(ControlFlowKind::Foreach, node),
        "while_statement" => control_flow(ControlFlowKind::While, node),
        "do_statement" => control_flow(ControlFlowKind::Do, node),
        "switch_expression" | "switch_statement" => control_flow(ControlFlowKind::Switch, node),
        "try_statement" | "try_with_resources_statement" => control_flow(ControlFlowKind::Try, node),
        "catch_clause" => control_flow(ControlFlowKind::Catch, node),
        "return_statement" => keyword(KeywordKind::Return, node),
        "throw_statement" => keyword(KeywordKind::Throw, node),
        "break_statement" => keyword(KeywordKind::Break, node),
        "continue_statement" => keyword(KeywordKind::Continue, node),
        "binary_expression" | "assignment_expression" | "unary_expression" | "update_expression" => {
            let op_node = node
                .child_by_field_name("operator")
                .or_else(|| node.child_by_field_name("op"));
            let op_text = op_node.map(|n| text_of(n, source)).unwrap_or_default();
            let mut children = Vec::new();
            for field in ["left", "right", "operand"] {
                if let Some(c) = node.child_by_field_name(field) {
                    children.push(c);
                }
            }
            Emission::Token {
                kind: TokenKind::Operator(op_text.clone()),
                text: op_text,
                is_decl: false,
                children,
            }
        }
        "identifier" => Emission::Token {
            kind: TokenKind::Var,
            text: text_of(node, source),
            is_decl: false,
            children: Vec::new(),
        },
        _ => Emission::Recurse,
    }
}

fn leaf_type<'a>(node: Node<'a>, source: &str) -> Emission<'a> {
    Emission::Token {
        kind: TokenKind::Type(text_of(node, source)),
        text: text_of(node, source),
        is_decl: false,
        children: Vec::new(),
    }
}

fn literal<'a>(kind: TokenKind, node: Node<'a>, source: &str) -> Emission<'a> {
    Emission::Token {
        kind,
        text: text_of(node, source),
        is_decl: false,
        children: Vec::new(),
    }
}

fn control_flow<'a>(kind: ControlFlowKind, node: Node<'a>) -> Emission<'a> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    Emission::Token {
        kind: TokenKind::ControlFlow(kind),
        text: node.kind().to_string(),
        is_decl: false,
        children,
    }
}

fn keyword<'a>(kind: KeywordKind, node: Node<'a>) -> Emission<'a> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    Emission::Token {
        kind: TokenKind::Keyword(kind),
        text: node.kind().to_string(),
        is_decl: false,
        children,
    }
}

fn spelling(kind: &TokenKind, text: &str, mode: NormalizeMode) -> String {
    match kind {
        TokenKind::Var if mode == NormalizeMode::Fuzzy => "VAR".to_string(),
        TokenKind::Field if mode == NormalizeMode::Fuzzy => "FIELD".to_string(),
        TokenKind::Var | TokenKind::Field => text.to_string(),
        TokenKind::StringLit => "STRING_LIT".to_string(),
        TokenKind::IntLit => "INT_LIT".to_string(),
        TokenKind::LongLit => "LONG_LIT".to_string(),
        TokenKind::DoubleLit => "DOUBLE_LIT".to_string(),
        TokenKind::BoolLit => "BOOL_LIT".to_string(),
        TokenKind::NullLit => "NULL_LIT".to_string(),
        TokenKind::CharLit => "CHAR_LIT".to_string(),
        TokenKind::MethodCall(name)
        | TokenKind::Type(name)
        | TokenKind::Assert(name)
        | TokenKind::Mock(name) => name.clone(),
        TokenKind::ControlFlow(_) | TokenKind::Keyword(_) => text.to_string(),
        TokenKind::Operator(op) => op.clone(),
    }
}

fn tag_for(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::Var => "VAR",
        TokenKind::Field => "FIELD",
        TokenKind::MethodCall(_) => "CALL",
        TokenKind::Type(_) => "TYPE",
        TokenKind::StringLit => "STRLIT",
        TokenKind::IntLit => "INTLIT",
        TokenKind::LongLit => "LONGLIT",
        TokenKind::DoubleLit => "DBLLIT",
        TokenKind::BoolLit => "BOOLLIT",
        TokenKind::NullLit => "NULLLIT",
        TokenKind::CharLit => "CHARLIT",
        TokenKind::ControlFlow(_) => "CF",
        TokenKind::Keyword(_) => "KW",
        TokenKind::Operator(_) => "OP",
        TokenKind::Assert(_) => "ASSERT",
        TokenKind::Mock(_) => "MOCK",
    }
}

/// Canonical nested serialization of `node` for one [`NormalizeMode`]. Used
/// to derive the two halves of a `NormalizedNode` (spec §3): equality of
/// normalized serialization is equality of this string.
pub fn serialize(node: Node, source: &str, mode: NormalizeMode, out: &mut String) {
    match classify(node, source) {
        Emission::Token { kind, text, children, .. } => {
            out.push('(');
            out.push_str(tag_for(&kind));
            out.push(' ');
            out.push_str(&spelling(&kind, &text, mode));
            for child in children {
                out.push(' ');
                serialize(child, source, mode, out);
            }
            out.push(')');
        }
        Emission::Multi(parts) => {
            out.push_str("(SEQ");
            for part in parts {
                out.push(' ');
                serialize_emission(part, source, mode, out);
            }
            out.push(')');
        }
        Emission::Recurse => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                serialize(child, source, mode, out);
                out.push(' ');
            }
        }
    }
}

fn serialize_emission(emission: Emission, source: &str, mode: NormalizeMode, out: &mut String) {
    match emission {
        Emission::Token { kind, text, children, .. } => {
            out.push('(');
            out.push_str(tag_for(&kind));
            out.push(' ');
            out.push_str(&spelling(&kind, &text, mode));
            for child in children {
                out.push(' ');
                serialize(child, source, mode, out);
            }
            out.push(')');
        }
        Emission::Multi(parts) => {
            out.push_str("(SEQ");
            for part in parts {
                out.push(' ');
                serialize_emission(part, source, mode, out);
            }
            out.push(')');
        }
        Emission::Recurse => {}
    }
}

/// Role of an identifier occurrence, used by the boundary refiner (spec
/// §4.8) to test whether a statement only reads names already bound
/// earlier in its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Declared,
    Referenced,
}

/// Flattens `node`'s meaningful tokens in document order (spec §4.2's
/// semantic-token / fuzzy-token views share this walk; they differ only in
/// `mode`). `roles`, if given, additionally records every `Var`/`Field`
/// occurrence's role for the boundary refiner.
pub fn flatten_tokens(
    node: Node,
    source: &str,
    mode: NormalizeMode,
    out: &mut Vec<Token>,
    mut roles: Option<&mut Vec<(String, Role)>>,
) {
    flatten_emission(classify(node, source), node, source, mode, out, &mut roles);
}

fn flatten_emission(
    emission: Emission,
    node: Node,
    source: &str,
    mode: NormalizeMode,
    out: &mut Vec<Token>,
    roles: &mut Option<&mut Vec<(String, Role)>>,
) {
    match emission {
        Emission::Token {
            kind,
            text,
            is_decl,
            children,
        } => {
            if kind.is_identifier_like() {
                if let Some(r) = reborrow(roles) {
                    r.push((
                        text.clone(),
                        if is_decl {
                            Role::Declared
                        } else {
                            Role::Referenced
                        },
                    ));
                }
            }
            let normalized = spelling(&kind, &text, mode);
            out.push(Token {
                kind,
                normalized,
                original: text,
                span: Some(span_of(node)),
            });
            for child in children {
                flatten_tokens(child, source, mode, out, reborrow(roles));
            }
        }
        Emission::Multi(parts) => {
            for part in parts {
                flatten_emission(part, node, source, mode, out, roles);
            }
        }
        Emission::Recurse => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                flatten_tokens(child, source, mode, out, reborrow(roles));
            }
        }
    }
}

/// Reborrows an `Option<&mut T>` without moving out of it, so the same
/// optional sink can be threaded through sibling recursive calls.
fn reborrow<'a>(
    roles: &'a mut Option<&mut Vec<(String, Role)>>,
) -> Option<&'a mut Vec<(String, Role)>> {
    match roles {
        Some(r) => Some(&mut **r),
        None => None,
    }
}

/// Names referenced or declared by statement `idx`, used by the boundary
/// refiner's "usage-only" test. `Err(Error::Structural(_))` if `idx`'s
/// source range no longer resolves (spec §7); the caller skips the
/// statement rather than propagating the failure past the refiner.
pub fn statement_roles(tu: &TranslationUnit, idx: usize) -> Result<Vec<(String, Role)>> {
    let node = tu.stmt_node(idx)?;
    let mut roles = Vec::new();
    let mut tokens = Vec::new();
    flatten_tokens(node, &tu.source, NormalizeMode::LiteralOnly, &mut tokens, Some(&mut roles));
    Ok(roles)
}

/// `true` if statement `idx` is a bare expression statement invoking a
/// call or reading fields, with no assignment/declaration/mutation of its
/// own, per spec §4.8.
pub fn is_usage_only_candidate(tu: &TranslationUnit, idx: usize) -> Result<bool> {
    let node = tu.stmt_node(idx)?;
    Ok(matches!(node.kind(), "expression_statement") && {
        let mut cursor = node.walk();
        node.named_children(&mut cursor).all(|c| {
            !matches!(
                c.kind(),
                "assignment_expression" | "update_expression" | "local_variable_declaration"
            )
        })
    })
}

pub fn declared_names_in_range(
    tu: &TranslationUnit,
    start: usize,
    end: usize,
) -> Result<HashSet<String>> {
    let mut declared = HashSet::new();
    for idx in start..end {
        for (name, role) in statement_roles(tu, idx)? {
            if role == Role::Declared {
                declared.insert(name);
            }
        }
    }
    Ok(declared)
}
