//! `Token` — a semantic unit produced from one syntax node (spec §3).

use serde::{Deserialize, Serialize};

use crate::span::Span;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Var,
    Field,
    MethodCall(String),
    Type(String),
    StringLit,
    IntLit,
    LongLit,
    DoubleLit,
    BoolLit,
    NullLit,
    CharLit,
    ControlFlow(ControlFlowKind),
    Keyword(KeywordKind),
    Operator(String),
    Assert(String),
    Mock(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlFlowKind {
    If,
    For,
    Foreach,
    While,
    Do,
    Switch,
    Try,
    Catch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeywordKind {
    Return,
    Throw,
    Break,
    Continue,
}

impl TokenKind {
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::StringLit
                | TokenKind::IntLit
                | TokenKind::LongLit
                | TokenKind::DoubleLit
                | TokenKind::BoolLit
                | TokenKind::NullLit
                | TokenKind::CharLit
        )
    }

    pub fn is_identifier_like(&self) -> bool {
        matches!(self, TokenKind::Var | TokenKind::Field)
    }

    pub fn is_callable_name(&self) -> bool {
        matches!(
            self,
            TokenKind::MethodCall(_) | TokenKind::Assert(_) | TokenKind::Mock(_)
        )
    }
}

/// One semantic unit. `normalized` is the canonical spelling used for
/// structural matching; `original` is the literal spelling used for
/// variation tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub normalized: String,
    pub original: String,
    pub span: Option<Span>,
}

impl Token {
    /// spec §4.2 `Token::matches`: tokens of different kinds never match;
    /// literal kinds match iff both exist (value differences are recorded
    /// elsewhere as a variation, never block alignment here); everything
    /// else matches iff `normalized` fields are equal.
    pub fn matches(&self, other: &Token) -> bool {
        if std::mem::discriminant(&self.kind) != std::mem::discriminant(&other.kind) {
            return false;
        }
        if self.kind.is_literal() {
            return true;
        }
        self.normalized == other.normalized
    }
}

/// Assertion-family method names (spec §4.2).
pub fn is_assert_name(name: &str) -> bool {
    name.starts_with("assert") || name == "fail" || name == "assertThat"
}

/// Mock-family method names (spec §4.2): the fixed Mockito-shaped set.
pub fn is_mock_name(name: &str) -> bool {
    const MOCK_NAMES: &[&str] = &[
        "when",
        "verify",
        "mock",
        "spy",
        "doReturn",
        "doThrow",
        "doAnswer",
        "doNothing",
        "thenReturn",
        "thenThrow",
        "times",
        "never",
        "any",
        "anyString",
        "anyInt",
        "anyLong",
    ];
    MOCK_NAMES.contains(&name)
}
