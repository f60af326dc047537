//! Variation and Type Analysis (spec §4.7): classifies where two aligned
//! semantic-token streams differ, and gates refactorability with a coarse
//! type-compatibility verdict.
//!
//! The resolved Open Question from spec.md §4.2 applies here: a literal
//! value difference never blocks structural alignment (`Token::matches`
//! treats same-kind literals as matching regardless of value) — it is
//! surfaced only as a recorded [`Variation`], never as a misalignment.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariationKind {
    Literal,
    Identifier,
    MethodName,
    Type,
    ControlFlow,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variation {
    pub position: usize,
    pub kind: VariationKind,
    pub original_a: String,
    pub original_b: String,
}

/// Differing positions between two aligned token streams, classified by
/// kind, plus the single boolean that gates refactorability (spec §4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariationAnalysis {
    pub variations: Vec<Variation>,
    pub has_control_flow_differences: bool,
}

/// Coarse type-compatibility verdict (spec §4.7). The detection core
/// consumes only `is_feasible`; `candidate_types` is the per-position
/// candidate-host-type map that downstream refactoring owns in detail.
#[derive(Debug, Clone, Default)]
pub struct TypeCompatibility {
    pub is_feasible: bool,
    pub candidate_types: HashMap<String, Vec<String>>,
}

/// One element of a token-stream alignment.
enum Aligned<'a> {
    Pair(&'a Token, &'a Token),
    OnlyA(&'a Token),
    OnlyB(&'a Token),
}

/// Aligns two token streams around an LCS backbone of `Token::matches`
/// anchors, then fills the gaps between anchors with one-sided entries.
/// This is not a general diff algorithm — it is exactly enough alignment to
/// drive deterministic variation classification over short sequences.
fn align<'a>(a: &'a [Token], b: &'a [Token]) -> Vec<Aligned<'a>> {
    let n = a.len();
    let m = b.len();
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i].matches(&b[j]) {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }
    let mut out = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < n && j < m {
        if a[i].matches(&b[j]) {
            out.push(Aligned::Pair(&a[i], &b[j]));
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            out.push(Aligned::OnlyA(&a[i]));
            i += 1;
        } else {
            out.push(Aligned::OnlyB(&b[j]));
            j += 1;
        }
    }
    while i < n {
        out.push(Aligned::OnlyA(&a[i]));
        i += 1;
    }
    while j < m {
        out.push(Aligned::OnlyB(&b[j]));
        j += 1;
    }
    out
}

fn kind_of(token: Option<&Token>) -> Option<&TokenKind> {
    token.map(|t| &t.kind)
}

/// Classifies one unmatched slot into the enumerated variation kinds. When
/// both sides are present but disagree on kind, `ta`'s kind is the tie
/// breaker, mirroring which side drove the alignment choice upstream.
fn classify_unmatched(ta: Option<&Token>, tb: Option<&Token>) -> VariationKind {
    match kind_of(ta).or_else(|| kind_of(tb)) {
        Some(TokenKind::Var) | Some(TokenKind::Field) => VariationKind::Identifier,
        Some(TokenKind::MethodCall(_)) | Some(TokenKind::Assert(_)) | Some(TokenKind::Mock(_)) => {
            VariationKind::MethodName
        }
        Some(TokenKind::Type(_)) => VariationKind::Type,
        Some(TokenKind::ControlFlow(_)) => VariationKind::ControlFlow,
        Some(k) if k.is_literal() => VariationKind::Literal,
        _ => VariationKind::Other,
    }
}

/// spec §4.7: walks the alignment, recording a [`Variation`] for every
/// literal value difference inside a matched pair and for every unmatched
/// token on either side.
pub fn analyze(a: &[Token], b: &[Token]) -> VariationAnalysis {
    let aligned = align(a, b);
    let mut variations = Vec::new();
    let mut has_control_flow_differences = false;
    let mut position = 0usize;
    let mut i = 0;

    while i < aligned.len() {
        match &aligned[i] {
            Aligned::Pair(ta, tb) => {
                if ta.kind.is_literal() && ta.original != tb.original {
                    variations.push(Variation {
                        position,
                        kind: VariationKind::Literal,
                        original_a: ta.original.clone(),
                        original_b: tb.original.clone(),
                    });
                }
                position += 1;
                i += 1;
            }
            Aligned::OnlyA(_) | Aligned::OnlyB(_) => {
                let start = i;
                while i < aligned.len() && matches!(aligned[i], Aligned::OnlyA(_) | Aligned::OnlyB(_)) {
                    i += 1;
                }
                let block = &aligned[start..i];
                let a_side: Vec<&Token> = block
                    .iter()
                    .filter_map(|e| match e {
                        Aligned::OnlyA(t) => Some(*t),
                        _ => None,
                    })
                    .collect();
                let b_side: Vec<&Token> = block
                    .iter()
                    .filter_map(|e| match e {
                        Aligned::OnlyB(t) => Some(*t),
                        _ => None,
                    })
                    .collect();
                let slots = a_side.len().max(b_side.len());
                for k in 0..slots {
                    let ta = a_side.get(k).copied();
                    let tb = b_side.get(k).copied();
                    let kind = classify_unmatched(ta, tb);
                    if kind == VariationKind::ControlFlow {
                        has_control_flow_differences = true;
                    }
                    variations.push(Variation {
                        position,
                        kind,
                        original_a: ta.map(|t| t.original.clone()).unwrap_or_default(),
                        original_b: tb.map(|t| t.original.clone()).unwrap_or_default(),
                    });
                    position += 1;
                }
            }
        }
    }

    VariationAnalysis {
        variations,
        has_control_flow_differences,
    }
}

fn infer_literal_host_type(text: &str) -> Option<String> {
    if text.starts_with('"') {
        Some("String".to_string())
    } else if text == "true" || text == "false" {
        Some("boolean".to_string())
    } else if text == "null" {
        Some("Object".to_string())
    } else if text.starts_with('\'') {
        Some("char".to_string())
    } else if text.ends_with('L') || text.ends_with('l') {
        Some("long".to_string())
    } else if text.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '-') {
        if text.contains('.') {
            Some("double".to_string())
        } else {
            Some("int".to_string())
        }
    } else {
        None
    }
}

/// spec §4.7: a coarse yes/no plus a per-position candidate host-type map.
/// `Other`-classified variations (operator/keyword divergence with no
/// mechanical parameterization) and control-flow divergence make a pair
/// infeasible; literal, identifier, method-name, and type variations are
/// all mechanically substitutable by a helper parameter.
pub fn type_compatibility(analysis: &VariationAnalysis) -> TypeCompatibility {
    let mut is_feasible = true;
    let mut candidate_types: HashMap<String, Vec<String>> = HashMap::new();

    for v in &analysis.variations {
        match v.kind {
            VariationKind::ControlFlow | VariationKind::Other => is_feasible = false,
            VariationKind::Literal => {
                if let Some(ty) =
                    infer_literal_host_type(&v.original_a).or_else(|| infer_literal_host_type(&v.original_b))
                {
                    candidate_types
                        .entry(format!("p{}", v.position))
                        .or_default()
                        .push(ty);
                }
            }
            VariationKind::Identifier | VariationKind::MethodName | VariationKind::Type => {}
        }
    }

    TypeCompatibility {
        is_feasible,
        candidate_types,
    }
}
