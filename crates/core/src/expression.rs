//! Placeholder expressions embedded in step, input and output values.
//!
//! Recognized syntaxes:
//!
//! - current: `${{ outputs.<ref>.<key> }}` and `${{ params.<key> }}`
//! - legacy: `${<name>:OUTPUT:<key>}` and `${params.<key>}`
//!
//! A value is scanned once; every placeholder span is parsed into a
//! [`Placeholder`] and either kept, replaced by a current-syntax token, or
//! reported as unresolved (and kept verbatim). Replacement text is never
//! scanned again, so a new ID that happens to equal some other old ID is
//! not rewritten twice. Text outside placeholder spans is left untouched.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::remap::{EntityKind, RemapContext};
use crate::types::DbId;

/// `${{ inner }}` (group 1) or `${inner}` (group 2).
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\{\s*([^{}]*?)\s*\}\}|\$\{([^{}]+)\}").expect("valid regex")
});

/// Namespace of step outputs in current-syntax expressions.
pub const OUTPUTS_NAMESPACE: &str = "outputs";

/// Namespace of scene params in both syntaxes.
pub const PARAMS_NAMESPACE: &str = "params";

/// Marker between name and key in legacy output references.
const LEGACY_OUTPUT_MARKER: &str = "OUTPUT";

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// A parsed placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder<'a> {
    /// `${{ outputs.<reference>.<key> }}`
    Output { reference: &'a str, key: &'a str },
    /// `${{ params.<key> }}`
    Param { key: &'a str },
    /// `${<name>:OUTPUT:<key>}`
    LegacyOutput { name: &'a str, key: &'a str },
    /// `${params.<key>}`
    LegacyParam { key: &'a str },
    /// Any other `${...}` / `${{ ... }}` expression, never touched.
    Other,
}

impl<'a> Placeholder<'a> {
    fn parse_current(inner: &'a str) -> Self {
        let mut parts = inner.splitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(OUTPUTS_NAMESPACE), Some(reference), Some(key))
                if !reference.is_empty() && !key.is_empty() =>
            {
                Self::Output { reference, key }
            }
            (Some(PARAMS_NAMESPACE), Some(first), rest) if !first.is_empty() => {
                // `params.a.b` keeps the dotted key intact.
                let key_len = first.len() + rest.map_or(0, |r| r.len() + 1);
                let start = PARAMS_NAMESPACE.len() + 1;
                Self::Param {
                    key: &inner[start..start + key_len],
                }
            }
            _ => Self::Other,
        }
    }

    fn parse_legacy(inner: &'a str) -> Self {
        let inner = inner.trim();
        if let Some(key) = inner.strip_prefix("params.") {
            if !key.is_empty() {
                return Self::LegacyParam { key };
            }
        }
        let parts: Vec<&str> = inner.splitn(3, ':').collect();
        match parts.as_slice() {
            [name, LEGACY_OUTPUT_MARKER, key] if !name.is_empty() && !key.is_empty() => {
                Self::LegacyOutput { name, key }
            }
            _ => Self::Other,
        }
    }
}

/// A placeholder occurrence inside a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// Byte range of the whole `${...}` span.
    pub span: std::ops::Range<usize>,
    pub placeholder: Placeholder<'a>,
}

fn placeholder_of<'a>(caps: &Captures<'a>) -> Placeholder<'a> {
    if let Some(inner) = caps.get(1) {
        Placeholder::parse_current(inner.as_str())
    } else if let Some(inner) = caps.get(2) {
        Placeholder::parse_legacy(inner.as_str())
    } else {
        Placeholder::Other
    }
}

/// List every placeholder in `text`, in order of appearance.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    PLACEHOLDER_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Token {
                span: whole.range(),
                placeholder: placeholder_of(&caps),
            })
        })
        .collect()
}

/// Render a current-syntax output reference.
pub fn output_token(reference: impl std::fmt::Display, key: &str) -> String {
    format!("${{{{ {OUTPUTS_NAMESPACE}.{reference}.{key} }}}}")
}

/// Render a current-syntax param reference.
pub fn param_token(key: &str) -> String {
    format!("${{{{ {PARAMS_NAMESPACE}.{key} }}}}")
}

// ---------------------------------------------------------------------------
// Rewriting
// ---------------------------------------------------------------------------

/// What to do with one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Leave the span as it is.
    Keep,
    /// Substitute the span.
    Replace(String),
    /// The reference could not be resolved; the span is kept and reported.
    Unresolved,
}

/// Result of rewriting one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub text: String,
    /// Raw text of every span that could not be resolved.
    pub unresolved: Vec<String>,
}

impl Rewritten {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Rewrite every placeholder of `text` in a single pass.
pub fn rewrite<F>(text: &str, mut resolve: F) -> Rewritten
where
    F: FnMut(&Placeholder<'_>) -> Resolution,
{
    let mut unresolved = Vec::new();
    let out = PLACEHOLDER_RE.replace_all(text, |caps: &Captures<'_>| {
        let raw = caps.get(0).map_or("", |m| m.as_str());
        match resolve(&placeholder_of(caps)) {
            Resolution::Keep => raw.to_string(),
            Resolution::Replace(replacement) => replacement,
            Resolution::Unresolved => {
                unresolved.push(raw.to_string());
                raw.to_string()
            }
        }
    });
    Rewritten {
        text: out.into_owned(),
        unresolved,
    }
}

// ---------------------------------------------------------------------------
// Copy-time resolution (numeric IDs through the remap tables)
// ---------------------------------------------------------------------------

/// Which remap tables the `<ref>` of an output reference goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceScope {
    /// Step and output values: `<ref>` is a step ID.
    Step,
    /// Scene input values: `<ref>` is a scene ID and the key may start
    /// with `<stepID>_`.
    SceneInput,
}

/// Remap a step-qualified key `<stepID>_<rest>`; other keys pass through.
fn remap_step_key(key: &str, ctx: &RemapContext) -> String {
    if let Some((head, rest)) = key.split_once('_') {
        if let Ok(old) = head.parse::<DbId>() {
            if let Some(new) = ctx.get(EntityKind::Step, old) {
                return format!("{new}_{rest}");
            }
        }
    }
    key.to_string()
}

/// Rewrite a value copied from another space using the run's remap tables.
///
/// Only numeric output references are remapped; named references, params
/// and legacy expressions are kept. A numeric reference missing from the
/// tables is reported as unresolved.
pub fn rewrite_copied_value(text: &str, ctx: &RemapContext, scope: ReferenceScope) -> Rewritten {
    rewrite(text, |placeholder| {
        let Placeholder::Output { reference, key } = *placeholder else {
            return Resolution::Keep;
        };
        let Ok(old) = reference.parse::<DbId>() else {
            return Resolution::Keep;
        };
        match scope {
            ReferenceScope::Step => match ctx.get(EntityKind::Step, old) {
                Some(new) => Resolution::Replace(output_token(new, key)),
                None => Resolution::Unresolved,
            },
            ReferenceScope::SceneInput => match ctx.get(EntityKind::Scene, old) {
                Some(new) => Resolution::Replace(output_token(new, &remap_step_key(key, ctx))),
                None => Resolution::Unresolved,
            },
        }
    })
}

// ---------------------------------------------------------------------------
// Migration-time resolution (names through lookup maps)
// ---------------------------------------------------------------------------

/// Name lookups available while migrating one legacy case.
#[derive(Debug, Clone, Copy)]
pub struct NameResolver<'a> {
    /// Task alias -> new step ID, for the case being migrated.
    pub aliases: &'a HashMap<String, DbId>,
    /// Legacy case identifier -> new scene ID, for cases already migrated.
    pub cases: &'a HashMap<String, DbId>,
}

impl NameResolver<'_> {
    fn lookup(&self, name: &str) -> Option<DbId> {
        self.aliases
            .get(name)
            .or_else(|| self.cases.get(name))
            .copied()
    }

    /// Rewrite legacy and name-based references into numeric current syntax.
    pub fn rewrite(&self, text: &str) -> Rewritten {
        rewrite(text, |placeholder| match *placeholder {
            Placeholder::LegacyOutput { name, key } => match self.lookup(name) {
                Some(id) => Resolution::Replace(output_token(id, key)),
                None => Resolution::Unresolved,
            },
            Placeholder::Output { reference, key } => {
                if reference.parse::<DbId>().is_ok() {
                    return Resolution::Keep;
                }
                match self.lookup(reference) {
                    Some(id) => Resolution::Replace(output_token(id, key)),
                    None => Resolution::Unresolved,
                }
            }
            Placeholder::LegacyParam { key } => Resolution::Replace(param_token(key)),
            Placeholder::Param { .. } | Placeholder::Other => Resolution::Keep,
        })
    }
}

/// Names referenced by legacy or named output expressions in `text`.
pub fn referenced_names(text: &str) -> Vec<&str> {
    tokenize(text)
        .into_iter()
        .filter_map(|t| match t.placeholder {
            Placeholder::LegacyOutput { name, .. } => Some(name),
            Placeholder::Output { reference, .. } if reference.parse::<DbId>().is_err() => {
                Some(reference)
            }
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
