//! Naming rules for spaces, scene sets and scenes.
//!
//! Covers name validation, collision-avoiding `_N` suffixes, and the
//! directory-derived names given to scene sets during legacy migration.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length (in characters) of any entity name.
pub const MAX_NAME_LENGTH: usize = 50;

/// Maximum length (in characters) of any entity description.
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Suffix appended to a display name cut to its character budget.
pub const ELLIPSIS: &str = "...";

/// Name used when sanitizing leaves nothing behind.
pub const FALLBACK_NAME: &str = "unnamed";

/// Scene names: letters, CJK ideographs, digits, `_` and `-`.
static SCENE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z\x{4e00}-\x{9fa5}0-9_-]+$").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a generic entity name: non-empty and within [`MAX_NAME_LENGTH`].
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Name must not be empty".to_string()));
    }
    let len = name.chars().count();
    if len > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Name must not exceed {MAX_NAME_LENGTH} characters, got {len}"
        )));
    }
    Ok(())
}

/// Validate a scene name: [`validate_name`] plus the scene character set.
pub fn validate_scene_name(name: &str) -> Result<(), CoreError> {
    validate_name(name)?;
    if !SCENE_NAME_RE.is_match(name) {
        return Err(CoreError::Validation(format!(
            "Scene name '{name}' may only contain letters, digits, '-' or '_'"
        )));
    }
    Ok(())
}

/// Validate a description against [`MAX_DESCRIPTION_LENGTH`].
pub fn validate_description(description: &str) -> Result<(), CoreError> {
    let len = description.chars().count();
    if len > MAX_DESCRIPTION_LENGTH {
        return Err(CoreError::Validation(format!(
            "Description must not exceed {MAX_DESCRIPTION_LENGTH} characters, got {len}"
        )));
    }
    Ok(())
}

/// Turn an arbitrary legacy name into a valid scene name.
///
/// Characters outside the scene character set become `_`, the result is
/// cut to [`MAX_NAME_LENGTH`] characters, and an empty result falls back
/// to [`FALLBACK_NAME`].
pub fn sanitize_scene_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            let mut buf = [0u8; 4];
            if SCENE_NAME_RE.is_match(c.encode_utf8(&mut buf)) {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LENGTH)
        .collect();
    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

// ---------------------------------------------------------------------------
// Collision avoidance
// ---------------------------------------------------------------------------

/// Compute the next candidate for a taken name.
///
/// A trailing `_<digits>` is incremented (`case_2` -> `case_3`); any other
/// name gets `_1` appended (`case` -> `case_1`, `a_b` -> `a_b_1`).
pub fn next_candidate(name: &str) -> String {
    if let Some(pivot) = name.rfind('_') {
        let suffix = &name[pivot + 1..];
        if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = suffix.parse::<u64>() {
                return format!("{}_{}", &name[..pivot], n + 1);
            }
        }
    }
    format!("{name}_1")
}

/// Return `desired` if no sibling uses it, otherwise the first free
/// `_N` variant produced by repeatedly applying [`next_candidate`].
///
/// Deterministic for a given sibling set. A suffixed candidate never
/// exceeds [`MAX_NAME_LENGTH`]; the stem is cut to make room.
pub fn generate_name<S: AsRef<str>>(desired: &str, siblings: &[S]) -> String {
    let taken: HashSet<&str> = siblings.iter().map(AsRef::as_ref).collect();
    let mut candidate = desired.to_string();
    while taken.contains(candidate.as_str()) {
        candidate = fit_suffixed(&next_candidate(&candidate));
    }
    candidate
}

/// Cut the stem of a `<stem>_<n>` candidate so the whole name fits.
fn fit_suffixed(candidate: &str) -> String {
    if candidate.chars().count() <= MAX_NAME_LENGTH {
        return candidate.to_string();
    }
    let Some(pivot) = candidate.rfind('_') else {
        return candidate.chars().take(MAX_NAME_LENGTH).collect();
    };
    let (stem, suffix) = candidate.split_at(pivot);
    let keep = MAX_NAME_LENGTH.saturating_sub(suffix.chars().count());
    stem.chars().take(keep).chain(suffix.chars()).collect()
}

// ---------------------------------------------------------------------------
// Directory-derived scene set names
// ---------------------------------------------------------------------------

/// A scene set name derived from a legacy directory path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedSetName {
    /// Display name, cut to the character budget.
    pub name: String,
    /// The untruncated joined path.
    pub description: String,
}

/// Derive a scene set name from the directory path of a legacy case.
///
/// `path` lists directory names from the root downward. The names are
/// joined deepest-first with `_`; the root is left out whenever the path
/// has more than one directory. The display name is cut to `budget`
/// characters (ellipsis included) while the description keeps the full
/// join.
pub fn scene_set_name_from_dirs<S: AsRef<str>>(path: &[S], budget: usize) -> DerivedSetName {
    let skip_root = usize::from(path.len() > 1);
    let joined = path
        .iter()
        .skip(skip_root)
        .rev()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("_");
    let joined = if joined.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        joined
    };

    DerivedSetName {
        name: truncate_display(&joined, budget),
        description: joined,
    }
}

/// Cut `text` to at most `budget` characters, ending in [`ELLIPSIS`] when cut.
pub fn truncate_display(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let keep = budget.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- validation -----------------------------------------------------------

    #[test]
    fn scene_name_accepts_mixed_charset() {
        assert!(validate_scene_name("login-flow_01").is_ok());
        assert!(validate_scene_name("登录场景").is_ok());
    }

    #[test]
    fn scene_name_rejects_spaces_and_dots() {
        assert!(validate_scene_name("login flow").is_err());
        assert!(validate_scene_name("a.b").is_err());
        assert!(validate_scene_name("").is_err());
    }

    #[test]
    fn name_length_counts_characters() {
        let name = "场".repeat(MAX_NAME_LENGTH);
        assert!(validate_name(&name).is_ok());
        assert!(validate_name(&format!("{name}x")).is_err());
    }

    #[test]
    fn description_limit() {
        assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LENGTH)).is_ok());
        assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LENGTH + 1)).is_err());
    }

    #[test]
    fn sanitize_replaces_invalid_characters() {
        assert_eq!(sanitize_scene_name("user login (v2)"), "user_login__v2_");
        assert_eq!(sanitize_scene_name("   "), FALLBACK_NAME);
        assert_eq!(sanitize_scene_name(&"x".repeat(80)).len(), MAX_NAME_LENGTH);
    }

    // -- next_candidate -------------------------------------------------------

    #[test]
    fn candidate_appends_first_suffix() {
        assert_eq!(next_candidate("case"), "case_1");
    }

    #[test]
    fn candidate_increments_numeric_suffix() {
        assert_eq!(next_candidate("case_1"), "case_2");
        assert_eq!(next_candidate("case_09"), "case_10");
    }

    #[test]
    fn candidate_keeps_non_numeric_suffix() {
        assert_eq!(next_candidate("a_b"), "a_b_1");
        assert_eq!(next_candidate("trailing_"), "trailing__1");
    }

    // -- generate_name --------------------------------------------------------

    #[test]
    fn free_name_is_returned_as_is() {
        assert_eq!(generate_name("login", &["logout"]), "login");
    }

    #[test]
    fn taken_name_walks_suffixes() {
        let siblings = ["login", "login_1", "login_2"];
        assert_eq!(generate_name("login", &siblings), "login_3");
    }

    #[test]
    fn generated_name_is_never_a_sibling() {
        let siblings: Vec<String> = (0..20).map(|i| format!("s_{i}")).collect();
        let name = generate_name("s_0", &siblings);
        assert!(!siblings.contains(&name));
        assert_eq!(name, generate_name("s_0", &siblings));
    }

    #[test]
    fn suffixed_name_stays_within_the_length_limit() {
        let full = "a".repeat(MAX_NAME_LENGTH);
        let name = generate_name(&full, &[full.as_str()]);
        assert_eq!(name.chars().count(), MAX_NAME_LENGTH);
        assert_eq!(name, format!("{}_1", "a".repeat(MAX_NAME_LENGTH - 2)));

        let next = generate_name(&full, &[full.clone(), name]);
        assert_eq!(next, format!("{}_2", "a".repeat(MAX_NAME_LENGTH - 2)));
    }

    // -- scene_set_name_from_dirs ---------------------------------------------

    #[test]
    fn single_directory_keeps_root() {
        let derived = scene_set_name_from_dirs(&["root"], 50);
        assert_eq!(derived.name, "root");
        assert_eq!(derived.description, "root");
    }

    #[test]
    fn nested_directories_join_deepest_first_without_root() {
        let derived = scene_set_name_from_dirs(&["root", "user", "login"], 50);
        assert_eq!(derived.name, "login_user");
    }

    #[test]
    fn long_join_is_truncated_with_ellipsis() {
        let derived = scene_set_name_from_dirs(&["root", "abcdefghij", "klmnopqrst"], 12);
        assert_eq!(derived.name, "klmnopqrs...");
        assert_eq!(derived.name.chars().count(), 12);
        assert_eq!(derived.description, "klmnopqrst_abcdefghij");
    }

    #[test]
    fn empty_path_falls_back() {
        let derived = scene_set_name_from_dirs::<&str>(&[], 50);
        assert_eq!(derived.name, FALLBACK_NAME);
    }
}
