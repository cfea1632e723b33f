// Name normalization helpers

use crate::error::{ManagementError, Result};
use std::collections::HashSet;

/// Patch operation that deletes the addressed resource.
pub const REMOVE_OPERATION: &str = "remove";

/// Parse the optional `operation` field of a patch request.
///
/// Returns `true` for `remove`, `false` when absent or blank.
pub fn is_remove_operation(operation: Option<&str>) -> Result<bool> {
    match operation.map(str::trim) {
        None | Some("") => Ok(false),
        Some(op) if op.eq_ignore_ascii_case(REMOVE_OPERATION) => Ok(true),
        Some(op) => Err(ManagementError::invalid(format!("Unsupported operation '{}'.", op))),
    }
}

/// Trim every entry, drop blanks and remove case-insensitive duplicates,
/// keeping the first spelling.
pub fn normalize_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for name in names {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            result.push(trimmed.to_string());
        }
    }
    result
}

/// `Some(trimmed)` when the value has non-whitespace content.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Case-insensitive membership test.
pub fn contains_ignore_case<S: AsRef<str>>(haystack: &[S], needle: &str) -> bool {
    haystack.iter().any(|item| item.as_ref().eq_ignore_ascii_case(needle))
}

/// Sort strings case-insensitively, ties broken ordinally.
pub fn sort_ignore_case(values: &mut [String]) {
    values.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}

/// Entries of `target` missing from `current` and entries of `current`
/// missing from `target`, both compared case-insensitively. Returned as
/// `(to_add, to_remove)`.
pub fn set_difference(current: &[String], target: &[String]) -> (Vec<String>, Vec<String>) {
    let to_add = target
        .iter()
        .filter(|t| !contains_ignore_case(current, t))
        .cloned()
        .collect();
    let to_remove = current
        .iter()
        .filter(|c| !contains_ignore_case(target, c))
        .cloned()
        .collect();
    (to_add, to_remove)
}
