//! Name-collision policy applied before any structural write.

use serde::{Deserialize, Serialize};
use std::future::Future;
use strum::{Display, EnumString};

use crate::domain::node::split_name;
use crate::error::VaultError;

/// How a new name colliding with an existing sibling is resolved.
///
/// Applies to file writes only; a directory name conflict is always a hard
/// failure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
pub enum ConflictPolicy {
    /// Fail with a name-conflict error; no state changes
    #[default]
    Reject,
    /// Stage the existing file aside and replace it
    Overwrite,
    /// Probe `name(1).ext`, `name(2).ext`, … and take the first free name
    Rename,
}

/// Candidate produced by the rename policy for attempt `n`.
pub fn candidate_name(name: &str, n: u32) -> String {
    let (stem, ext) = split_name(name);
    format!("{stem}({n}){ext}")
}

const MAX_RENAME_PROBES: u32 = 10_000;

/// Find the first non-colliding variant of `name` by probing the
/// caller-supplied collision predicate.
pub async fn find_available_name<F, Fut>(
    name: &str,
    mut collides: F,
) -> Result<String, VaultError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, VaultError>>,
{
    if !collides(name.to_string()).await? {
        return Ok(name.to_string());
    }
    for n in 1..=MAX_RENAME_PROBES {
        let candidate = candidate_name(name, n);
        if !collides(candidate.clone()).await? {
            return Ok(candidate);
        }
    }
    Err(VaultError::Validation(format!(
        "no available variant of '{name}' within {MAX_RENAME_PROBES} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_keep_the_extension() {
        assert_eq!(candidate_name("report.txt", 1), "report(1).txt");
        assert_eq!(candidate_name("report.txt", 12), "report(12).txt");
        assert_eq!(candidate_name("README", 2), "README(2)");
    }

    #[tokio::test]
    async fn probing_skips_taken_candidates() {
        let taken = ["report.txt", "report(1).txt", "report(2).txt"];
        let name = find_available_name("report.txt", |candidate| async move {
            Ok(taken.iter().any(|t| t.eq_ignore_ascii_case(&candidate)))
        })
        .await
        .unwrap();
        assert_eq!(name, "report(3).txt");
    }

    #[tokio::test]
    async fn free_name_is_used_unchanged() {
        let name = find_available_name("fresh.txt", |_| async { Ok(false) })
            .await
            .unwrap();
        assert_eq!(name, "fresh.txt");
    }
}
