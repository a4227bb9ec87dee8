//! `major.minor.patch` versions and the "pick the latest artifact" rule.
//!
//! Artifacts are named `{name}-{major}.{minor}.{patch}.ibsolution`; a file
//! stem that is only a version (`0.0.1.ibsolution`) is valid too.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PromoteError, Result};
use crate::paths;

static VERSION_STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("static regex compiles"));

/// Ordered triple; comparison is lexicographic over (major, minor, patch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ArtifactVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ArtifactVersion {
    pub const ZERO: ArtifactVersion = ArtifactVersion::new(0, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses exactly three `.`-separated non-negative integers.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(PromoteError::Format(format!(
                "version '{raw}' must have exactly three components"
            )));
        }
        let component = |part: &str| {
            part.parse::<u64>().map_err(|e| {
                PromoteError::Format(format!("version '{raw}' has a non-numeric component '{part}': {e}"))
            })
        };
        Ok(Self {
            major: component(parts[0])?,
            minor: component(parts[1])?,
            patch: component(parts[2])?,
        })
    }

    /// Fails with `Format` when the patch number is already at its maximum.
    pub fn next_patch(self) -> Result<Self> {
        let patch = self
            .patch
            .checked_add(1)
            .ok_or_else(|| PromoteError::Format(format!("cannot bump patch of version {self}")))?;
        Ok(Self { patch, ..self })
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ArtifactVersion {
    type Err = PromoteError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

pub fn compare(a: &ArtifactVersion, b: &ArtifactVersion) -> Ordering {
    a.cmp(b)
}

/// Winner of [`pick_latest`]. `name` is `None` when there were no candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestPick<T> {
    pub name: Option<T>,
    pub version: ArtifactVersion,
}

impl<T> LatestPick<T> {
    pub fn none() -> Self {
        Self {
            name: None,
            version: ArtifactVersion::ZERO,
        }
    }
}

/// Returns the candidate with the maximum version. Ties keep the first one
/// seen; an empty sequence yields the `0.0.0` sentinel.
pub fn pick_latest<T, V, I>(candidates: I) -> Result<LatestPick<T>>
where
    I: IntoIterator<Item = (T, V)>,
    V: AsRef<str>,
{
    let mut best = LatestPick::none();
    for (name, raw) in candidates {
        let version = ArtifactVersion::parse(raw.as_ref())?;
        if best.name.is_none() || version > best.version {
            best = LatestPick {
                name: Some(name),
                version,
            };
        }
    }
    Ok(best)
}

/// Version suffix of an artifact file name or path:
/// `solution_name-50.0.1000.ibsolution` -> `50.0.1000`.
pub fn extract_version(artifact: &str) -> &str {
    let stem = paths::file_stem(artifact);
    stem.rsplit('-').next().unwrap_or(stem)
}

/// True when a file stem is a bare `major.minor.patch` version.
pub fn is_version_stem(stem: &str) -> bool {
    VERSION_STEM.is_match(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_components() {
        let v = ArtifactVersion::parse("4.0.30").unwrap();
        assert_eq!(v, ArtifactVersion::new(4, 0, 30));
        assert_eq!(v.to_string(), "4.0.30");
    }

    #[test]
    fn rejects_wrong_arity_and_non_numeric() {
        assert!(matches!(
            ArtifactVersion::parse("4.0.30.1"),
            Err(PromoteError::Format(_))
        ));
        assert!(matches!(
            ArtifactVersion::parse("4.0"),
            Err(PromoteError::Format(_))
        ));
        assert!(matches!(
            ArtifactVersion::parse("a.b.c"),
            Err(PromoteError::Format(_))
        ));
        assert!(matches!(
            ArtifactVersion::parse("1.-2.3"),
            Err(PromoteError::Format(_))
        ));
    }

    #[test]
    fn comparison_is_lexicographic_not_textual() {
        let a: ArtifactVersion = "1.10.0".parse().unwrap();
        let b: ArtifactVersion = "1.9.99".parse().unwrap();
        assert_eq!(compare(&a, &b), Ordering::Greater);
        assert_eq!(compare(&b, &b), Ordering::Equal);
    }

    #[test]
    fn pick_latest_returns_max_and_keeps_first_on_tie() {
        let pick = pick_latest(vec![
            ("a", "0.0.1"),
            ("b", "4.0.30"),
            ("c", "0.0.3"),
            ("d", "4.0.30"),
        ])
        .unwrap();
        assert_eq!(pick.name, Some("b"));
        assert_eq!(pick.version.to_string(), "4.0.30");
    }

    #[test]
    fn pick_latest_of_nothing_is_zero_sentinel() {
        let pick = pick_latest(Vec::<(&str, &str)>::new()).unwrap();
        assert_eq!(pick.name, None);
        assert_eq!(pick.version.to_string(), "0.0.0");
    }

    #[test]
    fn extracts_trailing_version() {
        assert_eq!(
            extract_version("solution_name-50.0.1000.ibsolution"),
            "50.0.1000"
        );
        assert_eq!(extract_version("0.0.1.ibsolution"), "0.0.1");
        assert_eq!(
            extract_version("path/to/ibsolution/file/solution_name-0.0.1.ibsolution"),
            "0.0.1"
        );
    }

    #[test]
    fn version_stems() {
        assert!(is_version_stem("4.0.30"));
        assert!(!is_version_stem("flow"));
        assert!(!is_version_stem("4.0.30.1"));
    }

    #[test]
    fn next_patch_bumps_only_patch() {
        let v = ArtifactVersion::new(1, 2, 9).next_patch().unwrap();
        assert_eq!(v, ArtifactVersion::new(1, 2, 10));
    }

    #[test]
    fn next_patch_at_maximum_is_a_format_error() {
        let err = ArtifactVersion::new(0, 0, u64::MAX).next_patch().unwrap_err();
        assert!(matches!(err, PromoteError::Format(_)));
    }
}
