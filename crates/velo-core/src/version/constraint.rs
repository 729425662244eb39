//! Version constraint dialect and catalogue resolution.
//!
//! Constraints follow semver-crate semantics with a few relaxations common in
//! deployment tooling: a bare version is an equality match on the components
//! it names (`"1"` matches every `1.x.y`), `==` is accepted for `=`, `!=`
//! excludes versions, and `~=` is a compatible-release range.
//! Catalogue entries are coerced to three-component versions before matching.

use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease, Version, VersionReq};

use crate::error::{OctopusError, Result};

/// A parsed version constraint, keeping the text it was written as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    raw: String,
    req: VersionReq,
    /// `!=` comparators; a version matching any of these is rejected
    excluded: Vec<VersionReq>,
}

impl VersionConstraint {
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(invalid(raw, "constraint is empty"));
        }

        let mut required = Vec::new();
        let mut excluded = Vec::new();
        for part in raw.split(',') {
            match normalize_comparator(raw, part)? {
                Comparator::Require(comparators) => required.extend(comparators),
                Comparator::Exclude(comparator) => excluded.push(
                    VersionReq::parse(&comparator).map_err(|e| invalid(raw, &e.to_string()))?,
                ),
            }
        }

        let req = if required.is_empty() {
            VersionReq::STAR
        } else {
            VersionReq::parse(&required.join(", ")).map_err(|e| invalid(raw, &e.to_string()))?
        };

        Ok(Self {
            raw: raw.to_string(),
            req,
            excluded,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version) && !self.excluded.iter().any(|req| req.matches(version))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionConstraint {
    type Err = OctopusError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn invalid(constraint: &str, reason: &str) -> OctopusError {
    OctopusError::InvalidConstraint {
        constraint: constraint.to_string(),
        reason: reason.to_string(),
    }
}

/// One comma-separated comparator, rewritten into semver-crate syntax.
enum Comparator {
    Require(Vec<String>),
    Exclude(String),
}

fn normalize_comparator(raw: &str, part: &str) -> Result<Comparator> {
    let part = part.trim();
    if part.is_empty() {
        return Err(invalid(raw, "empty comparator"));
    }

    let split = part
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^' | '!'))
        .unwrap_or(part.len());
    let (op, version) = part.split_at(split);
    let version = version.trim();
    let version = match version.strip_prefix(['v', 'V']) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => version,
    };

    let comparator = match op {
        "!=" if has_wildcard(version) => Comparator::Exclude(version.to_string()),
        "!=" => Comparator::Exclude(format!("={}", version)),
        "~=" => Comparator::Require(compatible_release(raw, version)?),
        "==" => Comparator::Require(vec![format!("={}", version)]),
        "" if !has_wildcard(version) => Comparator::Require(vec![format!("={}", version)]),
        op => Comparator::Require(vec![format!("{}{}", op, version)]),
    };
    Ok(comparator)
}

/// `~=X.Y` is `>=X.Y.0, <(X+1).0.0`; `~=X.Y.Z` is `>=X.Y.Z, <X.(Y+1).0`.
fn compatible_release(raw: &str, version: &str) -> Result<Vec<String>> {
    let parts = version
        .split('.')
        .map(str::parse::<u64>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| invalid(raw, "'~=' needs a numeric version"))?;
    let bump = |n: u64| {
        n.checked_add(1)
            .ok_or_else(|| invalid(raw, "version component overflows"))
    };

    match parts.as_slice() {
        [major, minor] => Ok(vec![
            format!(">={}.{}.0", major, minor),
            format!("<{}.0.0", bump(*major)?),
        ]),
        [major, minor, patch] => Ok(vec![
            format!(">={}.{}.{}", major, minor, patch),
            format!("<{}.{}.0", major, bump(*minor)?),
        ]),
        _ => Err(invalid(raw, "'~=' needs two or three version components")),
    }
}

fn has_wildcard(version: &str) -> bool {
    version
        .split('.')
        .any(|segment| matches!(segment, "*" | "x" | "X"))
}

/// Coerce a catalogue entry into a semantic version.
///
/// Missing minor/patch components become 0; components past the third are
/// folded into build metadata. Entries without a leading number yield `None`.
pub fn coerce(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let text = match trimmed.strip_prefix(['v', 'V']) {
        Some(rest) => rest,
        None => trimmed,
    };
    if !text.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(version) = Version::parse(text) {
        return Some(version);
    }

    let numeric_end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (numeric, rest) = text.split_at(numeric_end);

    let segments: Vec<&str> = numeric.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return None;
    }
    let component = |index: usize| -> Option<u64> {
        segments.get(index).map_or(Some(0), |segment| segment.parse().ok())
    };

    let mut version = Version::new(component(0)?, component(1)?, component(2)?);

    let (pre, build) = match rest.chars().next() {
        None => ("", ""),
        Some('-') => rest[1..].split_once('+').unwrap_or((&rest[1..], "")),
        Some('+') => ("", &rest[1..]),
        Some(_) => ("", rest),
    };

    let mut build_parts: Vec<&str> = segments.iter().skip(3).copied().collect();
    if !build.is_empty() {
        build_parts.push(build);
    }

    if !pre.is_empty() {
        version.pre = Prerelease::new(pre).ok()?;
    }
    if !build_parts.is_empty() {
        version.build = BuildMetadata::new(&build_parts.join(".")).ok()?;
    }
    Some(version)
}

/// A catalogue entry selected by a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: Version,
    /// The entry as the catalogue listed it
    pub original: String,
}

/// Selects versions from catalogues.
pub struct VersionResolver;

impl VersionResolver {
    /// Return the highest entry satisfying `constraint`, if any.
    ///
    /// Entries that cannot be coerced are skipped. Among entries coercing to
    /// the same version, the first listed wins.
    pub fn resolve_highest<I, S>(candidates: I, constraint: &VersionConstraint) -> Option<ResolvedVersion>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut best: Option<ResolvedVersion> = None;
        for candidate in candidates {
            let original = candidate.as_ref();
            let Some(version) = coerce(original) else {
                tracing::debug!(version = original, "skipping non-semantic catalogue entry");
                continue;
            };
            if !constraint.matches(&version) {
                continue;
            }
            if best.as_ref().is_none_or(|current| version > current.version) {
                best = Some(ResolvedVersion {
                    version,
                    original: original.to_string(),
                });
            }
        }
        best
    }

    /// Like [`VersionResolver::resolve_highest`], but a miss is a
    /// `VersionResolution` error listing the catalogue.
    pub fn resolve(candidates: &[String], constraint: &VersionConstraint) -> Result<ResolvedVersion> {
        Self::resolve_highest(candidates, constraint).ok_or_else(|| {
            OctopusError::VersionResolution {
                constraint: constraint.to_string(),
                available: candidates.to_vec(),
            }
        })
    }
}
