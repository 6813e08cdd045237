//! Update decisions for both managed services.
//!
//! The runtime is compared by semantic version against a release feed, the
//! container by image content digest against the registry. The two sides
//! resolve an undetermined comparison differently; see
//! [`ServiceKind::undetermined_means_update`].

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use super::service::ServiceKind;

/// Outcome of a version comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    UpToDate,
    UpdateAvailable,
    Undetermined,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UpToDate => "up to date",
            Self::UpdateAvailable => "update available",
            Self::Undetermined => "undetermined",
        };
        f.write_str(label)
    }
}

/// What the upstream source said about the newest release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Latest {
    Known(String),
    Unknown,
    Unreachable,
}

impl Latest {
    #[must_use]
    pub fn known(&self) -> Option<&str> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown | Self::Unreachable => None,
        }
    }
}

/// Current/latest pair plus the resulting decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionState {
    pub current: Option<String>,
    pub latest: Latest,
    pub decision: Decision,
}

impl VersionState {
    /// Whether the lifecycle manager must run the update path.
    #[must_use]
    pub fn needs_update(&self, kind: ServiceKind) -> bool {
        match self.decision {
            Decision::UpToDate => false,
            Decision::UpdateAvailable => true,
            Decision::Undetermined => kind.undetermined_means_update(),
        }
    }
}

/// Parsed `major.minor.patch[-pre]` version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl SemVer {
    /// Parse a normalized version string. Missing minor/patch default to 0.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (core, pre) = match raw.split_once('-') {
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (raw, None),
        };
        let core = core.split('+').next().unwrap_or(core);
        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

/// Strip decoration from a reported version string.
///
/// Accepts forms such as `v0.5.7`, `0.5.7\n` and
/// `ollama version is 0.5.7`. Returns `None` for blank input.
#[must_use]
pub fn normalize_version(raw: &str) -> Option<String> {
    let token = raw.split_whitespace().last()?;
    let token = token.strip_prefix('v').unwrap_or(token);
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn same_version(a: &str, b: &str) -> bool {
    match (SemVer::parse(a), SemVer::parse(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Decide whether the native runtime needs an update.
///
/// `UpdateAvailable` iff both sides are known and differ; anything else is
/// `Undetermined`.
#[must_use]
pub fn compare_runtime(installed: Option<&str>, latest: Latest) -> VersionState {
    let current = installed.and_then(normalize_version);
    let latest = match latest {
        Latest::Known(raw) => normalize_version(&raw).map_or(Latest::Unknown, Latest::Known),
        other => other,
    };

    let decision = match (current.as_deref(), latest.known()) {
        (Some(current), Some(latest)) if same_version(current, latest) => Decision::UpToDate,
        (Some(_), Some(_)) => Decision::UpdateAvailable,
        _ => Decision::Undetermined,
    };

    VersionState {
        current,
        latest,
        decision,
    }
}

/// Reduce `repo@sha256:abc` or ` SHA256:ABC ` to `sha256:abc`.
#[must_use]
pub fn normalize_digest(raw: &str) -> Option<String> {
    let digest = raw.rsplit('@').next().unwrap_or(raw).trim();
    if digest.is_empty() {
        return None;
    }
    Some(digest.to_ascii_lowercase())
}

/// What is known about the currently deployed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployed {
    Absent,
    Present { digest: Option<String> },
}

/// Decide whether the container image needs an update.
///
/// `remote` is `None` when the registry could not be reached; `local` is the
/// newest locally cached digest for the same tag.
#[must_use]
pub fn compare_container(
    deployed: &Deployed,
    remote: Option<&str>,
    local: Option<&str>,
) -> VersionState {
    let remote = remote.and_then(normalize_digest);
    let local = local.and_then(normalize_digest);
    let latest = match &remote {
        Some(digest) => Latest::Known(digest.clone()),
        None => Latest::Unreachable,
    };

    let current = match deployed {
        Deployed::Absent => {
            return VersionState {
                current: None,
                latest,
                decision: Decision::UpdateAvailable,
            };
        }
        Deployed::Present { digest } => digest.as_deref().and_then(normalize_digest),
    };

    let reference = remote.as_ref().or(local.as_ref());
    let decision = match (current.as_ref(), reference) {
        (Some(current), Some(reference)) if current == reference => Decision::UpToDate,
        (Some(_), Some(_)) => Decision::UpdateAvailable,
        _ => Decision::Undetermined,
    };

    VersionState {
        current,
        latest,
        decision,
    }
}
