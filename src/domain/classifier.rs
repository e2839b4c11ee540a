//! Tag classification
//!
//! Decides, for every tag of one repository snapshot, whether the tag is an
//! orphaned artifact or a superseded legacy source tag that may be deleted.
//!
//! Classification runs in two pure steps so that all manifest existence
//! checks can complete before any decision is final:
//!
//! 1. [`plan`] evaluates every tag against the snapshot. Artifact tags whose
//!    target digest is no longer referenced by any tag come out as
//!    unverified, and [`ClassificationPlan::pending_digests`] lists the
//!    distinct digests that need a confirming existence check.
//! 2. [`ClassificationPlan::finalize`] applies the resolved existence answers
//!    and produces the [`ClassificationResult`].
//!
//! Rules, evaluated per tag against the fetched snapshot only:
//!
//! - `sha256-<hex>.<sbom|att|src|sig|dockerfile>` attests to manifest
//!   `sha256:<hex>`. Kept while some tag references that manifest, or while
//!   the registry still reports the manifest present. Deleted once the
//!   manifest is confirmed gone.
//! - `<binary>.src` is the legacy source tag naming. Deleted when `<binary>`
//!   no longer exists, or when the canonical `sha256-<digest>.src` tag for
//!   `<binary>`'s manifest exists. Never needs an existence check. When the
//!   listing was cut short ([`plan_truncated`]), a missing `<binary>` keeps
//!   the tag.
//! - Anything else is kept.

use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use super::tag::{ManifestDigestIndex, Tag, TagSet, TimeWindow};

const LEGACY_SOURCE_SUFFIX: &str = ".src";
const CANONICAL_PREFIX: &str = "sha256-";

fn artifact_tag_regex() -> &'static Regex {
    static ARTIFACT_TAG: OnceLock<Regex> = OnceLock::new();
    ARTIFACT_TAG.get_or_init(|| {
        Regex::new(r"^sha256-([0-9a-f]+)\.(sbom|att|src|sig|dockerfile)$")
            .expect("artifact tag pattern is valid")
    })
}

/// Kind of artifact encoded in a `sha256-<hex>.<suffix>` tag name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Sbom,
    Attestation,
    Source,
    Signature,
    Dockerfile,
}

impl ArtifactKind {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "sbom" => Some(Self::Sbom),
            "att" => Some(Self::Attestation),
            "src" => Some(Self::Source),
            "sig" => Some(Self::Signature),
            "dockerfile" => Some(Self::Dockerfile),
            _ => None,
        }
    }

    /// Reason recorded when an artifact of this kind is orphaned
    pub fn orphan_reason(&self) -> Reason {
        match self {
            Self::Sbom => Reason::OrphanSbom,
            Self::Attestation => Reason::OrphanAttestation,
            Self::Source => Reason::OrphanSource,
            Self::Signature => Reason::OrphanSignature,
            Self::Dockerfile => Reason::OrphanDockerfileRef,
        }
    }
}

/// Parse an artifact tag name into the manifest digest it attests to.
///
/// Matching is case-sensitive and anchored.
pub fn parse_artifact_tag(name: &str) -> Option<(String, ArtifactKind)> {
    let captures = artifact_tag_regex().captures(name)?;
    let kind = ArtifactKind::from_suffix(captures.get(2)?.as_str())?;
    Some((format!("sha256:{}", captures.get(1)?.as_str()), kind))
}

/// Canonical source tag name for a manifest digest
///
/// Example: "sha256:1237890" -> "sha256-1237890.src"
pub fn canonical_source_tag(digest: &str) -> String {
    format!("{}{}", digest.replace(':', "-"), LEGACY_SOURCE_SUFFIX)
}

/// Binary tag name shadowed by a legacy `.src` tag, if `name` is one
fn legacy_source_binary(name: &str) -> Option<&str> {
    if name.starts_with(CANONICAL_PREFIX) {
        return None;
    }
    name.strip_suffix(LEGACY_SOURCE_SUFFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Keep,
    Delete,
}

/// Why a tag received its action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    OrphanAttestation,
    OrphanSbom,
    OrphanSignature,
    OrphanSource,
    OrphanDockerfileRef,
    DeprecatedLegacySource,
    Kept,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrphanAttestation => "orphan-attestation",
            Self::OrphanSbom => "orphan-sbom",
            Self::OrphanSignature => "orphan-signature",
            Self::OrphanSource => "orphan-source",
            Self::OrphanDockerfileRef => "orphan-dockerfile-ref",
            Self::DeprecatedLegacySource => "deprecated-legacy-source",
            Self::Kept => "kept",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision for a single tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub tag: Tag,
    pub action: Action,
    pub reason: Reason,
}

impl Classification {
    fn keep(tag: Tag) -> Self {
        Self {
            tag,
            action: Action::Keep,
            reason: Reason::Kept,
        }
    }

    fn delete(tag: Tag, reason: Reason) -> Self {
        Self {
            tag,
            action: Action::Delete,
            reason,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.action == Action::Delete
    }
}

/// Ordered decisions for one repository pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationResult {
    entries: Vec<Classification>,
}

impl ClassificationResult {
    pub fn iter(&self) -> impl Iterator<Item = &Classification> {
        self.entries.iter()
    }

    pub fn deletions(&self) -> impl Iterator<Item = &Classification> {
        self.entries.iter().filter(|c| c.is_delete())
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Classification> {
        self.entries.iter().find(|c| c.tag.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Decided(Action, Reason),
    /// Target digest is unreferenced in the snapshot; needs an existence check
    Unverified { target: String, kind: ArtifactKind },
}

/// Per-tag verdicts awaiting manifest existence answers
#[derive(Debug, Clone)]
pub struct ClassificationPlan {
    entries: Vec<(Tag, Verdict)>,
}

impl ClassificationPlan {
    /// Distinct digests that need a confirming existence check, in first-seen order
    pub fn pending_digests(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter_map(|(_, verdict)| match verdict {
                Verdict::Unverified { target, .. } if seen.insert(target.as_str()) => {
                    Some(target.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Apply existence answers and produce the final decisions.
    ///
    /// `exists` returns `None` for a digest that was never resolved; such
    /// tags are kept.
    pub fn finalize<F>(self, exists: F) -> ClassificationResult
    where
        F: Fn(&str) -> Option<bool>,
    {
        let entries = self
            .entries
            .into_iter()
            .map(|(tag, verdict)| match verdict {
                Verdict::Decided(Action::Delete, reason) => Classification::delete(tag, reason),
                Verdict::Decided(Action::Keep, _) => Classification::keep(tag),
                Verdict::Unverified { target, kind } => match exists(&target) {
                    Some(false) => Classification::delete(tag, kind.orphan_reason()),
                    Some(true) | None => Classification::keep(tag),
                },
            })
            .collect();
        ClassificationResult { entries }
    }
}

/// Evaluate every in-scope tag of the snapshot.
///
/// With a window, out-of-window tags are left out of the plan entirely. The
/// digest index and the binary-tag lookups still see the whole snapshot.
pub fn plan(tags: &TagSet, window: Option<&TimeWindow>) -> ClassificationPlan {
    build_plan(tags, window, true)
}

/// Like [`plan`], for a listing that stopped before its last page.
///
/// A binary tag missing from the snapshot may sit on an unread page, so its
/// legacy source tag is kept.
pub fn plan_truncated(tags: &TagSet, window: Option<&TimeWindow>) -> ClassificationPlan {
    build_plan(tags, window, false)
}

fn build_plan(tags: &TagSet, window: Option<&TimeWindow>, complete: bool) -> ClassificationPlan {
    let index = ManifestDigestIndex::build(tags);
    let entries = tags
        .iter()
        .filter(|tag| window.map_or(true, |w| w.includes(tag)))
        .map(|tag| (tag.clone(), evaluate(tag, tags, &index, complete)))
        .collect();
    ClassificationPlan { entries }
}

fn evaluate(tag: &Tag, tags: &TagSet, index: &ManifestDigestIndex, complete: bool) -> Verdict {
    if let Some((target, kind)) = parse_artifact_tag(&tag.name) {
        if index.is_referenced(&target) {
            return Verdict::Decided(Action::Keep, Reason::Kept);
        }
        return Verdict::Unverified { target, kind };
    }

    if let Some(binary) = legacy_source_binary(&tag.name) {
        let Some(binary_tag) = tags.get(binary) else {
            if !complete {
                return Verdict::Decided(Action::Keep, Reason::Kept);
            }
            return Verdict::Decided(Action::Delete, Reason::DeprecatedLegacySource);
        };
        if tags.contains(&canonical_source_tag(&binary_tag.manifest_digest)) {
            return Verdict::Decided(Action::Delete, Reason::DeprecatedLegacySource);
        }
    }

    Verdict::Decided(Action::Keep, Reason::Kept)
}
