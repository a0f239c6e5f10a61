//! Validated coordinate types for build artifacts.
//!
//! A coordinate is a (group, artifact, version) triple plus an optional
//! classifier and extension. Group and artifact identifiers are shape-checked
//! at construction time; versions are classified structurally into literals,
//! ranges, and unresolved expressions by [`VersionSpec`]. Serde impls go
//! through the canonical string form so invalid data cannot enter the type
//! system from untrusted input.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when constructing a coordinate from invalid input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentError {
    /// The group identifier did not match the expected shape.
    #[error("invalid group id: {0:?}")]
    InvalidGroupId(String),
    /// The artifact identifier did not match the expected shape.
    #[error("invalid artifact id: {0:?}")]
    InvalidArtifactId(String),
    /// The version string was empty, contained whitespace, or was an
    /// unterminated range.
    #[error("invalid version {version:?}: {reason}")]
    InvalidVersion {
        /// The rejected version string.
        version: String,
        /// A human-readable description of the problem.
        reason: &'static str,
    },
    /// The classifier did not match the expected shape.
    #[error("invalid classifier: {0:?}")]
    InvalidClassifier(String),
    /// The extension did not match the expected shape.
    #[error("invalid extension: {0:?}")]
    InvalidExtension(String),
    /// A canonical coordinate string could not be split into its fields.
    #[error(
        "malformed coordinate {0:?}: expected group:artifact:version[:extension[:classifier]]"
    )]
    MalformedCoordinate(String),
}

// Patterns below are compile-time literals; Regex::new never fails for them.
// The never-matching "a^" fallback satisfies the workspace unwrap/expect ban.

/// Matches group ids, artifact ids, classifiers, and extensions.
static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$")
        .unwrap_or_else(|_| Regex::new("a^").unwrap_or_else(|_| unreachable!("regex engine broken")))
});

/// Matches a `${...}` property expression anywhere in a version string.
static EXPRESSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{[^}]*\}")
        .unwrap_or_else(|_| Regex::new("a^").unwrap_or_else(|_| unreachable!("regex engine broken")))
});

// ---------------------------------------------------------------------------
// GroupArtifact
// ---------------------------------------------------------------------------

/// A versionless `group:artifact` projection of a coordinate.
///
/// Used as the key for version selections (one selection pins every version
/// of the same GA) and for the store's GA index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupArtifact {
    group_id: String,
    artifact_id: String,
}

impl GroupArtifact {
    /// Constructs a validated GA pair.
    ///
    /// # Errors
    ///
    /// Returns [`IdentError::InvalidGroupId`] / [`IdentError::InvalidArtifactId`]
    /// when either identifier fails the shape check.
    pub fn new(group_id: &str, artifact_id: &str) -> Result<Self, IdentError> {
        if !ID_RE.is_match(group_id) {
            return Err(IdentError::InvalidGroupId(group_id.to_owned()));
        }
        if !ID_RE.is_match(artifact_id) {
            return Err(IdentError::InvalidArtifactId(artifact_id.to_owned()));
        }
        Ok(Self {
            group_id: group_id.to_owned(),
            artifact_id: artifact_id.to_owned(),
        })
    }

    /// The group identifier.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// The artifact identifier.
    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }
}

impl fmt::Display for GroupArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

impl TryFrom<&str> for GroupArtifact {
    type Error = IdentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [group, artifact] => Self::new(group, artifact),
            _ => Err(IdentError::MalformedCoordinate(s.to_owned())),
        }
    }
}

impl TryFrom<String> for GroupArtifact {
    type Error = IdentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}

impl From<GroupArtifact> for String {
    fn from(ga: GroupArtifact) -> Self {
        ga.to_string()
    }
}

// ---------------------------------------------------------------------------
// VersionSpec
// ---------------------------------------------------------------------------

/// A version string classified by shape.
///
/// A coordinate is *variable* when its version is a [`VersionSpec::Range`]
/// (`[1.0,2.0)`-style) or an unresolved [`VersionSpec::Expression`]
/// (`${project.version}`-style) rather than a single literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionSpec {
    /// A single concrete version, e.g. `1.4.2`.
    Literal(String),
    /// A version range, e.g. `[1.0,2.0)` or `[1.0]`.
    Range(String),
    /// An unresolved property expression, e.g. `${commons.version}`.
    Expression(String),
}

impl VersionSpec {
    /// Classifies a raw version string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentError::InvalidVersion`] for empty strings, strings
    /// containing whitespace, and unterminated ranges.
    pub fn parse(raw: &str) -> Result<Self, IdentError> {
        if raw.is_empty() {
            return Err(IdentError::InvalidVersion {
                version: raw.to_owned(),
                reason: "version is empty",
            });
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(IdentError::InvalidVersion {
                version: raw.to_owned(),
                reason: "version contains whitespace",
            });
        }
        if EXPRESSION_RE.is_match(raw) {
            return Ok(Self::Expression(raw.to_owned()));
        }
        if raw.starts_with('[') || raw.starts_with('(') {
            if raw.ends_with(']') || raw.ends_with(')') {
                return Ok(Self::Range(raw.to_owned()));
            }
            return Err(IdentError::InvalidVersion {
                version: raw.to_owned(),
                reason: "unterminated version range",
            });
        }
        Ok(Self::Literal(raw.to_owned()))
    }

    /// The raw version string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Range(s) | Self::Expression(s) => s,
        }
    }

    /// `true` for ranges and expressions, `false` for literals.
    pub fn is_variable(&self) -> bool {
        match self {
            Self::Literal(_) => false,
            Self::Range(_) | Self::Expression(_) => true,
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for VersionSpec {
    type Error = IdentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionSpec {
    type Error = IdentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VersionSpec> for String {
    fn from(v: VersionSpec) -> Self {
        match v {
            VersionSpec::Literal(s) | VersionSpec::Range(s) | VersionSpec::Expression(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectRef
// ---------------------------------------------------------------------------

/// A full build-artifact coordinate.
///
/// Equality and hashing cover all present fields. The canonical string form
/// is `group:artifact:version`, extended to `group:artifact:version:extension`
/// and `group:artifact:version:extension:classifier` when those fields are
/// present; a classifier therefore always implies an extension (defaulting to
/// `jar` when none was set).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectRef {
    group_id: String,
    artifact_id: String,
    version: VersionSpec,
    extension: Option<String>,
    classifier: Option<String>,
}

impl ProjectRef {
    /// Constructs a validated coordinate with no classifier or extension.
    ///
    /// # Errors
    ///
    /// Returns [`IdentError`] when any field fails validation.
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Result<Self, IdentError> {
        let ga = GroupArtifact::new(group_id, artifact_id)?;
        Ok(Self {
            group_id: ga.group_id,
            artifact_id: ga.artifact_id,
            version: VersionSpec::parse(version)?,
            extension: None,
            classifier: None,
        })
    }

    /// Returns a copy with the given extension (e.g. `pom`, `war`).
    ///
    /// # Errors
    ///
    /// Returns [`IdentError::InvalidExtension`] when the extension fails the
    /// shape check.
    pub fn with_extension(mut self, extension: &str) -> Result<Self, IdentError> {
        if !ID_RE.is_match(extension) {
            return Err(IdentError::InvalidExtension(extension.to_owned()));
        }
        self.extension = Some(extension.to_owned());
        Ok(self)
    }

    /// Returns a copy with the given classifier (e.g. `sources`).
    ///
    /// A classifier implies an extension; if none was set, `jar` is assumed.
    ///
    /// # Errors
    ///
    /// Returns [`IdentError::InvalidClassifier`] when the classifier fails
    /// the shape check.
    pub fn with_classifier(mut self, classifier: &str) -> Result<Self, IdentError> {
        if !ID_RE.is_match(classifier) {
            return Err(IdentError::InvalidClassifier(classifier.to_owned()));
        }
        if self.extension.is_none() {
            self.extension = Some("jar".to_owned());
        }
        self.classifier = Some(classifier.to_owned());
        Ok(self)
    }

    /// Returns a copy with the version replaced, all other fields preserved.
    pub fn with_version(&self, version: VersionSpec) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    /// The coordinate's POM artifact: same GAV, extension `pom`, no
    /// classifier.
    pub fn pom_artifact(&self) -> Self {
        Self {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: self.version.clone(),
            extension: Some("pom".to_owned()),
            classifier: None,
        }
    }

    /// Projects the coordinate to its versionless `group:artifact` pair.
    pub fn ga(&self) -> GroupArtifact {
        GroupArtifact {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
        }
    }

    /// The group identifier.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// The artifact identifier.
    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    /// The classified version.
    pub fn version(&self) -> &VersionSpec {
        &self.version
    }

    /// The extension, if any.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// The classifier, if any.
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// `true` when the version is a range or an unresolved expression.
    pub fn is_variable(&self) -> bool {
        self.version.is_variable()
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.group_id,
            self.artifact_id,
            self.version.as_str()
        )?;
        if let Some(ext) = &self.extension {
            write!(f, ":{ext}")?;
        }
        if let Some(cls) = &self.classifier {
            write!(f, ":{cls}")?;
        }
        Ok(())
    }
}

impl TryFrom<&str> for ProjectRef {
    type Error = IdentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [group, artifact, version] => Self::new(group, artifact, version),
            [group, artifact, version, extension] => {
                Self::new(group, artifact, version)?.with_extension(extension)
            }
            [group, artifact, version, extension, classifier] => Self::new(
                group, artifact, version,
            )?
            .with_extension(extension)?
            .with_classifier(classifier),
            _ => Err(IdentError::MalformedCoordinate(s.to_owned())),
        }
    }
}

impl TryFrom<String> for ProjectRef {
    type Error = IdentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}

impl From<ProjectRef> for String {
    fn from(p: ProjectRef) -> Self {
        p.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
