//! core::types
//!
//! Strong types for the upgrade domain.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Git object identifier (SHA)
//! - [`SemanticVersion`] - Generator version (`MAJOR.MINOR.PATCH[-pre][+build]`)
//! - [`TargetVersion`] - Requested upgrade target (explicit or `latest`)
//!
//! # Validation
//!
//! These types enforce validity at construction time. A version string that
//! cannot be parsed never reaches a commit message or the regenerator.
//!
//! # Examples
//!
//! ```
//! use scaffold_upgrade::core::types::{BranchName, SemanticVersion};
//!
//! let branch = BranchName::new("jhipster_upgrade").unwrap();
//! assert_eq!(branch.as_str(), "jhipster_upgrade");
//!
//! let version = SemanticVersion::parse("8.1.0").unwrap();
//! assert!(version > SemanticVersion::parse("8.0.12").unwrap());
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(SemanticVersion::parse("eight").is_err());
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },
}

/// A validated Git branch name.
///
/// Follows the subset of `git check-ref-format --branch` rules that matter
/// for names this tool creates or reads back from HEAD:
/// - not empty, not `@`
/// - no component starting with `.` or ending with `.lock`
/// - no `..`, `@{`, `//`, whitespace, control characters, or `~^:\?*[`
/// - no leading `-`, no trailing `/`
///
/// # Example
///
/// ```
/// use scaffold_upgrade::core::types::BranchName;
///
/// assert!(BranchName::new("main").is_ok());
/// assert!(BranchName::new("feature/login").is_ok());
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if let Some(reason) = Self::violation(&name) {
            return Err(TypeError::InvalidBranchName(format!("'{name}': {reason}")));
        }
        Ok(Self(name))
    }

    fn violation(name: &str) -> Option<&'static str> {
        const FORBIDDEN: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];

        if name.is_empty() {
            return Some("cannot be empty");
        }
        if name == "@" {
            return Some("'@' is reserved");
        }
        if name.starts_with('-') {
            return Some("cannot start with '-'");
        }
        if name.ends_with('/') {
            return Some("cannot end with '/'");
        }
        if name.contains("..") || name.contains("@{") || name.contains("//") {
            return Some("cannot contain '..', '@{' or '//'");
        }
        if name.chars().any(|c| c.is_ascii_control() || FORBIDDEN.contains(&c)) {
            return Some("contains a forbidden character");
        }
        let bad_component = name
            .split('/')
            .any(|part| part.starts_with('.') || part.ends_with(".lock"));
        if bad_component {
            return Some("path components cannot start with '.' or end with '.lock'");
        }
        None
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The full ref for this branch (`refs/heads/<name>`).
    pub fn refname(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256), normalized to lowercase.
///
/// # Example
///
/// ```
/// use scaffold_upgrade::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not 40 or 64 hex characters.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid("object id must be hexadecimal".into()));
        }
        Ok(Self(oid))
    }

    /// Abbreviated form; the full id when `len` exceeds it.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A generator version following Semantic Versioning 2.0.
///
/// A leading `v` is accepted and dropped. Ordering follows semver precedence:
/// pre-release versions sort below the release, build metadata is ignored for
/// ordering but kept for display.
///
/// # Example
///
/// ```
/// use scaffold_upgrade::core::types::SemanticVersion;
///
/// let rc = SemanticVersion::parse("8.0.0-rc.1").unwrap();
/// let release = SemanticVersion::parse("v8.0.0").unwrap();
/// assert!(rc < release);
/// assert_eq!(release.to_string(), "8.0.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Vec<String>,
    build: Option<String>,
}

impl SemanticVersion {
    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVersion` when the string is not a valid
    /// `MAJOR.MINOR.PATCH[-pre][+build]` version.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidVersion {
            version: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let (rest, build) = match trimmed.split_once('+') {
            Some((rest, build)) => {
                if !Self::valid_identifiers(build) {
                    return Err(invalid("malformed build metadata"));
                }
                (rest, Some(build.to_string()))
            }
            None => (trimmed, None),
        };

        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => {
                if !Self::valid_identifiers(pre) {
                    return Err(invalid("malformed pre-release"));
                }
                (core, pre.split('.').map(str::to_string).collect())
            }
            None => (rest, Vec::new()),
        };

        let numbers: Vec<&str> = core.split('.').collect();
        if numbers.len() != 3 {
            return Err(invalid("expected MAJOR.MINOR.PATCH"));
        }
        let mut parsed = [0u64; 3];
        for (slot, part) in parsed.iter_mut().zip(&numbers) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("version components must be numeric"));
            }
            if part.len() > 1 && part.starts_with('0') {
                return Err(invalid("version components cannot have leading zeros"));
            }
            *slot = part
                .parse()
                .map_err(|_| invalid("version component out of range"))?;
        }

        Ok(Self {
            major: parsed[0],
            minor: parsed[1],
            patch: parsed[2],
            pre,
            build,
        })
    }

    fn valid_identifiers(s: &str) -> bool {
        !s.is_empty()
            && s.split('.').all(|id| {
                !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Whether this is a pre-release (`1.0.0-beta.1`).
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    fn compare_pre(a: &[String], b: &[String]) -> Ordering {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        for (x, y) in a.iter().zip(b) {
            let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => x.cmp(y),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.len().cmp(&b.len())
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| Self::compare_pre(&self.pre, &other.pre))
    }
}

impl FromStr for SemanticVersion {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SemanticVersion> for String {
    fn from(version: SemanticVersion) -> Self {
        version.to_string()
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre.join("."))?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

/// The version an upgrade should move the project to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetVersion {
    /// Whatever version the installed generator reports.
    #[default]
    Latest,
    /// A pinned version.
    Exact(SemanticVersion),
}

impl FromStr for TargetVersion {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("latest") {
            Ok(TargetVersion::Latest)
        } else {
            SemanticVersion::parse(s).map(TargetVersion::Exact)
        }
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetVersion::Latest => f.write_str("latest"),
            TargetVersion::Exact(v) => write!(f, "{v}"),
        }
    }
}
