//! Python requirement specifiers and version matching
//!
//! Covers the subset of PEP 508/440 the packager needs: a distribution name,
//! optional extras, comma-separated version clauses, or a direct URL
//! (`git+https://...`, `name @ url`). Environment markers are dropped.

use super::PackageError;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator of a version clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VersionOp {
    Equal,
    NotEqual,
    GreaterEqual,
    LessEqual,
    Greater,
    Less,
    Compatible,
    Arbitrary,
}

impl VersionOp {
    fn as_str(&self) -> &'static str {
        match self {
            VersionOp::Equal => "==",
            VersionOp::NotEqual => "!=",
            VersionOp::GreaterEqual => ">=",
            VersionOp::LessEqual => "<=",
            VersionOp::Greater => ">",
            VersionOp::Less => "<",
            VersionOp::Compatible => "~=",
            VersionOp::Arbitrary => "===",
        }
    }
}

/// Longest operators first so `>=` is not read as `>`
const OPERATORS: [(&str, VersionOp); 8] = [
    ("===", VersionOp::Arbitrary),
    ("~=", VersionOp::Compatible),
    ("==", VersionOp::Equal),
    ("!=", VersionOp::NotEqual),
    (">=", VersionOp::GreaterEqual),
    ("<=", VersionOp::LessEqual),
    (">", VersionOp::Greater),
    ("<", VersionOp::Less),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Specifier {
    pub op: VersionOp,
    pub version: String,
}

impl Specifier {
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate_v = Version::parse(candidate);
        match self.op {
            VersionOp::Arbitrary => candidate == self.version,
            VersionOp::Equal => equal_with_wildcard(&self.version, &candidate_v),
            VersionOp::NotEqual => !equal_with_wildcard(&self.version, &candidate_v),
            VersionOp::GreaterEqual => candidate_v >= Version::parse(&self.version),
            VersionOp::LessEqual => candidate_v <= Version::parse(&self.version),
            VersionOp::Greater => candidate_v > Version::parse(&self.version),
            VersionOp::Less => candidate_v < Version::parse(&self.version),
            VersionOp::Compatible => {
                // ~=1.4.5 means >=1.4.5 and ==1.4.*
                let spec = Version::parse(&self.version);
                let prefix_len = spec.release.len().saturating_sub(1).max(1);
                let prefix = &spec.release[..prefix_len.min(spec.release.len())];
                candidate_v >= spec && candidate_v.starts_with(prefix)
            }
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

fn equal_with_wildcard(spec: &str, candidate: &Version) -> bool {
    match spec.strip_suffix(".*") {
        Some(prefix) => candidate.starts_with(&Version::parse(prefix).release),
        None => *candidate == Version::parse(spec),
    }
}

// =============================================================================
// Version
// =============================================================================

/// Release phase of a label, in PEP 440 order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Dev,
    Alpha,
    Beta,
    Candidate,
    Release,
    Post,
}

/// Trailing label of a segment (`rc10` -> Candidate, 10)
///
/// Unrecognized words keep their text for a stable tie-break and sort with
/// pre-releases.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Label {
    phase: Phase,
    number: u64,
    rest: String,
}

impl Label {
    fn release() -> Self {
        Self {
            phase: Phase::Release,
            number: 0,
            rest: String::new(),
        }
    }

    fn parse(s: &str) -> Self {
        let s = s.trim_start_matches(['-', '_', '.']);
        if s.is_empty() {
            return Self::release();
        }
        let word: String = s.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        let tail = s[word.len()..].trim_start_matches(['-', '_', '.']);
        let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
        let (phase, rest) = match word.as_str() {
            "dev" => (Phase::Dev, ""),
            "a" | "alpha" => (Phase::Alpha, ""),
            "b" | "beta" => (Phase::Beta, ""),
            "rc" | "c" | "pre" | "preview" => (Phase::Candidate, ""),
            "post" | "rev" | "r" => (Phase::Post, ""),
            other => (Phase::Dev, other),
        };
        Self {
            phase,
            number: digits.parse().unwrap_or(0),
            rest: format!("{}{}", rest, &tail[digits.len()..]),
        }
    }
}

/// One dotted component: numeric part plus any trailing label (`0rc1` -> 0, rc1)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Segment {
    number: u64,
    label: Label,
}

impl Segment {
    fn parse(s: &str) -> Self {
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        Self {
            number: digits.parse().unwrap_or(0),
            label: Label::parse(&s[digits.len()..].to_lowercase()),
        }
    }
}

/// Dotted release version compared segment by segment, missing segments as 0
#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<Segment>,
}

impl Version {
    pub fn parse(s: &str) -> Self {
        let s = s.trim().trim_start_matches(['v', 'V']);
        let s = s.split('+').next().unwrap_or(s);
        let mut release: Vec<Segment> = Vec::new();
        for part in s.split('.').filter(|p| !p.is_empty()) {
            let segment = Segment::parse(part);
            // `2.0.post1` labels the `0`, it is not a third component
            let bare_label = !part.starts_with(|c: char| c.is_ascii_digit());
            match release.last_mut() {
                Some(last) if bare_label && last.label == Label::release() => {
                    last.label = segment.label
                }
                _ => release.push(segment),
            }
        }
        Self { release }
    }

    fn segment(&self, i: usize) -> Segment {
        self.release.get(i).cloned().unwrap_or(Segment {
            number: 0,
            label: Label::release(),
        })
    }

    fn starts_with(&self, prefix: &[Segment]) -> bool {
        prefix.iter().enumerate().all(|(i, p)| {
            let segment = self.segment(i);
            segment.number == p.number && (p.label == Label::release() || segment.label == p.label)
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        (0..len)
            .map(|i| self.segment(i).cmp(&other.segment(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

// =============================================================================
// Requirement
// =============================================================================

/// A parsed requirement line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub specifiers: Vec<Specifier>,
    pub url: Option<String>,
    /// The text the requirement was parsed from
    pub line: String,
}

/// Canonical distribution name: lower-case, runs of `_`/`.`/`-` become `-`
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.chars() {
        if c == '_' || c == '.' || c == '-' {
            if !last_dash {
                out.push('-');
            }
            last_dash = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        }
    }
    out
}

fn name_from_url(url: &str) -> String {
    let path = url.split(['#', '?']).next().unwrap_or(url);
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
    // `repo.git@v1.0` pins a ref
    let last = last.split('@').next().unwrap_or(last);
    last.trim_end_matches(".git").to_string()
}

impl Requirement {
    pub fn parse(line: &str) -> Result<Self, PackageError> {
        let original = line.trim().to_string();
        let text = original.split(';').next().unwrap_or("").trim();
        let invalid = |reason: &str| PackageError::InvalidRequirement {
            requirement: original.clone(),
            reason: reason.to_string(),
        };

        if text.is_empty() {
            return Err(invalid("empty requirement"));
        }

        // `name @ url`
        if let Some((name, url)) = text.split_once(" @ ") {
            let mut req = Self::parse(name)?;
            req.url = Some(url.trim().to_string());
            req.line = original;
            return Ok(req);
        }

        // bare URL, e.g. git+https://github.com/org/pkg.git
        if text.contains("://") {
            let name = name_from_url(text);
            if name.is_empty() {
                return Err(invalid("cannot derive a package name from the URL"));
            }
            return Ok(Self {
                name,
                extras: vec![],
                specifiers: vec![],
                url: Some(text.to_string()),
                line: original,
            });
        }

        let name_len = text
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
            .unwrap_or(text.len());
        let name = &text[..name_len];
        if name.is_empty() {
            return Err(invalid("missing package name"));
        }
        let mut rest = text[name_len..].trim();

        let mut extras = vec![];
        if let Some(after) = rest.strip_prefix('[') {
            let (inside, tail) = after
                .split_once(']')
                .ok_or_else(|| invalid("unterminated extras"))?;
            extras = inside
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            rest = tail.trim();
        }

        let rest = rest.trim_start_matches('(').trim_end_matches(')');
        let mut specifiers = vec![];
        for clause in rest.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let (op, version) = OPERATORS
                .iter()
                .find_map(|(sym, op)| clause.strip_prefix(sym).map(|v| (*op, v.trim())))
                .ok_or_else(|| invalid(&format!("unknown version clause '{}'", clause)))?;
            if version.is_empty() {
                return Err(invalid(&format!("missing version in '{}'", clause)));
            }
            specifiers.push(Specifier {
                op,
                version: version.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            extras,
            specifiers,
            url: None,
            line: original,
        })
    }

    /// Requirement on `name` with no version constraint
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extras: vec![],
            specifiers: vec![],
            url: None,
            line: name.to_string(),
        }
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Whether `version` satisfies every clause
    pub fn is_satisfied_by(&self, version: &str) -> bool {
        self.specifiers.iter().all(|s| s.matches(version))
    }

    /// Archive name: `dummy-pkg` -> `dummy_pkg.zip`
    pub fn zip_file_name(&self) -> String {
        format!("{}.zip", self.name.replace('-', "_"))
    }

    /// Argument handed to the installer
    pub fn install_spec(&self) -> &str {
        self.line.split(';').next().unwrap_or(&self.line).trim()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let req = Requirement::parse("snowflake-connector-python").unwrap();
        assert_eq!(req.name, "snowflake-connector-python");
        assert!(req.specifiers.is_empty());
        assert!(req.url.is_none());
    }

    #[test]
    fn test_parse_specifiers_and_extras() {
        let req = Requirement::parse("requests[security, socks]>=2.0,<3 ; python_version > '3.8'")
            .unwrap();
        assert_eq!(req.name, "requests");
        assert_eq!(req.extras, vec!["security", "socks"]);
        assert_eq!(req.specifiers.len(), 2);
        assert_eq!(req.specifiers[0].to_string(), ">=2.0");
        assert_eq!(req.specifiers[1].to_string(), "<3");
        assert_eq!(req.install_spec(), "requests[security, socks]>=2.0,<3");
    }

    #[test]
    fn test_parse_url() {
        let req = Requirement::parse(
            "git+https://github.com/example/dummy-pkg-for-tests-with-deps.git",
        )
        .unwrap();
        assert_eq!(req.name, "dummy-pkg-for-tests-with-deps");
        assert_eq!(req.zip_file_name(), "dummy_pkg_for_tests_with_deps.zip");
        assert!(req.url.is_some());

        let req = Requirement::parse("pkg @ https://example.com/pkg-1.0.tar.gz").unwrap();
        assert_eq!(req.name, "pkg");
        assert_eq!(req.url.as_deref(), Some("https://example.com/pkg-1.0.tar.gz"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Requirement::parse("").is_err());
        assert!(Requirement::parse(">=1.0").is_err());
        assert!(Requirement::parse("pkg[extra").is_err());
        assert!(Requirement::parse("pkg>=").is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::parse("1.10") > Version::parse("1.9"));
        assert_eq!(Version::parse("1.0"), Version::parse("1.0.0"));
        assert!(Version::parse("2.0rc1") < Version::parse("2.0"));
        assert!(Version::parse("2.0.post1") > Version::parse("2.0"));
        assert!(Version::parse("3.7.1") < Version::parse("1000"));
    }

    #[test]
    fn test_pre_release_ordering() {
        assert!(Version::parse("2.0rc10") > Version::parse("2.0rc9"));
        assert!(Version::parse("2.0a1") < Version::parse("2.0b1"));
        assert!(Version::parse("2.0b3") < Version::parse("2.0rc1"));
        assert!(Version::parse("2.0.dev1") < Version::parse("2.0a1"));
        assert!(Version::parse("2.0.post2") > Version::parse("2.0.post1"));
        assert_eq!(Version::parse("2.0RC1"), Version::parse("2.0rc1"));

        let req = Requirement::parse("pkg>=2.0rc10").unwrap();
        assert!(!req.is_satisfied_by("2.0rc9"));
        assert!(req.is_satisfied_by("2.0rc11"));
        assert!(req.is_satisfied_by("2.0"));
        assert!(Requirement::parse("pkg==2.0.*").unwrap().is_satisfied_by("2.0.post1"));
    }

    #[test]
    fn test_specifier_matching() {
        let req = Requirement::parse("matplotlib>=1000").unwrap();
        assert!(!req.is_satisfied_by("3.7.1"));

        let req = Requirement::parse("numpy==1.24.*").unwrap();
        assert!(req.is_satisfied_by("1.24.3"));
        assert!(!req.is_satisfied_by("1.25.0"));

        let req = Requirement::parse("pandas~=1.5").unwrap();
        assert!(req.is_satisfied_by("1.5.3"));
        assert!(req.is_satisfied_by("1.9"));
        assert!(!req.is_satisfied_by("2.0"));

        let req = Requirement::parse("pkg!=2.0,>1").unwrap();
        assert!(req.is_satisfied_by("2.1"));
        assert!(!req.is_satisfied_by("2.0"));
        assert!(!req.is_satisfied_by("1"));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Dummy_Pkg.For--Tests"), "dummy-pkg-for-tests");
    }
}
