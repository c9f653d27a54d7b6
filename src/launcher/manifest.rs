//! Dependency manifest: one package constraint per line.
//!
//! ```text
//! # comments and blank lines are skipped
//! hyper>=1.0,<2
//! tokio[full]==1.*
//! serde-json
//! ```

use crate::domain::ports::PackageIndex;
use crate::utils::error::{IngestError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    release: Vec<u64>,
    pre_release: bool,
    raw: String,
}

impl Version {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let numeric_len = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let numeric = body[..numeric_len].trim_end_matches('.');
        if numeric.is_empty() {
            return None;
        }

        let release = numeric
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()?;

        // 後綴: rc/a/b/dev 視為預發行版, post 與本地版本號不算
        let suffix = body[numeric.len()..].to_ascii_lowercase();
        let suffix = suffix.trim_start_matches(&['.', '-', '_'][..]);
        let pre_release =
            !(suffix.is_empty() || suffix.starts_with("post") || suffix.starts_with('+'));

        Some(Self {
            release,
            pre_release,
            raw: trimmed.to_string(),
        })
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre_release
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn component(&self, i: usize) -> u64 {
        self.release.get(i).copied().unwrap_or(0)
    }

    fn cmp_release(&self, other: &Version) -> Ordering {
        let len = self.release.len().max(other.release.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    fn has_prefix(&self, prefix: &[u64]) -> bool {
        prefix.iter().enumerate().all(|(i, p)| self.component(i) == *p)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Ge,
    Le,
    Gt,
    Lt,
    Compatible,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub op: Operator,
    release: Vec<u64>,
    wildcard: bool,
}

impl Clause {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (op, rest) = [
            ("~=", Operator::Compatible),
            ("==", Operator::Eq),
            ("!=", Operator::NotEq),
            (">=", Operator::Ge),
            ("<=", Operator::Le),
            (">", Operator::Gt),
            ("<", Operator::Lt),
        ]
        .iter()
        .find_map(|(token, op)| text.strip_prefix(token).map(|rest| (*op, rest.trim())))?;

        let (version_text, wildcard) = match rest.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (rest, false),
        };
        if wildcard && !matches!(op, Operator::Eq | Operator::NotEq) {
            return None;
        }

        let version = Version::parse(version_text)?;
        if op == Operator::Compatible && version.release.len() < 2 {
            return None;
        }

        Some(Self {
            op,
            release: version.release,
            wildcard,
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        let bound = Version {
            release: self.release.clone(),
            pre_release: false,
            raw: String::new(),
        };
        let ordering = version.cmp_release(&bound);

        match self.op {
            Operator::Eq if self.wildcard => version.has_prefix(&self.release),
            Operator::NotEq if self.wildcard => !version.has_prefix(&self.release),
            Operator::Eq => ordering == Ordering::Equal,
            Operator::NotEq => ordering != Ordering::Equal,
            Operator::Ge => ordering != Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Compatible => {
                let prefix = &self.release[..self.release.len() - 1];
                ordering != Ordering::Less && version.has_prefix(prefix)
            }
        }
    }
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub constraint: String,
    clauses: Vec<Clause>,
}

impl Requirement {
    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        self.clauses.iter().all(|clause| clause.matches(version))
    }

    fn display_constraint(&self) -> &str {
        if self.constraint.is_empty() {
            "*"
        } else {
            &self.constraint
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub name: String,
    pub constraint: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManifest {
    requirements: Vec<Requirement>,
}

impl DependencyManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::DependencyResolutionError {
                package: path.display().to_string(),
                constraint: String::new(),
                reason: format!("cannot read manifest: {}", e),
            }
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let line_re = Regex::new(
            r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[[^\]]*\])?\s*(.*)$",
        )
        .map_err(|e| IngestError::ProcessingError {
            message: e.to_string(),
        })?;

        let mut requirements = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            // 環境標記 (`; target_os == "linux"`) 不參與解析
            let line = line.split(';').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let malformed = |reason: &str| IngestError::DependencyResolutionError {
                package: line.to_string(),
                constraint: String::new(),
                reason: format!("line {}: {}", number + 1, reason),
            };

            if line.starts_with('-') {
                return Err(malformed("installer options are not supported"));
            }

            let captures = line_re
                .captures(line)
                .ok_or_else(|| malformed("not a package constraint"))?;
            let name = captures[1].to_string();
            let constraint = captures[2].trim().to_string();

            let clauses = if constraint.is_empty() {
                Vec::new()
            } else {
                constraint
                    .split(',')
                    .map(|clause| {
                        Clause::parse(clause)
                            .ok_or_else(|| malformed(&format!("invalid clause `{}`", clause.trim())))
                    })
                    .collect::<Result<Vec<Clause>>>()?
            };

            requirements.push(Requirement {
                name,
                constraint,
                clauses,
            });
        }

        Ok(Self { requirements })
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Resolves every requirement, in manifest order, to the highest
    /// published final release that satisfies it.
    pub async fn resolve(&self, index: &dyn PackageIndex) -> Result<Vec<ResolvedDependency>> {
        let mut resolved = Vec::with_capacity(self.requirements.len());

        for requirement in &self.requirements {
            let failure = |reason: String| IngestError::DependencyResolutionError {
                package: requirement.name.clone(),
                constraint: requirement.display_constraint().to_string(),
                reason,
            };

            let available = index
                .available_versions(&requirement.name)
                .await
                .map_err(|e| failure(format!("package index error: {}", e)))?;
            if available.is_empty() {
                return Err(failure("package not found in index".to_string()));
            }

            let best = available
                .iter()
                .filter_map(|raw| Version::parse(raw))
                .filter(|v| !v.is_pre_release() && requirement.is_satisfied_by(v))
                .max_by(|a, b| a.cmp_release(b))
                .ok_or_else(|| {
                    failure(format!(
                        "no version satisfies the constraint ({} published)",
                        available.len()
                    ))
                })?;

            tracing::debug!(
                package = %requirement.name,
                version = best.as_str(),
                "Resolved dependency"
            );
            resolved.push(ResolvedDependency {
                name: requirement.name.clone(),
                constraint: requirement.constraint.clone(),
                version: best.as_str().to_string(),
            });
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::index::LocalIndex;

    fn v(raw: &str) -> Version {
        Version::parse(raw).unwrap()
    }

    #[test]
    fn test_version_parse() {
        assert_eq!(v("1.2.3").release, vec![1, 2, 3]);
        assert!(!v("1.2.3").is_pre_release());
        assert!(v("2.0.0rc1").is_pre_release());
        assert!(v("2.0.0.dev3").is_pre_release());
        assert!(!v("1.0.post2").is_pre_release());
        assert!(Version::parse("latest").is_none());
    }

    #[test]
    fn test_release_ordering_pads_with_zeros() {
        assert_eq!(v("1.2").cmp_release(&v("1.2.0")), Ordering::Equal);
        assert_eq!(v("1.10").cmp_release(&v("1.9")), Ordering::Greater);
    }

    #[test]
    fn test_clauses() {
        let clause = |text: &str| Clause::parse(text).unwrap();

        assert!(clause(">=1.0").matches(&v("1.0")));
        assert!(!clause(">1.0").matches(&v("1.0")));
        assert!(clause("<2").matches(&v("1.9.9")));
        assert!(clause("==0.29.*").matches(&v("0.29.3")));
        assert!(!clause("==0.29.*").matches(&v("0.30.0")));
        assert!(clause("!=1.5").matches(&v("1.6")));
        assert!(clause("~=1.4.2").matches(&v("1.4.9")));
        assert!(!clause("~=1.4.2").matches(&v("1.5.0")));
        assert!(clause("~=1.4").matches(&v("1.9")));
        assert!(!clause("~=1.4").matches(&v("2.0")));

        assert!(Clause::parse("~=1").is_none());
        assert!(Clause::parse(">=1.*").is_none());
        assert!(Clause::parse("=1.0").is_none());
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = DependencyManifest::parse(
            "# runtime\nhyper>=0.110, <1\n\ntokio[full]==0.29.*  # server\nserde-json\nreqwest; target_os == \"linux\"\n",
        )
        .unwrap();

        let names: Vec<&str> = manifest
            .requirements()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["hyper", "tokio", "serde-json", "reqwest"]);
        assert_eq!(manifest.requirements()[0].constraint, ">=0.110, <1");
        assert!(manifest.requirements()[2].constraint.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(DependencyManifest::parse("-r other.txt").is_err());
        assert!(DependencyManifest::parse("hyper >>> 1").is_err());
        assert!(DependencyManifest::parse("@@@").is_err());
    }

    fn index() -> LocalIndex {
        LocalIndex::from_toml_str(
            r#"
[packages]
hyper = ["0.109.2", "0.110.0", "0.111.0", "1.0.0a1"]
tokio = ["0.28.0", "0.29.0"]
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_picks_highest_final_release() {
        let manifest = DependencyManifest::parse("hyper>=0.110\ntokio").unwrap();

        let resolved = manifest.resolve(&index()).await.unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].name, "hyper");
        assert_eq!(resolved[0].version, "0.111.0");
        assert_eq!(resolved[1].version, "0.29.0");
    }

    #[tokio::test]
    async fn test_unsatisfiable_constraint() {
        let manifest = DependencyManifest::parse("hyper>=2").unwrap();

        let err = manifest.resolve(&index()).await.unwrap_err();

        match err {
            IngestError::DependencyResolutionError {
                package,
                constraint,
                ..
            } => {
                assert_eq!(package, "hyper");
                assert_eq!(constraint, ">=2");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_package() {
        let manifest = DependencyManifest::parse("not-a-package").unwrap();
        let err = manifest.resolve(&index()).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
