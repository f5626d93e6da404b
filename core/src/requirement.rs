use crate::error::{GemauditError, Result};
use crate::version::Version;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

static RE_CONSTRAINT: Lazy<Regex> =
    Lazy::new(|| {
        Regex::new(r"^\s*(~>|>=|<=|!=|=|>|<)?\s*([0-9]+(?:[.\-][0-9A-Za-z]+)*)\s*$").unwrap()
    });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// `~>`: at least the version, below the next significant release.
    Pessimistic,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Pessimistic => "~>",
        }
    }
}

impl FromStr for Operator {
    type Err = GemauditError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            "~>" => Ok(Operator::Pessimistic),
            other => Err(GemauditError::parse(other, "unknown operator")),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single operator/version pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    operator: Operator,
    version: Version,
    // Exclusive upper bound of a pessimistic constraint, computed once.
    upper: Option<Version>,
}

impl Constraint {
    pub fn new(operator: Operator, version: Version) -> Self {
        let upper = match operator {
            Operator::Pessimistic => Some(version.bump()),
            _ => None,
        };

        Self {
            operator,
            version,
            upper,
        }
    }

    /// Parses `"~> 2.3.1"`, `">= 1.0"` or a bare version (meaning `=`).
    pub fn parse(input: &str) -> Result<Self> {
        let caps = RE_CONSTRAINT
            .captures(input)
            .ok_or_else(|| GemauditError::parse(input, "expected '[operator] version'"))?;

        let operator = match caps.get(1) {
            Some(op) => op.as_str().parse()?,
            None => Operator::Eq,
        };
        let version = Version::parse(&caps[2])
            .map_err(|_| GemauditError::parse(input, "invalid version in constraint"))?;

        Ok(Self::new(operator, version))
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn satisfied_by(&self, candidate: &Version) -> bool {
        match self.operator {
            Operator::Eq => candidate == &self.version,
            Operator::Ne => candidate != &self.version,
            Operator::Gt => candidate > &self.version,
            Operator::Ge => candidate >= &self.version,
            Operator::Lt => candidate < &self.version,
            Operator::Le => candidate <= &self.version,
            Operator::Pessimistic => {
                // A pre-release of the next series (3.3.0.beta for ~> 3.2.11)
                // is outside the range, so the upper bound applies to the
                // candidate's release form.
                candidate >= &self.version
                    && self
                        .upper
                        .as_ref()
                        .is_some_and(|upper| &candidate.release() < upper)
            }
        }
    }
}

impl FromStr for Constraint {
    type Err = GemauditError;

    fn from_str(s: &str) -> Result<Self> {
        Constraint::parse(s)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operator, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Unrestricted,
    Unsatisfiable,
    All(Vec<Constraint>),
}

/// A conjunction of constraints.
///
/// The two empty forms are kept apart on purpose: an unrestricted set
/// matches every version, an unsatisfiable set matches none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementSet {
    kind: Kind,
}

impl RequirementSet {
    pub fn unrestricted() -> Self {
        Self {
            kind: Kind::Unrestricted,
        }
    }

    pub fn unsatisfiable() -> Self {
        Self {
            kind: Kind::Unsatisfiable,
        }
    }

    pub fn new(constraints: Vec<Constraint>) -> Result<Self> {
        if constraints.is_empty() {
            return Err(GemauditError::parse("", "requirement has no constraints"));
        }

        Ok(Self {
            kind: Kind::All(constraints),
        })
    }

    /// Parses a comma-separated list of constraints.
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(GemauditError::parse(input, "requirement has no constraints"));
        }

        let constraints = input
            .split(',')
            .map(Constraint::parse)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| match e {
                GemauditError::Parse { reason, .. } => GemauditError::parse(input, reason),
                other => other,
            })?;

        Self::new(constraints)
    }

    pub fn constraints(&self) -> &[Constraint] {
        match &self.kind {
            Kind::All(constraints) => constraints,
            Kind::Unrestricted | Kind::Unsatisfiable => &[],
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.kind == Kind::Unrestricted
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.kind == Kind::Unsatisfiable
    }

    pub fn satisfied_by(&self, version: &Version) -> bool {
        match &self.kind {
            Kind::Unrestricted => true,
            Kind::Unsatisfiable => false,
            Kind::All(constraints) => constraints.iter().all(|c| c.satisfied_by(version)),
        }
    }
}

impl Default for RequirementSet {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl FromStr for RequirementSet {
    type Err = GemauditError;

    fn from_str(s: &str) -> Result<Self> {
        RequirementSet::parse(s)
    }
}

impl fmt::Display for RequirementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Unrestricted => write!(f, ">= 0"),
            Kind::Unsatisfiable => write!(f, "none"),
            Kind::All(constraints) => {
                let parts: Vec<String> = constraints.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

impl Serialize for RequirementSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
