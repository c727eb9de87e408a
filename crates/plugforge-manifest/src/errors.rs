use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Position of an annotation in the scanned sources
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Malformed, missing or ambiguous plugin metadata. Aborts the whole compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no type annotated with @Plugin was found")]
    MissingEntryPoint,

    #[error("@Plugin found on {} types: {}", .candidates.len(), format_candidates(.candidates))]
    AmbiguousEntryPoint {
        candidates: Vec<(String, SourceLocation)>,
    },

    #[error("{location}: entry point `{type_name}` {reason}")]
    InvalidEntryPoint {
        type_name: String,
        location: SourceLocation,
        reason: String,
    },

    #[error("@Bootstrap found on {} types: {}", .candidates.len(), format_candidates(.candidates))]
    AmbiguousBootstrap {
        candidates: Vec<(String, SourceLocation)>,
    },

    #[error("{location}: @{annotation} is missing required attribute `{attribute}`")]
    MissingAttribute {
        annotation: String,
        attribute: String,
        location: SourceLocation,
    },

    #[error("{location}: @{annotation}.{attribute} must be {expected}, found `{found}`")]
    WrongAttributeType {
        annotation: String,
        attribute: String,
        expected: &'static str,
        found: String,
        location: SourceLocation,
    },

    #[error("{location}: @{annotation} has unknown attribute `{attribute}`")]
    UnknownAttribute {
        annotation: String,
        attribute: String,
        location: SourceLocation,
    },

    #[error("{location}: invalid plugin id `{value}` (expected lowercase letters, digits and '-')")]
    InvalidId {
        value: String,
        location: SourceLocation,
    },

    #[error("{location}: invalid plugin version `{value}`: {reason}")]
    InvalidVersion {
        value: String,
        reason: String,
        location: SourceLocation,
    },

    #[error("{location}: invalid version range `{value}` for dependency `{dependency}`: {reason}")]
    InvalidVersionRange {
        dependency: String,
        value: String,
        reason: String,
        location: SourceLocation,
    },

    #[error("{location}: invalid permission default `{value}` (expected true, false, op or not-op)")]
    InvalidPermissionDefault {
        value: String,
        location: SourceLocation,
    },
}

fn format_candidates(candidates: &[(String, SourceLocation)]) -> String {
    candidates
        .iter()
        .map(|(name, location)| format!("{name} ({location})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cross-field invariant violations on an otherwise well-formed descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("command `{name}` is declared more than once")]
    DuplicateCommand { name: String },

    #[error("alias `{alias}` of command `{command}` collides with command or alias of `{other}`")]
    AliasCollision {
        alias: String,
        command: String,
        other: String,
    },

    #[error("permission `{node}` is declared more than once")]
    DuplicatePermission { node: String },

    #[error("dependency `{id}` is declared more than once for platform(s) {platforms}")]
    DuplicateDependency { id: String, platforms: String },

    #[error("dependency `{dependency}` names unknown platform `{platform}`")]
    UnknownDependencyPlatform { dependency: String, platform: String },

    #[error("target platform `{platform}` is not registered")]
    UnknownTargetPlatform { platform: String },
}

/// Any error that stops descriptor construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// The rule a descriptor value broke on a given platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintRule {
    MaxLength(usize),
    MinLength(usize),
    Pattern(String),
    ForbiddenPrefix(String),
}

impl fmt::Display for ConstraintRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintRule::MaxLength(max) => write!(f, "at most {max} characters"),
            ConstraintRule::MinLength(min) => write!(f, "at least {min} characters"),
            ConstraintRule::Pattern(pattern) => write!(f, "must match `{pattern}`"),
            ConstraintRule::ForbiddenPrefix(prefix) => write!(f, "must not start with `{prefix}`"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{platform}] {field} `{value}` violates rule: {rule}")]
pub struct ConstraintError {
    pub platform: String,
    pub field: String,
    pub value: String,
    pub rule: ConstraintRule,
}

/// A platform definition that is incomplete or malformed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{platform}] invalid platform contract at `{element}`: {reason}")]
pub struct ContractError {
    pub platform: String,
    pub element: String,
    pub reason: String,
}

impl ContractError {
    pub fn new(platform: &str, element: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            platform: platform.to_string(),
            element: element.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
#[error("failed to write {}: {source}", .path.display())]
pub struct ArtifactIoError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl ArtifactIoError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Everything that can fail a single platform without touching the others
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("[{platform}] {source}")]
    Io {
        platform: String,
        #[source]
        source: ArtifactIoError,
    },

    #[error("platform `{0}` is not registered")]
    UnknownPlatform(String),
}

impl PlatformError {
    /// Short tag used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformError::Constraint(_) => "constraint",
            PlatformError::Contract(_) => "contract",
            PlatformError::Io { .. } => "io",
            PlatformError::UnknownPlatform(_) => "unknown-platform",
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read platform registry {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode platform registry {origin}: {source}")]
    Decode {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid platform key `{0}` (expected lowercase letters, digits and '-')")]
    InvalidKey(String),
}

/// The source tree could not be scanned. Aborts before any parsing.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("source root {} is not a directory", .0.display())]
    MissingRoot(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk {}: {message}", .path.display())]
    Walk { path: PathBuf, message: String },
}
