//! Centralized error types for the plugforge CLI
//!
//! Library crates return their own typed errors; this enum gathers the ones
//! that stop a command and maps each to a process exit code.

use plugforge_ast::DiscoveryError;
use plugforge_config::ConfigError;
use plugforge_manifest::errors::{ArtifactIoError, DescriptorError, RegistryError, ScanError};
use thiserror::Error;

use crate::report::{EXIT_DESCRIPTOR_ERROR, EXIT_SETUP_ERROR};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("plugin descriptor is invalid ({} error(s))", .0.len())]
    Descriptor(Vec<DescriptorError>),

    #[error("cannot prepare output directory: {0}")]
    Output(#[from] ArtifactIoError),

    #[error("{0:#}")]
    Report(#[from] anyhow::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Descriptor(_) => EXIT_DESCRIPTOR_ERROR,
            _ => EXIT_SETUP_ERROR,
        }
    }

    /// One line per underlying problem, for the console
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            CliError::Descriptor(errors) => errors.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}

impl From<Vec<DescriptorError>> for CliError {
    fn from(errors: Vec<DescriptorError>) -> Self {
        CliError::Descriptor(errors)
    }
}

impl From<DiscoveryError> for CliError {
    fn from(error: DiscoveryError) -> Self {
        match error {
            DiscoveryError::Scan(e) => CliError::Scan(e),
            DiscoveryError::Descriptor(errors) => CliError::Descriptor(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugforge_manifest::errors::{ParseError, ValidationError};

    #[test]
    fn test_descriptor_errors_exit_100() {
        let err = CliError::from(vec![
            DescriptorError::from(ParseError::MissingEntryPoint),
            DescriptorError::from(ValidationError::DuplicateCommand {
                name: "home".to_string(),
            }),
        ]);
        assert_eq!(err.exit_code(), 100);
        assert_eq!(err.to_string(), "plugin descriptor is invalid (2 error(s))");
        assert_eq!(
            err.diagnostics(),
            vec![
                "no type annotated with @Plugin was found".to_string(),
                "command `home` is declared more than once".to_string(),
            ]
        );
    }

    #[test]
    fn test_setup_errors_exit_101() {
        let err = CliError::from(RegistryError::InvalidKey("Bad Key".to_string()));
        assert_eq!(err.exit_code(), 101);
        assert_eq!(err.diagnostics().len(), 1);
    }
}
