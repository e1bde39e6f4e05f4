//! Command Template Validation
//!
//! Validates the registry's invocation templates before a child process is
//! spawned. The checks use a whitelist approach: only known interpreters,
//! relative program names, and metacharacter-free template arguments.
//!
//! The payload argument is exempt on purpose. It is appended as one argv
//! entry and the process is spawned without a shell, so metacharacters in
//! user input are inert; rejecting them would break legitimate scans.

use std::path::Path;

use crate::registry::ExternalHandler;

/// Error types for command template validation
#[derive(Debug, thiserror::Error)]
pub enum CommandValidationError {
    #[error("Program '{0}' is not in the allowed interpreter list")]
    NotAllowed(String),

    #[error("Template token '{0}' contains shell metacharacters")]
    ShellMetacharacter(String),

    #[error("Program path is absolute and potentially unsafe: '{0}'")]
    AbsolutePath(String),

    #[error("Template token contains directory traversal: '{0}'")]
    DirectoryTraversal(String),
}

/// Validator enforcing the template security policy
#[derive(Debug, Clone)]
pub struct CommandValidator {
    /// Whitelist of allowed interpreter programs
    allowed_programs: Vec<String>,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::with_default_whitelist()
    }
}

impl CommandValidator {
    /// Default whitelist: the interpreters the external analyzers ship with.
    pub fn with_default_whitelist() -> Self {
        Self {
            allowed_programs: vec![
                "python".to_string(),
                "python3".to_string(),
                "node".to_string(),
            ],
        }
    }

    /// Custom whitelist, for deployments with other interpreters and for
    /// tests that substitute stub executables.
    pub fn with_whitelist(allowed: Vec<String>) -> Self {
        Self {
            allowed_programs: allowed,
        }
    }

    /// Check if a program is in the whitelist
    pub fn is_allowed(&self, program: &str) -> bool {
        self.allowed_programs.iter().any(|p| p == program)
    }

    /// Get the current whitelist
    pub fn whitelist(&self) -> &[String] {
        &self.allowed_programs
    }

    /// Validate an external handler's invocation template.
    pub fn validate(&self, handler: &ExternalHandler) -> Result<(), CommandValidationError> {
        if !self.is_allowed(&handler.program) {
            return Err(CommandValidationError::NotAllowed(handler.program.clone()));
        }

        self.check_path(&handler.program)?;
        self.check_shell_metacharacters(&handler.program)?;

        for arg in &handler.args {
            if arg.contains("..") {
                return Err(CommandValidationError::DirectoryTraversal(arg.clone()));
            }
            self.check_shell_metacharacters(arg)?;
        }

        Ok(())
    }

    /// Prevents absolute interpreter paths (e.g. /bin/bash) and traversal
    fn check_path(&self, program: &str) -> Result<(), CommandValidationError> {
        if Path::new(program).is_absolute() {
            return Err(CommandValidationError::AbsolutePath(program.to_string()));
        }
        if program.contains("..") {
            return Err(CommandValidationError::DirectoryTraversal(program.to_string()));
        }
        Ok(())
    }

    /// Reject characters that would be dangerous if a template token ever
    /// reached a shell: separators, pipes, substitution, redirection.
    fn check_shell_metacharacters(&self, token: &str) -> Result<(), CommandValidationError> {
        const DANGEROUS: [char; 11] = [';', '|', '&', '$', '`', '\n', '\r', '(', ')', '<', '>'];

        if DANGEROUS.iter().any(|c| token.contains(*c)) {
            return Err(CommandValidationError::ShellMetacharacter(token.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn handler(program: &str, args: &[&str]) -> ExternalHandler {
        ExternalHandler {
            working_dir: PathBuf::from("/opt/scanhub/backend/tool"),
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(120),
        }
    }

    #[test]
    fn test_default_whitelist() {
        let validator = CommandValidator::default();

        assert!(validator.is_allowed("python"));
        assert!(validator.is_allowed("python3"));
        assert!(validator.is_allowed("node"));

        assert!(!validator.is_allowed("bash"));
        assert!(!validator.is_allowed("sh"));
        assert!(!validator.is_allowed("rm"));
        assert!(!validator.is_allowed("/bin/bash"));
    }

    #[test]
    fn test_validate_allowed_template() {
        let validator = CommandValidator::default();
        assert!(validator.validate(&handler("python3", &["main.py"])).is_ok());
    }

    #[test]
    fn test_validate_not_allowed_program() {
        let validator = CommandValidator::default();
        let result = validator.validate(&handler("bash", &["-c", "echo test"]));
        assert!(matches!(result, Err(CommandValidationError::NotAllowed(_))));
    }

    #[test]
    fn test_validate_absolute_path_rejected_even_if_whitelisted() {
        let validator = CommandValidator::with_whitelist(vec!["/bin/bash".to_string()]);
        let result = validator.validate(&handler("/bin/bash", &[]));
        assert!(matches!(result, Err(CommandValidationError::AbsolutePath(_))));
    }

    #[test]
    fn test_validate_directory_traversal_rejected() {
        let validator = CommandValidator::with_whitelist(vec!["../python".to_string()]);
        let result = validator.validate(&handler("../python", &[]));
        assert!(matches!(
            result,
            Err(CommandValidationError::DirectoryTraversal(_))
        ));

        let validator = CommandValidator::default();
        let result = validator.validate(&handler("python3", &["../../main.py"]));
        assert!(matches!(
            result,
            Err(CommandValidationError::DirectoryTraversal(_))
        ));
    }

    #[test]
    fn test_validate_metacharacters_in_template_args() {
        let validator = CommandValidator::default();
        for bad in [
            "main.py; rm -rf /",
            "main.py|cat",
            "main.py&",
            "$HOME/main.py",
            "`whoami`.py",
            "main.py\nextra",
            "main.py>out",
        ] {
            let result = validator.validate(&handler("python3", &[bad]));
            assert!(
                matches!(
                    result,
                    Err(CommandValidationError::ShellMetacharacter(_))
                        | Err(CommandValidationError::DirectoryTraversal(_))
                ),
                "should reject template arg {bad:?}"
            );
        }
    }

    #[test]
    fn test_custom_whitelist() {
        let validator = CommandValidator::with_whitelist(vec!["sh".to_string()]);
        assert!(validator.is_allowed("sh"));
        assert!(!validator.is_allowed("python"));
        assert!(validator.validate(&handler("sh", &["main.sh"])).is_ok());
    }

    proptest! {
        #[test]
        fn prop_metachar_free_templates_validate(
            args in prop::collection::vec("[a-zA-Z0-9_./-]+", 0..5)
        ) {
            let validator = CommandValidator::default();
            let args: Vec<&str> = args.iter()
                .filter(|a| !a.contains(".."))
                .map(String::as_str)
                .collect();
            let result = validator.validate(&handler("python3", &args));
            prop_assert!(result.is_ok());
        }
    }
}
