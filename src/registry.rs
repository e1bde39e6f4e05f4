//! Tool Registry
//!
//! Static mapping from a tool identifier to its handler descriptor. The
//! set of tools is fixed at startup: the registry is built once, handed
//! to the pipeline by value, and never mutated afterwards. Lookup is an
//! exact, case-sensitive hash-map probe; an unknown id never reaches the
//! execution supervisor.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use crate::request::TextInput;
use crate::tools;

/// In-process handler: a pure function over the text payload. It returns
/// a report-shaped JSON object and must not block on external I/O.
pub type InternalHandler = fn(&TextInput) -> Value;

/// Invocation template for an out-of-process analyzer. The payload is
/// always appended as the final positional argument at execution time.
#[derive(Debug, Clone)]
pub struct ExternalHandler {
    /// Directory the child process runs in
    pub working_dir: std::path::PathBuf,

    /// Interpreter or executable name
    pub program: String,

    /// Fixed template arguments (typically the script name)
    pub args: Vec<String>,

    /// Hard wall-clock budget for one invocation
    pub timeout: Duration,
}

/// Registry entry: one dispatchable handler, either kind.
#[derive(Clone)]
pub enum HandlerDescriptor {
    Internal(InternalHandler),
    External(ExternalHandler),
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal(_) => f.write_str("HandlerDescriptor::Internal"),
            Self::External(ext) => f.debug_tuple("HandlerDescriptor::External").field(ext).finish(),
        }
    }
}

/// The fixed tool catalog.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, HandlerDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool at startup. Not exposed over any runtime surface.
    pub fn register(&mut self, tool_id: impl Into<String>, descriptor: HandlerDescriptor) {
        self.handlers.insert(tool_id.into(), descriptor);
    }

    /// Exact-match lookup; `None` becomes the client-visible `NotFound`.
    pub fn resolve(&self, tool_id: &str) -> Option<&HandlerDescriptor> {
        self.handlers.get(tool_id)
    }

    /// Registered tool ids, sorted for stable CLI output.
    pub fn tool_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// The built-in catalog: three in-process rule evaluators plus the
    /// external analyzer scripts, each living in its own subdirectory of
    /// `backend_root` with a `main.py` entry point.
    pub fn builtin(backend_root: &Path, interpreter: &str, timeout: Duration) -> Self {
        let mut registry = Self::new();

        registry.register(
            "password-analyzer",
            HandlerDescriptor::Internal(tools::password::analyze),
        );
        registry.register(
            "text-encryptor",
            HandlerDescriptor::Internal(tools::encryptor::transform),
        );
        registry.register(
            "bughunter",
            HandlerDescriptor::Internal(tools::bughunter::scan),
        );

        let external = [
            ("phishing-detector", "Phishing_Detector_Tool"),
            ("dark-web-checker", "Dark_Web_Checker"),
            ("fake-login-detector", "Fake_Login_Detector"),
            ("file-url-scanner", "File_URL_Scanner"),
            ("network-analyzer", "AI_Network_Analyzer"),
            ("ueba-analyzer", "UEBA_Behavioral_Analytics"),
            ("forensics-nlp", "NLP_Campaign_Forensics"),
            ("deepfake-analyzer", "Deepfake_Analyzer"),
            ("adversarial-attack-shield", "Adversarial_Attack_Shield"),
            ("data-poisoning-monitor", "Data_Poisoning_Monitor"),
            ("metadata-extractor", "Metadata_Extractor"),
        ];

        for (tool_id, folder) in external {
            registry.register(
                tool_id,
                HandlerDescriptor::External(ExternalHandler {
                    working_dir: backend_root.join(folder),
                    program: interpreter.to_string(),
                    args: vec!["main.py".to_string()],
                    timeout,
                }),
            );
        }

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> ToolRegistry {
        ToolRegistry::builtin(Path::new("/opt/scanhub/backend"), "python3", Duration::from_secs(120))
    }

    #[test]
    fn test_builtin_catalog_size() {
        assert_eq!(builtin().len(), 14);
    }

    #[test]
    fn test_resolve_internal() {
        let registry = builtin();
        assert!(matches!(
            registry.resolve("password-analyzer"),
            Some(HandlerDescriptor::Internal(_))
        ));
        assert!(matches!(
            registry.resolve("text-encryptor"),
            Some(HandlerDescriptor::Internal(_))
        ));
        assert!(matches!(
            registry.resolve("bughunter"),
            Some(HandlerDescriptor::Internal(_))
        ));
    }

    #[test]
    fn test_resolve_external_descriptor() {
        let registry = builtin();
        match registry.resolve("phishing-detector") {
            Some(HandlerDescriptor::External(ext)) => {
                assert_eq!(
                    ext.working_dir,
                    Path::new("/opt/scanhub/backend/Phishing_Detector_Tool")
                );
                assert_eq!(ext.program, "python3");
                assert_eq!(ext.args, vec!["main.py"]);
                assert_eq!(ext.timeout, Duration::from_secs(120));
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_is_stable_across_calls() {
        let registry = builtin();
        for _ in 0..3 {
            for id in registry.tool_ids() {
                assert!(registry.resolve(id).is_some());
            }
        }
    }

    #[test]
    fn test_unknown_ids_do_not_resolve() {
        let registry = builtin();
        assert!(registry.resolve("not-a-tool").is_none());
        // Case-sensitive exact match
        assert!(registry.resolve("Password-Analyzer").is_none());
        assert!(registry.resolve("password-analyzer ").is_none());
    }
}
