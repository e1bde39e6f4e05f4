//! Static source-snippet heuristics.
//!
//! Flags dangerous constructs in submitted code: `eval(`, `os.system`,
//! and hardcoded password literals.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};

use crate::request::TextInput;

const TOOL_NAME: &str = "BugHunter";

lazy_static! {
    static ref HARDCODED_PASSWORD: Regex =
        Regex::new(r#"password\s*=\s*["'].*["']"#).expect("invalid hardcoded-password pattern");
}

pub fn scan(text: &TextInput) -> Value {
    let source = text.input.as_str();
    let mut issues: Vec<String> = Vec::new();

    if source.contains("eval(") {
        issues.push("Use of eval() is dangerous.".to_string());
    }
    if source.contains("os.system") {
        issues.push("os.system call found - potential command injection risk.".to_string());
    }
    if HARDCODED_PASSWORD.is_match(source) {
        issues.push("Hardcoded password detected.".to_string());
    }

    let risk = if issues.is_empty() { "Clean" } else { "Suspicious" };
    let main_finding = format!("{} critical issue(s) found.", issues.len());
    let issues_found: Vec<String> = if issues.is_empty() {
        vec!["No critical issues found.".to_string()]
    } else {
        issues
    };

    json!({
        "tool": TOOL_NAME,
        "issues_found": issues_found,
        "ok": true,
        "risk_level": risk,
        "main_finding": main_finding,
    })
}
