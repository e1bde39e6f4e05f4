//! Password strength analyzer.
//!
//! Four rules, one point each: minimum length, lowercase, uppercase, and
//! digit-or-symbol. The score indexes a five-level strength ladder and
//! confidence is score/4.

use serde_json::{json, Value};

use crate::request::TextInput;

const TOOL_NAME: &str = "Password Analyzer (Rule)";
const STRENGTH_LEVELS: [&str; 5] = ["Very Weak", "Weak", "Medium", "Strong", "Very Strong"];

pub fn analyze(text: &TextInput) -> Value {
    let password = text.input.as_str();

    if password.is_empty() {
        return json!({
            "tool": TOOL_NAME,
            "ok": false,
            "risk_level": "ERROR",
            "main_finding": "Input password cannot be empty.",
            "confidence_score": 0.0,
            "input_received": password,
        });
    }

    let mut score = 0usize;
    let mut features = serde_json::Map::new();

    let mut rule = |name: &str, pass: bool| {
        if pass {
            score += 1;
        }
        features.insert(name.to_string(), json!(if pass { "PASS" } else { "FAIL" }));
    };

    rule("length_check", password.chars().count() >= 8);
    rule("lowercase_check", password.chars().any(|c| c.is_ascii_lowercase()));
    rule("uppercase_check", password.chars().any(|c| c.is_ascii_uppercase()));
    rule(
        "digit_or_symbol_check",
        password
            .chars()
            .any(|c| c.is_ascii_digit() || !c.is_alphanumeric()),
    );

    let strength = STRENGTH_LEVELS[score];
    let confidence = score as f64 / 4.0;

    json!({
        "tool": TOOL_NAME,
        "ok": true,
        "risk_level": strength,
        "tool_prediction": strength,
        "main_finding": format!("Strength assessed as {strength} based on 4 security rules."),
        "confidence_score": confidence,
        "input_received": password,
        "advanced_report_details": {
            "features_analyzed": features,
        },
    })
}
