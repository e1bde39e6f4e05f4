//! Text encoder/hasher.
//!
//! Three modes: Base64 encode, Base64 decode, SHA-256 hex digest. An
//! unknown or absent mode is reported by the tool itself as an
//! unsuccessful result rather than rejected at the envelope.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::request::TextInput;

const TOOL_NAME: &str = "Text Encryptor/Hasher";

pub fn transform(text: &TextInput) -> Value {
    let (ok, action, output) = match text.mode.as_str() {
        "base64_encode" => (
            true,
            "Encode (Base64)",
            BASE64.encode(text.input.as_bytes()),
        ),
        "base64_decode" => match BASE64
            .decode(text.input.as_bytes())
            .map_err(|e| e.to_string())
            .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()))
        {
            Ok(decoded) => (true, "Decode (Base64)", decoded),
            Err(e) => (false, "Decode (Base64)", format!("Error: {e}")),
        },
        "sha256_hash" => {
            let digest = Sha256::digest(text.input.as_bytes());
            (true, "Hash (SHA-256)", hex::encode(digest))
        }
        _ => (
            false,
            "Invalid Mode Selected",
            "Please select a valid operation mode from the list.".to_string(),
        ),
    };

    let main_finding = if ok {
        format!("Operation '{action}' was successful.")
    } else {
        format!("Operation '{action}' failed.")
    };

    json!({
        "tool": TOOL_NAME,
        "mode": action,
        "output": output,
        "ok": ok,
        "risk_level": "N/A",
        "main_finding": main_finding,
    })
}
