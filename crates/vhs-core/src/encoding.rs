//! Decoding for secrets stored in environment variables
//!
//! Some deployment systems cannot carry `/` in variable values, so secret keys are
//! stored with `_SLASH_` in its place, and some are additionally base64 encoded.

use base64::Engine;

const SLASH_TOKEN: &str = "_SLASH_";

/// Replace every `_SLASH_` token with `/`.
pub fn process_secret_key(secret_key: &str) -> String {
    secret_key.replace(SLASH_TOKEN, "/")
}

/// Decode an escaped environment value.
///
/// `_SLASH_` is replaced first. If the result looks like standard base64 and decodes to
/// valid UTF-8, the decoded text is returned; otherwise the slash-replaced value is.
pub fn unescape_env_value(encoded_value: &str) -> String {
    if encoded_value.is_empty() {
        return String::new();
    }

    let replaced = process_secret_key(encoded_value);

    if looks_like_base64(&replaced) {
        if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(&replaced) {
            if let Ok(text) = String::from_utf8(bytes) {
                return text;
            }
        }
    }

    replaced
}

fn looks_like_base64(value: &str) -> bool {
    !value.is_empty()
        && value.len() % 4 == 0
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
}
