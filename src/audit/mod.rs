//! Prompt fingerprints
//!
//! Every reasoning step logs a SHA-256 of the assembled prompt so two turns
//! with identical profile and transcript can be shown to produce identical
//! prompts.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;

/// SHA-256 of any serializable value.
/// Uses zero-copy streaming serialization into hasher
pub fn compute_fingerprint<T: Serialize + ?Sized>(value: &T) -> String {
    let mut hasher = Sha256::new();

    // Stream JSON directly into hasher (no intermediate String)
    if serde_json::to_writer(&mut HashWriter(&mut hasher), value).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Fingerprint of the text actually sent to the model.
pub fn compute_prompt_hash(system_prompt: &str, prompt: &str) -> String {
    compute_fingerprint(&(system_prompt, prompt))
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_hash_is_stable() {
        let a = compute_prompt_hash("system", "Financial Profile Summary:\n- Monthly Income: $5,200.00");
        let b = compute_prompt_hash("system", "Financial Profile Summary:\n- Monthly Income: $5,200.00");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_prompt_hash_separates_parts() {
        assert_ne!(compute_prompt_hash("ab", "c"), compute_prompt_hash("a", "bc"));
    }
}
