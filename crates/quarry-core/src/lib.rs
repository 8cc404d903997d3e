//! Core shared types for Quarry.
//!
//! This crate is intentionally small: content digests, compile-command path
//! resolution, and a couple of helpers the rest of the workspace leans on.

mod digest;
mod paths;

pub use digest::ContentDigest;
pub use paths::resolve_command_path;

/// Best-effort extraction of a human-readable message from a panic payload.
///
/// Panic payloads are almost always a `&'static str` or a `String`; anything
/// else gets a placeholder so callers can still log something useful.
pub fn panic_payload_to_str(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
