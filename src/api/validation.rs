//! Image payload validation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Strip a `data:` URL prefix and surrounding whitespace.
///
/// Returns `None` when nothing is left.
pub fn normalize_base64(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    let data = match value.split_once(',') {
        Some((_, data)) => data,
        None => value,
    };
    if data.is_empty() { None } else { Some(data) }
}

/// Check the estimated decoded size, then that `value` is well-formed
/// standard base64 with correct padding.
pub fn is_valid_base64(value: &str, max_bytes: usize) -> bool {
    if value.is_empty() {
        return false;
    }
    let decoded_estimate = (value.len().saturating_mul(3)).div_ceil(4);
    if decoded_estimate > max_bytes {
        return false;
    }
    STANDARD.decode(value).is_ok()
}
