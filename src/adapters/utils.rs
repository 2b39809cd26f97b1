//! Shared validation helpers for credentials and provisioned strings.

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
///
/// Used to validate Wi-Fi credentials, both at association time and when
/// `.env` provisioning is loaded.
pub(crate) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}
