//! Flash cross-domain policy-file handling
//!
//! Before opening a socket, the Flash runtime sends `<policy-file-request/>`
//! and expects a policy document terminated by a NUL byte. The relay answers
//! this itself instead of bothering the game server.

/// Probe string the Flash runtime sends
pub const POLICY_REQUEST: &[u8] = b"<policy-file-request/>";

/// Canonical response, NUL terminated, no trailing newline
pub const POLICY_RESPONSE: &[u8] = b"<?xml version=\"1.0\"?><cross-domain-policy>\
<allow-access-from domain=\"*\" to-ports=\"*\" /></cross-domain-policy>\0";

/// Largest first read used for sniffing. The legacy client always sends the
/// probe as its first and only message, well inside this bound.
pub const FIRST_READ_LIMIT: usize = 1024;

/// Does the first chunk from a client contain the policy probe?
pub fn is_policy_request(chunk: &[u8]) -> bool {
    chunk
        .windows(POLICY_REQUEST.len())
        .any(|window| window == POLICY_REQUEST)
}
