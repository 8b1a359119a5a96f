//! Session identifiers.

use rand::Rng;

/// Id alphabet. Excludes `0` and `1`.
const ID_CHARSET: &[u8] = b"23456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `prefix` (two characters) followed by `length` characters drawn from the
/// thread-local CSPRNG.
pub fn random_id(prefix: &str, length: usize) -> String {
    debug_assert_eq!(prefix.len(), 2, "id prefix must be two characters");

    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(prefix.len() + length);
    id.push_str(prefix);
    id.extend((0..length).map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char));
    id
}

/// Session id: `CS` + 16 characters.
pub fn new_session_id() -> String {
    random_id("CS", 16)
}

/// Accept only ids this server could have minted.
pub fn is_valid_session_id(id: &str) -> bool {
    id.len() == 18
        && id.starts_with("CS")
        && id.bytes().skip(2).all(|b| ID_CHARSET.contains(&b))
}
