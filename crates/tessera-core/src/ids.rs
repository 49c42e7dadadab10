//! Random identifiers and raw CSRF bytes.

use rand::RngCore;
use uuid::Uuid;

/// Length in bytes of a raw CSRF value.
pub const CSRF_LENGTH: usize = 32;

/// Generates a token uid: a random (v4) 128-bit identifier.
pub fn new_uid() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a raw CSRF value.
pub fn new_csrf_bytes() -> [u8; CSRF_LENGTH] {
    let mut bytes = [0u8; CSRF_LENGTH];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uids_are_unique() {
        let a = new_uid();
        let b = new_uid();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_csrf_bytes_are_random() {
        assert_ne!(new_csrf_bytes(), new_csrf_bytes());
    }
}
