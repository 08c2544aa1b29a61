//! Random credentials for free addresses.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Random ASCII-alphanumeric password for a free address.
#[must_use]
pub fn generate_password(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_shape() {
        let pw = generate_password(12);
        assert_eq!(pw.len(), 12);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_password(32), generate_password(32));
    }
}
