use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;

/// Generate a random token of `length` characters drawn from the 62-symbol
/// alphanumeric alphabet, using the operating system's CSPRNG.
///
/// Used for email validation tokens (must resist guessing) and for the
/// opaque suffix of gift card creation request ids.
pub fn make_token(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_token_length() {
        assert_eq!(make_token(12).len(), 12);
        assert_eq!(make_token(32).len(), 32);
    }

    #[test]
    fn test_make_token_alphabet() {
        let token = make_token(64);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_make_token_is_not_constant() {
        // Collisions over 64 alphanumeric characters are not a realistic
        // concern for this assertion.
        assert_ne!(make_token(64), make_token(64));
    }
}
