use subtle::ConstantTimeEq;

/// Compare the webhook path segment against the configured secret without a
/// timing side channel. Length differences short-circuit, which leaks only
/// the length class, never the content.
pub fn constant_time_eq(candidate: &str, secret: &str) -> bool {
    candidate.as_bytes().ct_eq(secret.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_match() {
        assert!(constant_time_eq("s123456789abcdef0", "s123456789abcdef0"));
    }

    #[test]
    fn unequal_strings_do_not_match() {
        assert!(!constant_time_eq("s123456789abcdef0", "s123456789abcdef1"));
        assert!(!constant_time_eq("", "s123456789abcdef0"));
        assert!(!constant_time_eq("short", "s123456789abcdef0"));
    }
}
