// src/security/validation.rs - Input shape validation
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").unwrap();
}

// Characters accepted as password symbols
const SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Caller-facing description of the password policy
pub const PASSWORD_POLICY: &str =
    "Password must be at least 8 characters long, with uppercase, lowercase, digit, and special character";

pub fn valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Password shape check. Never compares against a stored credential.
pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| SYMBOLS.contains(c))
}
