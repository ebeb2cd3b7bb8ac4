//! Shared helpers

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
});

/// Extract the first e-mail address from free-form input, or an empty
/// string when none is present.
pub fn sanitize_email(raw: &str) -> String {
    EMAIL_RE
        .find(raw.trim())
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Local loan id for split queue entries, e.g. `L3F9QZ1`.
pub fn generate_loan_id() -> String {
    format!("L{}", random_code(6))
}

/// Public request short code shown to students, e.g. `LYOQNPL`.
pub fn generate_request_code() -> String {
    random_code(7)
}
