use subtle::ConstantTimeEq;

/// Verify an `Authorization` header value against the gateway token.
/// Returns true if no token is required (loopback) or if the bearer token matches.
pub fn verify_bearer(header: Option<&str>, expected: &Option<String>) -> bool {
    let expected = match expected {
        Some(t) => t,
        None => return true,
    };

    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    match token {
        Some(t) if !t.is_empty() => constant_time_eq(t.as_bytes(), expected.as_bytes()),
        _ => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
