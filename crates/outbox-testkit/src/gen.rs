//! Minimal hand-rolled generators for property-style checks (no `proptest`
//! dependency, consistent with the rest of this workspace).

/// A tiny deterministic xorshift64* PRNG. Not for anything security
/// sensitive — purely to vary test inputs across a handful of iterations
/// without pulling in `rand`.
pub struct Xorshift64(u64);

impl Xorshift64 {
    pub fn new(seed: u64) -> Self {
        Self(if seed == 0 { 0x9E3779B97F4A7C15 } else { seed })
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    pub fn next_range(&mut self, bound: usize) -> usize {
        (self.next_u64() as usize) % bound.max(1)
    }

    /// A pseudo-random ASCII payload of length `1..=max_len`.
    pub fn payload(&mut self, max_len: usize) -> String {
        const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-";
        let len = 1 + self.next_range(max_len);
        (0..len)
            .map(|_| ALPHABET[self.next_range(ALPHABET.len())] as char)
            .collect()
    }
}

/// Asserts `id` has the shape `^<app_id>:[A-Za-z0-9_-]+=*:<uuid>$`, and
/// that its middle segment matches
/// `outbox_engine::content_prefix(app_id, payload)`.
pub fn assert_correlation_id_shape(id: &str, app_id: &str, payload: &str) {
    let parts: Vec<&str> = id.splitn(3, ':').collect();
    assert_eq!(parts.len(), 3, "correlation id must have 3 colon-separated segments: {id}");
    assert_eq!(parts[0], app_id, "first segment must be app_id");

    let hash_part = parts[1];
    let core: String = hash_part.chars().take_while(|c| *c != '=').collect();
    assert!(
        core.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
        "hash segment must be base64url (before any padding): {hash_part}"
    );
    assert!(
        hash_part[core.len()..].chars().all(|c| c == '='),
        "only '=' padding may follow the base64url core: {hash_part}"
    );

    assert!(uuid::Uuid::parse_str(parts[2]).is_ok(), "third segment must be a uuid: {}", parts[2]);

    let expected_prefix = outbox_engine::content_prefix(app_id, payload);
    let actual_prefix = format!("{}:{}", parts[0], parts[1]);
    assert_eq!(actual_prefix, expected_prefix, "hash segment must match sha256(payload)");
}
