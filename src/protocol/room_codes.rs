use crate::config::ProtocolConfig;
use rand::RngExt;

/// Fold a client-supplied room code into its canonical form.
/// Codes are case-insensitive on entry and stored uppercase.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Generate an alphanumeric room code with configurable length.
/// Uses uppercase letters and numbers for easy social sharing; unguessable
/// enough for a watch party, not a credential.
pub fn generate_room_code_with_config(config: &ProtocolConfig) -> String {
    generate_room_code_of_length(config.room_code_length)
}

/// Generate a room code of the requested length.
pub fn generate_room_code_of_length(length: usize) -> String {
    const ALPHANUMERIC_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..ALPHANUMERIC_CHARS.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = ALPHANUMERIC_CHARS[idx] as char;
            ch
        })
        .collect()
}

/// Generate a 6-character room code with the default configuration.
pub fn generate_room_code() -> String {
    let cfg = ProtocolConfig::default();
    generate_room_code_with_config(&cfg)
}
