use blake3::Hasher;
use rand::{rngs::StdRng, RngCore, SeedableRng};

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub const ID_LEN: usize = 9;

pub fn base62(bytes: &[u8], len: usize) -> String {
    // Fold the digest into a u128 and peel base62 digits off it
    let mut out = String::with_capacity(len);
    let mut acc: u128 = 0;
    for (i, b) in bytes.iter().enumerate() {
        acc ^= (*b as u128) << ((i % 16) * 8);
    }
    for _ in 0..len {
        let idx = (acc % 62) as usize;
        out.push(ALPHABET[idx] as char);
        acc /= 62;
        if acc == 0 {
            acc = 0x9E3779B97F4A7C15;
        }
    }
    out
}

/// Opaque record id. `attempt` lets the caller re-roll after a conditional-put collision.
pub fn new_id(title: &str, target: &str, created_at: i64, attempt: u32) -> String {
    let mut hasher = Hasher::new();
    hasher.update(title.as_bytes());
    hasher.update(target.as_bytes());
    hasher.update(&created_at.to_be_bytes());
    hasher.update(&attempt.to_be_bytes());
    let mut rng = StdRng::from_entropy();
    let mut salt = [0u8; 8];
    rng.fill_bytes(&mut salt);
    hasher.update(&salt);
    let digest = hasher.finalize();
    base62(digest.as_bytes(), ID_LEN)
}

/// URL-safe, human readable form of a title. Not unique.
///
/// Keeps `[a-z0-9]`, turns whitespace runs into a single `-`, collapses repeated
/// hyphens and trims them from both ends. Running it on its own output is a no-op.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_dash = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_from_plain_title() {
        assert_eq!(slugify("Modern Business Strategy"), "modern-business-strategy");
    }

    #[test]
    fn slug_strips_punctuation_and_collapses_separators() {
        assert_eq!(slugify("  Rust: 10 Tips -- for  2024!  "), "rust-10-tips-for-2024");
        assert_eq!(slugify("C'est la vie"), "cest-la-vie");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn slug_is_idempotent() {
        for t in [
            "Modern Business Strategy",
            "a  -  b",
            "Health & Wellness: A Guide",
            "Über fast Café",
            "trailing-",
        ] {
            let once = slugify(t);
            assert_eq!(slugify(&once), once, "title {t:?}");
        }
    }

    #[test]
    fn ids_are_base62_and_fixed_length() {
        let id = new_id("t", "https://example.com", 1_700_000_000, 1);
        assert_eq!(id.len(), ID_LEN);
        assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn ids_differ_between_attempts() {
        let a = new_id("t", "https://example.com", 1_700_000_000, 1);
        let b = new_id("t", "https://example.com", 1_700_000_000, 2);
        assert_ne!(a, b);
    }
}
