//! Line tokenization
//!
//! Converts one code line into a fixed-length sequence of token ids via
//! feature hashing. Id 0 is reserved for padding; real tokens hash into
//! `[1, vocab_size)`.

/// Padding token id
pub const PAD_ID: u32 = 0;

/// FNV-1a, the usual stable string hash for feature hashing
fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Tokenize a line into exactly `budget` token ids, padding or truncating.
///
/// Tokens are maximal runs of alphanumeric/underscore characters plus
/// single punctuation characters, so `foo(bar)` yields four tokens.
pub fn tokenize_line(line: &str, budget: usize, vocab_size: u32) -> Vec<u32> {
    debug_assert!(vocab_size > 1, "vocab must leave room beyond PAD");
    let mut ids = Vec::with_capacity(budget);

    let mut word = String::new();
    let mut push_token = |ids: &mut Vec<u32>, token: &str| {
        if ids.len() < budget {
            ids.push(1 + (fnv1a(token) % u64::from(vocab_size - 1)) as u32);
        }
    };

    for ch in line.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            word.push(ch);
        } else {
            if !word.is_empty() {
                push_token(&mut ids, &word);
                word.clear();
            }
            if !ch.is_whitespace() {
                push_token(&mut ids, &ch.to_string());
            }
        }
    }
    if !word.is_empty() {
        push_token(&mut ids, &word);
    }

    ids.resize(budget, PAD_ID);
    ids
}
