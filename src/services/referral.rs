// SPDX-License-Identifier: MIT

//! Referral code generation and validation.
//!
//! Codes are 5 characters from `[A-Z0-9]`: three derived from the email
//! local-part, one from the display-name initial (fallback `X`), one from a
//! checksum of the full email. Uniqueness is enforced through a
//! transactional reservation; collisions mutate the last character and
//! retry, with a base-36 timestamp tail as the final fallback.

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};

/// Code alphabet. Excludes lowercase to survive case-insensitive entry.
const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of every referral code.
pub const CODE_LEN: usize = 5;

/// Collision retries before falling back to a timestamp-derived code.
const MAX_RESERVE_ATTEMPTS: usize = 10;

/// Deterministically generate a member code from email and display name.
pub fn generate_code(email: &str, display_name: &str) -> String {
    let local_part = email.split('@').next().unwrap_or(email);

    let local_digest = Sha256::digest(local_part.as_bytes());
    let email_digest = Sha256::digest(email.as_bytes());

    let mut code = String::with_capacity(CODE_LEN);
    for byte in &local_digest[..3] {
        code.push(alphabet_char(*byte));
    }
    code.push(initial_char(display_name));
    code.push(alphabet_char(email_digest[0] ^ email_digest[1]));
    code
}

/// Whether a string is a well-formed member code.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b))
}

/// Mutate the last character for a collision retry.
pub fn mutate_code(code: &str) -> String {
    let mut rng = rand::thread_rng();
    let last = code.as_bytes()[code.len() - 1];
    let mut replacement = last;
    while replacement == last {
        replacement = ALPHABET[rng.gen_range(0..ALPHABET.len())];
    }
    let mut mutated = code[..code.len() - 1].to_string();
    mutated.push(replacement as char);
    mutated
}

/// Last-resort code from the tail of a base-36 millisecond timestamp.
pub fn fallback_code(now_millis: u64) -> String {
    let mut n = now_millis;
    let mut digits = Vec::with_capacity(CODE_LEN);
    while digits.len() < CODE_LEN {
        let d = (n % 36) as usize;
        // 0-9 map to '0'-'9', 10-35 to 'A'-'Z'
        let c = if d < 10 { ALPHABET[26 + d] } else { ALPHABET[d - 10] };
        digits.push(c);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("alphabet is ASCII")
}

fn alphabet_char(byte: u8) -> char {
    ALPHABET[byte as usize % ALPHABET.len()] as char
}

fn initial_char(display_name: &str) -> char {
    display_name
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .unwrap_or('X')
}

/// Referral code operations backed by the store.
#[derive(Clone)]
pub struct ReferralService {
    db: FirestoreDb,
}

impl ReferralService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Allocate and reserve a unique code for a new member.
    ///
    /// Losing a reservation race counts as a collision: the code is mutated
    /// and retried, so two members generating the same candidate always end
    /// up with distinct codes.
    pub async fn allocate_code(&self, uid: &str, email: &str, display_name: &str) -> Result<String> {
        let mut code = generate_code(email, display_name);

        for attempt in 0..MAX_RESERVE_ATTEMPTS {
            if self.db.try_reserve_code(&code, uid).await? {
                if attempt > 0 {
                    tracing::debug!(uid, attempts = attempt + 1, "Member code reserved after retries");
                }
                return Ok(code);
            }
            code = mutate_code(&code);
        }

        let now_millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let code = fallback_code(now_millis);
        if self.db.try_reserve_code(&code, uid).await? {
            tracing::warn!(uid, "Member code allocation fell back to timestamp code");
            return Ok(code);
        }

        Err(AppError::Transient(
            "could not allocate a unique member code".to_string(),
        ))
    }

    /// Existence check only. Never returns the owning member: the code
    /// doubles as a credential, so this endpoint must not be an oracle for
    /// member identity.
    pub async fn validate_code(&self, code: &str) -> Result<bool> {
        if !is_valid_code(code) {
            return Ok(false);
        }
        Ok(self.db.find_member_by_code(code).await?.is_some())
    }

    /// Uniqueness probe used by the profile form.
    pub async fn is_code_unique(&self, code: &str) -> Result<bool> {
        Ok(self.db.find_member_by_code(code).await?.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_five_chars_from_alphabet() {
        let code = generate_code("ada@example.com", "Ada");
        assert!(is_valid_code(&code), "bad code: {code}");
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate_code("ada@example.com", "Ada");
        let b = generate_code("ada@example.com", "Ada");
        assert_eq!(a, b);
    }

    #[test]
    fn display_name_initial_is_embedded() {
        let code = generate_code("someone@example.com", "Grace");
        assert_eq!(code.as_bytes()[3], b'G');
    }

    #[test]
    fn missing_or_odd_initial_falls_back_to_x() {
        assert_eq!(generate_code("a@b.c", "").as_bytes()[3], b'X');
        assert_eq!(generate_code("a@b.c", "émile").as_bytes()[3], b'X');
    }

    #[test]
    fn mutation_changes_only_last_char() {
        let code = generate_code("ada@example.com", "Ada");
        let mutated = mutate_code(&code);
        assert!(is_valid_code(&mutated));
        assert_eq!(code[..4], mutated[..4]);
        assert_ne!(code.as_bytes()[4], mutated.as_bytes()[4]);
    }

    #[test]
    fn fallback_is_well_formed_and_time_dependent() {
        let a = fallback_code(1_700_000_000_000);
        let b = fallback_code(1_700_000_000_001);
        assert!(is_valid_code(&a));
        assert!(is_valid_code(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn collision_rate_stays_low() {
        use std::collections::HashSet;

        let n = 10_000;
        let mut seen = HashSet::with_capacity(n);
        for i in 0..n {
            seen.insert(generate_code(
                &format!("volunteer.{i}@example.com"),
                &format!("Volunteer {i}"),
            ));
        }
        let collisions = n - seen.len();
        // ≤ 0.5 % duplicates across 10 000 distinct emails
        assert!(
            collisions * 200 <= n,
            "{collisions} collisions out of {n}"
        );
    }

    #[test]
    fn validity_check_rejects_malformed() {
        assert!(!is_valid_code("AB12"));
        assert!(!is_valid_code("AB12XY"));
        assert!(!is_valid_code("ab12x"));
        assert!(!is_valid_code("AB1 X"));
        assert!(is_valid_code("AB12X"));
    }
}
