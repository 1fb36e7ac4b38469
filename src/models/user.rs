use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const ADJECTIVES: [&str; 10] = [
    "Brutal", "Neon", "Cyber", "Dark", "Wild", "Bold", "Sharp", "Raw", "Fierce", "Loud",
];
const NOUNS: [&str; 10] = [
    "Punk", "Rebel", "Ghost", "Storm", "Fire", "Beast", "Wolf", "Hawk", "Viper", "Phoenix",
];
const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnonymousUser {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl AnonymousUser {
    /// Fresh pseudonymous identity: `anon_<millis>_<base36>` and a handle
    /// such as `NeonWolf417`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> Self {
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        let username = format!(
            "{}{}{}",
            ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())],
            NOUNS[rng.gen_range(0..NOUNS.len())],
            rng.gen_range(1..=999)
        );

        Self {
            id: format!("anon_{}_{}", now.timestamp_millis(), suffix),
            username,
            created_at: now,
        }
    }
}
