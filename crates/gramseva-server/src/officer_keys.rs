//! Officer registration key pool.
//!
//! Seeded once, at first boot, into `officer-keys.json`: the memorable keys
//! plus random keys padded up to the configured minimum. Never rewritten
//! afterwards; an operator can edit the file by hand.

use std::collections::HashSet;

use rand::Rng;
use tracing::info;

use crate::constants::{MEMORABLE_OFFICER_KEYS, OFFICER_KEY_ALPHABET, OFFICER_KEY_LEN, OFFICER_KEYS_FILE};
use crate::error::StoreError;
use crate::store::CollectionStore;

fn random_key(rng: &mut impl Rng) -> String {
    (0..OFFICER_KEY_LEN)
        .map(|_| OFFICER_KEY_ALPHABET[rng.gen_range(0..OFFICER_KEY_ALPHABET.len())] as char)
        .collect()
}

/// Memorable keys first, then unique random keys until `min` is reached.
pub fn generate_pool(min: usize, rng: &mut impl Rng) -> Vec<String> {
    let mut pool: Vec<String> = MEMORABLE_OFFICER_KEYS.iter().map(|k| k.to_string()).collect();
    let mut seen: HashSet<String> = pool.iter().cloned().collect();
    while pool.len() < min {
        let key = random_key(rng);
        if seen.insert(key.clone()) {
            pool.push(key);
        }
    }
    pool
}

/// Current pool, or empty when the file is missing or unreadable.
pub async fn load(store: &CollectionStore) -> Vec<String> {
    store.read_file(OFFICER_KEYS_FILE).await.unwrap_or_default()
}

/// Return the pool, seeding it first if there is none.
pub async fn ensure_pool(store: &CollectionStore, min: usize) -> Result<Vec<String>, StoreError> {
    let existing = load(store).await;
    if !existing.is_empty() {
        return Ok(existing);
    }
    let pool = generate_pool(min, &mut rand::thread_rng());
    store.write_file(OFFICER_KEYS_FILE, &pool).await?;
    info!(keys = pool.len(), "seeded officer key pool");
    Ok(pool)
}
