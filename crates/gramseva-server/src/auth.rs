//! Login, registration, and credential storage.
//!
//! Credentials live in `credentials.json`, keyed by account id, as a random
//! salt plus the BLAKE3 digest of `salt || password`. They never appear in
//! the accounts collection or in any response.

use std::collections::{BTreeMap, HashMap};

use gramseva_types::api::{LoginRequest, RegisterRequest, RegisterResponse};
use gramseva_types::{Account, AccountStatus, Collection, Role, officer_key_matches};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::constants::{CREDENTIALS_FILE, SALT_LEN};
use crate::error::{ApiError, AuthError, StoreError};
use crate::officer_keys;
use crate::store::CollectionStore;

// ============================================================================
// Credentials
// ============================================================================

/// Salted password digest. Both fields are lowercase hex.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub salt: String,
    pub digest: String,
}

fn digest(salt: &[u8], password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize()
}

impl Credential {
    pub fn new(password: &str) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill(&mut salt);
        Self {
            salt: hex::encode(salt),
            digest: digest(&salt, password).to_hex().to_string(),
        }
    }

    /// Constant-time check (`blake3::Hash` equality).
    pub fn verify(&self, password: &str) -> bool {
        let Ok(salt) = hex::decode(&self.salt) else {
            return false;
        };
        let Ok(expected) = blake3::Hash::from_hex(&self.digest) else {
            return false;
        };
        digest(&salt, password) == expected
    }
}

pub type Credentials = BTreeMap<String, Credential>;

pub async fn load_credentials(store: &CollectionStore) -> Credentials {
    store.read_file(CREDENTIALS_FILE).await.unwrap_or_default()
}

/// Credentials for a write; an unreadable file is an error rather than empty.
pub async fn load_credentials_for_update(store: &CollectionStore) -> Result<Credentials, StoreError> {
    store.read_file_for_update(CREDENTIALS_FILE).await
}

// ============================================================================
// Login
// ============================================================================

/// Find the account matching every login field, then apply status gates.
pub async fn login(store: &CollectionStore, req: &LoginRequest) -> Result<Account, AuthError> {
    let accounts: Vec<Account> = store.read().await;
    let credentials = load_credentials(store).await;

    let account = accounts
        .into_iter()
        .find(|a| {
            a.email_matches(&req.email)
                && a.role == req.role
                && (a.role != Role::Officer || a.department == req.department)
                && credentials.get(&a.id).is_some_and(|c| c.verify(&req.password))
        })
        .ok_or(AuthError::InvalidCredentials)?;

    if let Some(reason) = account.login_block_reason() {
        info!(account = %account.id, status = %account.status, "login blocked");
        return Err(AuthError::Blocked(reason));
    }

    info!(account = %account.id, role = %account.role, "login");
    Ok(account)
}

// ============================================================================
// Registration
// ============================================================================

fn validate(req: &RegisterRequest, pool: &[String]) -> Result<(), AuthError> {
    let account = &req.account;
    if account.name.trim().is_empty() {
        return Err(AuthError::MissingField("Name"));
    }
    if account.email.trim().is_empty() {
        return Err(AuthError::MissingField("Email"));
    }
    if req.password.is_empty() {
        return Err(AuthError::MissingField("Password"));
    }
    if account.role == Role::Officer && account.department.is_none() {
        return Err(AuthError::MissingDepartment);
    }
    if matches!(account.role, Role::Officer | Role::Developer) {
        let key = req.officer_key.as_deref().map(str::trim).unwrap_or_default();
        if key.is_empty() {
            return Err(AuthError::MissingOfficerKey);
        }
        if !officer_key_matches(pool, key) {
            return Err(AuthError::InvalidOfficerKey);
        }
    }
    Ok(())
}

fn check_duplicates(accounts: &[Account], candidate: &Account) -> Result<(), AuthError> {
    if accounts.iter().any(|a| a.email_matches(&candidate.email)) {
        return Err(AuthError::DuplicateEmail);
    }
    if accounts.iter().any(|a| a.mobile_matches(candidate.mobile.as_deref())) {
        return Err(AuthError::DuplicateMobile);
    }
    Ok(())
}

/// Append a new account and its credential.
///
/// Returns the response body and the persisted accounts array for
/// broadcasting. Officers and developers always start `pending`.
pub async fn register(
    store: &CollectionStore,
    req: RegisterRequest,
) -> Result<(RegisterResponse, Value), ApiError> {
    let pool = officer_keys::load(store).await;
    validate(&req, &pool)?;

    let RegisterRequest {
        mut account,
        password,
        ..
    } = req;

    let _accounts_guard = store.lock(Collection::Accounts).await;
    let _credentials_guard = store.lock_credentials().await;

    let mut accounts: Vec<Account> = store.read_for_update().await?;
    check_duplicates(&accounts, &account)?;

    if account.id.trim().is_empty() || accounts.iter().any(|a| a.id == account.id) {
        account.id = account.role.id_kind().fresh();
    }
    account.email = account.email.trim().to_string();
    if account.role != Role::Resident {
        account.status = AccountStatus::Pending;
    }
    if account.joined_at.is_empty() {
        account.joined_at = gramseva_types::display_today();
    }

    let mut credentials = load_credentials_for_update(store).await?;
    credentials.insert(account.id.clone(), Credential::new(&password));
    store.write_file(CREDENTIALS_FILE, &credentials).await?;

    accounts.push(account.clone());
    let payload = store.persist_records(&accounts).await?;

    info!(account = %account.id, role = %account.role, "registered");
    Ok((
        RegisterResponse {
            success: true,
            account,
            accounts,
        },
        payload,
    ))
}

// ============================================================================
// Bulk account writes
// ============================================================================

/// Sanitize an incoming `POST /api/accounts` array against what is stored.
///
/// Drops any credential fields and restores `assignedOfficerId` for every
/// existing account that already has one. Returns how many were restored.
pub fn guard_account_writes(existing: &Value, incoming: &mut Value) -> usize {
    let assigned: HashMap<&str, &Value> = existing
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|a| {
            let id = a.get("id")?.as_str()?;
            let officer = a.get("assignedOfficerId")?;
            (!officer.is_null()).then_some((id, officer))
        })
        .collect();

    let mut restored = 0;
    for record in incoming.as_array_mut().into_iter().flatten() {
        let Some(obj) = record.as_object_mut() else {
            continue;
        };
        obj.remove("password");
        obj.remove("officerKey");

        let Some(id) = obj.get("id").and_then(Value::as_str).map(str::to_owned) else {
            continue;
        };
        let Some(officer) = assigned.get(id.as_str()) else {
            continue;
        };
        if obj.get("assignedOfficerId") != Some(*officer) {
            warn!(account = %id, "ignoring change to assignedOfficerId");
            obj.insert("assignedOfficerId".to_string(), (*officer).clone());
            restored += 1;
        }
    }
    restored
}

// ============================================================================
// Tests
// ============================================================================
