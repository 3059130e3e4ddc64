//! Session & identity resolver.
//!
//! The signed-in account is a snapshot persisted under `GRAMSEVA_SESSION`.
//! It is restored without asking the server and refreshed whenever a newer
//! accounts list arrives. Login and registration always go to the server.

use std::sync::Arc;

use gramseva_types::api::{LoginRequest, RegisterRequest, RegisterResponse};
use gramseva_types::{Account, Actor, Collection, Department, Role, officer_key_matches};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::constants::SESSION_KEY;
use crate::local::{LocalStore, LocalStoreError, onboarded_key};
use crate::remote::{Remote, RemoteError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Dismissable: the server could not be reached.
    #[error("Unable to reach the GramSeva server. Check your connection and try again.")]
    Connectivity(#[source] RemoteError),
    /// The server's own message, verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("An account with this email already exists.")]
    DuplicateEmail,
    #[error("An account with this mobile number already exists.")]
    DuplicateMobile,
    #[error("Officer registration requires a registration key.")]
    MissingOfficerKey,
    #[error("Invalid officer registration key.")]
    InvalidOfficerKey,
    #[error(transparent)]
    Local(#[from] LocalStoreError),
}

impl From<RemoteError> for SessionError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Status { status, message } if status < 500 => SessionError::Rejected(message),
            other => SessionError::Connectivity(other),
        }
    }
}

pub struct SessionResolver {
    remote: Arc<dyn Remote>,
    local: LocalStore,
    current: RwLock<Option<Account>>,
}

impl SessionResolver {
    pub fn new(remote: Arc<dyn Remote>, local: LocalStore) -> Self {
        Self {
            remote,
            local,
            current: RwLock::new(None),
        }
    }

    /// Load the persisted snapshot, if any. Not re-validated here.
    pub fn restore(&self) -> Option<Account> {
        let account = self
            .local
            .get(SESSION_KEY)
            .and_then(|v| serde_json::from_value::<Account>(v).ok());
        if let Some(account) = &account {
            info!(id = %account.id, role = %account.role, "session restored");
        }
        *self.current.write() = account.clone();
        account
    }

    pub fn current(&self) -> Option<Account> {
        self.current.read().clone()
    }

    pub fn actor(&self) -> Option<Actor> {
        self.current.read().as_ref().map(Actor::from)
    }

    fn persist(&self, account: &Account) -> Result<(), LocalStoreError> {
        let value = serde_json::to_value(account).map_err(|source| LocalStoreError::Encode {
            key: SESSION_KEY.to_string(),
            source,
        })?;
        self.local.set(SESSION_KEY, &value)?;
        *self.current.write() = Some(account.clone());
        Ok(())
    }

    /// Replace the snapshot with the matching record from `accounts`.
    ///
    /// An account missing from the list keeps its snapshot; the list may be a
    /// stale local cache.
    pub fn refresh_from(&self, accounts: &[Account]) -> Result<Option<Account>, LocalStoreError> {
        let Some(current) = self.current() else {
            return Ok(None);
        };
        match accounts.iter().find(|a| a.id == current.id) {
            Some(fresh) if *fresh != current => {
                debug!(id = %fresh.id, "session refreshed");
                self.persist(fresh)?;
                Ok(Some(fresh.clone()))
            }
            _ => Ok(Some(current)),
        }
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        role: Role,
        department: Option<Department>,
    ) -> Result<Account, SessionError> {
        let req = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            role,
            department,
        };
        let account = self.remote.login(&req).await?;
        self.persist(&account)?;
        info!(id = %account.id, role = %account.role, "signed in");
        Ok(account)
    }

    /// Pre-check against fresh server data, then submit. The server repeats
    /// every check.
    pub async fn register(
        &self,
        account: Account,
        password: &str,
        officer_key: Option<&str>,
    ) -> Result<RegisterResponse, SessionError> {
        self.remote.health().await.map_err(SessionError::Connectivity)?;

        let accounts = self.remote.fetch(Collection::Accounts).await?;
        let accounts: Vec<Account> = parse_accounts(accounts);
        if accounts.iter().any(|a| a.email_matches(&account.email)) {
            return Err(SessionError::DuplicateEmail);
        }
        if accounts.iter().any(|a| a.mobile_matches(account.mobile.as_deref())) {
            return Err(SessionError::DuplicateMobile);
        }

        if matches!(account.role, Role::Officer | Role::Developer) {
            let key = officer_key.map(str::trim).filter(|k| !k.is_empty());
            let key = key.ok_or(SessionError::MissingOfficerKey)?;
            let pool = self.officer_key_pool().await;
            if !officer_key_matches(&pool, key) {
                return Err(SessionError::InvalidOfficerKey);
            }
        }

        let req = RegisterRequest {
            account,
            password: password.to_string(),
            officer_key: officer_key.map(str::to_string),
        };
        let res = self.remote.register(&req).await?;
        info!(id = %res.account.id, role = %res.account.role, "registered");
        Ok(res)
    }

    /// Server pool, cached locally; the cache answers when the fetch fails.
    async fn officer_key_pool(&self) -> Vec<String> {
        match self.remote.officer_keys().await {
            Ok(pool) => {
                if let Err(e) = self.local.save_officer_keys(&pool) {
                    warn!(error = %e, "failed to cache officer keys");
                }
                pool
            }
            Err(e) => {
                warn!(error = %e, "officer key fetch failed; using cached pool");
                self.local.load_officer_keys()
            }
        }
    }

    pub fn logout(&self) -> Result<(), LocalStoreError> {
        self.local.remove(SESSION_KEY)?;
        if let Some(account) = self.current.write().take() {
            info!(id = %account.id, "signed out");
        }
        Ok(())
    }

    pub fn is_onboarded(&self, resident_id: &str) -> bool {
        self.local
            .get(&onboarded_key(resident_id))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn mark_onboarded(&self, resident_id: &str) -> Result<(), LocalStoreError> {
        self.local.set(&onboarded_key(resident_id), &Value::Bool(true))
    }
}

fn parse_accounts(value: Value) -> Vec<Account> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect(),
        _ => Vec::new(),
    }
}

/// Approved officers whose name, village, taluka, or district contains
/// `query` (case-insensitive). An empty query lists them all.
pub fn search_officers<'a>(accounts: &'a [Account], query: &str) -> Vec<&'a Account> {
    let query = query.trim().to_lowercase();
    accounts
        .iter()
        .filter(|a| a.role == Role::Officer && a.status == gramseva_types::AccountStatus::Approved)
        .filter(|a| {
            query.is_empty()
                || [&a.name, &a.location.village, &a.location.sub_district, &a.location.district]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gramseva_types::{AccountStatus, LocationStamp};

    use crate::sync::tests::FakeRemote;

    fn stamp(village: &str) -> LocationStamp {
        LocationStamp::new("Maharashtra", "Pune", "Haveli", village, "412207")
    }

    fn resolver(remote: Arc<FakeRemote>) -> (tempfile::TempDir, SessionResolver) {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::open(dir.path()).unwrap();
        (dir, SessionResolver::new(remote, local))
    }

    fn seed_accounts(remote: &FakeRemote, accounts: &[Account]) {
        remote
            .collections
            .lock()
            .insert(Collection::Accounts, serde_json::to_value(accounts).unwrap());
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    #[test]
    fn test_restore_refresh_logout() {
        let (_dir, session) = resolver(FakeRemote::online());
        assert!(session.restore().is_none());

        let account = Account::new("Asha", "asha@example.in", Role::Resident, stamp("Wagholi"));
        session.persist(&account).unwrap();
        assert_eq!(session.restore(), Some(account.clone()));

        let mut renamed = account.clone();
        renamed.name = "Asha Patil".into();
        let refreshed = session.refresh_from(&[renamed.clone()]).unwrap();
        assert_eq!(refreshed, Some(renamed.clone()));
        assert_eq!(session.restore(), Some(renamed.clone()));

        assert_eq!(session.refresh_from(&[]).unwrap(), Some(renamed));

        session.logout().unwrap();
        assert!(session.current().is_none());
        assert!(session.restore().is_none());
    }

    #[test]
    fn test_onboarding_flag() {
        let (_dir, session) = resolver(FakeRemote::online());
        assert!(!session.is_onboarded("RES-1"));
        session.mark_onboarded("RES-1").unwrap();
        assert!(session.is_onboarded("RES-1"));
        assert!(!session.is_onboarded("RES-2"));
    }

    // ========================================================================
    // Registration pre-checks
    // ========================================================================

    #[tokio::test]
    async fn test_register_offline_is_connectivity_error() {
        let remote = FakeRemote::online();
        remote.set_online(false);
        let (_dir, session) = resolver(remote);
        let account = Account::new("Asha", "asha@example.in", Role::Resident, stamp("Wagholi"));
        let err = session.register(account, "secret", None).await.unwrap_err();
        assert!(matches!(err, SessionError::Connectivity(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_register_duplicate_checks() {
        let remote = FakeRemote::online();
        let existing =
            Account::new("Asha", "Asha@Example.in", Role::Resident, stamp("Wagholi")).with_mobile("9800000001");
        seed_accounts(&remote, &[existing]);
        let (_dir, session) = resolver(remote);

        let dup_email = Account::new("A2", "asha@example.IN", Role::Resident, stamp("Wagholi"));
        let err = session.register(dup_email, "x", None).await.unwrap_err();
        assert!(matches!(err, SessionError::DuplicateEmail));

        let dup_mobile =
            Account::new("A3", "other@example.in", Role::Resident, stamp("Wagholi")).with_mobile(" 9800000001");
        let err = session.register(dup_mobile, "x", None).await.unwrap_err();
        assert!(matches!(err, SessionError::DuplicateMobile));
    }

    #[tokio::test]
    async fn test_register_officer_key_checks() {
        let (_dir, session) = resolver(FakeRemote::online());
        let officer = || {
            Account::new("Vikram", "vikram@gov.in", Role::Officer, stamp("Wagholi"))
                .with_department(Department::Gas)
        };

        let err = session.register(officer(), "x", None).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingOfficerKey));

        let err = session.register(officer(), "x", Some("NOPE")).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidOfficerKey));

        // Passes the pre-check; FakeRemote then refuses the submission itself.
        let err = session.register(officer(), "x", Some(" officer01 ")).await.unwrap_err();
        assert!(matches!(err, SessionError::Connectivity(_)), "{err:?}");
        assert_eq!(session.local.load_officer_keys(), vec!["OFFICER01".to_string()]);
    }

    #[test]
    fn test_rejection_message_is_verbatim() {
        let err = SessionError::from(RemoteError::Status {
            status: 403,
            message: "Your resident account is awaiting approval from your village officer.".into(),
        });
        assert_eq!(
            err.to_string(),
            "Your resident account is awaiting approval from your village officer."
        );
    }

    // ========================================================================
    // Officer search
    // ========================================================================

    #[test]
    fn test_search_officers() {
        let wagholi = Account::new("Vikram Rao", "v@gov.in", Role::Officer, stamp("Wagholi"))
            .with_status(AccountStatus::Approved);
        let lohegaon = Account::new("Sunita Jadhav", "s@gov.in", Role::Officer, stamp("Lohegaon"))
            .with_status(AccountStatus::Approved);
        let pending = Account::new("Pending Pawar", "p@gov.in", Role::Officer, stamp("Wagholi"));
        let resident = Account::new("Wagholi Resident", "r@example.in", Role::Resident, stamp("Wagholi"));
        let accounts = vec![wagholi.clone(), lohegaon.clone(), pending, resident];

        let ids = |found: Vec<&Account>| found.into_iter().map(|a| a.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(search_officers(&accounts, "wagh")), vec![wagholi.id.clone()]);
        assert_eq!(ids(search_officers(&accounts, "JADHAV")), vec![lohegaon.id.clone()]);
        assert_eq!(ids(search_officers(&accounts, "haveli")).len(), 2);
        assert_eq!(ids(search_officers(&accounts, "")).len(), 2);
    }
}
