//! Demo fixture loader, enabled by `--seed-demo`.
//!
//! Materializes one approved system-admin officer per department plus a
//! demo resident, each with a credential. Accounts whose email is already
//! present are left alone. Login never consults this module.

use gramseva_types::{Account, AccountStatus, Collection, Department, LocationStamp, Role};
use strum::IntoEnumIterator;
use tracing::info;

use crate::auth::{self, Credential};
use crate::constants::CREDENTIALS_FILE;
use crate::error::StoreError;
use crate::store::CollectionStore;

pub const DEMO_ADMIN_PASSWORD: &str = "admin123";
pub const DEMO_RESIDENT_EMAIL: &str = "demo@gramseva.in";
pub const DEMO_RESIDENT_PASSWORD: &str = "demo123";

fn demo_village() -> LocationStamp {
    LocationStamp::new("Maharashtra", "Pune", "Haveli", "Wagholi", "412207")
}

/// Email of the demo admin for `department`, e.g. `admin.water-supply@gramseva.gov.in`.
pub fn admin_email(department: Department) -> String {
    let slug = department.as_ref().to_ascii_lowercase().replace(' ', "-");
    format!("admin.{slug}@gramseva.gov.in")
}

/// Every fixture account with its plaintext demo password.
pub fn fixtures() -> Vec<(Account, &'static str)> {
    let mut out: Vec<(Account, &'static str)> = Department::iter()
        .map(|department| {
            let account = Account::new(
                format!("{department} Administrator"),
                admin_email(department),
                Role::Officer,
                LocationStamp::everywhere(),
            )
            .with_department(department)
            .with_status(AccountStatus::Approved);
            (account, DEMO_ADMIN_PASSWORD)
        })
        .collect();

    let resident = Account::new("Demo Resident", DEMO_RESIDENT_EMAIL, Role::Resident, demo_village())
        .with_mobile("9999999999");
    out.push((resident, DEMO_RESIDENT_PASSWORD));
    out
}

/// Add missing fixtures. Returns the persisted accounts when anything was
/// added, so the caller can broadcast.
pub async fn load_demo(store: &CollectionStore) -> Result<Option<serde_json::Value>, StoreError> {
    let _accounts_guard = store.lock(Collection::Accounts).await;
    let _credentials_guard = store.lock_credentials().await;

    let mut accounts: Vec<Account> = store.read_for_update().await?;
    let mut credentials = auth::load_credentials_for_update(store).await?;
    let mut added = 0;

    for (account, password) in fixtures() {
        if accounts.iter().any(|a| a.email_matches(&account.email)) {
            continue;
        }
        credentials.insert(account.id.clone(), Credential::new(password));
        accounts.push(account);
        added += 1;
    }

    if added == 0 {
        return Ok(None);
    }

    store.write_file(CREDENTIALS_FILE, &credentials).await?;
    let payload = store.persist_records(&accounts).await?;
    info!(added, "loaded demo accounts");
    Ok(Some(payload))
}
