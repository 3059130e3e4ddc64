//! Portal actions.
//!
//! Every action edits one or more collections in the [`ClientStore`] and
//! ends in one deduplicated push per touched collection. Bill settlement is
//! the exception: it goes to the server's atomic settle endpoint and only
//! falls back to two local pushes when the server cannot be reached.

use std::sync::Arc;

use gramseva_types::api::RegisterResponse;
use gramseva_types::{
    Account, AccountStatus, AppNotification, Bill, BillType, BusinessStatus, Collection, Department,
    LocalBusiness, LocationStamp, NoticeCategory, NotificationKind, Payment, PaymentMethod, PolicyError, Record,
    RequestSource, RequestStatus, Role, Scoped, ServiceCategory, ServiceRequest, Transaction,
    TransitionError, VillageNotice, visible,
};
use parking_lot::Mutex;
use strum::IntoEnumIterator;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::local::{LocalStore, LocalStoreError};
use crate::realtime::{ConnectionStatus, RealtimeClient};
use crate::remote::{HttpRemote, Remote, RemoteError};
use crate::session::{SessionError, SessionResolver, search_officers};
use crate::store::{ClientStore, StoreEvent};
use crate::sync::SyncEngine;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("sign in first")]
    NotSignedIn,
    #[error("{role} accounts cannot {action}")]
    Forbidden { role: Role, action: &'static str },
    #[error("officer account has no department")]
    MissingDepartment,
    #[error("no {collection} record with id {id}")]
    NotFound { collection: Collection, id: String },
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Local(#[from] LocalStoreError),
    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ActionError {
    fn not_found(collection: Collection, id: &str) -> Self {
        ActionError::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}

/// Details of a directory listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BusinessListing {
    pub name: String,
    pub category: String,
    pub contact: String,
    pub hours: String,
    pub description: String,
    pub proof_document: Option<String>,
}

const STAFF: &[Role] = &[Role::Officer, Role::Developer];

pub struct Portal {
    config: ClientConfig,
    store: Arc<ClientStore>,
    sync: Arc<SyncEngine>,
    session: Arc<SessionResolver>,
    status: watch::Sender<ConnectionStatus>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Portal {
    /// Connect to `config.server_url`: load everything, then open the
    /// realtime channel.
    pub async fn start(config: ClientConfig) -> Result<Self, ActionError> {
        let remote = Arc::new(HttpRemote::new(&config)?);
        let portal = Self::open(config, remote).await?;
        portal.connect_realtime();
        Ok(portal)
    }

    /// Restore the session and load every collection through `remote`,
    /// without a realtime channel.
    pub async fn open(config: ClientConfig, remote: Arc<dyn Remote>) -> Result<Self, ActionError> {
        let local = LocalStore::open(&config.data_dir)?;
        let store = Arc::new(ClientStore::new());
        let sync = Arc::new(SyncEngine::new(store.clone(), remote.clone(), local.clone(), &config));
        let session = Arc::new(SessionResolver::new(remote, local));
        session.restore();

        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let portal = Self {
            config,
            store,
            sync,
            session,
            status,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        };
        let refresher = portal.spawn_session_refresh();
        portal.tasks.lock().push(refresher);

        portal.sync.load_all().await;
        portal.session.refresh_from(&portal.store.snapshot::<Account>())?;
        Ok(portal)
    }

    /// Start the realtime listener and the pump applying its events.
    pub fn connect_realtime(&self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = RealtimeClient::new(&self.config).spawn(tx, self.status.clone(), self.cancel.clone());
        let pump = self.sync.spawn_pump(rx, self.cancel.clone());
        self.tasks.lock().extend([listener, pump]);
    }

    /// Keep the session snapshot in step with the accounts collection.
    fn spawn_session_refresh(&self) -> JoinHandle<()> {
        let mut events = self.store.subscribe();
        let store = self.store.clone();
        let session = self.session.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(StoreEvent::Changed {
                        collection: Collection::Accounts,
                        ..
                    })
                    | Err(RecvError::Lagged(_)) => {
                        if let Err(e) = session.refresh_from(&store.snapshot::<Account>()) {
                            warn!(error = %e, "failed to persist refreshed session");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Stop background tasks and close the realtime channel.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
        info!("portal stopped");
    }

    pub fn store(&self) -> &Arc<ClientStore> {
        &self.store
    }

    pub fn sync(&self) -> &Arc<SyncEngine> {
        &self.sync
    }

    pub fn session(&self) -> &Arc<SessionResolver> {
        &self.session
    }

    pub fn connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn current_account(&self) -> Option<Account> {
        self.session.current()
    }

    /// Records of `T` the signed-in actor may see. Empty when signed out.
    pub fn visible<T: Record + Scoped>(&self) -> Vec<T> {
        let Some(actor) = self.session.actor() else {
            return Vec::new();
        };
        let records = self.store.snapshot::<T>();
        visible(&records, &actor).into_iter().cloned().collect()
    }

    pub fn search_officers(&self, query: &str) -> Vec<Account> {
        let accounts = self.store.snapshot::<Account>();
        search_officers(&accounts, query).into_iter().cloned().collect()
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        role: Role,
        department: Option<Department>,
    ) -> Result<Account, ActionError> {
        Ok(self.session.login(email, password, role, department).await?)
    }

    /// Register, then adopt the server's accounts list.
    pub async fn register(
        &self,
        account: Account,
        password: &str,
        officer_key: Option<&str>,
    ) -> Result<RegisterResponse, ActionError> {
        let res = self.session.register(account, password, officer_key).await?;
        self.sync
            .apply_remote(Collection::Accounts, serde_json::to_value(&res.accounts)?);
        Ok(res)
    }

    pub fn logout(&self) -> Result<(), ActionError> {
        Ok(self.session.logout()?)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn signed_in(&self) -> Result<Account, ActionError> {
        self.session.current().ok_or(ActionError::NotSignedIn)
    }

    fn require(&self, roles: &[Role], action: &'static str) -> Result<Account, ActionError> {
        let account = self.signed_in()?;
        if roles.contains(&account.role) {
            Ok(account)
        } else {
            Err(ActionError::Forbidden {
                role: account.role,
                action,
            })
        }
    }

    /// Mutate one collection and push it.
    async fn commit<T, R>(
        &self,
        f: impl FnOnce(&mut Vec<T>) -> Result<R, ActionError>,
    ) -> Result<R, ActionError>
    where
        T: Record,
    {
        let out = self.store.update::<T, R, ActionError>(f)?;
        self.sync.push(T::COLLECTION).await?;
        Ok(out)
    }

    /// Update the record with `id` in place.
    async fn modify<T: Record>(
        &self,
        id: &str,
        f: impl FnOnce(&mut T) -> Result<(), ActionError>,
    ) -> Result<T, ActionError> {
        self.commit::<T, _>(|list| {
            let record = list
                .iter_mut()
                .find(|r| r.id() == id)
                .ok_or_else(|| ActionError::not_found(T::COLLECTION, id))?;
            f(record)?;
            Ok(record.clone())
        })
        .await
    }

    async fn remove<T: Record>(&self, id: &str) -> Result<(), ActionError> {
        self.commit::<T, _>(|list| {
            let before = list.len();
            list.retain(|r| r.id() != id);
            if list.len() == before {
                return Err(ActionError::not_found(T::COLLECTION, id));
            }
            Ok(())
        })
        .await
    }

    fn account(&self, id: &str) -> Result<Account, ActionError> {
        self.store
            .find::<Account>(id)
            .ok_or_else(|| ActionError::not_found(Collection::Accounts, id))
    }

    // ========================================================================
    // Requests
    // ========================================================================

    pub async fn submit_request(
        &self,
        category: ServiceCategory,
        title: &str,
        description: &str,
        citizen_document: Option<String>,
    ) -> Result<ServiceRequest, ActionError> {
        let me = self.require(&[Role::Resident], "submit requests")?;
        let mut request = ServiceRequest::new(
            &me.id,
            &me.name,
            me.location.clone(),
            category,
            title,
            description,
            RequestSource::User,
        );
        request.citizen_document = citizen_document;

        let submitted = request.clone();
        self.commit::<ServiceRequest, _>(|list| {
            list.push(request);
            Ok(())
        })
        .await?;
        info!(id = %submitted.id, category = %category, "request submitted");

        self.notify(
            NotificationKind::Success,
            "Request submitted",
            &format!("\"{title}\" was sent to {}.", category.department()),
        )
        .await?;
        Ok(submitted)
    }

    /// Raise a task on behalf of a resident.
    pub async fn issue_task(
        &self,
        resident_id: &str,
        category: ServiceCategory,
        title: &str,
        description: &str,
    ) -> Result<ServiceRequest, ActionError> {
        self.require(STAFF, "issue tasks")?;
        let resident = self.account(resident_id)?;
        let request = ServiceRequest::new(
            &resident.id,
            &resident.name,
            resident.location.clone(),
            category,
            title,
            description,
            RequestSource::Admin,
        );
        let issued = request.clone();
        self.commit::<ServiceRequest, _>(|list| {
            list.push(request);
            Ok(())
        })
        .await?;
        Ok(issued)
    }

    pub async fn update_request_status(
        &self,
        id: &str,
        status: RequestStatus,
        officer_report: Option<String>,
        officer_document: Option<String>,
    ) -> Result<ServiceRequest, ActionError> {
        self.require(STAFF, "update requests")?;
        self.modify::<ServiceRequest>(id, |request| {
            request.status = request.status.transition(status)?;
            if officer_report.is_some() {
                request.officer_report = officer_report;
            }
            if officer_document.is_some() {
                request.officer_document = officer_document;
            }
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Bills
    // ========================================================================

    pub async fn issue_bill(
        &self,
        account_id: &str,
        bill_type: BillType,
        amount: f64,
        due_date: &str,
        description: Option<&str>,
    ) -> Result<Bill, ActionError> {
        let me = self.require(&[Role::Officer], "issue bills")?;
        let department = me.department.ok_or(ActionError::MissingDepartment)?;
        let payer = self.account(account_id)?;

        let mut bill = Bill::issue(department, &payer.id, payer.location.clone(), bill_type, amount, due_date)?;
        if let Some(description) = description {
            bill = bill.with_description(description);
        }
        let issued = bill.clone();
        self.commit::<Bill, _>(|list| {
            list.push(bill);
            Ok(())
        })
        .await?;
        info!(id = %issued.id, bill_type = %bill_type, amount, "bill issued");

        self.notify(
            NotificationKind::Info,
            "Bill issued",
            &format!("{bill_type} of ₹{amount:.2} issued to {}.", payer.name),
        )
        .await?;
        Ok(issued)
    }

    /// Simulated online payment by the bill's owner.
    pub async fn pay_bill(&self, bill_id: &str, payment_address: &str) -> Result<Transaction, ActionError> {
        let me = self.require(&[Role::Resident], "pay bills")?;
        let bill = self
            .store
            .find::<Bill>(bill_id)
            .filter(|b| b.account_id == me.id)
            .ok_or_else(|| ActionError::not_found(Collection::Bills, bill_id))?;
        let payment = Payment {
            method: PaymentMethod::Online,
            payer_id: me.id.clone(),
            payer_name: me.name.clone(),
            recipient_name: recipient_for(bill.bill_type),
            payment_address: payment_address.to_string(),
        };
        let transaction = self.settle(&bill, payment).await?;

        self.notify(
            NotificationKind::Success,
            "Payment successful",
            &format!("₹{:.2} paid, reference {}.", transaction.amount, transaction.reference_id),
        )
        .await?;
        Ok(transaction)
    }

    /// Record a cash payment collected by an officer.
    pub async fn mark_bill_paid_cash(&self, bill_id: &str) -> Result<Transaction, ActionError> {
        let me = self.require(STAFF, "collect cash payments")?;
        let bill = self
            .store
            .find::<Bill>(bill_id)
            .ok_or_else(|| ActionError::not_found(Collection::Bills, bill_id))?;
        let payer_name = self
            .store
            .find::<Account>(&bill.account_id)
            .map(|a| a.name)
            .unwrap_or_else(|| bill.account_id.clone());
        let payment = Payment {
            method: PaymentMethod::Cash,
            payer_id: bill.account_id.clone(),
            payer_name,
            recipient_name: me.name.clone(),
            payment_address: "cash".to_string(),
        };
        self.settle(&bill, payment).await
    }

    async fn settle(&self, bill: &Bill, payment: Payment) -> Result<Transaction, ActionError> {
        if bill.is_paid() {
            return Err(PolicyError::AlreadyPaid(bill.id.clone()).into());
        }
        match self.sync.remote().settle_bill(&bill.id, &payment).await {
            Ok(res) => {
                self.absorb_settlement(res.bill, res.transaction.clone())?;
                info!(bill = %bill.id, method = %payment.method, "bill settled");
                Ok(res.transaction)
            }
            Err(e) if e.is_connectivity() => {
                warn!(bill = %bill.id, error = %e, "settle unreachable; recording locally");
                self.settle_locally(&bill.id, &payment).await
            }
            Err(e) => match e.status() {
                Some(404) => Err(ActionError::not_found(Collection::Bills, &bill.id)),
                Some(409) => Err(PolicyError::AlreadyPaid(bill.id.clone()).into()),
                _ => Err(e.into()),
            },
        }
    }

    /// Fold the server's settlement result in as server state.
    fn absorb_settlement(&self, bill: Bill, transaction: Transaction) -> Result<(), ActionError> {
        let mut bills = self.store.snapshot::<Bill>();
        match bills.iter_mut().find(|b| b.id == bill.id) {
            Some(existing) => *existing = bill,
            None => bills.push(bill),
        }
        let mut transactions = self.store.snapshot::<Transaction>();
        if !transactions.iter().any(|t| t.id == transaction.id) {
            transactions.push(transaction);
        }
        self.sync.apply_remote(Collection::Bills, serde_json::to_value(&bills)?);
        self.sync
            .apply_remote(Collection::Transactions, serde_json::to_value(&transactions)?);
        Ok(())
    }

    /// Offline settlement: two independent pushes. Until both land on the
    /// server, other clients may see the bill paid without its transaction.
    async fn settle_locally(&self, bill_id: &str, payment: &Payment) -> Result<Transaction, ActionError> {
        let transaction = self
            .commit::<Bill, _>(|list| {
                let bill = list
                    .iter_mut()
                    .find(|b| b.id == bill_id)
                    .ok_or_else(|| ActionError::not_found(Collection::Bills, bill_id))?;
                Ok(bill.settle(payment)?)
            })
            .await?;
        let recorded = transaction.clone();
        self.commit::<Transaction, _>(|list| {
            list.push(transaction);
            Ok(())
        })
        .await?;
        Ok(recorded)
    }

    pub async fn delete_bill(&self, id: &str) -> Result<(), ActionError> {
        self.require(STAFF, "delete bills")?;
        self.remove::<Bill>(id).await
    }

    // ========================================================================
    // Notices
    // ========================================================================

    /// Publish a notice for the officer's own location.
    pub async fn post_notice(
        &self,
        title: &str,
        body: &str,
        category: NoticeCategory,
    ) -> Result<VillageNotice, ActionError> {
        let me = self.require(STAFF, "post notices")?;
        let notice = VillageNotice::new(me.location.clone(), title, body, category);
        let posted = notice.clone();
        self.commit::<VillageNotice, _>(|list| {
            list.insert(0, notice);
            Ok(())
        })
        .await?;
        Ok(posted)
    }

    pub async fn delete_notice(&self, id: &str) -> Result<(), ActionError> {
        self.require(STAFF, "delete notices")?;
        self.remove::<VillageNotice>(id).await
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    pub async fn notify(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> Result<AppNotification, ActionError> {
        self.signed_in()?;
        let notification = AppNotification::new(kind, title, message);
        let added = notification.clone();
        self.commit::<AppNotification, _>(|list| {
            list.insert(0, notification);
            Ok(())
        })
        .await?;
        Ok(added)
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<AppNotification, ActionError> {
        self.signed_in()?;
        self.modify::<AppNotification>(id, |n| {
            n.read = true;
            Ok(())
        })
        .await
    }

    pub async fn clear_notifications(&self) -> Result<(), ActionError> {
        self.signed_in()?;
        self.commit::<AppNotification, _>(|list| {
            list.clear();
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Businesses
    // ========================================================================

    /// Self-listing by a resident; waits for officer approval.
    pub async fn register_business(&self, listing: BusinessListing) -> Result<LocalBusiness, ActionError> {
        let me = self.require(&[Role::Resident], "register businesses")?;
        self.list_business(listing, &me.name, me.location.clone(), BusinessStatus::Pending)
            .await
    }

    /// Officer-added listing, approved immediately.
    pub async fn add_business(&self, listing: BusinessListing, owner_name: &str) -> Result<LocalBusiness, ActionError> {
        let me = self.require(STAFF, "add businesses")?;
        self.list_business(listing, owner_name, me.location.clone(), BusinessStatus::Approved)
            .await
    }

    async fn list_business(
        &self,
        listing: BusinessListing,
        owner_name: &str,
        location: LocationStamp,
        status: BusinessStatus,
    ) -> Result<LocalBusiness, ActionError> {
        let mut business = LocalBusiness::new(listing.name, listing.category, owner_name, location, status)
            .with_details(listing.contact, listing.hours, listing.description);
        business.proof_document = listing.proof_document;
        let listed = business.clone();
        self.commit::<LocalBusiness, _>(|list| {
            list.push(business);
            Ok(())
        })
        .await?;
        Ok(listed)
    }

    pub async fn approve_business(&self, id: &str) -> Result<LocalBusiness, ActionError> {
        self.require(STAFF, "approve businesses")?;
        self.modify::<LocalBusiness>(id, |b| {
            b.status = BusinessStatus::Approved;
            Ok(())
        })
        .await
    }

    pub async fn delete_business(&self, id: &str) -> Result<(), ActionError> {
        self.require(STAFF, "delete businesses")?;
        self.remove::<LocalBusiness>(id).await
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub async fn approve_account(&self, id: &str) -> Result<Account, ActionError> {
        self.set_account_status(id, AccountStatus::Approved).await
    }

    pub async fn reject_account(&self, id: &str) -> Result<Account, ActionError> {
        self.set_account_status(id, AccountStatus::Rejected).await
    }

    async fn set_account_status(&self, id: &str, status: AccountStatus) -> Result<Account, ActionError> {
        self.require(STAFF, "review accounts")?;
        let account = self
            .modify::<Account>(id, |a| {
                a.status = status;
                Ok(())
            })
            .await?;
        info!(id, status = %status, "account reviewed");
        Ok(account)
    }

    /// Bulk edit of the accounts collection.
    pub async fn update_accounts(
        &self,
        f: impl FnOnce(&mut Vec<Account>) + Send,
    ) -> Result<(), ActionError> {
        self.require(STAFF, "edit accounts")?;
        self.commit::<Account, _>(|list| {
            f(list);
            Ok(())
        })
        .await
    }
}

impl Drop for Portal {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Payee for an online payment: the department issuing `bill_type`.
fn recipient_for(bill_type: BillType) -> String {
    Department::iter()
        .find(|d| d.issues(bill_type))
        .map(|d| format!("{d} Department"))
        .unwrap_or_else(|| "GramSeva".to_string())
}

// ============================================================================
// Tests
// ============================================================================
