//! Bills, transactions, and the department → bill-type policy.
//!
//! A bill settles exactly once. Settlement flips the bill to `Paid` and
//! produces one `Transaction`; the server does both atomically, the offline
//! client path does them as two independent collection pushes.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::account::Department;
use crate::collection::{Collection, Record};
use crate::ids::{self, IdKind};
use crate::location::LocationStamp;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum BillType {
    #[serde(rename = "Property Tax")]
    #[strum(serialize = "Property Tax")]
    PropertyTax,
    #[serde(rename = "Water Tax")]
    #[strum(serialize = "Water Tax")]
    WaterTax,
    #[serde(rename = "Sanitation Fee")]
    #[strum(serialize = "Sanitation Fee")]
    SanitationFee,
    #[serde(rename = "Electricity Bill")]
    #[strum(serialize = "Electricity Bill")]
    ElectricityBill,
    #[serde(rename = "Gas Bill")]
    #[strum(serialize = "Gas Bill")]
    GasBill,
    #[serde(rename = "Health Fee")]
    #[strum(serialize = "Health Fee")]
    HealthFee,
    #[serde(rename = "Land Revenue")]
    #[strum(serialize = "Land Revenue")]
    LandRevenue,
}

impl Department {
    /// Bill types this department issues (and its officers see).
    pub fn bill_types(self) -> &'static [BillType] {
        match self {
            Department::GramPanchayat => {
                &[BillType::PropertyTax, BillType::WaterTax, BillType::SanitationFee]
            }
            Department::Electricity => &[BillType::ElectricityBill],
            Department::WaterSupply => &[BillType::WaterTax],
            Department::Gas => &[BillType::GasBill],
            Department::Health => &[BillType::HealthFee],
            Department::Revenue => &[BillType::LandRevenue],
        }
    }

    pub fn issues(self, bill_type: BillType) -> bool {
        self.bill_types().contains(&bill_type)
    }
}

/// Rejected billing operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("{department} officers cannot issue {bill_type}")]
    BillTypeNotAllowed { department: Department, bill_type: BillType },
    #[error("bill amount must be a positive number, got {0}")]
    NonPositiveAmount(f64),
    #[error("bill {0} is already paid")]
    AlreadyPaid(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum BillStatus {
    #[default]
    Unpaid,
    Paid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub account_id: String,
    #[serde(flatten)]
    pub location: LocationStamp,
    pub bill_type: BillType,
    pub amount: f64,
    pub due_date: String,
    #[serde(default)]
    pub issued_date: String,
    #[serde(default)]
    pub status: BillStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Bill {
    /// Issue a bill on behalf of `department`, enforcing the bill-type policy.
    pub fn issue(
        department: Department,
        account_id: impl Into<String>,
        location: LocationStamp,
        bill_type: BillType,
        amount: f64,
        due_date: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        if !department.issues(bill_type) {
            return Err(PolicyError::BillTypeNotAllowed { department, bill_type });
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(PolicyError::NonPositiveAmount(amount));
        }
        Ok(Self {
            id: IdKind::Bill.fresh(),
            account_id: account_id.into(),
            location,
            bill_type,
            amount,
            due_date: due_date.into(),
            issued_date: crate::display_today(),
            status: BillStatus::Unpaid,
            description: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_paid(&self) -> bool {
        self.status == BillStatus::Paid
    }

    /// Mark paid and produce the matching transaction.
    pub fn settle(&mut self, payment: &Payment) -> Result<Transaction, PolicyError> {
        if self.is_paid() {
            return Err(PolicyError::AlreadyPaid(self.id.clone()));
        }
        self.status = BillStatus::Paid;
        Ok(Transaction {
            id: IdKind::Transaction.fresh(),
            bill_id: self.id.clone(),
            payer_id: payment.payer_id.clone(),
            payer_name: payment.payer_name.clone(),
            location: self.location.clone(),
            bill_type: self.bill_type,
            amount: self.amount,
            recipient_name: payment.recipient_name.clone(),
            payment_address: payment.payment_address.clone(),
            timestamp: crate::display_now(),
            status: TransactionStatus::Success,
            reference_id: ids::reference_id(),
        })
    }
}

impl Record for Bill {
    const COLLECTION: Collection = Collection::Bills;

    fn id(&self) -> &str {
        &self.id
    }
}

/// How a bill was settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentMethod {
    /// Collected in person by an officer.
    Cash,
    /// Simulated online confirmation.
    Online,
}

/// Who paid whom, for a settlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: PaymentMethod,
    pub payer_id: String,
    pub payer_name: String,
    pub recipient_name: String,
    /// UPI-style payment address token; `"cash"` for cash settlements.
    pub payment_address: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum TransactionStatus {
    #[default]
    Success,
    Failed,
}

/// Immutable payment record derived from a bill.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub bill_id: String,
    pub payer_id: String,
    pub payer_name: String,
    #[serde(flatten)]
    pub location: LocationStamp,
    #[serde(rename = "type")]
    pub bill_type: BillType,
    pub amount: f64,
    pub recipient_name: String,
    pub payment_address: String,
    pub timestamp: String,
    pub status: TransactionStatus,
    pub reference_id: String,
}

impl Record for Transaction {
    const COLLECTION: Collection = Collection::Transactions;

    fn id(&self) -> &str {
        &self.id
    }
}
