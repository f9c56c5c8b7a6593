use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for finalized applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

static ID_SEQUENCE: AtomicU32 = AtomicU32::new(0);

impl ApplicationId {
    /// Time-based id: epoch millis plus a short process-local suffix so two
    /// finalizations inside the same millisecond stay distinct.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1000;
        Self(format!("{}{suffix:03}", now.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Loan products offered by the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanProduct {
    Mortgage,
    Autoloan,
}

impl LoanProduct {
    pub const ALL: [LoanProduct; 2] = [LoanProduct::Mortgage, LoanProduct::Autoloan];

    pub const fn label(self) -> &'static str {
        match self {
            LoanProduct::Mortgage => "mortgage",
            LoanProduct::Autoloan => "autoloan",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            LoanProduct::Mortgage => "Mortgage",
            LoanProduct::Autoloan => "Auto loan",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|product| product.label().eq_ignore_ascii_case(raw.trim()))
    }
}

/// Lifecycle status of a finalized application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    Scoring,
    Underwriting,
    Approved,
    Rejected,
    Issued,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::Scoring,
        ApplicationStatus::Underwriting,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Issued,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Scoring => "scoring",
            ApplicationStatus::Underwriting => "underwriting",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Issued => "issued",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "Draft",
            ApplicationStatus::Submitted => "Submitted",
            ApplicationStatus::Scoring => "Scoring",
            ApplicationStatus::Underwriting => "Underwriting",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Issued => "Loan issued",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(raw.trim()))
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Rejected | ApplicationStatus::Issued)
    }

    /// Edges of the lifecycle graph. Everything not listed here is refused.
    pub const fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, Scoring)
                | (Submitted, Underwriting)
                | (Scoring, Underwriting)
                | (Scoring, Approved)
                | (Scoring, Rejected)
                | (Underwriting, Approved)
                | (Underwriting, Rejected)
                | (Approved, Issued)
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Demo persona attached to a record. Purely descriptive: no scenario alters
/// scoring or injects faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    #[default]
    Ideal,
    Gray,
    Reject,
    Error,
}

impl Scenario {
    pub const fn label(self) -> &'static str {
        match self {
            Scenario::Ideal => "ideal",
            Scenario::Gray => "gray",
            Scenario::Reject => "reject",
            Scenario::Error => "error",
        }
    }
}

/// Calculator output captured on step two.
///
/// The monthly payment is always derived. An incoming `monthlyPayment` is
/// ignored on deserialization and recomputed from the other two fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RequestedTerms")]
pub struct LoanTerms {
    pub principal: u64,
    pub term_months: u32,
    pub monthly_payment: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestedTerms {
    principal: u64,
    term_months: u32,
}

impl From<RequestedTerms> for LoanTerms {
    fn from(requested: RequestedTerms) -> Self {
        LoanTerms::new(requested.principal, requested.term_months)
    }
}

impl LoanTerms {
    pub fn new(principal: u64, term_months: u32) -> Self {
        Self {
            principal,
            term_months,
            monthly_payment: monthly_payment(principal, term_months),
        }
    }
}

/// Flat division rounded half up; no interest is modelled.
pub fn monthly_payment(principal: u64, term_months: u32) -> u64 {
    if principal == 0 || term_months == 0 {
        return 0;
    }
    let term = u64::from(term_months);
    principal / term + u64::from(principal % term * 2 >= term)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub national_id: String,
}

/// Opaque handle to an uploaded file. The core never opens it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

impl DocumentRef {
    pub fn named(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            storage_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Documents {
    #[serde(default)]
    pub primary_id_document: Option<DocumentRef>,
    #[serde(default)]
    pub secondary_id_document: Option<DocumentRef>,
}

/// In-progress application. Any subset of fields may be present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<LoanProduct>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_terms: Option<LoanTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_info: Option<PersonalInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Documents>,
}

impl ApplicationDraft {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Staff verdict captured during underwriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub const fn status(self) -> ApplicationStatus {
        match self {
            Verdict::Approve => ApplicationStatus::Approved,
            Verdict::Reject => ApplicationStatus::Rejected,
        }
    }
}

/// Advisory risk score in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RiskScore(u8);

impl RiskScore {
    pub const MAX: u8 = 100;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn recommendation(self) -> RiskRecommendation {
        if self.0 > 70 {
            RiskRecommendation::Approve
        } else if self.0 > 40 {
            RiskRecommendation::NeedsAnalysis
        } else {
            RiskRecommendation::Reject
        }
    }
}

impl Default for RiskScore {
    fn default() -> Self {
        Self(50)
    }
}

impl TryFrom<u8> for RiskScore {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("risk score {value} exceeds {}", Self::MAX))
    }
}

impl From<RiskScore> for u8 {
    fn from(value: RiskScore) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRecommendation {
    Approve,
    NeedsAnalysis,
    Reject,
}

/// Staff decision submitted from the underwriting desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderwritingDecision {
    pub verdict: Verdict,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub risk_score: RiskScore,
}

/// Persisted trail of an underwriting decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderwritingNote {
    pub verdict: Verdict,
    pub comment: String,
    pub risk_score: RiskScore,
    pub decided_at: DateTime<Utc>,
}

/// Finalized application as kept by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub client_name: String,
    pub product: LoanProduct,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub scenario: Scenario,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_terms: Option<LoanTerms>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underwriting: Option<UnderwritingNote>,
}

impl ApplicationRecord {
    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            id: self.id.clone(),
            client_name: self.client_name.clone(),
            product: self.product.label(),
            status: self.status.label(),
            status_label: self.status.display_name(),
            scenario: self.scenario.label(),
            created_at: self.created_at,
            monthly_payment: self.loan_terms.map(|terms| terms.monthly_payment),
            decision_comment: self
                .underwriting
                .as_ref()
                .map(|note| note.comment.clone())
                .filter(|comment| !comment.is_empty()),
        }
    }
}

/// Public projection of a record for API responses and CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub id: ApplicationId,
    pub client_name: String,
    pub product: &'static str,
    pub status: &'static str,
    pub status_label: &'static str,
    pub scenario: &'static str,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_payment: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_comment: Option<String>,
}
