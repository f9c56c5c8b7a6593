use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::domain::{ApplicationDraft, Documents, LoanTerms, PersonalInfo};

pub const MIN_TERM_MONTHS: u32 = 12;
pub const MAX_TERM_MONTHS: u32 = 360;

/// Form fields that can carry a validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Product,
    Principal,
    TermMonths,
    FullName,
    Phone,
    Email,
    NationalId,
    PrimaryIdDocument,
    SecondaryIdDocument,
}

impl Field {
    pub const fn label(self) -> &'static str {
        match self {
            Field::Product => "product",
            Field::Principal => "principal",
            Field::TermMonths => "termMonths",
            Field::FullName => "fullName",
            Field::Phone => "phone",
            Field::Email => "email",
            Field::NationalId => "nationalId",
            Field::PrimaryIdDocument => "primaryIdDocument",
            Field::SecondaryIdDocument => "secondaryIdDocument",
        }
    }
}

/// Field-level messages produced by a step predicate. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<Field, &'static str>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: Field) -> Option<&'static str> {
        self.errors.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.errors.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.errors.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &'static str)> + '_ {
        self.errors.iter().map(|(field, message)| (*field, *message))
    }

    fn flag(&mut self, field: Field, message: &'static str) {
        self.errors.insert(field, message);
    }

    fn check(&mut self, ok: bool, field: Field, message: &'static str) {
        if !ok {
            self.flag(field, message);
        }
    }

    fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field.label(), message)?;
            first = false;
        }
        Ok(())
    }
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("phone pattern compiles"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
    })
}

fn national_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9]{4}\s?[0-9]{6}$").expect("national id pattern compiles")
    })
}

pub fn validate_loan_terms(terms: &LoanTerms) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    errors.check(
        terms.principal > 0,
        Field::Principal,
        "Enter the loan amount",
    );
    errors.check(
        (MIN_TERM_MONTHS..=MAX_TERM_MONTHS).contains(&terms.term_months),
        Field::TermMonths,
        "Term must be between 12 and 360 months",
    );
    errors
}

pub fn validate_personal_info(info: &PersonalInfo) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    errors.check(
        info.full_name.chars().count() > 2,
        Field::FullName,
        "Enter your full name",
    );
    errors.check(
        phone_pattern().is_match(&info.phone),
        Field::Phone,
        "Enter the phone number as +79991234567",
    );
    errors.check(
        email_pattern().is_match(&info.email),
        Field::Email,
        "Enter a valid email address",
    );
    errors.check(
        national_id_pattern().is_match(&info.national_id),
        Field::NationalId,
        "Enter 10 digits, optionally with a space after the first four",
    );
    errors
}

pub fn validate_documents(documents: &Documents) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    errors.check(
        documents.primary_id_document.is_some(),
        Field::PrimaryIdDocument,
        "Attach the primary identity document",
    );
    errors.check(
        documents.secondary_id_document.is_some(),
        Field::SecondaryIdDocument,
        "Attach the secondary identity document",
    );
    errors
}

pub(crate) fn validate_product(draft: &ApplicationDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    errors.check(draft.product.is_some(), Field::Product, "Choose a loan product");
    errors
}

pub(crate) fn validate_terms_step(draft: &ApplicationDraft) -> ValidationErrors {
    match &draft.loan_terms {
        Some(terms) => validate_loan_terms(terms),
        None => validate_loan_terms(&LoanTerms::new(0, 0)),
    }
}

pub(crate) fn validate_personal_step(draft: &ApplicationDraft) -> ValidationErrors {
    match &draft.personal_info {
        Some(info) => validate_personal_info(info),
        None => validate_personal_info(&PersonalInfo::default()),
    }
}

pub(crate) fn validate_documents_step(draft: &ApplicationDraft) -> ValidationErrors {
    match &draft.documents {
        Some(documents) => validate_documents(documents),
        None => validate_documents(&Documents::default()),
    }
}

/// Every step predicate at once, used before a draft becomes a record.
pub fn validate_draft(draft: &ApplicationDraft) -> ValidationErrors {
    let mut errors = validate_product(draft);
    errors.merge(validate_terms_step(draft));
    errors.merge(validate_personal_step(draft));
    errors.merge(validate_documents_step(draft));
    errors
}
