//! Built-in PII patterns.
//!
//! Fixed at startup. Custom patterns come from configuration with confidence
//! pinned to 1.0. Declared in the order they must be tried: more-specific
//! patterns before generic ones — in particular the credit-card BIN-specific
//! pattern before the generic 4x4 grouping.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiKind {
    Email,
    Ssn,
    Phone,
    CreditCard,
    IpAddress,
    DateOfBirth,
    Passport,
    DriverLicense,
    Custom,
}

impl PiiKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PiiKind::Email => "email",
            PiiKind::Ssn => "ssn",
            PiiKind::Phone => "phone",
            PiiKind::CreditCard => "credit_card",
            PiiKind::IpAddress => "ip_address",
            PiiKind::DateOfBirth => "date_of_birth",
            PiiKind::Passport => "passport",
            PiiKind::DriverLicense => "driver_license",
            PiiKind::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PiiPattern {
    pub kind: PiiKind,
    pub name: String,
    pub regex: Regex,
    pub replacement_tag: String,
    pub confidence: f64,
}

/// Built-in patterns in detection order: within a kind, more specific
/// patterns first (credit-card BIN-specific before the generic 4x4 grouping);
/// across kinds, ordered roughly by specificity of the kind itself.
pub static BUILTIN_PATTERNS: LazyLock<Vec<PiiPattern>> = LazyLock::new(|| {
    vec![
        // Credit cards: Visa/Mastercard/Amex BIN-aware pattern first (more
        // specific), generic 4x4-grouped 16-digit fallback second.
        PiiPattern {
            kind: PiiKind::CreditCard,
            name: "credit_card_bin".to_string(),
            regex: Regex::new(
                r"\b(?:4\d{3}|5[1-5]\d{2}|3[47]\d{2})[ -]?\d{4,6}[ -]?\d{4,5}[ -]?\d{0,4}\b",
            )
            .expect("valid regex"),
            replacement_tag: "CREDIT_CARD".to_string(),
            confidence: 0.9,
        },
        PiiPattern {
            kind: PiiKind::CreditCard,
            name: "credit_card_grouped".to_string(),
            regex: Regex::new(r"\b\d{4}[ -]\d{4}[ -]\d{4}[ -]\d{4}\b").expect("valid regex"),
            replacement_tag: "CREDIT_CARD".to_string(),
            confidence: 0.6,
        },
        PiiPattern {
            kind: PiiKind::Email,
            name: "email".to_string(),
            regex: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
                .expect("valid regex"),
            replacement_tag: "EMAIL".to_string(),
            confidence: 0.95,
        },
        PiiPattern {
            kind: PiiKind::Ssn,
            name: "ssn".to_string(),
            regex: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid regex"),
            replacement_tag: "SSN".to_string(),
            confidence: 0.9,
        },
        PiiPattern {
            kind: PiiKind::Passport,
            name: "passport".to_string(),
            regex: Regex::new(r"\b[A-Z]{1,2}\d{6,9}\b").expect("valid regex"),
            replacement_tag: "PASSPORT".to_string(),
            confidence: 0.4,
        },
        PiiPattern {
            kind: PiiKind::DriverLicense,
            name: "driver_license".to_string(),
            regex: Regex::new(r"\b[A-Z]\d{7,12}\b").expect("valid regex"),
            replacement_tag: "DRIVER_LICENSE".to_string(),
            confidence: 0.35,
        },
        PiiPattern {
            kind: PiiKind::DateOfBirth,
            name: "date_of_birth".to_string(),
            regex: Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid regex"),
            replacement_tag: "DATE_OF_BIRTH".to_string(),
            confidence: 0.5,
        },
        PiiPattern {
            kind: PiiKind::Phone,
            name: "phone".to_string(),
            regex: Regex::new(r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}\b")
                .expect("valid regex"),
            replacement_tag: "PHONE".to_string(),
            confidence: 0.8,
        },
        PiiPattern {
            kind: PiiKind::IpAddress,
            name: "ip_address".to_string(),
            regex: Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid regex"),
            replacement_tag: "IP_ADDRESS".to_string(),
            confidence: 0.85,
        },
    ]
});

/// Build a custom pattern from configuration. Confidence is fixed at 1.0.
pub fn custom_pattern(name: String, regex: Regex, replacement_tag: String) -> PiiPattern {
    PiiPattern {
        kind: PiiKind::Custom,
        name,
        regex,
        replacement_tag,
        confidence: 1.0,
    }
}
