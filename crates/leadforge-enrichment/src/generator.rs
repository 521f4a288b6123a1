//! Candidate email addresses for a company.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Role mailboxes most companies have.
pub const GENERIC_PREFIXES: [&str; 8] = [
    "info", "contact", "hello", "sales", "support", "admin", "team", "office",
];

/// First names tried as personal mailboxes.
pub const COMMON_NAMES: [&str; 70] = [
    "john", "jane", "mike", "sarah", "david", "emma", "james", "lisa", "robert", "anna",
    "michael", "jennifer", "william", "linda", "richard", "susan", "thomas", "jessica",
    "christopher", "ashley", "charles", "amanda", "daniel", "brittany", "matthew", "nicole",
    "anthony", "elizabeth", "mark", "stephanie", "donald", "rebecca", "steven", "laura",
    "paul", "michelle", "andrew", "kimberly", "joshua", "deborah", "kenneth", "dorothy",
    "kevin", "helen", "brian", "diane", "george", "ruth", "edward", "julie", "ronald",
    "joyce", "timothy", "virginia", "jason", "victoria", "jeffrey", "kelly", "ryan",
    "lauren", "jacob", "christine", "gary", "amy", "nicholas", "shirley", "eric", "megan",
    "jonathan", "brenda",
];

const GENERIC_CONFIDENCE: f64 = 0.9;
const COMPANY_CONFIDENCE: f64 = 0.8;
const NAME_CONFIDENCE: f64 = 0.7;

/// A guessed address and how it was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEmail {
    /// The address
    pub email: String,
    /// Layout it follows, e.g. `generic@domain.com`
    pub pattern: String,
    /// Prior likelihood the mailbox exists, `0..=1`
    pub confidence: f64,
    /// Generation time
    pub generated_at: DateTime<Utc>,
}

impl GeneratedEmail {
    fn new(email: String, pattern: &str, confidence: f64) -> Self {
        Self {
            email,
            pattern: pattern.to_string(),
            confidence,
            generated_at: Utc::now(),
        }
    }
}

/// Up to `max` candidates at `domain`, most likely first.
///
/// Role mailboxes come first, then words of the company name longer than
/// two characters, then common first names. Duplicates are dropped.
#[must_use]
pub fn generate_emails(company_name: &str, domain: &str, max: usize) -> Vec<GeneratedEmail> {
    let company_words: Vec<String> = company_name
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
        .filter(|w| w.len() > 2)
        .collect();

    let candidates = GENERIC_PREFIXES
        .iter()
        .map(|p| (p.to_string(), "generic@domain.com", GENERIC_CONFIDENCE))
        .chain(
            company_words
                .into_iter()
                .map(|w| (w, "company@domain.com", COMPANY_CONFIDENCE)),
        )
        .chain(
            COMMON_NAMES
                .iter()
                .map(|n| (n.to_string(), "first@domain.com", NAME_CONFIDENCE)),
        );

    let mut seen = HashSet::new();
    candidates
        .filter(|(local, _, _)| seen.insert(local.clone()))
        .take(max)
        .map(|(local, pattern, confidence)| {
            GeneratedEmail::new(format!("{local}@{domain}"), pattern, confidence)
        })
        .collect()
}

/// Name-based layouts for a known contact at `domain`.
#[must_use]
pub fn generate_person_patterns(first: &str, last: &str, domain: &str) -> Vec<GeneratedEmail> {
    let clean = |s: &str| -> String {
        s.to_lowercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect()
    };
    let first = clean(first);
    let last = clean(last);
    let (Some(f), Some(l)) = (first.chars().next(), last.chars().next()) else {
        return Vec::new();
    };

    let layouts = [
        (format!("{first}.{last}"), "first.last@domain.com"),
        (first.clone(), "first@domain.com"),
        (format!("{f}{last}"), "flast@domain.com"),
        (format!("{first}_{last}"), "first_last@domain.com"),
        (format!("{first}{l}"), "firstl@domain.com"),
        (format!("{f}.{last}"), "f.last@domain.com"),
        (format!("{first}.{l}"), "first.l@domain.com"),
    ];

    layouts
        .into_iter()
        .map(|(local, pattern)| {
            GeneratedEmail::new(format!("{local}@{domain}"), pattern, NAME_CONFIDENCE)
        })
        .collect()
}
