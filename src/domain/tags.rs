//! Controlled vocabulary for content tags and difficulty ratings.
//!
//! Tags come back from the rewriter as free text; anything outside the
//! vocabulary is dropped rather than stored.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A cue or topic tag from the fixed vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Urgency,
    Authority,
    Fear,
    Curiosity,
    Reward,
    Impersonation,
    CredentialHarvest,
    MaliciousAttachment,
    SuspiciousLink,
    SpoofedSender,
    GenericGreeting,
    SpellingErrors,
    MismatchedUrl,
    Payment,
    Delivery,
    AccountSecurity,
    HumanResources,
    ItSupport,
}

impl Tag {
    /// Every tag in the vocabulary
    pub const ALL: [Tag; 18] = [
        Tag::Urgency,
        Tag::Authority,
        Tag::Fear,
        Tag::Curiosity,
        Tag::Reward,
        Tag::Impersonation,
        Tag::CredentialHarvest,
        Tag::MaliciousAttachment,
        Tag::SuspiciousLink,
        Tag::SpoofedSender,
        Tag::GenericGreeting,
        Tag::SpellingErrors,
        Tag::MismatchedUrl,
        Tag::Payment,
        Tag::Delivery,
        Tag::AccountSecurity,
        Tag::HumanResources,
        Tag::ItSupport,
    ];

    /// Wire name of the tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Urgency => "urgency",
            Tag::Authority => "authority",
            Tag::Fear => "fear",
            Tag::Curiosity => "curiosity",
            Tag::Reward => "reward",
            Tag::Impersonation => "impersonation",
            Tag::CredentialHarvest => "credential_harvest",
            Tag::MaliciousAttachment => "malicious_attachment",
            Tag::SuspiciousLink => "suspicious_link",
            Tag::SpoofedSender => "spoofed_sender",
            Tag::GenericGreeting => "generic_greeting",
            Tag::SpellingErrors => "spelling_errors",
            Tag::MismatchedUrl => "mismatched_url",
            Tag::Payment => "payment",
            Tag::Delivery => "delivery",
            Tag::AccountSecurity => "account_security",
            Tag::HumanResources => "human_resources",
            Tag::ItSupport => "it_support",
        }
    }

    /// Parse a free-text label, normalizing case and separators
    pub fn parse_label(label: &str) -> Option<Tag> {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();

        Tag::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, deduplicated set of tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add labels, keeping only those in the vocabulary. Returns how many were dropped.
    pub fn extend_labels<'a>(&mut self, labels: impl IntoIterator<Item = &'a str>) -> usize {
        let mut dropped = 0;
        for label in labels {
            match Tag::parse_label(label) {
                Some(tag) => {
                    self.0.insert(tag);
                }
                None => dropped += 1,
            }
        }
        dropped
    }

    /// Union another set into this one
    pub fn union_with(&mut self, other: &TagSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn insert(&mut self, tag: Tag) {
        self.0.insert(tag);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Tag> {
        self.0.into_iter().collect()
    }
}

/// Difficulty rating of a simulation (ordinal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Parse a free-text rating ("easy", "Medium", "3", ...)
    pub fn parse_label(label: &str) -> Option<Difficulty> {
        match label.trim().to_lowercase().as_str() {
            "easy" | "low" | "1" => Some(Difficulty::Easy),
            "medium" | "moderate" | "2" => Some(Difficulty::Medium),
            "hard" | "high" | "difficult" | "3" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}
