use std::collections::BTreeSet;

use serde::Serialize;

use super::domain::{Application, ApplicationKey, EmailRecord, OrganizationHint};
use crate::config::MatcherConfig;

/// Heuristic signals that tie an email to an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSignal {
    SenderDomain,
    OrganizationInSubject,
    OrganizationInBody,
    RoleInSubject,
    RoleInBody,
    SharedReference,
}

/// One entry of the additive scoring table.
#[derive(Clone, Copy)]
pub struct MatchRule {
    pub signal: MatchSignal,
    pub weight: u32,
    predicate: fn(&EmailFeatures, &CandidateFeatures) -> bool,
}

impl MatchRule {
    pub fn applies(&self, email: &EmailFeatures, candidate: &CandidateFeatures) -> bool {
        (self.predicate)(email, candidate)
    }
}

impl std::fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchRule")
            .field("signal", &self.signal)
            .field("weight", &self.weight)
            .finish()
    }
}

/// Every rule contributes its weight at most once per candidate.
pub const MATCH_RULES: &[MatchRule] = &[
    MatchRule {
        signal: MatchSignal::SenderDomain,
        weight: 50,
        predicate: organization_in_sender_domain,
    },
    MatchRule {
        signal: MatchSignal::OrganizationInSubject,
        weight: 20,
        predicate: organization_in_subject,
    },
    MatchRule {
        signal: MatchSignal::OrganizationInBody,
        weight: 10,
        predicate: organization_in_body,
    },
    MatchRule {
        signal: MatchSignal::RoleInSubject,
        weight: 15,
        predicate: role_in_subject,
    },
    MatchRule {
        signal: MatchSignal::RoleInBody,
        weight: 5,
        predicate: role_in_body,
    },
    MatchRule {
        signal: MatchSignal::SharedReference,
        weight: 100,
        predicate: shares_reference_number,
    },
];

/// Minimum token length for subject/body comparisons (tokens must be longer than this).
const CONTENT_TOKEN_FLOOR: usize = 3;
/// Minimum token length for sender-domain comparisons.
const DOMAIN_TOKEN_MIN: usize = 3;
/// Digit runs of at least this length count as vacancy/reference numbers.
const REFERENCE_DIGITS: usize = 5;

/// Lower-cased email text the rules inspect.
#[derive(Debug, Clone)]
pub struct EmailFeatures {
    pub sender_domain: Option<String>,
    pub subject: String,
    pub body_prefix: String,
    pub reference_numbers: BTreeSet<String>,
}

impl EmailFeatures {
    pub fn extract(email: &EmailRecord, body_prefix_chars: usize) -> Self {
        let subject = email.subject_text().to_lowercase();
        let body_prefix: String = email
            .body_text()
            .chars()
            .take(body_prefix_chars)
            .collect::<String>()
            .to_lowercase();

        let mut numbers = reference_numbers(&subject);
        numbers.extend(reference_numbers(&body_prefix));

        Self {
            sender_domain: email.sender_domain(),
            subject,
            body_prefix,
            reference_numbers: numbers,
        }
    }
}

/// Tokens derived from an application's identity.
#[derive(Debug, Clone)]
pub struct CandidateFeatures {
    pub organization_tokens: Vec<String>,
    pub role_tokens: Vec<String>,
    pub reference_numbers: BTreeSet<String>,
}

impl CandidateFeatures {
    pub fn extract(application: &Application) -> Self {
        Self {
            organization_tokens: tokens(application.organization.as_deref().unwrap_or_default()),
            role_tokens: tokens(&application.role),
            reference_numbers: reference_numbers(application.key.as_str()),
        }
    }
}

fn organization_in_sender_domain(email: &EmailFeatures, candidate: &CandidateFeatures) -> bool {
    let Some(domain) = email.sender_domain.as_deref() else {
        return false;
    };
    candidate
        .organization_tokens
        .iter()
        .filter(|token| token.chars().count() >= DOMAIN_TOKEN_MIN)
        .any(|token| domain.contains(token.as_str()))
}

fn organization_in_subject(email: &EmailFeatures, candidate: &CandidateFeatures) -> bool {
    any_content_token_in(&candidate.organization_tokens, &email.subject)
}

fn organization_in_body(email: &EmailFeatures, candidate: &CandidateFeatures) -> bool {
    any_content_token_in(&candidate.organization_tokens, &email.body_prefix)
}

fn role_in_subject(email: &EmailFeatures, candidate: &CandidateFeatures) -> bool {
    any_content_token_in(&candidate.role_tokens, &email.subject)
}

fn role_in_body(email: &EmailFeatures, candidate: &CandidateFeatures) -> bool {
    any_content_token_in(&candidate.role_tokens, &email.body_prefix)
}

fn shares_reference_number(email: &EmailFeatures, candidate: &CandidateFeatures) -> bool {
    !email
        .reference_numbers
        .is_disjoint(&candidate.reference_numbers)
}

fn any_content_token_in(tokens: &[String], haystack: &str) -> bool {
    tokens
        .iter()
        .filter(|token| token.chars().count() > CONTENT_TOKEN_FLOOR)
        .any(|token| haystack.contains(token.as_str()))
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn reference_numbers(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| run.len() >= REFERENCE_DIGITS)
        .map(str::to_string)
        .collect()
}

/// Contribution of one rule to a candidate score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreComponent {
    pub signal: MatchSignal,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateScore {
    pub key: ApplicationKey,
    pub score: u32,
    pub components: Vec<ScoreComponent>,
}

impl CandidateScore {
    pub fn has_signal(&self, signal: MatchSignal) -> bool {
        self.components
            .iter()
            .any(|component| component.signal == signal)
    }

    /// Selection order: a shared reference number outranks any text score.
    fn rank(&self) -> (bool, u32) {
        (self.has_signal(MatchSignal::SharedReference), self.score)
    }
}

/// How a match was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    /// Content scoring cleared the confidence floor.
    Scored,
    /// Scoring was inconclusive; the explicit organization hint decided.
    HintFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Unrelated mail: block the sender and delete the record.
    Discard { sender: Option<String> },
    Matched { candidate: CandidateScore, basis: MatchBasis },
    /// No confident match; the email stays unclassified.
    Unresolved { best: Option<CandidateScore> },
}

/// Best-effort assignment of unlabeled mail to applications.
pub struct EmailMatcher {
    config: MatcherConfig,
}

impl EmailMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn rules(&self) -> &'static [MatchRule] {
        MATCH_RULES
    }

    pub fn score(&self, email: &EmailFeatures, application: &Application) -> CandidateScore {
        let candidate = CandidateFeatures::extract(application);
        let components: Vec<ScoreComponent> = self
            .rules()
            .iter()
            .filter(|rule| rule.applies(email, &candidate))
            .map(|rule| ScoreComponent {
                signal: rule.signal,
                weight: rule.weight,
            })
            .collect();

        CandidateScore {
            key: application.key.clone(),
            score: components.iter().map(|component| component.weight).sum(),
            components,
        }
    }

    /// Pick the application `email` belongs to among `applications`; archived ones are ignored.
    pub fn match_email(&self, email: &EmailRecord, applications: &[Application]) -> MatchOutcome {
        let hint = match email.organization_hint() {
            OrganizationHint::Discard => {
                return MatchOutcome::Discard {
                    sender: email.sender_address(),
                }
            }
            OrganizationHint::Named(hint) => Some(hint),
            OrganizationHint::Absent => None,
        };

        let mut active: Vec<&Application> = applications
            .iter()
            .filter(|application| !application.archived)
            .collect();
        active.sort_by(|left, right| left.key.cmp(&right.key));

        let hinted: Vec<&Application> = match hint.as_deref() {
            Some(hint) => {
                let needle = normalize_hint(hint);
                active
                    .iter()
                    .copied()
                    .filter(|application| {
                        application
                            .organization
                            .as_deref()
                            .is_some_and(|organization| {
                                normalize_hint(organization).contains(&needle)
                            })
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        let candidates = if hinted.is_empty() { &active } else { &hinted };
        if candidates.is_empty() {
            return MatchOutcome::Unresolved { best: None };
        }

        let features = EmailFeatures::extract(email, self.config.body_prefix_chars);
        let mut best: Option<CandidateScore> = None;
        for application in candidates {
            let scored = self.score(&features, application);
            if best.as_ref().map_or(true, |current| scored.rank() > current.rank()) {
                best = Some(scored);
            }
        }

        match best {
            Some(candidate) if candidate.score > self.config.confidence_floor => {
                MatchOutcome::Matched {
                    candidate,
                    basis: MatchBasis::Scored,
                }
            }
            best => match hinted.first() {
                Some(application) => MatchOutcome::Matched {
                    candidate: self.score(&features, application),
                    basis: MatchBasis::HintFallback,
                },
                None => MatchOutcome::Unresolved { best },
            },
        }
    }
}

impl Default for EmailMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

fn normalize_hint(value: &str) -> String {
    value.replace('_', " ").trim().to_lowercase()
}
