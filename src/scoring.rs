//! Lead scoring heuristic.
//!
//! A lead's score is a base value plus bonuses for how much the prospect told
//! us (comments), who they are (email domain, full name), and how they have
//! engaged with the site (tracked interactions). The result is capped at 100.

use chrono::{DateTime, Utc};

use crate::models::{InteractionCount, Lead};

pub const BASE_SCORE: i32 = 10;
pub const MAX_SCORE: i32 = 100;

const FREE_MAIL_DOMAINS: [&str; 3] = ["gmail.com", "yahoo.com", "hotmail.com"];

/// Tracked front-end actions that carry an engagement weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    PropertyView,
    PropertyDetailView,
    ContactClick,
    EnquiryFormOpen,
    EnquirySubmitted,
    PhoneClick,
    EmailClick,
    PageView,
}

impl InteractionKind {
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "property_view" => Some(Self::PropertyView),
            "property_detail_view" => Some(Self::PropertyDetailView),
            "contact_click" => Some(Self::ContactClick),
            "enquiry_form_open" => Some(Self::EnquiryFormOpen),
            "enquiry_submitted" => Some(Self::EnquirySubmitted),
            "phone_click" => Some(Self::PhoneClick),
            "email_click" => Some(Self::EmailClick),
            "page_view" => Some(Self::PageView),
            _ => None,
        }
    }

    pub fn engagement_weight(&self) -> i32 {
        match self {
            Self::PropertyView => 15,
            Self::PropertyDetailView => 20,
            Self::ContactClick => 25,
            Self::EnquiryFormOpen => 10,
            Self::EnquirySubmitted => 30,
            Self::PhoneClick => 20,
            Self::EmailClick => 15,
            Self::PageView => 2,
        }
    }
}

/// Engagement score stored on a tracked event; unknown actions weigh nothing.
pub fn engagement_score(action: &str) -> i32 {
    InteractionKind::from_action(action)
        .map(|kind| kind.engagement_weight())
        .unwrap_or(0)
}

/// Everything the heuristic looks at for one lead.
#[derive(Debug, Clone, Default)]
pub struct LeadSignals<'a> {
    pub comments: Option<&'a str>,
    pub email: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Computes a lead score in `[BASE_SCORE, MAX_SCORE]`.
///
/// `interactions` holds `(action_type, count)` pairs; each known action type
/// with a positive count contributes its weight once.
pub fn score_lead<S: AsRef<str>>(signals: &LeadSignals<'_>, interactions: &[(S, i64)]) -> i32 {
    let mut score = BASE_SCORE;

    if let Some(comments) = signals.comments.filter(|c| !c.is_empty()) {
        score += match comments.chars().count() {
            n if n > 100 => 20,
            n if n > 50 => 15,
            n if n > 20 => 10,
            _ => 5,
        };
    }

    if let Some(email) = signals.email.filter(|e| !e.is_empty()) {
        let domain = email.rsplit('@').next().unwrap_or_default().to_lowercase();
        score += if FREE_MAIL_DOMAINS.contains(&domain.as_str()) {
            5
        } else {
            15
        };
    }

    if let Some(name) = signals.display_name {
        if name.split_whitespace().count() >= 2 {
            score += 10;
        }
    }

    if signals.created_at.is_some() {
        score += 5;
    }

    let mut seen: Vec<InteractionKind> = Vec::new();
    for (action, count) in interactions {
        if *count <= 0 {
            continue;
        }
        if let Some(kind) = InteractionKind::from_action(action.as_ref()) {
            if !seen.contains(&kind) {
                seen.push(kind);
                score += kind.engagement_weight();
            }
        }
    }

    score.min(MAX_SCORE)
}

impl<'a> From<&'a Lead> for LeadSignals<'a> {
    /// The contact's current name wins over the name captured with the lead.
    fn from(lead: &'a Lead) -> Self {
        Self {
            comments: lead.lead_comments.as_deref(),
            email: Some(lead.email.as_str()),
            display_name: Some(lead.contact_name.as_deref().unwrap_or(&lead.customer_name)),
            created_at: Some(lead.created_date),
        }
    }
}

fn score_with_counts(signals: &LeadSignals<'_>, counts: &[InteractionCount]) -> i32 {
    let interactions: Vec<(&str, i64)> = counts
        .iter()
        .map(|c| (c.action_type.as_str(), c.count))
        .collect();
    score_lead(signals, &interactions)
}

/// Score of a stored lead given its email's interaction counts.
pub fn score_stored_lead(lead: &Lead, counts: &[InteractionCount]) -> i32 {
    score_with_counts(&LeadSignals::from(lead), counts)
}

/// Score a lead starts with when captured, given its email's interactions so far.
pub fn score_new_lead(
    name: &str,
    email: &str,
    comments: Option<&str>,
    counts: &[InteractionCount],
) -> i32 {
    let signals = LeadSignals {
        comments,
        email: Some(email),
        display_name: Some(name),
        created_at: Some(Utc::now()),
    };
    score_with_counts(&signals, counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_interactions() -> Vec<(String, i64)> {
        Vec::new()
    }

    #[test]
    fn empty_signals_score_base() {
        assert_eq!(score_lead(&LeadSignals::default(), &no_interactions()), BASE_SCORE);
    }

    #[test]
    fn comment_length_tiers() {
        let score_for = |text: &str| {
            score_lead(
                &LeadSignals {
                    comments: Some(text),
                    ..Default::default()
                },
                &no_interactions(),
            )
        };

        assert_eq!(score_for("hi"), 15);
        assert_eq!(score_for(&"a".repeat(21)), 20);
        assert_eq!(score_for(&"a".repeat(51)), 25);
        assert_eq!(score_for(&"a".repeat(101)), 30);
        assert_eq!(score_for(""), BASE_SCORE);
    }

    #[test]
    fn business_domain_beats_free_mail() {
        let free = score_lead(
            &LeadSignals {
                email: Some("jane@Gmail.com"),
                ..Default::default()
            },
            &no_interactions(),
        );
        let business = score_lead(
            &LeadSignals {
                email: Some("jane@acme-realty.com"),
                ..Default::default()
            },
            &no_interactions(),
        );

        assert_eq!(free, 15);
        assert_eq!(business, 25);
    }

    #[test]
    fn full_name_and_creation_date_add_bonus() {
        let score = score_lead(
            &LeadSignals {
                display_name: Some("Jane  Doe"),
                created_at: Some(Utc::now()),
                ..Default::default()
            },
            &no_interactions(),
        );
        assert_eq!(score, BASE_SCORE + 10 + 5);
    }

    #[test]
    fn interaction_types_count_once() {
        let interactions = vec![
            ("property_view".to_string(), 12),
            ("contact_click".to_string(), 1),
            ("contact_click".to_string(), 3),
            ("unknown_action".to_string(), 40),
            ("page_view".to_string(), 0),
        ];
        let score = score_lead(&LeadSignals::default(), &interactions);
        assert_eq!(score, BASE_SCORE + 15 + 25);
    }

    #[test]
    fn score_is_capped() {
        let interactions: Vec<(&str, i64)> = vec![
            ("property_view", 1),
            ("property_detail_view", 1),
            ("contact_click", 1),
            ("enquiry_submitted", 1),
            ("phone_click", 1),
        ];
        let signals = LeadSignals {
            comments: Some("Looking for a three bedroom house close to the river, budget flexible."),
            email: Some("buyer@corp.example"),
            display_name: Some("Jane Doe"),
            created_at: Some(Utc::now()),
        };
        assert_eq!(score_lead(&signals, &interactions), MAX_SCORE);
    }

    #[test]
    fn engagement_score_of_unknown_action_is_zero() {
        assert_eq!(engagement_score("enquiry_submitted"), 30);
        assert_eq!(engagement_score("scroll"), 0);
    }

    fn stored_lead(customer_name: &str, contact_name: Option<&str>) -> Lead {
        Lead {
            lead_id: 1,
            customer_name: customer_name.to_string(),
            email: "cher@gmail.com".to_string(),
            phone: None,
            status: "new".to_string(),
            lead_score: 0,
            property_id: None,
            property_interested: None,
            lead_comments: None,
            source: "website".to_string(),
            assigned_agent_id: None,
            created_by: None,
            created_date: Utc::now(),
            updated_at: Utc::now(),
            contact_name: contact_name.map(str::to_string),
        }
    }

    #[test]
    fn stored_lead_uses_current_contact_name() {
        let renamed = stored_lead("Cher", Some("Cher Smith"));
        let unjoined = stored_lead("Cher", None);

        assert_eq!(score_stored_lead(&renamed, &[]), score_stored_lead(&unjoined, &[]) + 10);
    }

    #[test]
    fn new_lead_starts_at_or_above_base() {
        let bare = score_new_lead("Cher", "cher@gmail.com", None, &[]);
        assert!(bare >= BASE_SCORE);
        assert_eq!(bare, BASE_SCORE + 5 + 5);

        let counts = vec![InteractionCount {
            action_type: "property_view".to_string(),
            count: 3,
        }];
        let engaged = score_new_lead("Cher Smith", "cher@gmail.com", Some("Call me"), &counts);
        assert_eq!(engaged, BASE_SCORE + 5 + 5 + 10 + 5 + 15);
    }
}
