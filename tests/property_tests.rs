/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use realty_crm_api::core::scoring::{engagement_score, score_lead, LeadSignals, BASE_SCORE, MAX_SCORE};
use realty_crm_api::core::validation::{is_valid_email, normalize_phone, slugify};
use realty_crm_api::data::update::build_update;
use realty_crm_api::models::PropertyPatch;

const ACTIONS: [&str; 10] = [
    "property_view",
    "property_detail_view",
    "contact_click",
    "enquiry_form_open",
    "enquiry_submitted",
    "phone_click",
    "email_click",
    "page_view",
    "scroll",
    "video_play",
];

fn interactions() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec(
        (prop::sample::select(ACTIONS.to_vec()).prop_map(str::to_string), 0i64..500),
        0..20,
    )
}

// Property: scores stay within [BASE_SCORE, MAX_SCORE]
proptest! {
    #[test]
    fn score_is_bounded(
        comments in proptest::option::of("\\PC{0,300}"),
        email in proptest::option::of("[a-z]{1,10}@[a-z]{1,10}\\.(com|org|io)"),
        name in proptest::option::of("[A-Za-z ]{0,40}"),
        created in proptest::option::of(0i64..2_000_000_000),
        counts in interactions(),
    ) {
        let signals = LeadSignals {
            comments: comments.as_deref(),
            email: email.as_deref(),
            display_name: name.as_deref(),
            created_at: created.and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        };

        let score = score_lead(&signals, &counts);
        prop_assert!(score >= BASE_SCORE);
        prop_assert!(score <= MAX_SCORE);
    }

    #[test]
    fn more_interactions_never_lower_the_score(
        counts in interactions(),
        extra in prop::sample::select(ACTIONS.to_vec()),
    ) {
        let signals = LeadSignals::default();
        let before = score_lead(&signals, &counts);

        let mut more = counts.clone();
        more.push((extra.to_string(), 1));
        let after = score_lead(&signals, &more);

        prop_assert!(after >= before);
    }

    #[test]
    fn engagement_score_is_non_negative(action in "\\PC*") {
        prop_assert!(engagement_score(&action) >= 0);
    }
}

// Property: validation helpers never panic
proptest! {
    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = is_valid_email(&email);
    }

    #[test]
    fn well_formed_emails_are_accepted(
        local in "[a-z]{1,10}",
        domain in "[a-z]{1,10}",
        tld in "[a-z]{2,4}"
    ) {
        let email = format!("{}@{}.{}", local, domain, tld);
        prop_assert!(is_valid_email(&email));
    }

    #[test]
    fn phone_normalization_never_panics(phone in "\\PC*") {
        let _ = normalize_phone(&phone);
    }

    #[test]
    fn normalized_phones_are_e164(phone in "[0-9 ()+-]{7,20}") {
        if let Some(normalized) = normalize_phone(&phone) {
            prop_assert!(normalized.starts_with('+'));
            prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn slugs_are_url_safe(text in "\\PC{0,60}") {
        let slug = slugify(&text);
        prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
    }
}

// Property: user-supplied text never becomes SQL
proptest! {
    #[test]
    fn patch_values_are_always_bound(label in "\\PC{1,80}", description in "\\PC{1,80}") {
        let patch = PropertyPatch {
            label: Some(label),
            description: Some(description),
            ..Default::default()
        };

        let builder = build_update(&patch, 1, None).unwrap();
        prop_assert_eq!(
            builder.sql(),
            "UPDATE properties SET label = $1, description = $2, updated_at = NOW() WHERE property_id = $3 RETURNING *"
        );
    }
}
