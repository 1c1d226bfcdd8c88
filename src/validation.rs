use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use std::sync::OnceLock;

/// Region assumed for phone numbers written without a `+` country prefix.
const DEFAULT_PHONE_REGION: CountryId = CountryId::US;

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    // RFC 5322 simplified: local@domain.tld
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email regex is valid")
    })
}

/// Validate email address
///
/// Requires a local part, an `@` and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || email.len() > 254 {
        return false;
    }

    if !email_regex().is_match(email) {
        tracing::debug!("Invalid email format: {}", email);
        return false;
    }

    true
}

/// Normalizes a phone number to E.164 (`+15551234567`).
///
/// Returns `None` when the input cannot be parsed as a valid number; callers
/// keep the raw text in that case.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 7 {
        return None;
    }

    match phonenumber::parse(Some(DEFAULT_PHONE_REGION), trimmed) {
        Ok(number) if phonenumber::is_valid(&number) => {
            Some(number.format().mode(Mode::E164).to_string())
        }
        Ok(_) => {
            tracing::debug!("Phone number not valid: {}", trimmed);
            None
        }
        Err(e) => {
            tracing::debug!("Failed to parse phone '{}': {:?}", trimmed, e);
            None
        }
    }
}

/// Lower-case, ASCII alphanumerics, single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Public URL assigned to the profile of a newly created agent.
pub fn agent_public_url(user_id: i32, name: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() {
        format!("agent-{}", user_id)
    } else {
        format!("agent-{}-{}", user_id, slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("jane.doe@example.com"));
        assert!(is_valid_email("sales+web@acme-realty.co.uk"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("jane"));
        assert!(!is_valid_email("jane@localhost"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jane doe@example.com"));
    }

    #[test]
    fn phone_is_normalized_to_e164() {
        assert_eq!(normalize_phone("(201) 555-0123").as_deref(), Some("+12015550123"));
        assert_eq!(normalize_phone("+44 121 234 5678").as_deref(), Some("+441212345678"));
        assert_eq!(normalize_phone("12"), None);
    }

    #[test]
    fn public_url_slug() {
        assert_eq!(agent_public_url(4, "Ana María  O'Neil"), "agent-4-ana-mar-a-o-neil");
        assert_eq!(agent_public_url(9, "  "), "agent-9");
    }
}
