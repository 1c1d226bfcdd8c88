//! Dynamic `UPDATE ... SET` statements built from typed patches.
//!
//! Column names only ever come from the `Patch` impls below; every value is a
//! bind parameter.

use bigdecimal::BigDecimal;
use sqlx::{Postgres, QueryBuilder};

use crate::errors::AppError;
use crate::models::{AgentProfilePatch, PropertyPatch};

/// A value assigned by a patch.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Text(String),
    Int(i32),
    Decimal(BigDecimal),
    Bool(bool),
}

/// A partial update of one table row.
pub trait Patch {
    const TABLE: &'static str;
    const KEY: &'static str;

    /// Present fields only, as `(column, value)` pairs.
    fn assignments(&self) -> Vec<(&'static str, Bind)>;
}

fn text(out: &mut Vec<(&'static str, Bind)>, column: &'static str, value: &Option<String>) {
    if let Some(v) = value {
        out.push((column, Bind::Text(v.clone())));
    }
}

fn int(out: &mut Vec<(&'static str, Bind)>, column: &'static str, value: Option<i32>) {
    if let Some(v) = value {
        out.push((column, Bind::Int(v)));
    }
}

impl Patch for PropertyPatch {
    const TABLE: &'static str = "properties";
    const KEY: &'static str = "property_id";

    fn assignments(&self) -> Vec<(&'static str, Bind)> {
        let mut out = Vec::new();
        text(&mut out, "label", &self.label);
        text(&mut out, "description", &self.description);
        text(&mut out, "address", &self.address);
        text(&mut out, "area", &self.area);
        int(&mut out, "beds", self.beds);
        int(&mut out, "baths", self.baths);
        if let Some(price) = &self.price {
            out.push(("price", Bind::Decimal(price.clone())));
        }
        text(&mut out, "property_type", &self.property_type);
        text(&mut out, "status", &self.status);
        text(&mut out, "image_url", &self.image_url);
        out
    }
}

impl Patch for AgentProfilePatch {
    const TABLE: &'static str = "agent_profiles";
    const KEY: &'static str = "user_id";

    fn assignments(&self) -> Vec<(&'static str, Bind)> {
        let mut out = Vec::new();
        text(&mut out, "bio", &self.bio);
        text(&mut out, "phone", &self.phone);
        text(&mut out, "specialization", &self.specialization);
        text(&mut out, "profile_picture", &self.profile_picture);
        if let Some(active) = self.is_active {
            out.push(("is_active", Bind::Bool(active)));
        }
        out
    }
}

/// Builds `UPDATE <table> SET ..., updated_at = NOW() WHERE <key> = $n
/// [AND <scope> = $m] RETURNING *`.
///
/// # Errors
///
/// `400 No fields to update` when the patch carries no fields.
pub fn build_update<P: Patch>(
    patch: &P,
    key: i32,
    scope: Option<(&'static str, i32)>,
) -> Result<QueryBuilder<'static, Postgres>, AppError> {
    let assignments = patch.assignments();
    if assignments.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let mut builder = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", P::TABLE));
    {
        let mut set = builder.separated(", ");
        for (column, value) in assignments {
            set.push(format!("{} = ", column));
            match value {
                Bind::Text(v) => set.push_bind_unseparated(v),
                Bind::Int(v) => set.push_bind_unseparated(v),
                Bind::Decimal(v) => set.push_bind_unseparated(v),
                Bind::Bool(v) => set.push_bind_unseparated(v),
            };
        }
        set.push("updated_at = NOW()");
    }

    builder.push(format!(" WHERE {} = ", P::KEY));
    builder.push_bind(key);
    if let Some((column, value)) = scope {
        builder.push(format!(" AND {} = ", column));
        builder.push_bind(value);
    }
    builder.push(" RETURNING *");

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn only_present_fields_are_emitted() {
        let patch = PropertyPatch {
            label: Some("Harbour view loft".to_string()),
            price: Some(BigDecimal::from_str("450000.00").unwrap()),
            ..Default::default()
        };

        let builder = build_update(&patch, 7, None).unwrap();
        assert_eq!(
            builder.sql(),
            "UPDATE properties SET label = $1, price = $2, updated_at = NOW() \
             WHERE property_id = $3 RETURNING *"
        );
    }

    #[test]
    fn scope_adds_bound_predicate() {
        let patch = PropertyPatch {
            status: Some("active".to_string()),
            ..Default::default()
        };

        let builder = build_update(&patch, 3, Some(("assigned_agent_id", 12))).unwrap();
        assert_eq!(
            builder.sql(),
            "UPDATE properties SET status = $1, updated_at = NOW() \
             WHERE property_id = $2 AND assigned_agent_id = $3 RETURNING *"
        );
    }

    #[test]
    fn values_never_reach_sql_text() {
        let patch = AgentProfilePatch {
            bio: Some("'; DROP TABLE users; --".to_string()),
            is_active: Some(false),
            ..Default::default()
        };

        let builder = build_update(&patch, 1, None).unwrap();
        assert!(!builder.sql().contains("DROP TABLE"));
        assert!(builder.sql().starts_with("UPDATE agent_profiles SET bio = $1, is_active = $2"));
    }

    #[test]
    fn empty_patch_is_rejected() {
        let err = build_update(&PropertyPatch::default(), 1, None).err().unwrap();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "No fields to update"));
    }
}
