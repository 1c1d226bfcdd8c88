use std::env;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use uuid::Uuid;

use realty_crm_api::data::{
    InteractionStorage, LeadStorage, NewLead, NewUser, PropertyStorage, UserStorage,
};
use realty_crm_api::db::Database;
use realty_crm_api::errors::AppError;
use realty_crm_api::models::{InteractionRequest, LeadStatus, PropertyCreate, PropertyPatch, Role};
use realty_crm_api::scoring::{score_stored_lead, BASE_SCORE};

/// Database-backed tests for the storage layer.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
async fn test_database() -> anyhow::Result<Database> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    db.migrate().await?;
    Ok(db)
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

fn enquiry(email: &str, name: &str) -> NewLead {
    NewLead {
        customer_name: name.to_string(),
        email: email.to_string(),
        phone: Some("+12015550123".to_string()),
        comments: Some("Interested in a viewing next week".to_string()),
        property_id: None,
        property_interested: "General Inquiry".to_string(),
        source: "website",
        assigned_agent_id: None,
        created_by: None,
        lead_score: BASE_SCORE,
    }
}

#[tokio::test]
#[ignore]
async fn repeated_enquiry_does_not_duplicate_contact() -> anyhow::Result<()> {
    let db = test_database().await?;
    let leads = LeadStorage::new(db.pool.clone());
    let email = unique_email("repeat");

    let first = leads
        .capture(&enquiry(&email, "Jane Doe"))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let second = leads
        .capture(&enquiry(&email, "Jane  Q. Doe"))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_ne!(first, second);

    let (contacts, display_name): (i64, String) = sqlx::query_as(
        "SELECT COUNT(*), MAX(display_name) FROM contacts WHERE email = $1",
    )
    .bind(&email)
    .fetch_one(&db.pool)
    .await?;
    assert_eq!(contacts, 1);
    assert_eq!(display_name, "Jane Q. Doe");

    let stored = leads
        .find_by_email(&email)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|l| l.status == "new" && l.source == "website"));
    Ok(())
}

#[tokio::test]
#[ignore]
async fn duplicate_user_email_conflicts() -> anyhow::Result<()> {
    let db = test_database().await?;
    let users = UserStorage::new(db.pool.clone());
    let email = unique_email("agent");

    let new_user = NewUser {
        email: email.clone(),
        name: "Riley Agent".to_string(),
        role: Role::Agent,
        profile_picture: None,
        phone: None,
        specialization: Some("Condos".to_string()),
        bio: None,
    };

    let created = users
        .create(&new_user)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(created.role, Role::Agent);

    let public_url: String =
        sqlx::query_scalar("SELECT public_url FROM agent_profiles WHERE user_id = $1")
            .bind(created.user_id)
            .fetch_one(&db.pool)
            .await?;
    assert_eq!(public_url, format!("agent-{}-riley-agent", created.user_id));

    let mut shouting = new_user.clone();
    shouting.email = email.to_uppercase();
    let err = users.create(&shouting).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}

#[tokio::test]
#[ignore]
async fn agent_update_is_scoped_to_assigned_listings() -> anyhow::Result<()> {
    let db = test_database().await?;
    let users = UserStorage::new(db.pool.clone());
    let properties = PropertyStorage::new(db.pool.clone());

    let agent = users
        .create(&NewUser {
            email: unique_email("lister"),
            name: "Lee Lister".to_string(),
            role: Role::Agent,
            profile_picture: None,
            phone: None,
            specialization: None,
            bio: None,
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let listing = PropertyCreate {
        label: "Riverside duplex".to_string(),
        description: None,
        address: Some("12 River Rd".to_string()),
        area: Some("Riverside".to_string()),
        beds: Some(4),
        baths: Some(2),
        price: Some(BigDecimal::from_str("615000.00")?),
        property_type: Some("duplex".to_string()),
        image_url: None,
    };
    let property_id = properties
        .create(&listing, "pending", Some(agent.user_id), agent.user_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let patch = PropertyPatch {
        status: Some("active".to_string()),
        ..Default::default()
    };

    let updated = properties
        .update(property_id, &patch, Some(agent.user_id))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("assigned agent could not update"))?;
    assert_eq!(updated.status, "active");
    assert_eq!(updated.label, "Riverside duplex");

    let foreign = properties
        .update(property_id, &patch, Some(agent.user_id + 100_000))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(foreign.is_none());
    Ok(())
}

#[tokio::test]
#[ignore]
async fn interactions_raise_stored_score() -> anyhow::Result<()> {
    let db = test_database().await?;
    let leads = LeadStorage::new(db.pool.clone());
    let interactions = InteractionStorage::new(db.pool.clone());
    let email = unique_email("engaged");

    let lead_id = leads
        .capture(&enquiry(&email, "Sam Buyer"))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let event = InteractionRequest {
        session_id: "sess-1".to_string(),
        action: "contact_click".to_string(),
        timestamp: None,
        page: Some("/properties/1".to_string()),
        user_agent: None,
        element: None,
        property_id: None,
        property_label: None,
        phone: None,
        email: Some(email.clone()),
        referrer: None,
    };
    interactions
        .record(&event, Some(&email), chrono::Utc::now(), 25)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let counts = interactions
        .counts_for_email(&email)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let lead = leads
        .get(lead_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("lead missing"))?;

    let score = score_stored_lead(&lead, &counts);
    assert!(score > BASE_SCORE);
    leads
        .save_scores(&[(lead_id, score)])
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let updated = leads
        .update_status(lead_id, Some(LeadStatus::Contacted), Some("Called back"), 0)
        .await;
    // author 0 does not exist; the note insert violates the foreign key
    assert!(updated.is_err());

    let reloaded = leads
        .get(lead_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("lead missing"))?;
    assert_eq!(reloaded.lead_score, score);
    // status change rolled back with the failed note
    assert_eq!(reloaded.status, "new");
    Ok(())
}
