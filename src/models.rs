use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    Decode, Encode, FromRow, Postgres, Type,
};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

// ============ Roles ============

/// Access role of a CRM user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Agent => "agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "agent" => Ok(Role::Agent),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

// Stored as VARCHAR; delegate the wire format to String.
impl Type<Postgres> for Role {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as Decode<Postgres>>::decode(value)?;
        Ok(raw.parse::<Role>()?)
    }
}

impl<'q> Encode<'q, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <&str as Encode<'q, Postgres>>::encode(self.as_str(), buf)
    }
}

// ============ Database Models ============

/// A CRM user (admin or agent).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: i32,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// A property listing.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Property {
    pub property_id: i32,
    pub label: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub area: Option<String>,
    pub beds: Option<i32>,
    pub baths: Option<i32>,
    pub price: Option<BigDecimal>,
    pub property_type: Option<String>,
    pub image_url: Option<String>,
    pub status: String,
    pub assigned_agent_id: Option<i32>,
    /// Name of the assigned agent, present when the query joins `users`.
    #[sqlx(default)]
    pub agent_name: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public page metadata of an agent.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AgentProfile {
    pub profile_id: i32,
    pub user_id: i32,
    pub public_url: String,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A captured expression of interest.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub lead_id: i32,
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: String,
    pub lead_score: i32,
    pub property_id: Option<i32>,
    pub property_interested: Option<String>,
    pub lead_comments: Option<String>,
    pub source: String,
    pub assigned_agent_id: Option<i32>,
    pub created_by: Option<i32>,
    pub created_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Current display name of the lead's contact; absent on bare `leads` rows.
    #[sqlx(default)]
    #[serde(skip)]
    pub contact_name: Option<String>,
}

/// Number of tracked interactions of one action type.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct InteractionCount {
    pub action_type: String,
    pub count: i64,
}

// ============ Lead status ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
        }
    }
}

impl FromStr for LeadStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(LeadStatus::New),
            "contacted" => Ok(LeadStatus::Contacted),
            "qualified" => Ok(LeadStatus::Qualified),
            "converted" => Ok(LeadStatus::Converted),
            "lost" => Ok(LeadStatus::Lost),
            other => Err(AppError::BadRequest(format!(
                "Invalid lead status '{}': expected new, contacted, qualified, converted or lost",
                other
            ))),
        }
    }
}

// ============ Pagination ============

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// A validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub page_size: i64,
}

impl PageWindow {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

impl PageQuery {
    /// Applies defaults and bounds: `page >= 1`, `1 <= page_size <= max_page_size`.
    pub fn window(&self, default_page_size: i64, max_page_size: i64) -> Result<PageWindow, AppError> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(default_page_size);

        if page < 1 {
            return Err(AppError::BadRequest("page must be >= 1".to_string()));
        }
        if page_size < 1 || page_size > max_page_size {
            return Err(AppError::BadRequest(format!(
                "page_size must be between 1 and {}",
                max_page_size
            )));
        }

        Ok(PageWindow { page, page_size })
    }
}

#[derive(Debug, Serialize)]
pub struct PropertyPage {
    pub properties: Vec<Property>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize)]
pub struct LeadPage {
    pub leads: Vec<Lead>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

// ============ Auth Request/Response Models ============

#[derive(Debug, Deserialize)]
pub struct GoogleAuthRequest {
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
pub struct MicrosoftAuthRequest {
    pub access_token: String,
    #[serde(default)]
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

// ============ User administration ============

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub message: String,
    pub user_id: i32,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: Option<String>,
}

// ============ Property Request Models ============

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyCreate {
    pub label: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub area: Option<String>,
    pub beds: Option<i32>,
    pub baths: Option<i32>,
    pub price: Option<BigDecimal>,
    pub property_type: Option<String>,
    pub image_url: Option<String>,
}

/// Partial update of a property; absent or null fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyPatch {
    pub label: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub area: Option<String>,
    pub beds: Option<i32>,
    pub baths: Option<i32>,
    pub price: Option<BigDecimal>,
    pub property_type: Option<String>,
    pub status: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignPropertyRequest {
    pub agent_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct CreatedProperty {
    pub message: String,
    pub property_id: i32,
}

// ============ Agent profile Request Models ============

#[derive(Debug, Deserialize)]
pub struct AgentProfileCreate {
    pub public_url: String,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentProfilePatch {
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub profile_picture: Option<String>,
    pub is_active: Option<bool>,
}

/// Agent card shown on a public page.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PublicAgent {
    #[serde(skip)]
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub public_url: String,
}

#[derive(Debug, Serialize)]
pub struct PublicAgentPage {
    pub agent: PublicAgent,
    pub properties: Vec<Property>,
}

// ============ Lead Request/Response Models ============

/// Enquiry form submission; agents post the same shape to create leads.
#[derive(Debug, Clone, Deserialize)]
pub struct EnquiryRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub property_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct CreatedLead {
    pub message: String,
    pub lead_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct LeadStatusUpdate {
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub lead_ids: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub message: String,
    pub deleted_count: u64,
    pub deleted_ids: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageChannel {
    Email,
    Sms,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(rename = "type")]
    pub channel: MessageChannel,
    pub recipients: Vec<i32>,
    pub subject: Option<String>,
    pub body: String,
    pub template: Option<String>,
}

/// Lead fields needed to address a message.
#[derive(Debug, Clone, FromRow)]
pub struct MessageRecipient {
    pub lead_id: i32,
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SentMessage {
    pub recipient_id: i32,
    pub recipient_name: String,
    #[serde(rename = "type")]
    pub channel: MessageChannel,
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
    pub template: Option<String>,
    pub status: &'static str,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FailedMessage {
    pub recipient_id: i32,
    pub recipient_name: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct MessageReport {
    pub message: String,
    pub sent_count: usize,
    pub failed_count: usize,
    pub sent_messages: Vec<SentMessage>,
    pub failed_messages: Vec<FailedMessage>,
}

// ============ Interaction tracking ============

/// Event posted by the web front-end's click tracker.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRequest {
    pub session_id: String,
    pub action: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub element: Option<String>,
    pub property_id: Option<String>,
    pub property_label: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_score: Option<i32>,
    pub engagement_score: i32,
}

// ============ Dashboards ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_properties: i64,
    pub total_users: i64,
    pub total_leads: i64,
    pub pending_properties: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub total_properties: i64,
    pub total_leads: i64,
    pub pending_leads: i64,
    pub conversion_rate: i64,
}

impl AgentStats {
    /// Share of non-`new` leads, as a rounded percentage.
    pub fn new(total_properties: i64, total_leads: i64, pending_leads: i64) -> Self {
        let conversion_rate = if total_leads > 0 {
            (((total_leads - pending_leads) as f64 / total_leads as f64) * 100.0).round() as i64
        } else {
            0
        };

        Self {
            total_properties,
            total_leads,
            pending_leads,
            conversion_rate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeadStatsSummary {
    pub total_leads: i64,
    pub status_breakdown: BTreeMap<String, i64>,
    pub average_lead_score: f64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults_and_bounds() {
        let window = PageQuery::default().window(10, 100).unwrap();
        assert_eq!(window, PageWindow { page: 1, page_size: 10 });
        assert_eq!(window.offset(), 0);

        let third = PageQuery { page: Some(3), page_size: Some(25) }
            .window(10, 100)
            .unwrap();
        assert_eq!(third.offset(), 50);

        assert!(PageQuery { page: Some(0), page_size: None }.window(10, 100).is_err());
        assert!(PageQuery { page: None, page_size: Some(101) }.window(10, 100).is_err());
    }

    #[test]
    fn conversion_rate_rounds() {
        assert_eq!(AgentStats::new(2, 3, 1).conversion_rate, 67);
        assert_eq!(AgentStats::new(0, 0, 0).conversion_rate, 0);
    }

    #[test]
    fn lead_status_parsing_is_case_insensitive() {
        assert_eq!("Qualified".parse::<LeadStatus>().unwrap(), LeadStatus::Qualified);
        assert!("archived".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!("AGENT".parse::<Role>().unwrap(), Role::Agent);
    }
}
