//! Postgres storage, one struct per aggregate.

pub mod agent_profiles;
pub mod interactions;
pub mod leads;
pub mod properties;
pub mod update;
pub mod users;

pub use agent_profiles::AgentProfileStorage;
pub use interactions::InteractionStorage;
pub use leads::{LeadStorage, NewLead};
pub use properties::PropertyStorage;
pub use users::{NewUser, UserStorage};

use crate::errors::AppError;

/// Turns a unique-constraint violation into `409 Conflict`.
pub(crate) fn conflict_on_unique(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}
