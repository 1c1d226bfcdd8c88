// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod auth_handler {
    pub use crate::auth_handler::*;
}

pub mod admin_handler {
    pub use crate::admin_handler::*;
}

pub mod agent_handler {
    pub use crate::agent_handler::*;
}

pub mod routes {
    pub use crate::routes::*;
}
