//! External service integrations.

pub mod identity {
    pub use crate::identity::*;
}

pub mod circuit_breaker {
    pub use crate::circuit_breaker::*;
}
