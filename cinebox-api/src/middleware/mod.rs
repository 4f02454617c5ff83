pub mod auth;
pub mod resiliency;

pub use auth::MemberClaims;
pub use resiliency::{circuit_breaker_middleware, CircuitBreaker, ResiliencyState};
