pub mod auth;

pub use auth::{backend_auth_middleware, jwt_auth_middleware};
