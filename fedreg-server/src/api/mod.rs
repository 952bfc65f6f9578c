//! HTTP API handlers for fedreg-server

pub mod auth;
pub mod diagnosis;
pub mod extract;
pub mod federated_data;
pub mod form;
pub mod health;
pub mod models;

pub use auth::auth_routes;
pub use diagnosis::diagnosis_routes;
pub use extract::{AdminUser, AuthUser};
pub use federated_data::federated_data_routes;
pub use health::health_routes;
pub use models::model_routes;
