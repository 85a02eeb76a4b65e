//! API Module
//!
//! HTTP handlers and routing for the admin REST API.
//!
//! # Endpoints
//! - `GET|DELETE /attr/:object/:attr`, `PUT /attr` - Attribute access
//! - `GET /player/:id`, `PUT /player/:id/money` - Player accounting
//! - `PUT /objects/:id` - Object registration
//! - `POST /admin/sync`, `PUT /admin/write-protect`, `POST /admin/import`
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
