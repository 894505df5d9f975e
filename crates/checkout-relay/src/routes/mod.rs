pub mod api;
pub mod health;
pub mod views;

use actix_web::web;

/// Mount every route the relay serves.
pub fn configure(cfg: &mut web::ServiceConfig) {
    health::configure(cfg);
    views::configure(cfg);
    api::configure(cfg);
}
