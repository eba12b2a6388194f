//! HTTP handlers and route configuration.

mod answer;
mod health;

use actix_web::web;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .service(
                web::resource("/answer")
                    .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
                    .route(web::post().to(answer::answer))
                    .default_service(web::to(answer::method_not_allowed)),
            ),
    );
}
