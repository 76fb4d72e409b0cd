use actix_cors::Cors;
use actix_web::web;

use super::handlers;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health checks
        .route("/health", web::get().to(handlers::health_check))
        .route("/ready", web::get().to(handlers::readiness_check))
        .route("/metrics", web::get().to(handlers::metrics_endpoint))

        // API v1
        .service(
            web::scope("/api/v1")
                .wrap(
                    Cors::default()
                        .allowed_origin_fn(|origin, _req_head| {
                            origin.as_bytes().starts_with(b"http://localhost") ||
                            origin.as_bytes().starts_with(b"https://")
                        })
                        .allowed_methods(vec!["GET", "POST", "PUT"])
                        .allowed_headers(vec!["Content-Type", "Authorization", handlers::ISSUER_HEADER])
                        .max_age(3600)
                )
                .service(
                    web::scope("/invoices")
                        .route("", web::post().to(handlers::create_invoice))
                        .route("", web::get().to(handlers::list_invoices))
                        .route("/{id}", web::get().to(handlers::get_invoice))
                        .route("/{id}", web::put().to(handlers::update_invoice))
                        .route("/{id}/pdf", web::get().to(handlers::download_invoice_pdf))
                )
        );
}
