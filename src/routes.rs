use axum::{
    routing::{get, post},
    Router,
};

use crate::{auth, billing, catalog, companies, contacts, editorial, releases};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/register", post(auth::register_user))
        .route("/api/login", post(auth::login_user))
        .route("/api/logout", post(auth::logout_user))
        .route("/api/me", get(auth::current_user))
        .route("/api/me/credits", get(billing::my_credits))
        .route(
            "/api/products",
            get(catalog::list_products).put(catalog::create_product),
        )
        .route(
            "/api/products/:id",
            post(catalog::update_product).delete(catalog::delete_product),
        )
        .route("/api/checkout", post(billing::start_checkout))
        .route("/api/webhooks/payment", post(billing::payment_webhook))
        .route(
            "/api/companies",
            get(companies::list_companies).post(companies::create_company),
        )
        .route(
            "/api/companies/:id",
            get(companies::get_company)
                .post(companies::update_company)
                .delete(companies::delete_company),
        )
        .route("/api/companies/:id/credits", get(companies::company_credits))
        .route(
            "/api/companies/:id/contacts",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route(
            "/api/companies/:id/contacts/:contact_id",
            post(contacts::update_contact).delete(contacts::delete_contact),
        )
        .route(
            "/api/releases",
            get(releases::list_releases).post(releases::create_release),
        )
        .route(
            "/api/releases/:id",
            get(releases::get_release)
                .put(releases::update_release)
                .delete(releases::delete_release),
        )
        .route("/api/releases/:id/submit", post(releases::submit_release))
        .route("/api/releases/:id/retract", post(releases::retract_release))
        .route("/api/editorial/queue", get(editorial::list_queue))
        .route(
            "/api/editorial/queue/:id/checkout",
            post(editorial::checkout_entry),
        )
        .route("/api/editorial/review", post(editorial::review_release))
}
