use once_cell::sync::Lazy;

/// Secret used for JWT signing. Must be set via the `JWT_SECRET` env variable.
pub static JWT_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"));

/// Secret key used to authenticate against the payment processor's API.
pub static STRIPE_SECRET_KEY: Lazy<String> =
    Lazy::new(|| std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY must be set"));

/// Shared secret used to verify webhook signatures from the payment processor.
pub static STRIPE_WEBHOOK_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET must be set"));

/// Base URL of the payment processor API. Overridable so tests can point at a mock server.
pub static STRIPE_API_BASE: Lazy<String> = Lazy::new(|| {
    std::env::var("STRIPE_API_BASE").unwrap_or_else(|_| "https://api.stripe.com".to_string())
});

/// Where the hosted checkout page redirects the buyer after a successful payment.
pub static CHECKOUT_SUCCESS_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("CHECKOUT_SUCCESS_URL")
        .unwrap_or_else(|_| "https://app.newsworthy.example/checkout/success".to_string())
});

/// Where the hosted checkout page redirects the buyer after cancelling.
pub static CHECKOUT_CANCEL_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("CHECKOUT_CANCEL_URL")
        .unwrap_or_else(|_| "https://app.newsworthy.example/checkout/cancel".to_string())
});

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even if database
/// migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(false)
});
