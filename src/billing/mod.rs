pub mod api;
pub mod checkout;
pub mod ledger;
pub mod models;
pub mod reconciler;
pub mod stripe;

pub use api::{start_checkout, my_credits, StartCheckoutRequest, StartCheckoutResponse};
pub use checkout::{CheckoutService, CheckoutStarted};
pub use ledger::BrandCreditLedger;
pub use models::{
    BrandCredit, CartItem, CartSession, CartTransaction, Product, UserSubscription,
};
pub use reconciler::{payment_webhook, ReconcileOutcome, Reconciler, WebhookAck};
pub use stripe::{CheckoutLineItem, HostedCheckout, StripeGateway};
