use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::RelayError;
use crate::metrics::RELAY_FAILURES_TOTAL;
use crate::state::AppState;
use crate::views::{CheckoutPage, View};

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    #[serde(rename = "customerID")]
    pub customer_id: Option<String>,
}

/// Mint an identity token for the customer and render `view` with it.
async fn render_for_customer(
    state: &AppState,
    view: View,
    customer_id: &str,
) -> Result<String, RelayError> {
    let id_token = state.gateway.tokens().identity_token(customer_id).await?;
    // identity_token would have failed without a client id
    let client_id = state
        .config
        .credentials
        .client_id()
        .ok_or(RelayError::Configuration("PAYPAL_CLIENT_ID"))?;

    state.views.render(
        view,
        &CheckoutPage {
            client_id,
            user_id_token: &id_token,
            customer_id_query_param: customer_id,
        },
    )
}

async fn serve_view(
    state: &AppState,
    query: CustomerQuery,
    view: View,
    endpoint: &'static str,
    failure_message: &'static str,
) -> HttpResponse {
    let Some(customer_id) = query.customer_id.filter(|id| !id.trim().is_empty()) else {
        return HttpResponse::BadRequest()
            .content_type("text/plain; charset=utf-8")
            .body("Missing customerID query parameter.");
    };

    match render_for_customer(state, view, &customer_id).await {
        Ok(html) => {
            tracing::info!(endpoint, "issued identity token for vaulted customer");
            HttpResponse::Ok()
                .content_type("text/html; charset=utf-8")
                .body(html)
        }
        Err(e) => {
            tracing::error!(endpoint, kind = e.kind(), error = %e, "{}", failure_message);
            RELAY_FAILURES_TOTAL
                .with_label_values(&[endpoint, e.kind()])
                .inc();
            HttpResponse::InternalServerError()
                .content_type("text/plain; charset=utf-8")
                .body(failure_message)
        }
    }
}

/// GET /vaultedSubscription?customerID=
pub async fn vaulted_subscription(
    state: web::Data<AppState>,
    query: web::Query<CustomerQuery>,
) -> HttpResponse {
    serve_view(
        &state,
        query.into_inner(),
        View::VaultedSubscription,
        "vaulted_subscription",
        "Failed to load vaulted subscription.",
    )
    .await
}

/// GET /oneTimeCheckoutVaultedWallet?customerID=
pub async fn one_time_checkout_vaulted_wallet(
    state: web::Data<AppState>,
    query: web::Query<CustomerQuery>,
) -> HttpResponse {
    serve_view(
        &state,
        query.into_inner(),
        View::OneTimeCheckoutVaultedWallet,
        "one_time_checkout_vaulted_wallet",
        "Failed to load vaulted wallet checkout.",
    )
    .await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/vaultedSubscription", web::get().to(vaulted_subscription))
        .route(
            "/oneTimeCheckoutVaultedWallet",
            web::get().to(one_time_checkout_vaulted_wallet),
        );
}
