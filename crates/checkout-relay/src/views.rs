//! Server-rendered checkout pages for vaulted customers.

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    VaultedSubscription,
    OneTimeCheckoutVaultedWallet,
}

impl View {
    fn template(&self) -> &'static str {
        match self {
            View::VaultedSubscription => "vaulted_subscription.html",
            View::OneTimeCheckoutVaultedWallet => "one_time_checkout_vaulted_wallet.html",
        }
    }
}

/// Values the browser SDK needs to render buttons for a vaulted customer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPage<'a> {
    pub client_id: &'a str,
    pub user_id_token: &'a str,
    pub customer_id_query_param: &'a str,
}

/// Compiled page templates. `.html` names keep tera's autoescaping on.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, RelayError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (
                View::VaultedSubscription.template(),
                include_str!("../templates/vaulted_subscription.html"),
            ),
            (
                View::OneTimeCheckoutVaultedWallet.template(),
                include_str!("../templates/one_time_checkout_vaulted_wallet.html"),
            ),
        ])?;
        Ok(Self { tera })
    }

    pub fn render(&self, view: View, page: &CheckoutPage<'_>) -> Result<String, RelayError> {
        let context = Context::from_serialize(page)?;
        Ok(self.tera.render(view.template(), &context)?)
    }
}
