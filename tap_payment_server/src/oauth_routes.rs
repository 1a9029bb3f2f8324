//----------------------------------------------   OAuth linking  ----------------------------------------------------
//
// The two halves of the account-linking flow. `oauth_start` sends the vendor off to the provider's
// authorization page with a signed state token; `oauth_callback` receives the provider's redirect,
// verifies everything, exchanges the code and persists the merchant link.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use log::*;
use mercado_tools::MercadoConfig;
use tap_payment_engine::{
    helpers::StateTokenCodec,
    traits::{MerchantLinkManagement, PaymentProvider, VendorManagement},
    LinkFlowApi,
    VendorApi,
};

use crate::{
    auth::{login_redirect, SessionClaims},
    config::ServerOptions,
    data_objects::{OAuthCallbackParams, OAuthStartParams},
    errors::ServerError,
    route,
};

/// The original URL of this request (path + query), used as the `return_to` target when the caller has to
/// log in first.
fn original_url(req: &HttpRequest) -> String {
    match req.query_string() {
        "" => req.path().to_string(),
        q => format!("{}?{q}", req.path()),
    }
}

route!(oauth_start => Get "/start" impl VendorManagement);
/// Kick off the account-linking flow for a vendor.
///
/// Preconditions, in order: a `vendorId` query parameter (400 without one); an authenticated session
/// (302 to login otherwise, with this URL as the return target); and the vendor must belong to the caller
/// (403 otherwise). On success the caller is redirected to the provider's authorization page with a
/// freshly minted state token. Nothing is persisted.
pub async fn oauth_start<B>(
    req: HttpRequest,
    params: web::Query<OAuthStartParams>,
    session: Option<SessionClaims>,
    vendors: web::Data<VendorApi<B>>,
    codec: web::Data<StateTokenCodec>,
    provider_config: web::Data<MercadoConfig>,
) -> Result<HttpResponse, ServerError>
where
    B: VendorManagement,
{
    let vendor_id = params
        .into_inner()
        .vendor_id
        .ok_or_else(|| ServerError::InvalidRequestQuery("vendorId is required".to_string()))?;
    let Some(session) = session else {
        debug!("💻️ OAuth start for vendor {vendor_id} without a session. Redirecting to login.");
        return Ok(login_redirect(&original_url(&req)));
    };
    let vendor = vendors.vendor_owned_by(vendor_id, &session.user_id).await?.ok_or_else(|| {
        warn!("💻️ User {} tried to start linking vendor {vendor_id}, which they do not own.", session.user_id);
        ServerError::VendorNotOwned
    })?;
    let state = codec.encode(vendor.id);
    let location = provider_config.authorization_url(&state);
    info!("💻️ Redirecting owner of vendor {vendor_id} to the provider authorization page.");
    Ok(HttpResponse::Found().insert_header((header::LOCATION, location)).finish())
}

route!(oauth_callback => Get "/callback" impl VendorManagement, MerchantLinkManagement, PaymentProvider);
/// Receive the provider's redirect and finish the linking flow.
///
/// The state token is checked *before* anything else that costs money or trust: a forged or expired state
/// is a 400 with no provider call made. The session requirement comes next — the provider redirect
/// arrives in the vendor's browser, so a missing session just bounces through login and back here with
/// the full original query string. Ownership is then re-verified against the vendor id embedded in the
/// state, the code is exchanged, and the merchant link is upserted. Success lands on the dashboard.
pub async fn oauth_callback<BVendor, BLink, P>(
    req: HttpRequest,
    params: web::Query<OAuthCallbackParams>,
    session: Option<SessionClaims>,
    vendors: web::Data<VendorApi<BVendor>>,
    link_flow: web::Data<LinkFlowApi<BLink, P>>,
    codec: web::Data<StateTokenCodec>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    BVendor: VendorManagement,
    BLink: MerchantLinkManagement,
    P: PaymentProvider,
{
    let OAuthCallbackParams { code, state } = params.into_inner();
    let code = code.ok_or_else(|| ServerError::InvalidRequestQuery("code is required".to_string()))?;
    let state = state.ok_or_else(|| ServerError::InvalidRequestQuery("state is required".to_string()))?;
    let state = codec.decode(&state).map_err(|e| {
        warn!("💻️ OAuth callback with a bad state token: {e}");
        ServerError::InvalidStateToken(e.to_string())
    })?;
    let Some(session) = session else {
        debug!("💻️ OAuth callback for vendor {} without a session. Redirecting to login.", state.vendor_id);
        return Ok(login_redirect(&original_url(&req)));
    };
    let vendor = vendors.vendor_owned_by(state.vendor_id, &session.user_id).await?.ok_or_else(|| {
        warn!(
            "💻️ User {} completed an OAuth callback for vendor {}, which they do not own.",
            session.user_id, state.vendor_id
        );
        ServerError::VendorNotOwned
    })?;
    let link = link_flow.complete_link(vendor.id, &code).await.map_err(|e| {
        warn!("💻️ Could not complete the link for vendor {}. {e}", vendor.id);
        ServerError::from(e)
    })?;
    info!("💻️ Vendor {} linked to merchant account {}.", vendor.id, link.external_merchant_id);
    Ok(HttpResponse::Found().insert_header((header::LOCATION, options.dashboard_url())).finish())
}
