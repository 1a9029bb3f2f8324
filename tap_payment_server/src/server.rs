use std::{net::IpAddr, str::FromStr, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::{future::ok, FutureExt};
use log::{info, warn};
use mercado_tools::MercadoApi;
use tap_payment_engine::{
    helpers::StateTokenCodec,
    CheckoutApi,
    CheckoutSettings,
    CredentialApi,
    LinkFlowApi,
    ReconciliationApi,
    SqliteDatabase,
    VendorApi,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::MercadoProvider,
    middleware::{SignatureMiddlewareFactory, SIGNATURE_HEADER},
    oauth_routes::{OauthCallbackRoute, OauthStartRoute},
    routes::{health, CheckoutRoute},
    webhook_routes::WebhookRoute,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let api_client =
        MercadoApi::new(config.mercado.api.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let provider = MercadoProvider::new(api_client);
    // The service APIs are constructed once, before the worker factory, and shared across all workers.
    // This matters for `CredentialApi`: its per-vendor refresh locks only serialize refreshes if every
    // worker sees the same lock map.
    let credentials = CredentialApi::new(db.clone(), provider.clone());
    let vendor_api = web::Data::new(VendorApi::new(db.clone()));
    let link_flow_api = web::Data::new(LinkFlowApi::new(db.clone(), provider.clone()));
    let reconciliation_api = web::Data::new(ReconciliationApi::new(
        credentials.clone(),
        config.mercado.fallback_access_token.clone(),
    ));
    let checkout_settings =
        CheckoutSettings { fee_percent: config.mercado.marketplace_fee_percent, ..Default::default() };
    let checkout_api = web::Data::new(CheckoutApi::new(credentials, checkout_settings));
    let state_codec = web::Data::new(StateTokenCodec::with_default_max_age(config.mercado.state_secret.clone()));
    let auth_config = web::Data::new(config.auth.clone());
    let server_options = web::Data::new(ServerOptions::from_config(&config));
    let provider_config = web::Data::new(config.mercado.api.clone());

    let use_x_forwarded_for = config.use_x_forwarded_for;
    let use_forwarded = config.use_forwarded;
    let webhook_whitelist = config.mercado.whitelist.clone();
    let webhook_secret = config.mercado.webhook_secret.clone();
    let webhook_checks = config.mercado.webhook_checks;

    let srv = HttpServer::new(move || {
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tap::access_log"))
            .app_data(vendor_api.clone())
            .app_data(link_flow_api.clone())
            .app_data(reconciliation_api.clone())
            .app_data(checkout_api.clone())
            .app_data(state_codec.clone())
            .app_data(auth_config.clone())
            .app_data(server_options.clone())
            .app_data(provider_config.clone());
        let oauth_scope = web::scope("/oauth")
            .service(OauthStartRoute::<SqliteDatabase>::new())
            .service(OauthCallbackRoute::<SqliteDatabase, SqliteDatabase, MercadoProvider>::new());
        let whitelist = webhook_whitelist.clone();
        let webhook_scope = web::scope("/mp")
            .wrap(SignatureMiddlewareFactory::new(SIGNATURE_HEADER, webhook_secret.clone(), webhook_checks))
            .wrap_fn(move |req, srv| {
                // Collect the peer IP from the X-Forwarded-For or Forwarded headers _if_ the matching
                // `use_nnn` flag has been set in the configuration. Otherwise, use the peer address from
                // the connection info.
                let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
                let peer_ip = req
                    .headers()
                    .get("X-Forwarded-For")
                    .and_then(|v| use_x_forwarded_for.then(|| v.to_str().ok()).flatten())
                    .or_else(|| {
                        req.headers().get("Forwarded").and_then(|v| use_forwarded.then(|| v.to_str().ok()).flatten())
                    })
                    .or_else(|| peer_addr.as_deref())
                    .and_then(|s| s.split(',').next())
                    .and_then(|s| IpAddr::from_str(s.trim()).ok());
                let whitelisted = match (peer_ip, &whitelist) {
                    (Some(ip), Some(whitelist)) => {
                        info!("Webhook delivery from {ip}");
                        whitelist.contains(&ip)
                    },
                    (_, None) => true,
                    (None, Some(_)) => {
                        warn!("No IP address found in webhook request, denying access.");
                        false
                    },
                };
                if whitelisted {
                    srv.call(req).boxed_local()
                } else {
                    ok(req.error_response(ServerError::ForbiddenPeer)).boxed_local()
                }
            })
            .service(WebhookRoute::<SqliteDatabase, MercadoProvider>::new());
        let api_scope = web::scope("/api").service(CheckoutRoute::<SqliteDatabase, MercadoProvider>::new());
        app.service(health).service(oauth_scope).service(webhook_scope).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
