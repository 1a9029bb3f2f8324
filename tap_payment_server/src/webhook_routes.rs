//----------------------------------------------   Webhook  ----------------------------------------------------

use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use serde_json::Value;
use tap_payment_engine::{
    traits::{PaymentProvider, PaymentStore},
    ReconciliationApi,
    ReconciliationOutcome,
};

use crate::{
    data_objects::{extract_payment_notice, JsonResponse, WebhookParams},
    route,
};

route!(webhook => Post "/webhook" impl PaymentStore, PaymentProvider);
/// The provider's asynchronous notification channel.
///
/// The signature middleware has already authenticated the delivery by the time this handler runs. From
/// here the rules are: respond 200 to everything that was *handled*, however inconclusive, because any
/// other status makes the provider redeliver; reserve 5xx for genuine internal failures, where a
/// redelivery is exactly what we want. A malformed body is noise, not an error — it is logged and
/// acknowledged as an empty notification.
pub async fn webhook<B, P>(
    req: HttpRequest,
    body: web::Bytes,
    params: web::Query<WebhookParams>,
    api: web::Data<ReconciliationApi<B, P>>,
) -> HttpResponse
where
    B: PaymentStore,
    P: PaymentProvider,
{
    trace!("🔁️ Received webhook request: {}", req.uri());
    let body: Value = if body.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|e| {
            warn!("🔁️ Webhook body is not parseable JSON ({e}). Treating as empty.");
            Value::Object(Default::default())
        })
    };
    let notice = extract_payment_notice(&body, &params);
    debug!("🔁️ Webhook notice: payment_id={:?}, external_reference={:?}", notice.payment_id, notice.external_reference);
    let result = match api.process_notification(notice).await {
        Ok(ReconciliationOutcome::Updated(order)) => {
            info!("🔁️ Order {} is now {}.", order.id, order.status);
            JsonResponse::success(format!("Order {} updated", order.id))
        },
        Ok(ReconciliationOutcome::Conflict { order_id, current, incoming }) => {
            // Deliberately a 200: redelivering a stale notification will never make it applicable.
            warn!("🔁️ Ignored stale transition {current} -> {incoming} for order {order_id}.");
            JsonResponse::success("Stale notification ignored")
        },
        Ok(ReconciliationOutcome::NothingActionable) => JsonResponse::success("Nothing actionable"),
        Ok(ReconciliationOutcome::PaymentUnresolved) => JsonResponse::success("Payment could not be resolved"),
        Ok(ReconciliationOutcome::MissingReference { payment_id }) => {
            JsonResponse::success(format!("Payment {payment_id} carries no order reference"))
        },
        Ok(ReconciliationOutcome::OrderNotFound { reference }) => {
            JsonResponse::success(format!("No order for reference {reference}"))
        },
        Ok(ReconciliationOutcome::UnrecognisedStatus { order_id, status }) => {
            JsonResponse::success(format!("Unrecognised status {status} for order {order_id}"))
        },
        Err(e) => {
            // Internal failure: answer 5xx so the provider redelivers once we are healthy again.
            error!("🔁️ Webhook processing failed. {e}");
            return HttpResponse::InternalServerError().json(JsonResponse::failure("Internal error"));
        },
    };
    HttpResponse::Ok().json(result)
}
