use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::{order, payment_transaction};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::notifications::NotificationService;
use crate::services::orders::{OrderStatus, PaymentState};
use crate::services::tickets::TicketService;
use crate::{ListQuery, Paginated};

/// Transaction lifecycle: Pending until the provider reports back, then one
/// of the two terminal states. Callback strings are matched
/// case-insensitively.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InitiatePaymentRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 32, message = "Provider is required"))]
    pub provider: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitiatePaymentResponse {
    pub transaction_id: Uuid,
    pub provider: String,
    pub provider_ref: String,
    pub amount: Decimal,
    pub currency: String,
    pub redirect_url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentCallbackRequest {
    pub provider_ref: String,
    /// "Success" or "Failed", case-insensitive
    pub status: String,
    pub amount: Option<Decimal>,
    pub raw_payload: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CallbackResponse {
    pub provider_ref: String,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentSummary {
    pub id: Uuid,
    pub provider: String,
    pub provider_ref: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub order_code: Option<String>,
}

/// Payment workflow: transaction initiation against the simulated provider
/// and one-way, idempotent callback settlement.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DbPool>,
    events: EventSender,
    tickets: Arc<TicketService>,
    notifications: Arc<NotificationService>,
    currency: String,
    redirect_base: String,
}

impl PaymentService {
    pub fn new(
        db: Arc<DbPool>,
        events: EventSender,
        tickets: Arc<TicketService>,
        notifications: Arc<NotificationService>,
        cfg: &AppConfig,
    ) -> Self {
        Self {
            db,
            events,
            tickets,
            notifications,
            currency: cfg.payment_currency.clone(),
            redirect_base: cfg.payment_redirect_base.clone(),
        }
    }

    /// Create a Pending transaction for an unpaid order owned by the caller
    /// and hand back the provider redirect target.
    ///
    /// Deliberately not idempotent: every call is a fresh payment attempt
    /// with its own provider reference.
    #[instrument(skip(self, req), fields(user_id = %user_id, order_id = %req.order_id))]
    pub async fn initiate(
        &self,
        user_id: Uuid,
        req: InitiatePaymentRequest,
    ) -> Result<InitiatePaymentResponse, ServiceError> {
        req.validate()?;

        let found = order::Entity::find_by_id(req.order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if found.payment_status == PaymentState::Paid.to_string() {
            return Err(ServiceError::Conflict("Order already paid".to_string()));
        }

        let now = Utc::now();
        let provider_ref = format!(
            "{}-{}-{}",
            req.provider,
            now.format("%Y%m%d%H%M%S%3f"),
            found.id.simple()
        );
        let amount = found.total_amount;

        let redirect_url = build_redirect_url(
            &self.redirect_base,
            &req.provider,
            &provider_ref,
            amount,
        )?;

        let tx = payment_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(found.id),
            provider: Set(req.provider.clone()),
            provider_ref: Set(provider_ref.clone()),
            amount: Set(amount),
            currency: Set(self.currency.clone()),
            status: Set(TxStatus::Pending.to_string()),
            raw_payload: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db)
        .await?;

        info!(transaction_id = %tx.id, provider_ref = %tx.provider_ref, "payment initiated");
        self.events
            .publish(Event::PaymentInitiated {
                transaction_id: tx.id,
                order_id: found.id,
                provider_ref: tx.provider_ref.clone(),
            })
            .await;

        Ok(InitiatePaymentResponse {
            transaction_id: tx.id,
            provider: tx.provider,
            provider_ref: tx.provider_ref,
            amount,
            currency: tx.currency,
            redirect_url,
        })
    }

    /// Settle a transaction from a provider callback.
    ///
    /// The transition is one-way and idempotent: a transaction already in
    /// the delivered terminal state acknowledges the replay without
    /// touching anything, a callback trying to move it to the *other*
    /// terminal state is a conflict, and concurrent deliveries are
    /// serialized by a status-guarded update. On success the linked order
    /// flips to Paid (once), tickets are issued exactly once per item, and
    /// the owner is notified.
    #[instrument(skip(self, req), fields(provider_ref = %req.provider_ref))]
    pub async fn process_callback(
        &self,
        req: PaymentCallbackRequest,
    ) -> Result<CallbackResponse, ServiceError> {
        let target: TxStatus = req.status.parse().map_err(|_| {
            ServiceError::ValidationError(format!("Unknown callback status: {}", req.status))
        })?;
        if !target.is_terminal() {
            return Err(ServiceError::ValidationError(
                "Callback status must be Success or Failed".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let tx = payment_transaction::Entity::find()
            .filter(payment_transaction::Column::ProviderRef.eq(req.provider_ref.as_str()))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Transaction not found".to_string()))?;

        if let Some(reported) = req.amount {
            if reported != tx.amount {
                warn!(
                    transaction_id = %tx.id,
                    expected = %tx.amount,
                    reported = %reported,
                    "callback amount differs from transaction amount"
                );
            }
        }

        if tx.status != TxStatus::Pending.to_string() {
            return terminal_outcome(&tx.status, target, req.provider_ref);
        }

        let now = Utc::now();
        let updated = payment_transaction::Entity::update_many()
            .col_expr(
                payment_transaction::Column::Status,
                Expr::value(target.to_string()),
            )
            .col_expr(
                payment_transaction::Column::RawPayload,
                Expr::value(req.raw_payload.clone()),
            )
            .col_expr(payment_transaction::Column::UpdatedAt, Expr::value(now))
            .filter(payment_transaction::Column::Id.eq(tx.id))
            .filter(payment_transaction::Column::Status.eq(TxStatus::Pending.to_string()))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            // A concurrent delivery settled this transaction first.
            let current = payment_transaction::Entity::find_by_id(tx.id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Transaction not found".to_string()))?;
            return terminal_outcome(&current.status, target, req.provider_ref);
        }

        let mut issued = 0;
        if target == TxStatus::Success {
            let settled = order::Entity::update_many()
                .col_expr(
                    order::Column::PaymentStatus,
                    Expr::value(PaymentState::Paid.to_string()),
                )
                .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid.to_string()))
                .col_expr(order::Column::PaidAt, Expr::value(now))
                .col_expr(order::Column::UpdatedAt, Expr::value(now))
                .col_expr(order::Column::Version, Expr::col(order::Column::Version).add(1))
                .filter(order::Column::Id.eq(tx.order_id))
                .filter(order::Column::PaymentStatus.ne(PaymentState::Paid.to_string()))
                .exec(&txn)
                .await?;

            issued = self.tickets.issue_for_order(&txn, tx.order_id).await?;

            if settled.rows_affected > 0 {
                let paid_order = order::Entity::find_by_id(tx.order_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
                self.notifications
                    .create_on(
                        &txn,
                        paid_order.user_id,
                        "Payment",
                        "Payment received",
                        format!("Order {} has been paid", paid_order.order_code),
                    )
                    .await?;
            }
        }

        txn.commit().await?;

        info!(transaction_id = %tx.id, status = %target, "payment callback processed");
        self.events
            .publish(Event::PaymentSettled {
                transaction_id: tx.id,
                order_id: tx.order_id,
                succeeded: target == TxStatus::Success,
            })
            .await;
        if issued > 0 {
            self.events
                .publish(Event::TicketsIssued {
                    order_id: tx.order_id,
                    count: issued,
                })
                .await;
        }

        Ok(CallbackResponse {
            provider_ref: req.provider_ref,
            status: target.to_string(),
        })
    }

    pub async fn my_payments(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<Paginated<PaymentSummary>, ServiceError> {
        let (page, page_size) = query.clamp();

        let paginator = payment_transaction::Entity::find()
            .find_also_related(order::Entity)
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(payment_transaction::Column::CreatedAt)
            .paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let data = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(|(t, o)| PaymentSummary {
                id: t.id,
                provider: t.provider,
                provider_ref: t.provider_ref,
                amount: t.amount,
                currency: t.currency,
                status: t.status,
                created_at: t.created_at,
                order_code: o.map(|o| o.order_code),
            })
            .collect();

        Ok(Paginated::new(total, page, page_size, data))
    }
}

/// Replay of the same terminal outcome is acknowledged; an attempt to move a
/// settled transaction to a different terminal state is refused.
fn terminal_outcome(
    current: &str,
    target: TxStatus,
    provider_ref: String,
) -> Result<CallbackResponse, ServiceError> {
    if current.eq_ignore_ascii_case(&target.to_string()) {
        info!(%provider_ref, status = %target, "duplicate callback acknowledged");
        Ok(CallbackResponse {
            provider_ref,
            status: target.to_string(),
        })
    } else {
        Err(ServiceError::Conflict(format!(
            "Transaction already settled as {current}"
        )))
    }
}

fn build_redirect_url(
    base: &str,
    provider: &str,
    provider_ref: &str,
    amount: Decimal,
) -> Result<String, ServiceError> {
    let url = Url::parse_with_params(
        &format!("{}/{}/pay", base.trim_end_matches('/'), provider),
        &[("ref", provider_ref), ("amount", &amount.to_string())],
    )
    .map_err(|_| ServiceError::ValidationError("Invalid payment provider".to_string()))?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn callback_status_parses_case_insensitively() {
        assert_eq!("success".parse::<TxStatus>().unwrap(), TxStatus::Success);
        assert_eq!("FAILED".parse::<TxStatus>().unwrap(), TxStatus::Failed);
        assert!("paid".parse::<TxStatus>().is_err());
    }

    #[test]
    fn redirect_url_escapes_the_provider_ref() {
        let url = build_redirect_url(
            "https://sandbox-pay.example.com",
            "Momo",
            "Momo-20250101-abc",
            dec!(200000),
        )
        .unwrap();
        assert!(url.starts_with("https://sandbox-pay.example.com/Momo/pay?"));
        assert!(url.contains("ref=Momo-20250101-abc"));
        assert!(url.contains("amount=200000"));
    }

    #[test]
    fn replayed_terminal_outcome_is_acknowledged() {
        let out = terminal_outcome("Success", TxStatus::Success, "ref-1".into()).unwrap();
        assert_eq!(out.status, "Success");
    }

    #[test]
    fn conflicting_terminal_outcome_is_refused() {
        let err = terminal_outcome("Success", TxStatus::Failed, "ref-1".into()).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}
