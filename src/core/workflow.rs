//! Approval workflow - Submitting orders and acting on them.
//!
//! This is the only place that combines classification, routing, the order
//! lifecycle and message synchronization. Handlers in the bot layer collect
//! input and hand it over here; everything they show afterwards is derived
//! from the returned [`Outcome`] or error.

use crate::{
    config::AppConfig,
    core::{
        chat::{ChatClient, IncomingAttachment, Verdict},
        directory::{self, require_chain, require_role, require_user},
        escalation::order_level,
        exchange::RateSource,
        file::{discard, download_all, files_for_order, purge_order_files, record_files},
        order::{self, NewOrder, ensure_actionable, require_order},
        routing::{APPROVED_STEP, INITIAL_STEP, next_step},
        settings,
        sync::{OrderView, Participant, finalize, publish, relocate},
    },
    entities::{ChainModel, Currency, OrderModel, OrderState, Role, UserModel},
    errors::{Error, Result},
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{error, info, instrument, warn};

/// Rationale stored on orders that could not be delivered at submission.
pub const DELIVERY_FAILED_REPLY: &str = "delivery failed";

/// Order fields collected from the initiator.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub description: String,
    pub currency: Currency,
    pub amount: f64,
}

/// Where an order ended up after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Waiting on the inspector at `step`
    InReview { step: i32 },
    /// Chain complete, waiting on a payeer
    AwaitingPayment,
    Approved,
    Rejected,
    Paid,
}

impl Outcome {
    /// Confirmation shown to whoever acted.
    #[must_use]
    pub fn describe(self, order_id: i64) -> String {
        match self {
            Self::InReview { step } => {
                format!("✅ Order #{order_id} was sent to inspector {step}.")
            }
            Self::AwaitingPayment => format!("✅ Order #{order_id} was sent for payment."),
            Self::Approved => format!("✅ Order #{order_id} is approved."),
            Self::Rejected => format!("❌ Order #{order_id} was rejected."),
            Self::Paid => format!("💰 Order #{order_id} is marked as paid."),
        }
    }
}

/// Everything the workflow talks to.
#[derive(Clone, Copy)]
pub struct Workflow<'a> {
    pub db: &'a DatabaseConnection,
    pub chat: &'a dyn ChatClient,
    pub rates: &'a dyn RateSource,
    pub config: &'a AppConfig,
}

impl Workflow<'_> {
    /// Submits a new order on behalf of `initiator_discord_id`.
    ///
    /// The order is classified, routed, stored together with its downloaded
    /// attachments and posted. Nothing is persisted when the initiator is not
    /// allowed to submit or has no chain. If the posts fail after the order
    /// was stored, the order is canceled and its attachments purged.
    #[instrument(skip(self, submission, attachments), fields(attachments = attachments.len()))]
    pub async fn submit(
        &self,
        initiator_discord_id: &str,
        submission: Submission,
        attachments: &[IncomingAttachment],
    ) -> Result<(OrderModel, Outcome)> {
        let initiator = require_user(self.db, initiator_discord_id).await?;
        require_role(self.db, initiator.id, Role::Initiator).await?;
        let description = order::validate_description(&submission.description)?;
        let chain = require_chain(self.db, initiator.id).await?;

        let bands = settings::get_bands(self.db, &self.config.escalation).await?;
        let level = order_level(
            self.rates,
            self.config.exchange.fallback_rate,
            &bands,
            submission.amount,
            submission.currency,
        )
        .await?;
        let step = next_step(INITIAL_STEP, level, &chain.slots());

        let stored = download_all(self.chat, &self.config.storage.files_dir, attachments).await?;
        let persisted = async {
            let txn = self.db.begin().await?;
            let order = order::create_order(
                &txn,
                NewOrder {
                    initiator_id: initiator.id,
                    description,
                    amount: submission.amount,
                    currency: submission.currency,
                    level,
                    step,
                },
            )
            .await?;
            let files = record_files(&txn, order.id, &stored).await?;
            txn.commit().await?;
            Ok::<_, Error>((order, files))
        }
        .await;
        let (order, files) = match persisted {
            Ok(persisted) => persisted,
            Err(e) => {
                discard(&stored).await;
                return Err(e);
            }
        };

        let view = OrderView {
            order: &order,
            files: &files,
            initiator: &initiator,
        };
        match self.deliver_new(&view, &chain).await {
            Ok(outcome) => {
                let order = require_order(self.db, order.id).await?;
                Ok((order, outcome))
            }
            Err(e) => {
                self.compensate(&order).await;
                Err(e)
            }
        }
    }

    async fn deliver_new(&self, view: &OrderView<'_>, chain: &ChainModel) -> Result<Outcome> {
        let order = view.order;
        if order.step != APPROVED_STEP {
            let inspector = self.inspector(chain, order.step).await?;
            publish(self.db, self.chat, view, &Participant::inspector(&inspector)).await?;
            return Ok(Outcome::InReview { step: order.step });
        }

        warn!(
            order_id = order.id,
            initiator_id = order.initiator_id,
            level = order.level,
            "No inspector assigned within the order's tier, skipping review"
        );
        match settings::get_payeer_chat(self.db).await? {
            Some(payeer_chat) => {
                publish(self.db, self.chat, view, &Participant::payeer(&payeer_chat)).await?;
                Ok(Outcome::AwaitingPayment)
            }
            None => {
                finalize(self.db, self.chat, view, OrderState::Success, None).await?;
                Ok(Outcome::Approved)
            }
        }
    }

    /// Cancels an order whose first posts failed and drops its attachments.
    async fn compensate(&self, order: &OrderModel) {
        warn!(order_id = order.id, "Order could not be delivered, canceling it");
        if let Err(e) = order::finish_order(
            self.db,
            order.id,
            order.step,
            OrderState::Canceled,
            Some(DELIVERY_FAILED_REPLY.to_string()),
        )
        .await
        {
            error!(order_id = order.id, error = %e, "Failed to cancel undelivered order");
        }
        if let Err(e) = purge_order_files(self.db, order.id).await {
            error!(order_id = order.id, error = %e, "Failed to purge undelivered order files");
        }
    }

    /// Checks that `actor_discord_id` may decide `order_id` at `expected_step`.
    ///
    /// Steps 1-4 may only be decided by the inspector bound to that slot, the
    /// payment stage only by a payeer. Returns the actor and the order.
    pub async fn authorize(
        &self,
        actor_discord_id: &str,
        order_id: i64,
        expected_step: i32,
    ) -> Result<(UserModel, OrderModel)> {
        let actor = require_user(self.db, actor_discord_id).await?;
        let order = require_order(self.db, order_id).await?;
        ensure_actionable(&order, expected_step)?;

        if expected_step == APPROVED_STEP {
            require_role(self.db, actor.id, Role::Payeer).await?;
        } else {
            let chain = require_chain(self.db, order.initiator_id).await?;
            if chain.inspector_at(expected_step) != Some(actor.id) {
                return Err(Error::PermissionDenied {
                    message: format!("Order #{order_id} is assigned to another inspector."),
                });
            }
        }
        Ok((actor, order))
    }

    /// Applies a decision by `actor_discord_id` on `order_id` at `expected_step`.
    ///
    /// `text` is the optional approval note or the mandatory rejection reason.
    /// Nothing is posted or stored when the actor is not [authorized](Self::authorize)
    /// or the text is too long.
    #[instrument(skip(self, text))]
    pub async fn review(
        &self,
        actor_discord_id: &str,
        order_id: i64,
        expected_step: i32,
        verdict: Verdict,
        text: Option<&str>,
    ) -> Result<Outcome> {
        let (actor, order) = self
            .authorize(actor_discord_id, order_id, expected_step)
            .await?;
        let text = order::validate_reply(text)?;

        let initiator = directory::get_user_by_id(self.db, order.initiator_id)
            .await?
            .ok_or_else(|| Error::UserNotFound {
                user: order.initiator_id.to_string(),
            })?;
        let files = files_for_order(self.db, order.id).await?;
        let view = OrderView {
            order: &order,
            files: &files,
            initiator: &initiator,
        };

        if expected_step == APPROVED_STEP {
            return self.settle(&actor, &view, verdict, text).await;
        }

        let chain = require_chain(self.db, order.initiator_id).await?;
        match verdict {
            Verdict::Reject => {
                let reason = text.ok_or(Error::ReasonRequired)?;
                finalize(self.db, self.chat, &view, OrderState::Canceled, Some(reason)).await?;
                Ok(Outcome::Rejected)
            }
            Verdict::Approve => {
                let next = next_step(order.step, order.level, &chain.slots());
                if next == APPROVED_STEP {
                    return self.complete_chain(&view, text).await;
                }
                if text.is_some() {
                    return Err(Error::NoteNotAllowed);
                }
                let inspector = self.inspector(&chain, next).await?;
                relocate(
                    self.db,
                    self.chat,
                    &view,
                    &Participant::inspector(&inspector),
                    next,
                    None,
                )
                .await?;
                Ok(Outcome::InReview { step: next })
            }
        }
    }

    /// The last inspector approved: hand over to the payeers or finish.
    async fn complete_chain(&self, view: &OrderView<'_>, note: Option<String>) -> Result<Outcome> {
        match settings::get_payeer_chat(self.db).await? {
            Some(payeer_chat) => {
                relocate(
                    self.db,
                    self.chat,
                    view,
                    &Participant::payeer(&payeer_chat),
                    APPROVED_STEP,
                    note,
                )
                .await?;
                Ok(Outcome::AwaitingPayment)
            }
            None => {
                finalize(self.db, self.chat, view, OrderState::Success, note).await?;
                Ok(Outcome::Approved)
            }
        }
    }

    /// Payment stage decision by an authorized payeer.
    async fn settle(
        &self,
        actor: &UserModel,
        view: &OrderView<'_>,
        verdict: Verdict,
        text: Option<String>,
    ) -> Result<Outcome> {
        match verdict {
            Verdict::Approve => {
                let note = text.or_else(|| view.order.reply.clone());
                finalize(self.db, self.chat, view, OrderState::Paid, note).await?;
                info!(order_id = view.order.id, payeer_id = actor.id, "Order paid");
                Ok(Outcome::Paid)
            }
            Verdict::Reject => {
                let reason = text.ok_or(Error::ReasonRequired)?;
                finalize(self.db, self.chat, view, OrderState::Canceled, Some(reason)).await?;
                Ok(Outcome::Rejected)
            }
        }
    }

    async fn inspector(&self, chain: &ChainModel, step: i32) -> Result<UserModel> {
        directory::inspector_for_step(self.db, chain, step)
            .await?
            .ok_or_else(|| Error::UserNotFound {
                user: format!("inspector for step {step}"),
            })
    }
}
