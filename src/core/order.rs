//! Order lifecycle - Creating orders and moving them between states.
//!
//! Every mutation after creation is a guarded update: it only applies while
//! the order is still `PENDING` at the step the caller saw. A transition that
//! matches no row means someone else already acted on the order, and is
//! reported as `StaleAction` without touching anything.

use crate::{
    core::routing::{APPROVED_STEP, INITIAL_STEP},
    core::escalation::TIER_COUNT,
    entities::{Currency, Order, OrderState, order},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 700;

/// Longest note or rejection reason accepted. With a full description the
/// status caption still fits in a 2000 character Discord message.
pub const MAX_REPLY_CHARS: usize = 1000;

/// Validated input for a new order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub initiator_id: i64,
    pub description: String,
    pub amount: f64,
    pub currency: Currency,
    pub level: i32,
    pub step: i32,
}

/// Checks a description against the length limit and trims it.
pub fn validate_description(description: &str) -> Result<String> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidDescription {
            message: "The description cannot be empty.".to_string(),
        });
    }
    let length = trimmed.chars().count();
    if length > MAX_DESCRIPTION_CHARS {
        return Err(Error::InvalidDescription {
            message: format!(
                "The description is {length} characters long; the limit is {MAX_DESCRIPTION_CHARS}."
            ),
        });
    }
    Ok(trimmed.to_string())
}

/// Trims a note or rejection reason. Blank text counts as no text.
pub fn validate_reply(text: Option<&str>) -> Result<Option<String>> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let length = text.chars().count();
    if length > MAX_REPLY_CHARS {
        return Err(Error::ReplyTooLong {
            length,
            limit: MAX_REPLY_CHARS,
        });
    }
    Ok(Some(text.to_string()))
}

/// Parses a user-typed amount; a comma is accepted as the decimal separator.
pub fn parse_amount(input: &str) -> Result<f64> {
    let normalized = input.trim().replace(',', ".");
    let amount: f64 = normalized
        .parse()
        .map_err(|_| Error::InvalidAmount { amount: f64::NAN })?;
    validate_amount(amount)?;
    Ok(amount)
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Inserts a new order in the `PENDING` state.
///
/// `CREATED` is never written: the order becomes visible to the workflow
/// only once it is pending.
pub async fn create_order<C>(db: &C, new_order: NewOrder) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    let description = validate_description(&new_order.description)?;
    validate_amount(new_order.amount)?;
    if !(1..=TIER_COUNT).contains(&new_order.level) {
        return Err(Error::Config {
            message: format!("Order level {} is outside 1..={TIER_COUNT}", new_order.level),
        });
    }
    if !(INITIAL_STEP + 1..=APPROVED_STEP).contains(&new_order.step) {
        return Err(Error::Config {
            message: format!("Initial step {} is not a routed step", new_order.step),
        });
    }

    let model = order::ActiveModel {
        level: Set(new_order.level),
        step: Set(new_order.step),
        state: Set(OrderState::Pending),
        initiator_id: Set(new_order.initiator_id),
        description: Set(description),
        amount: Set(new_order.amount),
        currency: Set(new_order.currency),
        reply: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        order_id = model.id,
        level = model.level,
        step = model.step,
        "Order created"
    );
    Ok(model)
}

/// Retrieves an order by id.
pub async fn get_order_by_id<C>(db: &C, order_id: i64) -> Result<Option<order::Model>>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id).one(db).await.map_err(Into::into)
}

/// Like [`get_order_by_id`], but a missing order is an error.
pub async fn require_order<C>(db: &C, order_id: i64) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    get_order_by_id(db, order_id)
        .await?
        .ok_or(Error::OrderNotFound { order_id })
}

/// Most recent orders of an initiator, newest first.
pub async fn get_orders_for_initiator<C>(
    db: &C,
    initiator_id: i64,
    limit: u64,
) -> Result<Vec<order::Model>>
where
    C: ConnectionTrait,
{
    Order::find()
        .filter(order::Column::InitiatorId.eq(initiator_id))
        .order_by_desc(order::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Fails with `StaleAction` unless the order is pending at `expected_step`.
pub fn ensure_actionable(order: &order::Model, expected_step: i32) -> Result<()> {
    if order.state.is_terminal() || order.step != expected_step {
        debug!(
            order_id = order.id,
            state = ?order.state,
            step = order.step,
            expected_step,
            "Rejecting stale action"
        );
        return Err(Error::StaleAction { order_id: order.id });
    }
    Ok(())
}

/// Moves a pending order from `expected_step` to `new_step`.
///
/// A `note` is stored as the order's reply; `None` leaves the reply as it is.
pub async fn advance_step<C>(
    db: &C,
    order_id: i64,
    expected_step: i32,
    new_step: i32,
    note: Option<String>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if new_step <= expected_step || new_step > APPROVED_STEP {
        return Err(Error::Config {
            message: format!("Cannot move order from step {expected_step} to {new_step}"),
        });
    }
    let mut update = Order::update_many()
        .col_expr(order::Column::Step, Expr::value(new_step))
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()));
    if let Some(note) = note {
        update = update.col_expr(order::Column::Reply, Expr::value(note));
    }
    let result = update
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Step.eq(expected_step))
        .filter(order::Column::State.eq(OrderState::Pending))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::StaleAction { order_id });
    }
    info!(order_id, from = expected_step, to = new_step, "Order advanced");
    Ok(())
}

/// Moves a pending order at `expected_step` into a terminal state.
pub async fn finish_order<C>(
    db: &C,
    order_id: i64,
    expected_step: i32,
    state: OrderState,
    reply: Option<String>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if !state.is_terminal() {
        return Err(Error::Config {
            message: format!("{state:?} is not a terminal state"),
        });
    }
    let result = Order::update_many()
        .col_expr(order::Column::State, Expr::value(state))
        .col_expr(order::Column::Reply, Expr::value(reply))
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Step.eq(expected_step))
        .filter(order::Column::State.eq(OrderState::Pending))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::StaleAction { order_id });
    }
    info!(order_id, ?state, "Order finished");
    Ok(())
}

/// Caption shown to the initiator: current status and, once set, the rationale.
#[must_use]
pub fn status_text(order: &order::Model) -> String {
    let mut text = format!("ID: {}\nStatus: {}\n", order.id, order.state.label());
    if let Some(reply) = order.reply.as_deref().filter(|r| !r.trim().is_empty()) {
        text.push_str(&format!("Rationale: {reply}\n"));
    }
    text.push_str(&format!(
        "Amount: {} {}\nDescription: {}",
        format_amount(order.amount),
        order.currency.code(),
        order.description
    ));
    text
}

/// Caption shown to inspectors and payeers: who submitted the order.
#[must_use]
pub fn review_text(order: &order::Model, initiator_name: &str) -> String {
    format!(
        "ID: {}\nInitiator: @{}\nAmount: {} {}\nDescription: {}",
        order.id,
        initiator_name,
        format_amount(order.amount),
        order.currency.code(),
        order.description
    )
}

/// One line per order for the `/orders` listing.
#[must_use]
pub fn summary_line(order: &order::Model) -> String {
    const PREVIEW_CHARS: usize = 60;
    let mut preview: String = order.description.chars().take(PREVIEW_CHARS).collect();
    if order.description.chars().count() > PREVIEW_CHARS {
        preview.push('…');
    }
    let status = if order.state.is_terminal() {
        order.state.label().to_string()
    } else {
        format!("{} (step {})", order.state.label(), order.step)
    };
    format!(
        "#{} · {status} · {} {} · {preview}",
        order.id,
        format_amount(order.amount),
        order.currency.code()
    )
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}
