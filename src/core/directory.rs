//! Role and chain directory - Who a user is and who inspects their orders.
//!
//! The workflow only reads from here. The write operations back the `/start`
//! registration and the admin commands.

use crate::{
    entities::{Chain, Role, User, UserRole, chain, user, user_role},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

/// Finds a registered user by Discord id.
pub async fn get_user_by_discord_id<C>(db: &C, discord_id: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::DiscordId.eq(discord_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a user by primary key.
pub async fn get_user_by_id<C>(db: &C, user_id: i64) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Like [`get_user_by_discord_id`], but a missing user is an error.
pub async fn require_user<C>(db: &C, discord_id: &str) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    get_user_by_discord_id(db, discord_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user: discord_id.to_string(),
        })
}

/// Registers a user, or refreshes the username and DM chat of an existing one.
///
/// Returns the user and whether it was newly created.
#[instrument(skip(db))]
pub async fn register_user<C>(
    db: &C,
    discord_id: &str,
    username: &str,
    chat_id: &str,
) -> Result<(user::Model, bool)>
where
    C: ConnectionTrait,
{
    if let Some(existing) = get_user_by_discord_id(db, discord_id).await? {
        let mut active: user::ActiveModel = existing.into();
        active.username = Set(username.to_string());
        active.chat_id = Set(chat_id.to_string());
        return Ok((active.update(db).await?, false));
    }

    let created = user::ActiveModel {
        discord_id: Set(discord_id.to_string()),
        username: Set(username.to_string()),
        chat_id: Set(chat_id.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(user_id = created.id, username, "Registered new user");
    Ok((created, true))
}

/// All roles held by a user.
pub async fn roles_for_user<C>(db: &C, user_id: i64) -> Result<Vec<Role>>
where
    C: ConnectionTrait,
{
    Ok(UserRole::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .order_by_asc(user_role::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.role)
        .collect())
}

/// Whether a user holds `role`.
pub async fn has_role<C>(db: &C, user_id: i64, role: Role) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = UserRole::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .filter(user_role::Column::Role.eq(role))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Fails with `PermissionDenied` unless the user holds `role`.
pub async fn require_role<C>(db: &C, user_id: i64, role: Role) -> Result<()>
where
    C: ConnectionTrait,
{
    if has_role(db, user_id, role).await? {
        return Ok(());
    }
    let held = roles_for_user(db, user_id).await?;
    let held = if held.is_empty() {
        "none".to_string()
    } else {
        held.iter().map(|r| r.label()).collect::<Vec<_>>().join(", ")
    };
    Err(Error::PermissionDenied {
        message: format!("This needs the {} role. Your roles: {held}.", role.label()),
    })
}

/// Grants a role. Granting a held role is a no-op; any real role replaces `Unknown`.
#[instrument(skip(db))]
pub async fn grant_role<C>(db: &C, user_id: i64, role: Role) -> Result<()>
where
    C: ConnectionTrait,
{
    if has_role(db, user_id, role).await? {
        return Ok(());
    }
    if role != Role::Unknown {
        UserRole::delete_many()
            .filter(user_role::Column::UserId.eq(user_id))
            .filter(user_role::Column::Role.eq(Role::Unknown))
            .exec(db)
            .await?;
    }
    user_role::ActiveModel {
        user_id: Set(user_id),
        role: Set(role),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(user_id, role = role.label(), "Role granted");
    Ok(())
}

/// Revokes a role. Returns whether the user held it.
#[instrument(skip(db))]
pub async fn revoke_role<C>(db: &C, user_id: i64, role: Role) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = UserRole::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .filter(user_role::Column::Role.eq(role))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// All users holding `role`.
pub async fn users_with_role<C>(db: &C, role: Role) -> Result<Vec<user::Model>>
where
    C: ConnectionTrait,
{
    Ok(UserRole::find()
        .filter(user_role::Column::Role.eq(role))
        .find_also_related(User)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(_, user)| user)
        .collect())
}

/// The inspector chain of an initiator, if an admin has configured one.
pub async fn get_chain<C>(db: &C, initiator_id: i64) -> Result<Option<chain::Model>>
where
    C: ConnectionTrait,
{
    Chain::find()
        .filter(chain::Column::InitiatorId.eq(initiator_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_chain`], but a missing chain is an error.
pub async fn require_chain<C>(db: &C, initiator_id: i64) -> Result<chain::Model>
where
    C: ConnectionTrait,
{
    get_chain(db, initiator_id)
        .await?
        .ok_or(Error::ChainMissing { initiator_id })
}

/// Creates or replaces the chain of an initiator.
#[instrument(skip(db))]
pub async fn set_chain<C>(db: &C, initiator_id: i64, slots: [Option<i64>; 4]) -> Result<chain::Model>
where
    C: ConnectionTrait,
{
    let [first, second, third, fourth] = slots;
    let now = Utc::now();
    let saved = if let Some(existing) = get_chain(db, initiator_id).await? {
        let mut active: chain::ActiveModel = existing.into();
        active.first_inspector_id = Set(first);
        active.second_inspector_id = Set(second);
        active.third_inspector_id = Set(third);
        active.fourth_inspector_id = Set(fourth);
        active.updated_at = Set(Some(now));
        active.update(db).await?
    } else {
        chain::ActiveModel {
            initiator_id: Set(initiator_id),
            first_inspector_id: Set(first),
            second_inspector_id: Set(second),
            third_inspector_id: Set(third),
            fourth_inspector_id: Set(fourth),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(db)
        .await?
    };
    info!(initiator_id, ?slots, "Approval chain saved");
    Ok(saved)
}

/// The inspector responsible for `step` in `chain`, if that slot is bound.
pub async fn inspector_for_step<C>(
    db: &C,
    chain: &chain::Model,
    step: i32,
) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    match chain.inspector_at(step) {
        Some(user_id) => get_user_by_id(db, user_id).await,
        None => Ok(None),
    }
}
