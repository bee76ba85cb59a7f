use std::collections::BTreeSet;

use flock_core::{Post, PostId, Repost, RepostId, Timestamp, User, UserId, validate};
use redb_bincode::ReadableTable as _;
use snafu::OptionExt as _;
use tracing::info;

use super::{Database, DbResult, LOG_TARGET, UserNotFoundSnafu, UsernameTakenSnafu};
use crate::tables::*;

/// Fields of a user account chosen at sign-up
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub is_private: bool,
}

/// Profile changes, `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub is_private: Option<bool>,
}

/// Everything [`Database::delete_user`] removed that others could have seen
#[derive(Debug, Clone)]
pub struct DeletedUser {
    pub user: User,
    pub posts: Vec<Post>,
    pub reposts: Vec<Repost>,
    /// Followers right before the follow edges were removed
    pub followers: BTreeSet<UserId>,
}

impl Database {
    pub async fn create_user(&self, new: NewUser) -> DbResult<User> {
        validate::username(&new.username)?;
        validate::display_name(&new.display_name)?;
        validate::bio(&new.bio)?;

        self.write_with(|tx| {
            let mut users_table = tx.open_table(&users::TABLE)?;
            let mut users_by_username_table = tx.open_table(&users_by_username::TABLE)?;

            if users_by_username_table.get(&new.username)?.is_some() {
                return UsernameTakenSnafu {
                    username: new.username,
                }
                .fail();
            }

            let now = Timestamp::now();
            let user = User {
                id: UserId::generate(),
                username: new.username,
                display_name: new.display_name,
                bio: new.bio,
                is_private: new.is_private,
                created_at: now,
                updated_at: now,
            };

            users_table.insert(&user.id, &user)?;
            users_by_username_table.insert(&user.username, &user.id)?;

            let user_id = user.id;
            tx.on_commit(move || info!(target: LOG_TARGET, %user_id, "User created"));
            Ok(user)
        })
        .await
    }

    pub async fn get_user(&self, user_id: UserId) -> DbResult<Option<User>> {
        self.read_with(|tx| {
            let users_table = tx.open_table(&users::TABLE)?;
            Ok(users_table.get(&user_id)?.map(|g| g.value()))
        })
        .await
    }

    pub async fn get_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let username = username.to_owned();
        self.read_with(|tx| {
            let users_by_username_table = tx.open_table(&users_by_username::TABLE)?;
            let Some(user_id) = users_by_username_table.get(&username)?.map(|g| g.value()) else {
                return Ok(None);
            };
            let users_table = tx.open_table(&users::TABLE)?;
            Ok(users_table.get(&user_id)?.map(|g| g.value()))
        })
        .await
    }

    pub async fn user_exists(&self, user_id: UserId) -> DbResult<bool> {
        self.read_with(|tx| {
            let users_table = tx.open_table(&users::TABLE)?;
            Ok(users_table.get(&user_id)?.is_some())
        })
        .await
    }

    pub async fn update_user(&self, user_id: UserId, update: UserUpdate) -> DbResult<User> {
        if let Some(display_name) = update.display_name.as_deref() {
            validate::display_name(display_name)?;
        }
        if let Some(bio) = update.bio.as_deref() {
            validate::bio(bio)?;
        }

        self.write_with(|tx| {
            let mut users_table = tx.open_table(&users::TABLE)?;
            let mut user = users_table
                .get(&user_id)?
                .map(|g| g.value())
                .context(UserNotFoundSnafu { user_id })?;

            if let Some(display_name) = update.display_name {
                user.display_name = display_name;
            }
            if let Some(bio) = update.bio {
                user.bio = bio;
            }
            if let Some(is_private) = update.is_private {
                user.is_private = is_private;
            }
            user.updated_at = Timestamp::now();

            users_table.insert(&user_id, &user)?;
            Ok(user)
        })
        .await
    }

    /// Delete a user together with everything they authored and every
    /// relation they are part of
    pub async fn delete_user(&self, user_id: UserId) -> DbResult<DeletedUser> {
        self.write_with(|tx| {
            let user = {
                let mut users_table = tx.open_table(&users::TABLE)?;
                let user = users_table
                    .remove(&user_id)?
                    .map(|g| g.value())
                    .context(UserNotFoundSnafu { user_id })?;
                tx.open_table(&users_by_username::TABLE)?
                    .remove(&user.username)?;
                user
            };
            let followers =
                Self::read_edges_tx(user_id, &tx.open_table(&ids_followers::TABLE)?)?;

            let mut posts = vec![];
            {
                let mut posts_table = tx.open_table(&posts::TABLE)?;
                let mut posts_by_user_table = tx.open_table(&posts_by_user::TABLE)?;
                let mut likes_table = tx.open_table(&likes::TABLE)?;
                let mut likes_by_user_table = tx.open_table(&likes_by_user::TABLE)?;

                let post_ids = posts_by_user_table
                    .range(
                        (user_id, Timestamp::ZERO, PostId::ZERO)
                            ..=(user_id, Timestamp::MAX, PostId::MAX),
                    )?
                    .map(|res| res.map(|(k, _)| k.value().2))
                    .collect::<Result<Vec<_>, _>>()?;
                for post_id in post_ids {
                    posts.extend(Self::delete_post_tx(
                        post_id,
                        &mut posts_table,
                        &mut posts_by_user_table,
                        &mut likes_table,
                        &mut likes_by_user_table,
                    )?);
                }

                let liked = likes_by_user_table
                    .range((user_id, PostId::ZERO)..=(user_id, PostId::MAX))?
                    .map(|res| res.map(|(k, _)| k.value().1))
                    .collect::<Result<Vec<_>, _>>()?;
                for post_id in liked {
                    likes_table.remove(&(post_id, user_id))?;
                    likes_by_user_table.remove(&(user_id, post_id))?;
                }
            }

            let mut reposts = vec![];
            {
                let mut reposts_table = tx.open_table(&reposts::TABLE)?;
                let mut reposts_by_user_table = tx.open_table(&reposts_by_user::TABLE)?;
                let mut reposts_plain_table = tx.open_table(&reposts_plain::TABLE)?;

                let repost_ids = reposts_by_user_table
                    .range(
                        (user_id, Timestamp::ZERO, RepostId::ZERO)
                            ..=(user_id, Timestamp::MAX, RepostId::MAX),
                    )?
                    .map(|res| res.map(|(k, _)| k.value().2))
                    .collect::<Result<Vec<_>, _>>()?;
                for repost_id in repost_ids {
                    reposts.extend(Self::delete_repost_tx(
                        repost_id,
                        &mut reposts_table,
                        &mut reposts_by_user_table,
                        &mut reposts_plain_table,
                    )?);
                }
            }

            for (fwd, rev) in [
                (&ids_followees::TABLE, &ids_followers::TABLE),
                (&ids_mutes::TABLE, &ids_muted_by::TABLE),
                (&ids_blocks::TABLE, &ids_blocked_by::TABLE),
            ] {
                Self::remove_all_edges_tx(
                    user_id,
                    &mut tx.open_table(fwd)?,
                    &mut tx.open_table(rev)?,
                )?;
            }

            tx.on_commit(move || info!(target: LOG_TARGET, %user_id, "User deleted"));
            Ok(DeletedUser {
                user,
                posts,
                reposts,
                followers,
            })
        })
        .await
    }
}
