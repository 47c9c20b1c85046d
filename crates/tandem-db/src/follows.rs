use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use tandem_types::models::ToggleFollowOutput;

use crate::error::{ResultExt, StoreError};
use crate::{CancellationToken, Database, validate};

/// Re-derives a user's `followers_count` from the `follows` rows and returns
/// the new value.
fn recount_followers(conn: &Connection, user_id: i64) -> Result<i64, StoreError> {
    conn.query_row(
        "UPDATE users
         SET followers_count = (SELECT COUNT(*) FROM follows WHERE followee_id = ?1)
         WHERE id = ?1
         RETURNING followers_count",
        [user_id],
        |row| row.get(0),
    )
    .write_context("recount followers")
}

impl Database {
    /// Flips the follow relationship from `follower` to `username` and keeps
    /// both counters in step, all inside one write transaction.
    ///
    /// The transaction is opened with `BEGIN IMMEDIATE`, so two concurrent
    /// toggles can never both observe the same prior state. Every early
    /// return drops the transaction, which rolls it back.
    pub fn toggle_follow(
        &self,
        cancel: &CancellationToken,
        follower: Option<i64>,
        username: &str,
    ) -> Result<ToggleFollowOutput, StoreError> {
        let follower_id = follower.ok_or(StoreError::Unauthenticated)?;
        let username = validate::username(username)?;

        self.with_conn_mut(cancel, |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| StoreError::transaction("begin", e))?;

            let followee_id: i64 = tx
                .query_row("SELECT id FROM users WHERE username = ?1", [username], |row| row.get(0))
                .optional()
                .query_context("resolve followee")?
                .ok_or(StoreError::UserNotFound)?;

            if followee_id == follower_id {
                return Err(StoreError::ForbiddenSelfFollow);
            }

            let following: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2)",
                    params![follower_id, followee_id],
                    |row| row.get(0),
                )
                .query_context("follow lookup")?;

            if following {
                tx.execute(
                    "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                    params![follower_id, followee_id],
                )
                .write_context("delete follow")?;
                tx.execute(
                    "UPDATE users SET followees_count = followees_count - 1 WHERE id = ?1",
                    [follower_id],
                )
                .write_context("decrement followees")?;
            } else {
                tx.execute(
                    "INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
                    params![follower_id, followee_id],
                )
                .write_context("insert follow")?;
                tx.execute(
                    "UPDATE users SET followees_count = followees_count + 1 WHERE id = ?1",
                    [follower_id],
                )
                .write_context("increment followees")?;
            }

            let followers_count = recount_followers(&tx, followee_id)?;

            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            tx.commit().map_err(|e| StoreError::transaction("commit", e))?;

            debug!(follower_id, followee_id, following = !following, "follow toggled");
            Ok(ToggleFollowOutput {
                following: !following,
                followers_count,
            })
        })
    }
}
