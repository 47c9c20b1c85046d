use rusqlite::{OptionalExtension, Row, params_from_iter};
use tracing::debug;

use tandem_types::models::ProfileView;

use crate::error::{ResultExt, StoreError};
use crate::query::{Cond, QuerySpec};
use crate::{CancellationToken, Database, validate};

/// Bounds applied to the `first` argument of a user search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizePolicy {
    pub default: u32,
    pub max: u32,
}

impl Default for PageSizePolicy {
    fn default() -> Self {
        Self { default: 10, max: 99 }
    }
}

impl PageSizePolicy {
    pub fn normalize(&self, first: i64) -> u32 {
        if first <= 0 {
            self.default
        } else {
            u32::try_from(first).map_or(self.max, |n| n.min(self.max))
        }
    }
}

/// Arguments of [`Database::search_users`]. `after` is the last username of
/// the previous page.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserSearch<'a> {
    pub search: &'a str,
    pub first: i64,
    pub after: &'a str,
}

const RELATION_COLUMNS: &str = ", followers.follower_id IS NOT NULL AS following, \
     followees.followee_id IS NOT NULL AS followed";

const RELATION_JOINS: &str = "LEFT JOIN follows AS followers \
         ON followers.follower_id = @uid AND followers.followee_id = users.id \
     LEFT JOIN follows AS followees \
         ON followees.follower_id = users.id AND followees.followee_id = @uid";

/// Projection shared by profile lookup and search. The relationship flags
/// are only selected when there is a viewer to relate to.
fn profile_select(viewer: Option<i64>) -> QuerySpec {
    QuerySpec::new()
        .sql("SELECT users.id, users.email, users.username, users.followers_count, users.followees_count")
        .sql_if(Cond::flag("auth"), RELATION_COLUMNS)
        .sql("FROM users")
        .sql_if(Cond::flag("auth"), RELATION_JOINS)
        .param("auth", viewer.is_some())
        .param("uid", viewer)
}

pub(crate) fn profile_query(viewer: Option<i64>, username: &str) -> QuerySpec {
    profile_select(viewer)
        .sql("WHERE users.username = @username")
        .param("username", username)
}

pub(crate) fn search_query(viewer: Option<i64>, search: &str, after: &str, first: u32) -> QuerySpec {
    let pattern = if search.is_empty() { String::new() } else { like_contains(search) };

    profile_select(viewer)
        .sql_if(Cond::or("search", "after"), "WHERE")
        .sql_if(Cond::flag("search"), r"users.username LIKE @search ESCAPE '\'")
        .sql_if(Cond::and("search", "after"), "AND")
        .sql_if(Cond::flag("after"), "users.username > @after")
        .sql("ORDER BY users.username ASC")
        .sql(format!("LIMIT {first}"))
        .param("search", pattern)
        .param("after", after)
}

/// `%term%` with LIKE wildcards in `term` escaped.
fn like_contains(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn map_profile(row: &Row<'_>, auth: bool) -> rusqlite::Result<ProfileView> {
    let mut profile = ProfileView {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        followers_count: row.get(3)?,
        followees_count: row.get(4)?,
        ..Default::default()
    };
    if auth {
        profile.following = row.get(5)?;
        profile.followed = row.get(6)?;
    }
    Ok(profile)
}

impl Database {
    /// Looks up one profile. The match ignores case and the stored spelling
    /// of the username is returned. Private fields are only kept when the
    /// viewer is the subject.
    pub fn get_profile(
        &self,
        cancel: &CancellationToken,
        viewer: Option<i64>,
        username: &str,
    ) -> Result<ProfileView, StoreError> {
        let username = validate::username(username)?;
        let query = profile_query(viewer, username).build()?;

        let profile = self.with_conn(cancel, |conn| {
            conn.query_row(&query.sql, params_from_iter(query.args.iter()), |row| {
                map_profile(row, viewer.is_some())
            })
            .optional()
            .query_context("profile query")
        })?;

        let mut profile = profile.ok_or(StoreError::UserNotFound)?;
        profile.redact(viewer);
        Ok(profile)
    }

    /// Forward-only keyset search ordered by username. The viewer's own row
    /// is never part of the result.
    pub fn search_users(
        &self,
        cancel: &CancellationToken,
        viewer: Option<i64>,
        params: UserSearch<'_>,
    ) -> Result<Vec<ProfileView>, StoreError> {
        let first = self.page_size.normalize(params.first);
        let query = search_query(viewer, params.search.trim(), params.after.trim(), first).build()?;
        debug!(sql = %query.sql, args = ?query.args, "users query");

        let rows = self.with_conn(cancel, |conn| {
            let mut stmt = conn.prepare(&query.sql).query_context("users query")?;
            let rows = stmt
                .query_map(params_from_iter(query.args.iter()), |row| {
                    map_profile(row, viewer.is_some())
                })
                .query_context("users query")?
                .collect::<Result<Vec<_>, _>>()
                .query_context("scan users")?;
            Ok(rows)
        })?;

        let mut profiles = Vec::with_capacity(rows.len());
        for mut profile in rows {
            profile.redact(viewer);
            if !profile.me {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::types::Value;

    use super::*;

    fn seeded() -> (Database, CancellationToken) {
        let db = Database::open_in_memory().unwrap();
        let cancel = CancellationToken::new();
        for name in ["alice", "anna", "bob", "carol", "dan_n", "hannah"] {
            db.create_user(&cancel, &format!("{name}@x.com"), name, "hash").unwrap();
        }
        (db, cancel)
    }

    fn names(profiles: &[ProfileView]) -> Vec<&str> {
        profiles.iter().map(|p| p.username.as_str()).collect()
    }

    #[test]
    fn page_size_policy() {
        let policy = PageSizePolicy::default();
        assert_eq!(policy.normalize(0), 10);
        assert_eq!(policy.normalize(-5), 10);
        assert_eq!(policy.normalize(1), 1);
        assert_eq!(policy.normalize(99), 99);
        assert_eq!(policy.normalize(100), 99);
        assert_eq!(policy.normalize(i64::MAX), 99);
    }

    #[test]
    fn anonymous_search_query() {
        let q = search_query(None, "ann", "", 10).build().unwrap();

        assert_eq!(q.args, vec![Value::Text("%ann%".into())]);
        assert!(q.sql.contains("LIKE ?1"));
        assert!(!q.sql.contains("LEFT JOIN"));
        assert!(!q.sql.contains("AS following"));
        assert!(!q.sql.contains("username >"));
        assert!(q.sql.ends_with("ORDER BY users.username ASC LIMIT 10"));
    }

    #[test]
    fn authenticated_search_query() {
        let q = search_query(Some(42), "", "bob", 5).build().unwrap();

        assert_eq!(q.sql.matches("LEFT JOIN follows").count(), 2);
        assert!(q.sql.contains("AS following"));
        assert!(q.sql.contains("WHERE users.username > ?3"));
        assert!(!q.sql.contains("LIKE"));
        assert_eq!(
            q.args,
            vec![Value::Integer(42), Value::Integer(42), Value::Text("bob".into())]
        );
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_contains("a_b%c\\"), r"%a\_b\%c\\%");
    }

    #[test]
    fn profile_masks_private_fields() {
        let (db, cancel) = seeded();
        let bob_id = db.credentials_by_email(&cancel, "bob@x.com").unwrap().unwrap().id;

        let anon = db.get_profile(&cancel, None, "alice").unwrap();
        assert!(!anon.me);
        assert_eq!(anon.id, 0);
        assert!(anon.email.is_empty());
        assert_eq!(anon.username, "alice");

        let other = db.get_profile(&cancel, Some(bob_id), "alice").unwrap();
        assert!(!other.me);
        assert_eq!(other.id, 0);
        assert!(other.email.is_empty());

        let me = db.get_profile(&cancel, Some(bob_id), " bob ").unwrap();
        assert!(me.me);
        assert_eq!(me.id, bob_id);
        assert_eq!(me.email, "bob@x.com");
    }

    #[test]
    fn profile_returns_stored_username() {
        let (db, cancel) = seeded();
        let profile = db.get_profile(&cancel, None, "ALICE").unwrap();
        assert_eq!(profile.username, "alice");
    }

    #[test]
    fn profile_errors() {
        let (db, cancel) = seeded();
        assert!(matches!(
            db.get_profile(&cancel, None, "1nvalid"),
            Err(StoreError::InvalidUsername)
        ));
        assert!(matches!(
            db.get_profile(&cancel, None, "nobody"),
            Err(StoreError::UserNotFound)
        ));
    }

    #[test]
    fn profile_relationship_flags() {
        let (db, cancel) = seeded();
        let alice = db.credentials_by_email(&cancel, "alice@x.com").unwrap().unwrap().id;
        let bob = db.credentials_by_email(&cancel, "bob@x.com").unwrap().unwrap().id;

        db.toggle_follow(&cancel, Some(alice), "bob").unwrap();

        let seen_by_alice = db.get_profile(&cancel, Some(alice), "bob").unwrap();
        assert!(seen_by_alice.following);
        assert!(!seen_by_alice.followed);
        assert_eq!(seen_by_alice.followers_count, 1);

        let seen_by_bob = db.get_profile(&cancel, Some(bob), "alice").unwrap();
        assert!(!seen_by_bob.following);
        assert!(seen_by_bob.followed);
        assert_eq!(seen_by_bob.followees_count, 1);

        let anon = db.get_profile(&cancel, None, "bob").unwrap();
        assert!(!anon.following && !anon.followed);
    }

    #[test]
    fn search_filters_and_pages() {
        let (db, cancel) = seeded();

        let all = db.search_users(&cancel, None, UserSearch::default()).unwrap();
        assert_eq!(names(&all), ["alice", "anna", "bob", "carol", "dan_n", "hannah"]);
        assert!(all.iter().all(|p| p.id == 0 && p.email.is_empty()));

        let ann = db
            .search_users(&cancel, None, UserSearch { search: " ann ", ..Default::default() })
            .unwrap();
        assert_eq!(names(&ann), ["anna", "hannah"]);

        let page = db
            .search_users(&cancel, None, UserSearch { first: 2, after: "anna", ..Default::default() })
            .unwrap();
        assert_eq!(names(&page), ["bob", "carol"]);

        let both = db
            .search_users(&cancel, None, UserSearch { search: "an", after: "anna", first: 0 })
            .unwrap();
        assert_eq!(names(&both), ["dan_n", "hannah"]);
    }

    #[test]
    fn search_underscore_is_literal() {
        let (db, cancel) = seeded();
        let found = db
            .search_users(&cancel, None, UserSearch { search: "_", ..Default::default() })
            .unwrap();
        assert_eq!(names(&found), ["dan_n"]);
    }

    #[test]
    fn search_excludes_viewer() {
        let (db, cancel) = seeded();
        let bob = db.credentials_by_email(&cancel, "bob@x.com").unwrap().unwrap().id;

        let found = db.search_users(&cancel, Some(bob), UserSearch::default()).unwrap();
        assert_eq!(names(&found), ["alice", "anna", "carol", "dan_n", "hannah"]);
        assert!(found.iter().all(|p| !p.me && p.id == 0));
    }

    #[test]
    fn search_respects_page_size_policy() {
        let db = Database::open_in_memory()
            .unwrap()
            .with_page_size(PageSizePolicy { default: 2, max: 3 });
        let cancel = CancellationToken::new();
        for name in ["a1", "a2", "a3", "a4"] {
            db.create_user(&cancel, &format!("{name}@x.com"), name, "hash").unwrap();
        }

        let page = db.search_users(&cancel, None, UserSearch::default()).unwrap();
        assert_eq!(page.len(), 2);
        let page = db
            .search_users(&cancel, None, UserSearch { first: 50, ..Default::default() })
            .unwrap();
        assert_eq!(page.len(), 3);
    }
}
