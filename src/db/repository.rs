use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::filter::parse_keywords;
use crate::models::{
    parse_user_ids, AiOperation, CacheRecord, DeliveryMode, Subscription, UsageStat,
    UserAiPreferences,
};

use super::schema::SCHEMA;

/// Cursor stored for a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedCursor {
    pub last_update: DateTime<Utc>,
    pub latest_title: String,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Subscription operations

    pub async fn get_subscriptions(&self) -> Result<Vec<Subscription>> {
        let subscriptions = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT subscription_id, rss_url, rss_name, users, channel FROM subscriptions ORDER BY subscription_id",
                )?;
                let rows = stmt
                    .query_map([], subscription_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(subscriptions)
    }

    /// Insert a subscription, or update the one with the same name.
    pub async fn upsert_subscription(
        &self,
        name: &str,
        url: &str,
        mode: DeliveryMode,
        users: &[i64],
    ) -> Result<i64> {
        let name = name.to_string();
        let url = url.to_string();
        let users = serde_json::to_string(users)?;
        let channel = mode.as_channel();
        let id = self
            .conn
            .call(move |conn| {
                let id: i64 = conn.query_row(
                    r#"INSERT INTO subscriptions (rss_url, rss_name, users, channel)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(rss_name) DO UPDATE SET
                           rss_url = excluded.rss_url,
                           users = excluded.users,
                           channel = excluded.channel
                       RETURNING subscription_id"#,
                    params![url, name, users, channel],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    // Keyword operations

    /// All users with at least one keyword.
    pub async fn get_user_keywords(&self) -> Result<HashMap<i64, Vec<String>>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT user_id, keywords FROM user_keywords")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(user_id, raw)| {
                let keywords = parse_keywords(&raw);
                (!keywords.is_empty()).then_some((user_id, keywords))
            })
            .collect())
    }

    pub async fn set_user_keywords(&self, user_id: i64, keywords: &[String]) -> Result<()> {
        let encoded = serde_json::to_string(keywords)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO user_keywords (user_id, keywords) VALUES (?1, ?2)",
                    params![user_id, encoded],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Cursor operations

    /// Stored cursor time for a feed.
    ///
    /// A missing cursor is created at the zero time and `None` is returned, so
    /// the first fetch of a feed only establishes a baseline.
    pub async fn get_cursor(&self, feed_name: &str) -> Result<Option<DateTime<Utc>>> {
        let name = feed_name.to_string();
        let zero = format_timestamp(DateTime::<Utc>::UNIX_EPOCH);
        let stored = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT last_update_time FROM feed_data WHERE rss_name = ?1",
                        params![name],
                        |row| row.get(0),
                    )
                    .optional()?;
                if existing.is_none() {
                    tx.execute(
                        "INSERT OR IGNORE INTO feed_data (rss_name, last_update_time, latest_title) VALUES (?1, ?2, '')",
                        params![name, zero],
                    )?;
                }
                tx.commit()?;
                Ok(existing)
            })
            .await?;

        stored
            .map(|s| {
                parse_datetime(&s).ok_or_else(|| {
                    AppError::Storage(format!("invalid cursor time for {}: {}", feed_name, s))
                })
            })
            .transpose()
    }

    /// Overwrite a feed's cursor. Callers only pass the newest time they saw.
    pub async fn advance_cursor(
        &self,
        feed_name: &str,
        time: DateTime<Utc>,
        latest_title: &str,
    ) -> Result<()> {
        let name = feed_name.to_string();
        let title = latest_title.to_string();
        let time = format_timestamp(time);
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO feed_data (rss_name, last_update_time, latest_title)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(rss_name) DO UPDATE SET
                           last_update_time = excluded.last_update_time,
                           latest_title = excluded.latest_title"#,
                    params![name, time, title],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Read a cursor without creating it.
    pub async fn peek_cursor(&self, feed_name: &str) -> Result<Option<FeedCursor>> {
        let name = feed_name.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT last_update_time, latest_title FROM feed_data WHERE rss_name = ?1",
                        params![name],
                        |row| {
                            Ok(FeedCursor {
                                last_update: timestamp_column(row, 0)?,
                                latest_title: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        Ok(row)
    }

    // AI cache operations

    pub async fn get_cache_record(
        &self,
        content_hash: &str,
        operation: AiOperation,
    ) -> Result<Option<CacheRecord>> {
        let hash = content_hash.to_string();
        let record = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT content_hash, content_type, original_content, processed_content,
                              source_lang, target_lang, provider, model, tokens_used,
                              processing_time, created_at
                       FROM ai_processing_records
                       WHERE content_hash = ?1 AND content_type = ?2"#,
                )?;
                let record = stmt
                    .query_row(params![hash, operation.as_str()], cache_record_from_row)
                    .optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    /// Single-statement replace; concurrent writers of one hash leave one intact row.
    pub async fn put_cache_record(&self, record: CacheRecord) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT OR REPLACE INTO ai_processing_records
                       (content_hash, content_type, original_content, processed_content,
                        source_lang, target_lang, provider, model, tokens_used,
                        processing_time, created_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
                    params![
                        record.content_hash,
                        record.operation.as_str(),
                        record.original_text,
                        record.processed_text,
                        record.source_lang,
                        record.target_lang,
                        record.provider,
                        record.model,
                        record.tokens_used,
                        record.processing_time_ms,
                        format_timestamp(record.created_at),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Delete cache records created before `cutoff`. Returns the number removed.
    pub async fn prune_cache(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = format_timestamp(cutoff);
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM ai_processing_records WHERE created_at < ?1",
                    params![cutoff],
                )?;
                Ok(n)
            })
            .await?;
        Ok(removed)
    }

    // Usage operations

    pub async fn record_usage(
        &self,
        date: NaiveDate,
        operation: AiOperation,
        tokens: i64,
        cost: f64,
    ) -> Result<()> {
        let date = date.format("%Y-%m-%d").to_string();
        let (translate, summarize) = match operation {
            AiOperation::Translate => (1_i64, 0_i64),
            AiOperation::Summarize => (0, 1),
        };
        let now = format_timestamp(Utc::now());
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO ai_usage_stats
                       (date, translate_count, summarize_count, total_tokens, total_cost, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(date) DO UPDATE SET
                           translate_count = translate_count + excluded.translate_count,
                           summarize_count = summarize_count + excluded.summarize_count,
                           total_tokens = total_tokens + excluded.total_tokens,
                           total_cost = total_cost + excluded.total_cost,
                           updated_at = excluded.updated_at"#,
                    params![date, translate, summarize, tokens, cost, now],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Most recent `days` rows, newest first.
    pub async fn get_usage_stats(&self, days: u32) -> Result<Vec<UsageStat>> {
        let stats = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT date, translate_count, summarize_count, total_tokens, total_cost, updated_at
                       FROM ai_usage_stats
                       ORDER BY date DESC
                       LIMIT ?1"#,
                )?;
                let stats = stmt
                    .query_map(params![days], usage_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await?;
        Ok(stats)
    }

    // Preference operations

    pub async fn get_preferences(&self, user_id: i64) -> Result<Option<UserAiPreferences>> {
        let prefs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT user_id, auto_translate, auto_summarize, preferred_lang,
                              max_summary_length, created_at, updated_at
                       FROM user_ai_preferences WHERE user_id = ?1"#,
                )?;
                let prefs = stmt
                    .query_row(params![user_id], preferences_from_row)
                    .optional()?;
                Ok(prefs)
            })
            .await?;
        Ok(prefs)
    }

    pub async fn upsert_preferences(&self, prefs: &UserAiPreferences) -> Result<()> {
        let prefs = prefs.clone();
        let now = format_timestamp(Utc::now());
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO user_ai_preferences
                       (user_id, auto_translate, auto_summarize, preferred_lang,
                        max_summary_length, created_at, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                       ON CONFLICT(user_id) DO UPDATE SET
                           auto_translate = excluded.auto_translate,
                           auto_summarize = excluded.auto_summarize,
                           preferred_lang = excluded.preferred_lang,
                           max_summary_length = excluded.max_summary_length,
                           updated_at = excluded.updated_at"#,
                    params![
                        prefs.user_id,
                        prefs.auto_translate,
                        prefs.auto_summarize,
                        prefs.preferred_lang,
                        prefs.max_summary_length,
                        now,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Fixed-width RFC 3339 with nanoseconds, so stored values keep full
/// precision and still compare correctly as text.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp {}", raw).into(),
        )
    })
}

fn subscription_from_row(row: &Row) -> rusqlite::Result<Subscription> {
    let users: String = row.get(3)?;
    Ok(Subscription {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        users: parse_user_ids(&users),
        mode: DeliveryMode::from_channel(row.get(4)?),
    })
}

fn cache_record_from_row(row: &Row) -> rusqlite::Result<CacheRecord> {
    let kind: String = row.get(1)?;
    let operation = AiOperation::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown content type {}", kind).into(),
        )
    })?;
    Ok(CacheRecord {
        content_hash: row.get(0)?,
        operation,
        original_text: row.get(2)?,
        processed_text: row.get(3)?,
        source_lang: row.get(4)?,
        target_lang: row.get(5)?,
        provider: row.get(6)?,
        model: row.get(7)?,
        tokens_used: row.get(8)?,
        processing_time_ms: row.get(9)?,
        created_at: timestamp_column(row, 10)?,
    })
}

fn usage_from_row(row: &Row) -> rusqlite::Result<UsageStat> {
    let date: String = row.get(0)?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(UsageStat {
        date,
        translate_count: row.get(1)?,
        summarize_count: row.get(2)?,
        total_tokens: row.get(3)?,
        total_cost: row.get(4)?,
        updated_at: timestamp_column(row, 5)?,
    })
}

fn preferences_from_row(row: &Row) -> rusqlite::Result<UserAiPreferences> {
    Ok(UserAiPreferences {
        user_id: row.get(0)?,
        auto_translate: row.get(1)?,
        auto_summarize: row.get(2)?,
        preferred_lang: row.get(3)?,
        max_summary_length: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
        updated_at: timestamp_column(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio_test::assert_ok;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_cursor_created_lazily() {
        let repo = Repository::in_memory().await.unwrap();

        assert_eq!(repo.get_cursor("news").await.unwrap(), None);
        let cursor = repo.peek_cursor("news").await.unwrap().unwrap();
        assert_eq!(cursor.last_update, DateTime::<Utc>::UNIX_EPOCH);

        // Second read finds the row created by the first.
        assert_eq!(repo.get_cursor("news").await.unwrap(), Some(DateTime::<Utc>::UNIX_EPOCH));
    }

    #[tokio::test]
    async fn test_advance_cursor_overwrites() {
        let repo = Repository::in_memory().await.unwrap();
        repo.get_cursor("news").await.unwrap();

        assert_ok!(repo.advance_cursor("news", at(1_700_000_000), "Hello").await);
        let cursor = repo.peek_cursor("news").await.unwrap().unwrap();
        assert_eq!(cursor.last_update, at(1_700_000_000));
        assert_eq!(cursor.latest_title, "Hello");
    }

    #[tokio::test]
    async fn test_cursor_keeps_subsecond_precision() {
        let repo = Repository::in_memory().await.unwrap();
        let time = Utc.timestamp_opt(1_700_000_100, 500_000_000).unwrap();

        repo.advance_cursor("news", time, "Half").await.unwrap();
        assert_eq!(repo.get_cursor("news").await.unwrap(), Some(time));
        assert_eq!(repo.peek_cursor("news").await.unwrap().unwrap().last_update, time);
    }

    #[tokio::test]
    async fn test_unreadable_cursor_is_storage_error() {
        let repo = Repository::in_memory().await.unwrap();
        repo.conn
            .call(|conn| {
                conn.execute(
                    "INSERT INTO feed_data (rss_name, last_update_time, latest_title) VALUES ('news', 'yesterday', '')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(matches!(repo.get_cursor("news").await, Err(AppError::Storage(_))));
        assert!(matches!(repo.peek_cursor("news").await, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn test_subscription_round_trip() {
        let repo = Repository::in_memory().await.unwrap();
        repo.upsert_subscription("hn", "https://hn.example/rss", DeliveryMode::Full, &[1, 2])
            .await
            .unwrap();
        repo.upsert_subscription("hn", "https://hn.example/feed", DeliveryMode::Full, &[3])
            .await
            .unwrap();

        let subs = repo.get_subscriptions().await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].url, "https://hn.example/feed");
        assert_eq!(subs[0].users, vec![3]);
        assert_eq!(subs[0].mode, DeliveryMode::Full);
    }

    #[tokio::test]
    async fn test_keywords_skip_empty_sets() {
        let repo = Repository::in_memory().await.unwrap();
        repo.set_user_keywords(1, &["rust".to_string(), "-crypto".to_string()])
            .await
            .unwrap();
        repo.set_user_keywords(2, &[]).await.unwrap();

        let keywords = repo.get_user_keywords().await.unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[&1], vec!["rust", "-crypto"]);
    }

    #[tokio::test]
    async fn test_usage_upsert_accumulates() {
        let repo = Repository::in_memory().await.unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        repo.record_usage(day, AiOperation::Translate, 100, 0.2).await.unwrap();
        repo.record_usage(day, AiOperation::Summarize, 50, 0.1).await.unwrap();
        repo.record_usage(day, AiOperation::Translate, 10, 0.02).await.unwrap();

        let stats = repo.get_usage_stats(7).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].translate_count, 2);
        assert_eq!(stats[0].summarize_count, 1);
        assert_eq!(stats[0].total_tokens, 160);
        assert!((stats[0].total_cost - 0.32).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_preferences_upsert() {
        let repo = Repository::in_memory().await.unwrap();
        assert!(assert_ok!(repo.get_preferences(5).await).is_none());

        let mut prefs = UserAiPreferences::defaults(5);
        prefs.auto_summarize = true;
        repo.upsert_preferences(&prefs).await.unwrap();
        prefs.preferred_lang = "en".to_string();
        repo.upsert_preferences(&prefs).await.unwrap();

        let stored = repo.get_preferences(5).await.unwrap().unwrap();
        assert!(stored.auto_summarize);
        assert!(!stored.auto_translate);
        assert_eq!(stored.preferred_lang, "en");
    }

    #[tokio::test]
    async fn test_prune_cache_by_age() {
        let repo = Repository::in_memory().await.unwrap();
        let mut record = CacheRecord {
            content_hash: "old".to_string(),
            operation: AiOperation::Summarize,
            original_text: "a".to_string(),
            processed_text: "b".to_string(),
            source_lang: None,
            target_lang: None,
            provider: "openai".to_string(),
            model: "gpt".to_string(),
            tokens_used: 1,
            processing_time_ms: 1,
            created_at: at(1_000),
        };
        repo.put_cache_record(record.clone()).await.unwrap();
        record.content_hash = "new".to_string();
        record.created_at = at(5_000);
        repo.put_cache_record(record).await.unwrap();

        assert_eq!(repo.prune_cache(at(2_000)).await.unwrap(), 1);
        assert!(repo
            .get_cache_record("old", AiOperation::Summarize)
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .get_cache_record("new", AiOperation::Summarize)
            .await
            .unwrap()
            .is_some());
    }
}
