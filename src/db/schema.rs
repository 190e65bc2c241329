pub const SCHEMA: &str = r#"
-- subscriptions table
CREATE TABLE IF NOT EXISTS subscriptions (
    subscription_id INTEGER PRIMARY KEY AUTOINCREMENT,
    rss_url TEXT NOT NULL,
    rss_name TEXT NOT NULL UNIQUE,
    users TEXT NOT NULL DEFAULT '[]',
    channel INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- feed_data table: one dedup cursor per feed
CREATE TABLE IF NOT EXISTS feed_data (
    rss_name TEXT PRIMARY KEY,
    last_update_time TEXT NOT NULL,
    latest_title TEXT NOT NULL DEFAULT ''
);

-- user_keywords table: JSON array or comma separated list
CREATE TABLE IF NOT EXISTS user_keywords (
    user_id INTEGER PRIMARY KEY,
    keywords TEXT NOT NULL DEFAULT ''
);

-- ai_processing_records table: content-addressed AI result cache
CREATE TABLE IF NOT EXISTS ai_processing_records (
    content_hash TEXT NOT NULL,
    content_type TEXT NOT NULL,
    original_content TEXT NOT NULL,
    processed_content TEXT NOT NULL,
    source_lang TEXT,
    target_lang TEXT,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    tokens_used INTEGER NOT NULL DEFAULT 0,
    processing_time INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    PRIMARY KEY (content_hash, content_type)
);

CREATE INDEX IF NOT EXISTS idx_ai_records_created_at ON ai_processing_records(created_at);

-- ai_usage_stats table: one row per day
CREATE TABLE IF NOT EXISTS ai_usage_stats (
    date TEXT PRIMARY KEY,
    translate_count INTEGER NOT NULL DEFAULT 0,
    summarize_count INTEGER NOT NULL DEFAULT 0,
    total_tokens INTEGER NOT NULL DEFAULT 0,
    total_cost REAL NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- user_ai_preferences table
CREATE TABLE IF NOT EXISTS user_ai_preferences (
    user_id INTEGER PRIMARY KEY,
    auto_translate INTEGER NOT NULL DEFAULT 0,
    auto_summarize INTEGER NOT NULL DEFAULT 0,
    preferred_lang TEXT NOT NULL DEFAULT 'zh-CN',
    max_summary_length INTEGER NOT NULL DEFAULT 200,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
