use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio_test::assert_ok;

use rss_relay::ai::{AiError, AiErrorKind, AiOrchestrator, AiProvider};
use rss_relay::config::Config;
use rss_relay::db::Repository;
use rss_relay::delivery::Notifier;
use rss_relay::error::{AppError, Result};
use rss_relay::feed::FeedSource;
use rss_relay::models::{DeliveryMode, FeedItem, SummaryResult, TranslateResult, UserAiPreferences};
use rss_relay::pipeline::{CycleCoordinator, PipelineContext};

#[derive(Default)]
struct FakeFeeds {
    feeds: Mutex<HashMap<String, Vec<FeedItem>>>,
}

impl FakeFeeds {
    fn set(&self, url: &str, items: Vec<FeedItem>) {
        self.feeds.lock().unwrap().insert(url.to_string(), items);
    }
}

#[async_trait]
impl FeedSource for FakeFeeds {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        self.feeds
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Network(format!("HTTP 503 from {}", url)))
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(i64, String)>>,
}

impl Outbox {
    fn messages(&self) -> Vec<(i64, String)> {
        let mut sent = self.sent.lock().unwrap().clone();
        sent.sort();
        sent
    }
}

#[async_trait]
impl Notifier for Outbox {
    async fn send_text(&self, recipient: i64, body: &str) -> Result<()> {
        self.sent.lock().unwrap().push((recipient, body.to_string()));
        Ok(())
    }

    async fn send_photo(&self, recipient: i64, image_url: &str, caption: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient, format!("[photo {}] {}", image_url, caption)));
        Ok(())
    }
}

struct FakeAi {
    calls: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl FakeAi {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
            delay: Duration::ZERO,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay,
        })
    }
}

#[async_trait]
impl AiProvider for FakeAi {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        "fake"
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> std::result::Result<TranslateResult, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(AiError::new("openai", "insufficient_quota", "quota", AiErrorKind::Quota));
        }
        Ok(TranslateResult {
            original_text: text.to_string(),
            translated_text: format!("TRANSLATED({})", target_lang),
            source_lang: if source_lang.is_empty() { "auto".to_string() } else { source_lang.to_string() },
            target_lang: target_lang.to_string(),
            provider: "openai".to_string(),
            model: "fake".to_string(),
            tokens_used: 100,
            processing_time_ms: 1,
            created_at: Utc::now(),
        })
    }

    async fn summarize(
        &self,
        text: &str,
        max_length: u32,
        min_length: u32,
    ) -> std::result::Result<SummaryResult, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SummaryResult {
            original_text: text.to_string(),
            summary_text: "SUMMARY".to_string(),
            max_length,
            min_length,
            provider: "openai".to_string(),
            model: "fake".to_string(),
            tokens_used: 50,
            processing_time_ms: 1,
            created_at: Utc::now(),
        })
    }

    async fn is_available(&self) -> bool {
        true
    }
}

const GOOD: &str = "https://good.example/rss";
const MIRROR: &str = "https://mirror.example/rss";
const BROKEN: &str = "https://broken.example/rss";
const LONG_BODY: &str = "<p>Every item in the store is discounted this weekend, including laptops.</p>";

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_770_000_000 + secs, 0).unwrap()
}

fn item(title: &str, description: &str, secs: i64) -> FeedItem {
    FeedItem {
        title: title.to_string(),
        description: description.to_string(),
        link: format!("https://good.example/{}", secs),
        published: Some(at(secs)),
        updated: None,
    }
}

fn config(extra: &str) -> Config {
    let mut config: Config = toml::from_str(&format!("db_path = \":memory:\"\n{}", extra)).unwrap();
    config.ai.features.translation.enabled = true;
    config.ai.features.summarization.enabled = true;
    config.ai.features.summarization.min_length = 10;
    config
}

struct Harness {
    repo: Arc<Repository>,
    feeds: Arc<FakeFeeds>,
    outbox: Arc<Outbox>,
    coordinator: CycleCoordinator,
}

async fn harness(config: Config, ai: Option<Arc<FakeAi>>) -> Harness {
    let repo = Arc::new(Repository::in_memory().await.unwrap());
    let feeds = Arc::new(FakeFeeds::default());
    let outbox = Arc::new(Outbox::default());
    let ai = ai.map(|provider| AiOrchestrator::new(provider, repo.clone(), Duration::from_secs(5)));
    let ctx = PipelineContext::new(repo.clone(), feeds.clone(), ai, outbox.clone(), &config).unwrap();
    Harness {
        repo,
        feeds,
        outbox,
        coordinator: CycleCoordinator::new(Arc::new(ctx)),
    }
}

#[tokio::test]
async fn failing_subscription_does_not_block_others() {
    let h = harness(config(""), None).await;
    h.repo.upsert_subscription("broken", BROKEN, DeliveryMode::Link, &[1]).await.unwrap();
    h.repo.upsert_subscription("good", GOOD, DeliveryMode::Link, &[1]).await.unwrap();
    h.repo.set_user_keywords(1, &["sale".to_string()]).await.unwrap();

    h.feeds.set(GOOD, vec![item("Old sale", "", 0)]);
    let baseline = assert_ok!(h.coordinator.run_cycle().await);
    assert_eq!(baseline.subscriptions, 2);
    assert_eq!(baseline.failures, 1);
    assert_eq!(baseline.new_items, 0);
    assert_eq!(baseline.deliveries, 0);

    h.feeds.set(GOOD, vec![item("Big Sale", "50% off", 60), item("Old sale", "", 0)]);
    let report = assert_ok!(h.coordinator.run_cycle().await);
    assert_eq!(report.failures, 1);
    assert_eq!(report.new_items, 1);
    assert_eq!(report.deliveries, 1);
    assert_eq!(report.delivered, 1);

    let sent = h.outbox.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 1);
    assert!(sent[0].1.starts_with("📌 Big Sale\n🔖 Keywords: <code>sale</code>"));

    let cursor = h.repo.peek_cursor("good").await.unwrap().unwrap();
    assert_eq!(cursor.last_update, at(60));
    assert_eq!(cursor.latest_title, "Big Sale");
    assert!(h.repo.peek_cursor("broken").await.unwrap().is_none());
}

#[tokio::test]
async fn keyword_rules_decide_recipients() {
    let h = harness(config(""), None).await;
    h.repo.upsert_subscription("good", GOOD, DeliveryMode::Link, &[1, 2, 3, 4]).await.unwrap();
    h.repo.set_user_keywords(1, &["sale".to_string()]).await.unwrap();
    h.repo.set_user_keywords(2, &["-sale".to_string(), "50%".to_string()]).await.unwrap();
    h.repo.set_user_keywords(3, &[]).await.unwrap();
    h.repo.set_user_keywords(4, &["dea*".to_string()]).await.unwrap();

    h.feeds.set(GOOD, vec![item("baseline", "", 0)]);
    h.coordinator.run_cycle().await.unwrap();

    h.feeds.set(
        GOOD,
        vec![item("Sale", "50% off", 60), item("An idea", "nothing", 30), item("Dealer news", "", 20)],
    );
    let report = h.coordinator.run_cycle().await.unwrap();
    assert_eq!(report.new_items, 3);

    let recipients: Vec<i64> = h.outbox.messages().into_iter().map(|(to, _)| to).collect();
    assert_eq!(recipients, vec![1, 4]);
}

#[tokio::test]
async fn admin_receives_a_copy_of_each_delivery() {
    let h = harness(config("admin_chat_id = 999"), None).await;
    h.repo.upsert_subscription("good", GOOD, DeliveryMode::Full, &[1]).await.unwrap();
    h.repo.set_user_keywords(1, &["sale".to_string()]).await.unwrap();

    h.feeds.set(GOOD, vec![item("baseline", "", 0)]);
    h.coordinator.run_cycle().await.unwrap();
    h.feeds.set(GOOD, vec![item("Sale", "<b>Now</b>", 60)]);
    let report = h.coordinator.run_cycle().await.unwrap();

    assert_eq!(report.deliveries, 1);
    assert_eq!(report.delivered, 2);
    let sent = h.outbox.messages();
    assert_eq!(sent[0].0, 1);
    assert!(sent[0].1.starts_with("👋 good: <code>sale</code>\n"));
    assert_eq!(sent[1].0, 999);
    assert!(sent[1].1.starts_with("👋 good\n"));
    assert!(sent[1].1.ends_with("<b>Now</b>"));
}

#[tokio::test]
async fn augmentation_is_cached_across_subscribers() {
    let ai = FakeAi::new(false);
    let h = harness(config(""), Some(ai.clone())).await;
    h.repo.upsert_subscription("good", GOOD, DeliveryMode::Full, &[1, 2, 3]).await.unwrap();
    for user in [1, 2, 3] {
        h.repo.set_user_keywords(user, &["store".to_string()]).await.unwrap();
    }
    for user in [1, 2] {
        let mut prefs = UserAiPreferences::defaults(user);
        prefs.auto_translate = true;
        prefs.preferred_lang = "en".to_string();
        h.repo.upsert_preferences(&prefs).await.unwrap();
    }

    h.feeds.set(GOOD, vec![item("baseline", "", 0)]);
    h.coordinator.run_cycle().await.unwrap();
    h.feeds.set(GOOD, vec![item("Weekend", LONG_BODY, 60)]);
    h.coordinator.run_cycle().await.unwrap();

    assert_eq!(ai.calls.load(Ordering::SeqCst), 1);

    let sent = h.outbox.messages();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].1.contains("🌐 <b>Translation</b>:\nTRANSLATED(en)"));
    assert!(sent[1].1.contains("🌐 <b>Translation</b>:\nTRANSLATED(en)"));
    assert!(sent[0].1.contains("📝 <b>Original</b>:\nEvery item in the store"));
    // User 3 has no preferences and gets the plain rendering.
    assert!(!sent[2].1.contains("Translation"));

    let usage = h.repo.get_usage_stats(1).await.unwrap();
    assert_eq!(usage[0].translate_count, 1);
}

#[tokio::test]
async fn same_item_in_concurrent_subscriptions_is_translated_once() {
    let ai = FakeAi::slow(Duration::from_millis(50));
    let h = harness(config(""), Some(ai.clone())).await;
    h.repo.upsert_subscription("good", GOOD, DeliveryMode::Full, &[1]).await.unwrap();
    h.repo.upsert_subscription("mirror", MIRROR, DeliveryMode::Full, &[2]).await.unwrap();
    for user in [1, 2] {
        h.repo.set_user_keywords(user, &["store".to_string()]).await.unwrap();
        let mut prefs = UserAiPreferences::defaults(user);
        prefs.auto_translate = true;
        prefs.preferred_lang = "en".to_string();
        h.repo.upsert_preferences(&prefs).await.unwrap();
    }

    for url in [GOOD, MIRROR] {
        h.feeds.set(url, vec![item("baseline", "", 0)]);
    }
    h.coordinator.run_cycle().await.unwrap();
    for url in [GOOD, MIRROR] {
        h.feeds.set(url, vec![item("Weekend", LONG_BODY, 60)]);
    }
    let report = h.coordinator.run_cycle().await.unwrap();

    assert_eq!(report.delivered, 2);
    assert_eq!(ai.calls.load(Ordering::SeqCst), 1);
    let usage = h.repo.get_usage_stats(1).await.unwrap();
    assert_eq!(usage[0].translate_count, 1);
    for (_, body) in h.outbox.messages() {
        assert!(body.contains("TRANSLATED(en)"));
    }
}

#[tokio::test]
async fn failed_augmentation_still_delivers() {
    let ai = FakeAi::new(true);
    let h = harness(config(""), Some(ai.clone())).await;
    h.repo.upsert_subscription("good", GOOD, DeliveryMode::Link, &[1]).await.unwrap();
    h.repo.set_user_keywords(1, &["store".to_string()]).await.unwrap();
    let mut prefs = UserAiPreferences::defaults(1);
    prefs.auto_translate = true;
    prefs.auto_summarize = true;
    h.repo.upsert_preferences(&prefs).await.unwrap();

    h.feeds.set(GOOD, vec![item("baseline", "", 0)]);
    h.coordinator.run_cycle().await.unwrap();
    h.feeds.set(GOOD, vec![item("Weekend", LONG_BODY, 60)]);
    let report = h.coordinator.run_cycle().await.unwrap();

    assert_eq!(report.delivered, 1);
    let body = &h.outbox.messages()[0].1;
    assert!(!body.contains("Translation"));
    // Translation failed, the summary still went through.
    assert!(body.contains("\n📄 Summary: SUMMARY\n🔗 "));
}

#[tokio::test]
async fn short_items_skip_ai() {
    let ai = FakeAi::new(false);
    let h = harness(config(""), Some(ai.clone())).await;
    h.repo.upsert_subscription("good", GOOD, DeliveryMode::Link, &[1]).await.unwrap();
    h.repo.set_user_keywords(1, &["sale".to_string()]).await.unwrap();
    let mut prefs = UserAiPreferences::defaults(1);
    prefs.auto_translate = true;
    h.repo.upsert_preferences(&prefs).await.unwrap();

    h.feeds.set(GOOD, vec![item("baseline", "", 0)]);
    h.coordinator.run_cycle().await.unwrap();
    h.feeds.set(GOOD, vec![item("Sale", "today", 60)]);
    let report = h.coordinator.run_cycle().await.unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(ai.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cursor_is_monotonic_across_cycles() {
    let h = harness(config(""), None).await;
    h.repo.upsert_subscription("good", GOOD, DeliveryMode::Link, &[1]).await.unwrap();

    for (secs, expected) in [(100, 100), (300, 300), (200, 300)] {
        h.feeds.set(GOOD, vec![item("x", "", secs)]);
        h.coordinator.run_cycle().await.unwrap();
        let cursor = h.repo.peek_cursor("good").await.unwrap().unwrap();
        assert_eq!(cursor.last_update, at(expected));
    }
}
