use chrono::FixedOffset;

use super::sanitize::{escape_html, extract_image_url, sanitize, to_plain_text, truncate_chars};
use crate::delivery::Outbound;
use crate::models::{DeliveryMode, Message, SummaryResult, TranslateResult};

/// Telegram rejects photo captions longer than this.
pub const MAX_CAPTION_CHARS: usize = 1024;
const ORIGINAL_PREVIEW_CHARS: usize = 300;

/// A matched message together with whatever augmentation succeeded.
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    pub message: Message,
    pub translation: Option<TranslateResult>,
    pub summary: Option<SummaryResult>,
}

impl ProcessedMessage {
    pub fn plain(message: Message) -> Self {
        Self {
            message,
            translation: None,
            summary: None,
        }
    }

    pub fn has_ai(&self) -> bool {
        self.translation.is_some() || self.summary.is_some()
    }
}

/// Each keyword in its own `<code>` span.
pub fn format_keywords<S: AsRef<str>>(keywords: &[S]) -> String {
    keywords
        .iter()
        .map(|k| format!("<code>{}</code>", escape_html(k.as_ref())))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct NotificationFormatter {
    offset: FixedOffset,
}

impl NotificationFormatter {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    fn format_date(&self, message: &Message) -> String {
        message
            .published
            .with_timezone(&self.offset)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    pub fn render(
        &self,
        subscription_name: &str,
        mode: DeliveryMode,
        processed: &ProcessedMessage,
        keywords: &str,
    ) -> Outbound {
        match mode {
            DeliveryMode::Full => self.render_full(subscription_name, processed, keywords),
            DeliveryMode::Link => Outbound::Text {
                body: self.render_link(processed, keywords),
            },
        }
    }

    fn render_full(&self, name: &str, processed: &ProcessedMessage, keywords: &str) -> Outbound {
        let msg = &processed.message;
        let date = self.format_date(msg);

        let body = if processed.has_ai() {
            let mut body = format!("👋 {}: {}\n🕒 {}\n\n", escape_html(name), keywords, date);
            if let Some(t) = &processed.translation {
                body.push_str("🌐 <b>Translation</b>:\n");
                body.push_str(&escape_html(&t.translated_text));
                body.push_str("\n\n");
            }
            if let Some(s) = &processed.summary {
                body.push_str("📄 <b>Summary</b>:\n");
                body.push_str(&escape_html(&s.summary_text));
                body.push_str("\n\n");
            }
            if !msg.description.is_empty() {
                body.push_str("📝 <b>Original</b>:\n");
                body.push_str(&truncate_chars(&to_plain_text(&msg.description), ORIGINAL_PREVIEW_CHARS));
                body.push('\n');
            }
            body
        } else {
            format!(
                "👋 {}: {}\n🕒 {}\n{}\n",
                escape_html(name),
                keywords,
                date,
                sanitize(&msg.description)
            )
        };

        match extract_image_url(&msg.description) {
            Some(image_url) if body.chars().count() <= MAX_CAPTION_CHARS => Outbound::Photo {
                image_url,
                caption: body,
            },
            _ => Outbound::Text { body },
        }
    }

    fn render_link(&self, processed: &ProcessedMessage, keywords: &str) -> String {
        let msg = &processed.message;
        let mut body = format!(
            "📌 {}\n🔖 Keywords: {}\n🕒 {}",
            escape_html(&msg.title),
            keywords,
            self.format_date(msg)
        );
        if let Some(t) = &processed.translation {
            body.push_str(&format!("\n🌐 Translation: {}", escape_html(&t.translated_text)));
        }
        if let Some(s) = &processed.summary {
            body.push_str(&format!("\n📄 Summary: {}", escape_html(&s.summary_text)));
        }
        body.push_str(&format!("\n🔗 {}", escape_html(&msg.link)));
        body
    }

    /// Abbreviated copy for the administrator chat.
    pub fn render_admin_copy(&self, subscription_name: &str, mode: DeliveryMode, message: &Message) -> String {
        let date = self.format_date(message);
        match mode {
            DeliveryMode::Full => format!(
                "👋 {}\n🕒 {}\n{}",
                escape_html(subscription_name),
                date,
                sanitize(&message.description)
            ),
            DeliveryMode::Link => format!(
                "📌 {}\n🕒 {}\n🔗 {}",
                escape_html(&message.title),
                date,
                escape_html(&message.link)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(description: &str) -> Message {
        Message {
            title: "Rust & Go".to_string(),
            description: description.to_string(),
            link: "https://news.example/a?x=1&y=2".to_string(),
            // 2026-03-02 10:00:00 UTC
            published: Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap(),
        }
    }

    fn translation(text: &str) -> TranslateResult {
        TranslateResult {
            original_text: String::new(),
            translated_text: text.to_string(),
            source_lang: "auto".to_string(),
            target_lang: "en".to_string(),
            provider: "openai".to_string(),
            model: "m".to_string(),
            tokens_used: 1,
            processing_time_ms: 1,
            created_at: Utc::now(),
        }
    }

    fn summary(text: &str) -> SummaryResult {
        SummaryResult {
            original_text: String::new(),
            summary_text: text.to_string(),
            max_length: 200,
            min_length: 100,
            provider: "openai".to_string(),
            model: "m".to_string(),
            tokens_used: 1,
            processing_time_ms: 1,
            created_at: Utc::now(),
        }
    }

    fn formatter(hours: i32) -> NotificationFormatter {
        NotificationFormatter::new(FixedOffset::east_opt(hours * 3600).unwrap())
    }

    fn text_body(outbound: Outbound) -> String {
        match outbound {
            Outbound::Text { body } => body,
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_keywords_are_code_spans() {
        assert_eq!(format_keywords(&["sale", "<b>"]), "<code>sale</code> <code>&lt;b&gt;</code>");
        assert_eq!(format_keywords::<&str>(&[]), "");
    }

    #[test]
    fn test_full_without_ai() {
        let fmt = formatter(8);
        let processed = ProcessedMessage::plain(message("<p>Big <b>news</b></p>"));
        let body = text_body(fmt.render("Tech", DeliveryMode::Full, &processed, "<code>rust</code>"));
        assert_eq!(
            body,
            "👋 Tech: <code>rust</code>\n🕒 2026-03-02 18:00:00\nBig <b>news</b>\n"
        );
    }

    #[test]
    fn test_full_body_is_balanced_and_escaped() {
        let fmt = formatter(8);
        let processed = ProcessedMessage::plain(message("AT&T <b>deal</i> < $5"));
        let body = text_body(fmt.render("Tech", DeliveryMode::Full, &processed, ""));
        assert!(body.ends_with("\nAT&amp;T <b>deal &lt; $5</b>\n"));
    }

    #[test]
    fn test_full_with_ai_sections() {
        let fmt = formatter(8);
        let long = "x".repeat(400);
        let processed = ProcessedMessage {
            message: message(&format!("<p>{}</p>", long)),
            translation: Some(translation("Hello <world>")),
            summary: Some(summary("Short")),
        };
        let body = text_body(fmt.render("Tech", DeliveryMode::Full, &processed, "<code>x</code>"));

        let expected_original = format!("{}...", "x".repeat(300));
        assert_eq!(
            body,
            format!(
                "👋 Tech: <code>x</code>\n🕒 2026-03-02 18:00:00\n\n🌐 <b>Translation</b>:\nHello &lt;world&gt;\n\n📄 <b>Summary</b>:\nShort\n\n📝 <b>Original</b>:\n{}\n",
                expected_original
            )
        );
    }

    #[test]
    fn test_full_with_only_summary() {
        let fmt = formatter(0);
        let processed = ProcessedMessage {
            message: message("Body"),
            translation: None,
            summary: Some(summary("Sum")),
        };
        let body = text_body(fmt.render("Tech", DeliveryMode::Full, &processed, ""));
        assert!(!body.contains("Translation"));
        assert!(body.contains("📄 <b>Summary</b>:\nSum\n\n📝 <b>Original</b>:\nBody\n"));
        assert!(body.contains("🕒 2026-03-02 10:00:00"));
    }

    #[test]
    fn test_full_with_image_is_photo() {
        let fmt = formatter(8);
        let processed = ProcessedMessage::plain(message(r#"<img src="https://i.example/a.png">Caption"#));
        match fmt.render("Tech", DeliveryMode::Full, &processed, "") {
            Outbound::Photo { image_url, caption } => {
                assert_eq!(image_url, "https://i.example/a.png");
                assert!(caption.ends_with("Caption\n"));
                assert!(!caption.contains("<img"));
            }
            other => panic!("expected photo, got {:?}", other),
        }
    }

    #[test]
    fn test_long_caption_falls_back_to_text() {
        let fmt = formatter(8);
        let description = format!(r#"<img src="https://i.example/a.png">{}"#, "y".repeat(1100));
        let processed = ProcessedMessage::plain(message(&description));
        assert!(matches!(
            fmt.render("Tech", DeliveryMode::Full, &processed, ""),
            Outbound::Text { .. }
        ));
    }

    #[test]
    fn test_link_mode() {
        let fmt = formatter(8);
        let plain = ProcessedMessage::plain(message(r#"<img src="https://i.example/a.png">"#));
        let body = text_body(fmt.render("Tech", DeliveryMode::Link, &plain, "<code>go</code>"));
        assert_eq!(
            body,
            "📌 Rust &amp; Go\n🔖 Keywords: <code>go</code>\n🕒 2026-03-02 18:00:00\n🔗 https://news.example/a?x=1&amp;y=2"
        );

        let augmented = ProcessedMessage {
            message: message(""),
            translation: Some(translation("Rust und Go")),
            summary: Some(summary("Zwei Sprachen")),
        };
        let body = text_body(fmt.render("Tech", DeliveryMode::Link, &augmented, ""));
        assert!(body.contains("\n🌐 Translation: Rust und Go\n📄 Summary: Zwei Sprachen\n🔗 "));
    }

    #[test]
    fn test_admin_copy() {
        let fmt = formatter(8);
        let msg = message("<div>Body<br>more</div>");
        assert_eq!(
            fmt.render_admin_copy("Tech", DeliveryMode::Full, &msg),
            "👋 Tech\n🕒 2026-03-02 18:00:00\nBody\nmore"
        );
        assert_eq!(
            fmt.render_admin_copy("Tech", DeliveryMode::Link, &msg),
            "📌 Rust &amp; Go\n🕒 2026-03-02 18:00:00\n🔗 https://news.example/a?x=1&amp;y=2"
        );
    }
}
