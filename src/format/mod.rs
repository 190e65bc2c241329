mod notification;
mod sanitize;

pub use notification::{format_keywords, NotificationFormatter, ProcessedMessage, MAX_CAPTION_CHARS};
pub use sanitize::{escape_html, extract_image_url, render_text, sanitize, to_plain_text, truncate_chars};
