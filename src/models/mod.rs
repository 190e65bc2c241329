mod ai;
mod message;
mod subscription;

pub use ai::{
    AiOperation, CacheRecord, Language, SummaryResult, TranslateResult, UsageStat,
    UserAiPreferences, DEFAULT_MAX_SUMMARY_LENGTH, DEFAULT_PREFERRED_LANG, SUPPORTED_LANGUAGES,
};
pub use message::{FeedItem, Message};
pub use subscription::{parse_user_ids, DeliveryMode, Subscription};
