use crate::models::Language;

pub const TRANSLATION_SYSTEM: &str =
    "You are a professional translator. Translate the user's text accurately.";

pub const SUMMARY_SYSTEM: &str = "You are a news summarization assistant. \
Extract the core information of a text and write a concise summary.";

pub fn translation(text: &str, source_lang: &str, target_lang: &str) -> String {
    let target = Language::display_name(target_lang);
    if source_lang.is_empty() {
        format!(
            "Translate the following text into {}. Return only the translation, without explanations or formatting:\n\n{}",
            target, text
        )
    } else {
        format!(
            "Translate the following {} text into {}. Return only the translation, without explanations or formatting:\n\n{}",
            Language::display_name(source_lang),
            target,
            text
        )
    }
}

pub fn summary(text: &str, max_length: u32) -> String {
    format!(
        r#"Write a concise summary of the text below.
1. The summary must not exceed {} characters
2. Keep the main facts and key points
3. Use plain, clear language
4. Return only the summary, without explanations or formatting

Text:
{}"#,
        max_length, text
    )
}
