use regex::Regex;

use crate::models::Message;

const BLOCK_MARKER: char = '-';
const WILDCARD: char = '*';

/// Parse a stored keyword list: a JSON array of strings, or a comma separated list.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    if raw.starts_with('[') && raw.ends_with(']') {
        if let Ok(keywords) = serde_json::from_str::<Vec<String>>(raw) {
            return keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }
    }

    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
enum Matcher {
    Contains(String),
    Glob(Regex),
}

/// One compiled keyword rule.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    /// Rule text as the user wrote it, without the block marker.
    keyword: String,
    blocking: bool,
    matcher: Matcher,
}

impl KeywordRule {
    /// Compile a raw rule. Returns `None` for rules that can never match
    /// meaningfully (empty text, a bare wildcard) or whose pattern fails to build.
    pub fn compile(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (blocking, keyword) = match raw.strip_prefix(BLOCK_MARKER) {
            Some(rest) => (true, rest.trim()),
            None => (false, raw),
        };

        let lowered = keyword.to_lowercase();
        if lowered.chars().all(|c| c == WILDCARD) {
            return None;
        }

        let matcher = if lowered.contains(WILDCARD) {
            match glob_to_regex(&lowered) {
                Ok(re) => Matcher::Glob(re),
                Err(e) => {
                    tracing::debug!("Skipping keyword {:?}: {}", keyword, e);
                    return None;
                }
            }
        } else {
            Matcher::Contains(lowered)
        };

        Some(Self {
            keyword: keyword.to_string(),
            blocking,
            matcher,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// `content` must already be lowercased.
    fn is_match(&self, content: &str) -> bool {
        match &self.matcher {
            Matcher::Contains(needle) => content.contains(needle.as_str()),
            Matcher::Glob(re) => re.is_match(content),
        }
    }
}

/// Literal pieces are escaped and each `*` becomes a lazy any-sequence. The
/// pattern is anchored to a word edge on every side that does not start or
/// end with a wildcard, so `dea*` finds "dealer" but not "idea".
fn glob_to_regex(glob: &str) -> std::result::Result<Regex, regex::Error> {
    let body = glob
        .split(WILDCARD)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*?");

    let head = if glob.starts_with(WILDCARD) { "" } else { r"(?:^|\W)" };
    let tail = if glob.ends_with(WILDCARD) { "" } else { r"(?:\W|$)" };

    Regex::new(&format!("(?s){}{}{}", head, body, tail))
}

/// A user's compiled rules, evaluated against each message.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<KeywordRule>,
}

impl RuleSet {
    pub fn compile<S: AsRef<str>>(keywords: &[S]) -> Self {
        let rules = keywords
            .iter()
            .filter_map(|k| KeywordRule::compile(k.as_ref()))
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Matched inclusion keywords, in rule order.
    ///
    /// Every rule is evaluated first; if any blocking rule matched the result
    /// is empty no matter how many inclusion rules also matched.
    pub fn matches(&self, message: &Message) -> Vec<String> {
        let content = format!("{} {}", message.title, message.description).to_lowercase();

        let mut matched = Vec::new();
        let mut blocked = Vec::new();
        for rule in &self.rules {
            if !rule.is_match(&content) {
                continue;
            }
            if rule.blocking {
                blocked.push(rule.keyword.as_str());
            } else {
                matched.push(rule.keyword.clone());
            }
        }

        if !blocked.is_empty() {
            tracing::debug!("Blocked by [{}]: {}", blocked.join(", "), message.title);
            return Vec::new();
        }

        matched
    }
}

/// Compile `keywords` and match them against one message.
pub fn match_keywords<S: AsRef<str>>(message: &Message, keywords: &[S]) -> Vec<String> {
    RuleSet::compile(keywords).matches(message)
}
