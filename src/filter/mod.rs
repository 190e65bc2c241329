mod keywords;

pub use keywords::{match_keywords, parse_keywords, KeywordRule, RuleSet};
