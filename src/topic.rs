// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
use serde::{Deserialize, Serialize};

/// Topic name or topic filter as carried by an intercept event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    text: String,
    tokens: Vec<String>,
}

impl Topic {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            tokens: get_topic_tokens(text),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Levels split by '/'
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// True when the topic contains '+' or '#' levels
    pub fn has_wildcard(&self) -> bool {
        self.tokens.iter().any(|t| t == "+" || t == "#")
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.text.starts_with(prefix)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split topic into tokens
pub fn get_topic_tokens(topic: &str) -> Vec<String> {
    topic.split('/').map(|s| s.to_string()).collect()
}

/// Check whether `topic_tokens` lies inside the namespace of `filter_tokens`.
///
/// Wildcards in the topic itself (subscribe filters) are compared literally,
/// so `devices/+/status` falls under `devices/#` and `devices/+/status` but
/// not under `devices/d1/status`.
pub fn topic_matches(topic_tokens: &[String], filter_tokens: &[String]) -> bool {
    let mut topic_iter = topic_tokens.iter();
    let mut filter_iter = filter_tokens.iter();

    loop {
        match (topic_iter.next(), filter_iter.next()) {
            (Some(topic_level), Some(filter_level)) => {
                if filter_level == "#" {
                    return true;
                }
                if filter_level == "+" {
                    continue;
                }
                if topic_level != filter_level {
                    return false;
                }
            }
            // "a/#" also covers "a"
            (None, Some(filter_level)) => return filter_level == "#",
            (Some(_), None) => return false,
            (None, None) => return true,
        }
    }
}

/// Namespace a handler claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicFilter {
    /// Plain string prefix, e.g. `alerts/`
    Prefix(String),
    /// Wildcard pattern, e.g. `devices/+/status` or `devices/#`
    Pattern(String),
}

impl TopicFilter {
    pub fn prefix(prefix: &str) -> Self {
        TopicFilter::Prefix(prefix.to_string())
    }

    pub fn pattern(pattern: &str) -> Self {
        TopicFilter::Pattern(pattern.to_string())
    }

    pub fn matches(&self, topic: &Topic) -> bool {
        match self {
            TopicFilter::Prefix(prefix) => topic.starts_with(prefix),
            TopicFilter::Pattern(pattern) => {
                topic_matches(topic.tokens(), &get_topic_tokens(pattern))
            }
        }
    }
}

impl std::fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopicFilter::Prefix(prefix) => write!(f, "{prefix}*"),
            TopicFilter::Pattern(pattern) => f.write_str(pattern),
        }
    }
}
