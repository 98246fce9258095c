use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Shopify,
    Snitch,
    Tasva,
}

impl Source {
    pub fn key(&self) -> &'static str {
        match self {
            Source::Shopify => "shopify",
            Source::Snitch => "snitch",
            Source::Tasva => "tasva",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "shopify" => Some(Source::Shopify),
            "snitch" => Some(Source::Snitch),
            "tasva" => Some(Source::Tasva),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        for source in [Source::Shopify, Source::Snitch, Source::Tasva] {
            assert_eq!(Source::from_key(source.key()), Some(source));
        }
        assert_eq!(Source::from_key("amazon"), None);
    }
}
