use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Classification bucket for a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Crisis,
    Sadness,
    Anxiety,
    Loneliness,
    Gratitude,
    Greeting,
    Uncategorized,
}

impl Category {
    /// Every category, crisis first and the catch-all last.
    pub const ALL: [Category; 7] = [
        Category::Crisis,
        Category::Sadness,
        Category::Anxiety,
        Category::Loneliness,
        Category::Gratitude,
        Category::Greeting,
        Category::Uncategorized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Crisis => "crisis",
            Category::Sadness => "sadness",
            Category::Anxiety => "anxiety",
            Category::Loneliness => "loneliness",
            Category::Gratitude => "gratitude",
            Category::Greeting => "greeting",
            Category::Uncategorized => "uncategorized",
        }
    }

    /// Whether this category is answered from a single fixed response.
    pub fn has_fixed_response(&self) -> bool {
        !matches!(self, Category::Uncategorized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crisis_leads_and_uncategorized_trails() {
        assert_eq!(Category::ALL.first(), Some(&Category::Crisis));
        assert_eq!(Category::ALL.last(), Some(&Category::Uncategorized));
    }

    #[test]
    fn serde_names_match_display() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{category}\""));
        }
    }

    #[test]
    fn only_uncategorized_uses_the_pool() {
        assert!(!Category::Uncategorized.has_fixed_response());
        assert!(Category::Crisis.has_fixed_response());
        assert!(Category::Greeting.has_fixed_response());
    }
}
