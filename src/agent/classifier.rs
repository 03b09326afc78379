use serde::Serialize;

use super::category::Category;
use super::lexicon;
use crate::config::Lexicon;
use crate::error::CompanionError;

/// Result of classifying one message, with the trigger that decided it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

/// Ordered first-match classifier over a validated lexicon.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<(Category, Vec<String>)>,
}

impl IntentClassifier {
    /// Build the priority list from a lexicon.
    ///
    /// The crisis rule is hoisted to the front; the others keep their
    /// configured order.
    pub fn new(lexicon: &Lexicon) -> Result<Self, CompanionError> {
        lexicon.validate()?;

        let mut rules: Vec<(Category, Vec<String>)> = lexicon
            .rules
            .iter()
            .map(|rule| (rule.category, rule.triggers.clone()))
            .collect();

        if let Some(pos) = rules.iter().position(|(c, _)| *c == Category::Crisis) {
            let crisis = rules.remove(pos);
            rules.insert(0, crisis);
        }

        Ok(Self { rules })
    }

    pub fn classify(&self, text: &str) -> Category {
        self.explain(text).category
    }

    pub fn explain(&self, text: &str) -> Classification {
        let folded = text.to_lowercase();
        for (category, triggers) in &self.rules {
            if let Some(trigger) = lexicon::first_match_folded(&folded, triggers) {
                tracing::debug!(%category, trigger, "classified message");
                return Classification {
                    category: *category,
                    trigger: Some(trigger.to_string()),
                };
            }
        }
        tracing::debug!("no trigger matched");
        Classification {
            category: Category::Uncategorized,
            trigger: None,
        }
    }

    /// Categories in evaluation order, ending with the catch-all.
    pub fn priority(&self) -> Vec<Category> {
        self.rules
            .iter()
            .map(|(category, _)| *category)
            .chain(std::iter::once(Category::Uncategorized))
            .collect()
    }
}
