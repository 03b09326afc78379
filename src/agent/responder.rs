use std::collections::HashMap;

use rand::Rng;
use rand::seq::IndexedRandom;

use super::category::Category;
use crate::config::Lexicon;
use crate::error::CompanionError;

/// Maps a category to the agent's reply text.
#[derive(Debug, Clone)]
pub struct ResponseSelector {
    responses: HashMap<Category, String>,
    fallback: Vec<String>,
}

impl ResponseSelector {
    pub fn new(lexicon: &Lexicon) -> Self {
        Self {
            responses: lexicon
                .rules
                .iter()
                .map(|rule| (rule.category, rule.response.clone()))
                .collect(),
            fallback: lexicon.fallback.clone(),
        }
    }

    /// Reply for a category.
    ///
    /// Fixed categories return their configured response verbatim. The
    /// catch-all draws uniformly from the fallback pool using `rng`.
    pub fn select_response<R: Rng + ?Sized>(
        &self,
        category: Category,
        rng: &mut R,
    ) -> Result<String, CompanionError> {
        let reply = if category.has_fixed_response() {
            self.responses.get(&category)
        } else {
            self.fallback.choose(rng)
        };
        reply
            .cloned()
            .ok_or(CompanionError::InvalidCategory(category))
    }

    pub fn fallback_pool(&self) -> &[String] {
        &self.fallback
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn selector() -> ResponseSelector {
        ResponseSelector::new(&Lexicon::default())
    }

    #[test]
    fn fixed_categories_return_configured_text() {
        let lexicon = Lexicon::default();
        let s = selector();
        let mut rng = StdRng::seed_from_u64(1);
        for rule in &lexicon.rules {
            assert_eq!(
                s.select_response(rule.category, &mut rng).unwrap(),
                rule.response
            );
        }
    }

    #[test]
    fn greeting_reply() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            selector()
                .select_response(Category::Greeting, &mut rng)
                .unwrap(),
            "Hello there. How can I support you today?"
        );
    }

    #[test]
    fn fallback_draws_stay_in_pool() {
        let s = selector();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let reply = s.select_response(Category::Uncategorized, &mut rng).unwrap();
            assert!(s.fallback_pool().contains(&reply), "{reply}");
        }
    }

    #[test]
    fn fallback_draws_are_roughly_uniform() {
        let s = selector();
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..1000 {
            let reply = s.select_response(Category::Uncategorized, &mut rng).unwrap();
            *counts.entry(reply).or_default() += 1;
        }
        assert_eq!(counts.len(), s.fallback_pool().len());
        // Expected 200 each; allow six standard deviations either way.
        for (reply, count) in &counts {
            assert!((120..=280).contains(count), "{reply}: {count}");
        }
    }

    #[test]
    fn same_seed_same_replies() {
        let s = selector();
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..20)
                .map(|_| s.select_response(Category::Uncategorized, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(3), draw(3));
    }

    #[test]
    fn missing_category_is_invalid() {
        let mut lexicon = Lexicon::default();
        lexicon.rules.retain(|r| r.category != Category::Gratitude);
        let s = ResponseSelector::new(&lexicon);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            s.select_response(Category::Gratitude, &mut rng),
            Err(CompanionError::InvalidCategory(Category::Gratitude))
        );
    }

    #[test]
    fn empty_pool_is_invalid() {
        let mut lexicon = Lexicon::default();
        lexicon.fallback.clear();
        let s = ResponseSelector::new(&lexicon);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            s.select_response(Category::Uncategorized, &mut rng),
            Err(CompanionError::InvalidCategory(Category::Uncategorized))
        );
    }

    #[test]
    fn works_through_a_trait_object() {
        let s = selector();
        let mut rng: Box<dyn rand::RngCore + Send> = Box::new(StdRng::seed_from_u64(9));
        let reply = s.select_response(Category::Uncategorized, &mut *rng).unwrap();
        assert!(s.fallback_pool().contains(&reply));
    }
}
