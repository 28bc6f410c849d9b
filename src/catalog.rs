//! Read-only queries over a catalog snapshot: lookup, categories, search.

use std::collections::HashMap;

use nucleo::{Config as NucleoConfig, Matcher, Utf32Str};

use crate::recipe::Recipe;

pub fn find_by_id(catalog: &[Recipe], id: i64) -> Option<&Recipe> {
    catalog.iter().find(|r| r.id == id)
}

/// Recipes for `ids`, in `ids` order. Unknown ids are skipped.
pub fn resolve_ids<'a>(catalog: &'a [Recipe], ids: &[i64]) -> Vec<&'a Recipe> {
    let by_id: HashMap<i64, &Recipe> = catalog.iter().map(|r| (r.id, r)).collect();
    ids.iter().filter_map(|id| by_id.get(id).copied()).collect()
}

/// Distinct category labels in first-seen order.
pub fn categories(catalog: &[Recipe]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for recipe in catalog {
        if !seen.contains(&recipe.category.as_str()) {
            seen.push(&recipe.category);
        }
    }
    seen
}

pub fn in_category<'a>(catalog: &'a [Recipe], category: &str) -> Vec<&'a Recipe> {
    catalog
        .iter()
        .filter(|r| r.category.eq_ignore_ascii_case(category))
        .collect()
}

/// Ranks recipes against a free-text query.
pub struct RecipeSearch {
    matcher: Matcher,
}

impl Default for RecipeSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeSearch {
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(NucleoConfig::DEFAULT),
        }
    }

    /// Score a recipe. `None` means it does not match at all.
    pub fn score(&mut self, recipe: &Recipe, query: &str) -> Option<u32> {
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return Some(0);
        }
        let name_lower = recipe.name.to_lowercase();

        let mut score = if name_lower == query_lower {
            1000
        } else if name_lower.starts_with(&query_lower) {
            500
        } else if name_lower.contains(&query_lower) {
            200
        } else {
            0
        };

        if recipe.category.to_lowercase().contains(&query_lower) {
            score += 100;
        }
        if recipe
            .all_ingredient_names()
            .iter()
            .any(|i| i.to_lowercase().contains(&query_lower))
        {
            score += 50;
        }

        if score == 0 {
            // Loose match on the name only, kept below any substring hit
            score = self.fuzzy(&recipe.name, &query_lower)?.min(49);
        }
        Some(score)
    }

    fn fuzzy(&mut self, text: &str, query: &str) -> Option<u32> {
        let mut haystack_buf = Vec::new();
        let mut needle_buf = Vec::new();
        let haystack = Utf32Str::new(text, &mut haystack_buf);
        let needle = Utf32Str::new(query, &mut needle_buf);

        self.matcher
            .fuzzy_match(haystack, needle)
            .map(|score| (score as u32).max(1))
    }

    /// Matching recipes, best first; ties keep catalog order.
    pub fn search<'a>(&mut self, catalog: &'a [Recipe], query: &str) -> Vec<&'a Recipe> {
        let mut scored: Vec<(u32, &Recipe)> = catalog
            .iter()
            .filter_map(|r| self.score(r, query).map(|s| (s, r)))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, r)| r).collect()
    }
}
