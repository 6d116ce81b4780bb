use crate::models::Product;

/// Decides whether a listing's text refers to the requested product.
pub fn is_match(candidate: &str, product: &Product) -> bool {
    ProductMatcher::new(product).matches(candidate)
}

/// Pre-computed lowercase variants for one product, reused across listings.
#[derive(Debug, Clone)]
pub struct ProductMatcher {
    part_variants: Vec<String>,
    part_words: Vec<String>,
    brand_variants: Vec<String>,
}

impl ProductMatcher {
    pub fn new(product: &Product) -> Self {
        let part = product.part_number.trim().to_lowercase();
        let brand = product.brand.trim().to_lowercase();

        let part_variants = if part.is_empty() {
            Vec::new()
        } else {
            dedup(vec![
                part.clone(),
                part.replace(' ', ""),
                part.replace(' ', "-"),
                part.replace(' ', "_"),
            ])
        };

        let brand_variants = if brand.is_empty() {
            Vec::new()
        } else {
            dedup(vec![brand.clone(), brand.replace(' ', "")])
        };

        ProductMatcher {
            part_words: part.split_whitespace().map(str::to_string).collect(),
            part_variants,
            brand_variants,
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        if self.part_variants.is_empty() {
            return false;
        }

        let text = candidate.to_lowercase();
        if self.part_variants.iter().any(|v| text.contains(v.as_str())) {
            return true;
        }

        let brand_present = self.brand_variants.iter().any(|v| text.contains(v.as_str()));
        brand_present && self.part_words.iter().all(|w| text.contains(w.as_str()))
    }

    /// Matches when either the title or the separate part-number field does.
    pub fn matches_any<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> bool {
        fields.into_iter().any(|f| self.matches(f))
    }
}

fn dedup(mut variants: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(variants.len());
    variants.retain(|v| {
        if seen.contains(v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
    variants
}
