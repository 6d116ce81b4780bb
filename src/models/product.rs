use serde::{Deserialize, Serialize};
use validator::Validate;

/// The item being priced. Identity is `(brand, part_number, size)` compared
/// exactly as the caller supplied it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[validate(length(min = 1, max = 100, message = "Brand is required and must be less than 100 characters"))]
    pub brand: String,

    #[validate(length(min = 1, max = 100, message = "Part number is required and must be less than 100 characters"))]
    pub part_number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 50, message = "Size must be less than 50 characters"))]
    pub size: Option<String>,
}

impl Product {
    pub fn new(brand: impl Into<String>, part_number: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            part_number: part_number.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Size, treating an empty string the same as no size.
    pub fn size(&self) -> Option<&str> {
        self.size.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Text typed into supplier search boxes: `"<brand> <part> [<size>]"`.
    pub fn search_query(&self) -> String {
        let mut query = format!("{} {}", self.brand, self.part_number);
        if let Some(size) = self.size() {
            query.push(' ');
            query.push_str(size);
        }
        query.trim().to_string()
    }

    /// Human-readable label used in the comparison payload.
    pub fn display_name(&self) -> String {
        format!(
            "{} {} {}",
            self.brand,
            self.part_number,
            self.size.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }

    /// Cheap precondition check used by the orchestrator before fan-out.
    pub fn has_identity(&self) -> bool {
        !self.brand.trim().is_empty() && !self.part_number.trim().is_empty()
    }
}
