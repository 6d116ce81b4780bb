//! Reads listings out of rendered HTML according to a site descriptor.

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

use super::descriptor::{ExtractionStrategy, SiteDescriptor};
use crate::extract::ProductMatcher;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Available,
    Unavailable,
}

/// One search result as it appeared on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub title: String,
    pub price_text: String,
    pub link: Option<String>,
    pub part_number: Option<String>,
    pub status: ListingStatus,
}

impl Listing {
    pub fn matches(&self, matcher: &ProductMatcher) -> bool {
        matcher.matches_any(std::iter::once(self.title.as_str()).chain(self.part_number.as_deref()))
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AppError::Scraping(format!("Invalid CSS selector '{}': {:?}", selector, e)))
}

/// Whether any element matches `selector`.
pub fn contains(html: &str, selector: &str) -> Result<bool> {
    let document = Html::parse_document(html);
    let selector = parse_selector(selector)?;
    Ok(document.select(&selector).next().is_some())
}

pub fn count(html: &str, selector: &str) -> Result<usize> {
    let document = Html::parse_document(html);
    let selector = parse_selector(selector)?;
    Ok(document.select(&selector).count())
}

/// All listings carrying a title, in discovery order.
pub fn extract_listings(html: &str, descriptor: &SiteDescriptor) -> Result<Vec<Listing>> {
    let document = Html::parse_document(html);
    let fields = FieldSelectors::compile(descriptor)?;

    let mut listings = match descriptor.strategy {
        ExtractionStrategy::Listing => {
            let containers = parse_selector(descriptor.containers)?;
            let limit = descriptor.max_items.unwrap_or(usize::MAX);

            document
                .select(&containers)
                .take(limit)
                .filter_map(|item| fields.listing(item, ListingStatus::Available, None))
                .collect::<Vec<_>>()
        }
        ExtractionStrategy::MarkerClassified {
            price_marker,
            unavailable_marker,
            item_container,
        } => {
            let price_marker = parse_selector(price_marker)?;
            let unavailable_marker = parse_selector(unavailable_marker)?;
            let item_container = parse_selector(item_container)?;
            let div = parse_selector("div")?;

            let mut found = Vec::new();
            for marker in document.select(&price_marker) {
                let price = element_text(marker);
                let container = closest(marker, &item_container).or_else(|| closest(marker, &div));
                let listing = container
                    .and_then(|c| fields.listing(c, ListingStatus::Available, Some(price)));
                // Priced markers need both a title and a price
                if let Some(listing) = listing.filter(|l| !l.price_text.is_empty()) {
                    found.push(listing);
                }
            }
            for marker in document.select(&unavailable_marker) {
                let container = closest(marker, &item_container).or_else(|| closest(marker, &div));
                if let Some(listing) = container.and_then(|c| fields.listing(c, ListingStatus::Unavailable, None)) {
                    found.push(listing);
                }
            }
            found
        }
    };

    if let Some(limit) = descriptor.max_items {
        listings.truncate(limit);
    }

    for listing in &mut listings {
        listing.link = listing
            .link
            .take()
            .and_then(|href| resolve_link(descriptor.base_url, &href));
    }

    Ok(listings)
}

/// First matching listing with a link, else the first matching listing.
pub fn best_match<'a>(listings: &'a [Listing], matcher: &ProductMatcher) -> Option<&'a Listing> {
    let mut matched = listings.iter().filter(|l| l.matches(matcher));
    let first = matched.next()?;
    if first.link.is_some() {
        return Some(first);
    }
    matched.find(|l| l.link.is_some()).or(Some(first))
}

/// Price text from a product page: the first fallback selector whose text
/// holds a `$`, else the first element whose text looks like a price.
pub fn product_page_price(html: &str, selectors: &[&str]) -> Result<Option<String>> {
    let document = Html::parse_document(html);

    for selector in selectors {
        let selector = parse_selector(selector)?;
        if let Some(text) = document
            .select(&selector)
            .next()
            .map(element_text)
            .filter(|t| t.contains('$'))
        {
            return Ok(Some(text));
        }
    }

    // Innermost element with a dollar amount, so the text stays short
    let any = parse_selector("body *")?;
    let priced = document
        .select(&any)
        .map(element_text)
        .filter(|t| looks_like_price(t))
        .min_by_key(|t| t.len());
    Ok(priced)
}

/// Resolves `href` against the site root; empty links are dropped.
pub fn resolve_link(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Some(href.to_string()),
    }
}

struct FieldSelectors {
    title: Vec<Selector>,
    price: Vec<Selector>,
    link: Vec<Selector>,
    part_number: Vec<Selector>,
}

impl FieldSelectors {
    fn compile(descriptor: &SiteDescriptor) -> Result<Self> {
        let compile = |group: &[&str]| group.iter().map(|s| parse_selector(s)).collect::<Result<Vec<_>>>();
        Ok(Self {
            title: compile(descriptor.title)?,
            price: compile(descriptor.price)?,
            link: compile(descriptor.link)?,
            part_number: compile(descriptor.part_number)?,
        })
    }

    fn listing(&self, item: ElementRef<'_>, status: ListingStatus, price: Option<String>) -> Option<Listing> {
        let title = first_text(item, &self.title)?;
        let price_text = price.unwrap_or_else(|| first_text(item, &self.price).unwrap_or_default());
        let link = first_attr(item, &self.link, "href");
        let part_number = first_text(item, &self.part_number);

        Some(Listing {
            title,
            price_text,
            link,
            part_number,
            status,
        })
    }
}

fn descendants<'a>(item: ElementRef<'a>, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let own_id = item.id();
    item.select(selector).filter(move |e| e.id() != own_id)
}

fn first_text(item: ElementRef<'_>, groups: &[Selector]) -> Option<String> {
    groups.iter().find_map(|selector| {
        descendants(item, selector)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    })
}

fn first_attr(item: ElementRef<'_>, groups: &[Selector], attr: &str) -> Option<String> {
    groups.iter().find_map(|selector| {
        descendants(item, selector)
            .next()
            .and_then(|e| e.value().attr(attr))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// The element itself or its nearest ancestor matching `selector`.
fn closest<'a>(element: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    if selector.matches(&element) {
        return Some(element);
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| selector.matches(ancestor))
}

/// Text content with runs of whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_like_price(text: &str) -> bool {
    text.split('$')
        .skip(1)
        .any(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}
