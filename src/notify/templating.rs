//! Minijinja rendering of listing notification messages.
//!
//! Templates are configuration strings, so a fresh
//! [`minijinja::Environment`] is built per render call.

use std::collections::BTreeMap;

use minijinja::AutoEscape;
use serde::Serialize;

use crate::error::NotifyError;
use crate::models::Listing;

pub const DEFAULT_TEMPLATE: &str = "{{ title }}\n\
Price: {{ price }}\n\
Size: {{ size }}\n\
Rooms: {{ rooms }}\n\
Address: {{ address }}\n\
{{ url }}\n\
{{ durations }}";

/// Values available to message templates. Missing numbers render as `?`.
#[derive(Debug, Clone, Serialize)]
pub struct ListingContext {
    pub title: String,
    pub price: String,
    pub size: String,
    pub rooms: String,
    pub address: String,
    pub url: String,
    pub image_url: String,
    pub source: String,
    pub durations: String,
    pub details: BTreeMap<String, String>,
}

impl From<&Listing> for ListingContext {
    fn from(listing: &Listing) -> Self {
        Self {
            title: listing.title.clone(),
            price: format_amount(listing.price),
            size: format_amount(listing.size),
            rooms: format_amount(listing.rooms),
            address: listing.address.clone(),
            url: listing.url.clone(),
            image_url: listing.image_url.clone().unwrap_or_default(),
            source: listing.source.clone(),
            durations: listing.durations.clone().unwrap_or_default(),
            details: listing.details.clone().unwrap_or_default(),
        }
    }
}

fn format_amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => format!("{v}"),
        None => "?".to_string(),
    }
}

/// Renders one tenant-configured template for each listing.
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    template: String,
}

impl MessageRenderer {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Check the template parses without rendering it.
    pub fn validate(&self) -> Result<(), NotifyError> {
        let env = minijinja::Environment::new();
        env.template_from_str(&self.template)
            .map(|_| ())
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Values are HTML-escaped; the template's own markup is kept as written.
    pub fn render(&self, listing: &Listing) -> Result<String, NotifyError> {
        let mut env = minijinja::Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.render_str(&self.template, ListingContext::from(listing))
            .map(|text| text.trim().to_string())
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

impl Default for MessageRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}
