//! Parsed listing page: DOM, JSON-LD nodes and visible text.
//!
//! `scraper::Html` is not `Send`. A `ListingDocument` is built, queried and
//! dropped synchronously; never hold one across an `.await`.

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use super::Read;

const NON_VISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

pub struct ListingDocument {
    html: Html,
    /// JSON-LD nodes with `@type: Product` first, otherwise in page order.
    metadata: Vec<Value>,
    visible_text: String,
}

impl ListingDocument {
    #[must_use]
    pub fn parse(raw_html: &str) -> Self {
        let html = Html::parse_document(raw_html);
        let metadata = collect_json_ld(&html);
        let visible_text = collect_visible_text(&html);
        Self {
            html,
            metadata,
            visible_text,
        }
    }

    #[must_use]
    pub fn visible_text(&self) -> &str {
        &self.visible_text
    }

    /// Values read from every element matching `css`.
    ///
    /// An unparseable selector is logged and treated as no match.
    #[must_use]
    pub fn select(&self, css: &str, read: Read) -> Vec<String> {
        let selector = match Selector::parse(css) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(css, error = %e, "invalid CSS selector; skipping strategy");
                return Vec::new();
            }
        };
        let matches = self.html.select(&selector);

        match read {
            Read::Count => {
                let count = matches.count();
                if count == 0 {
                    Vec::new()
                } else {
                    vec![count.to_string()]
                }
            }
            Read::Text => matches
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect(),
            Read::Attr(name) => matches
                .filter_map(|el| el.value().attr(name))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Scalars found at `pointer` in the first JSON-LD node where it resolves
    /// to anything usable.
    ///
    /// Arrays are flattened. Offer objects become `"<currency> <amount>"`
    /// strings; other objects contribute their `url`, `contentUrl` or `name`.
    #[must_use]
    pub fn metadata_values(&self, pointer: &str) -> Vec<String> {
        for node in &self.metadata {
            let Some(found) = node.pointer(pointer) else {
                continue;
            };
            let mut out = Vec::new();
            flatten_metadata(found, &mut out);
            if !out.is_empty() {
                return out;
            }
        }
        Vec::new()
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_json_ld(html: &Html) -> Vec<Value> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut nodes = Vec::new();
    for script in html.select(&selector) {
        let body: String = script.text().collect();
        let value: Value = match serde_json::from_str(body.trim()) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed JSON-LD block");
                continue;
            }
        };

        // Top-level object, array, or an object wrapping an @graph list.
        let top_level = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        for item in top_level {
            if let Some(graph) = item.get("@graph").and_then(Value::as_array) {
                nodes.extend(graph.iter().cloned());
            }
            nodes.push(item);
        }
    }

    // Stable: non-Product nodes keep their page order after the Products.
    nodes.sort_by_key(|node| !has_type(node, "Product"));
    nodes
}

/// `@type` may be a string or an array of strings.
fn has_type(node: &Value, wanted: &str) -> bool {
    match node.get("@type") {
        Some(Value::String(s)) => s.eq_ignore_ascii_case(wanted),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.eq_ignore_ascii_case(wanted)),
        _ => false,
    }
}

fn flatten_metadata(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_owned());
            }
        }
        Value::Number(n) => out.push(n.to_string()),
        Value::Array(items) => {
            for item in items {
                flatten_metadata(item, out);
            }
        }
        Value::Object(map) => {
            if map.contains_key("price") || map.contains_key("lowPrice") {
                let currency = map
                    .get("priceCurrency")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                for key in ["lowPrice", "price", "highPrice"] {
                    let amount = match map.get(key) {
                        Some(Value::String(s)) => s.trim().to_owned(),
                        Some(Value::Number(n)) => n.to_string(),
                        _ => continue,
                    };
                    if !amount.is_empty() {
                        out.push(format!("{currency} {amount}").trim().to_owned());
                    }
                }
                return;
            }
            if let Some(text) = ["url", "contentUrl", "name"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
            {
                flatten_metadata(&Value::String(text.to_owned()), out);
            }
        }
        Value::Bool(_) | Value::Null => {}
    }
}

fn collect_visible_text(html: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|body| html.select(&body).next())
        .unwrap_or_else(|| html.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| NON_VISIBLE_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
        <title>Mug</title>
        <script type="application/ld+json">{"@type":"BreadcrumbList","name":"crumbs"}</script>
        <script type="application/ld+json">
          {"@graph":[{"@type":["Product"],"name":"Ceramic Mug",
            "offers":{"@type":"AggregateOffer","priceCurrency":"USD","lowPrice":"12.00","highPrice":"18.50"},
            "image":[{"@type":"ImageObject","contentUrl":"https://i.example/a.jpg"},"https://i.example/b.jpg"]}]}
        </script>
        <script type="application/ld+json">{ not json</script>
        </head><body>
          <h1>  Ceramic
             Mug </h1>
          <script>var hidden = "42 favorites";</script>
          <p data-n="7">Loved by 1,204 favorites</p>
          <p data-n="">blank attr</p>
        </body></html>"#;

    #[test]
    fn product_node_is_consulted_first() {
        let doc = ListingDocument::parse(PAGE);
        assert_eq!(doc.metadata_values("/name"), vec!["Ceramic Mug"]);
    }

    #[test]
    fn offers_flatten_to_currency_amount_strings() {
        let doc = ListingDocument::parse(PAGE);
        assert_eq!(
            doc.metadata_values("/offers"),
            vec!["USD 12.00", "USD 18.50"]
        );
    }

    #[test]
    fn image_objects_flatten_to_urls() {
        let doc = ListingDocument::parse(PAGE);
        assert_eq!(
            doc.metadata_values("/image"),
            vec!["https://i.example/a.jpg", "https://i.example/b.jpg"]
        );
    }

    #[test]
    fn unresolved_pointer_is_empty() {
        let doc = ListingDocument::parse(PAGE);
        assert!(doc.metadata_values("/aggregateRating/ratingValue").is_empty());
    }

    #[test]
    fn text_is_whitespace_collapsed() {
        let doc = ListingDocument::parse(PAGE);
        assert_eq!(doc.select("h1", Read::Text), vec!["Ceramic Mug"]);
    }

    #[test]
    fn attr_skips_blank_values() {
        let doc = ListingDocument::parse(PAGE);
        assert_eq!(doc.select("p", Read::Attr("data-n")), vec!["7"]);
    }

    #[test]
    fn count_of_zero_is_no_match() {
        let doc = ListingDocument::parse(PAGE);
        assert!(doc.select("[data-review-id]", Read::Count).is_empty());
        assert_eq!(doc.select("p", Read::Count), vec!["2"]);
    }

    #[test]
    fn invalid_selector_is_no_match() {
        let doc = ListingDocument::parse(PAGE);
        assert!(doc.select("p[", Read::Text).is_empty());
    }

    #[test]
    fn visible_text_excludes_scripts() {
        let doc = ListingDocument::parse(PAGE);
        assert!(doc.visible_text().contains("Loved by 1,204 favorites"));
        assert!(!doc.visible_text().contains("42 favorites"));
    }
}
