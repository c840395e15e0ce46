//! Secondary fallback source: marketplace listing pages
//!
//! HTML scraping, used only when the primary source has no entry. The host
//! actively rejects bursty clients, so a CAPTCHA marker or a 429/503 is a
//! block signal that terminates the whole batch, never just the item.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use bookdata_common::CatalogError;

use super::{build_client, classify_status, is_captcha, FetchError, FetchResult};

static ASIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/dp/([A-Z0-9]{10})").expect("static regex"));

static BLOCK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.zg-grid-general-faceout").expect("static selector"));

static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("static selector"));

static IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("static selector"));

static LABEL_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.a-size-small, span.a-size-small").expect("static selector")
});

/// Small-text labels that are binding/format markers, not author names.
const BINDING_LABELS: [&str; 3] = ["paperback", "hardcover", "kindle"];

/// One result block resolved from a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingHit {
    /// Vendor item id extracted from the detail-page link
    pub asin: String,
    pub title: String,
    pub author: String,
    pub detail_url: String,
}

/// Client for a marketplace listing page.
pub struct ListingSource {
    client: reqwest::Client,
    url_template: String,
    origin: String,
    max_items: usize,
}

impl ListingSource {
    pub fn new(
        url_template: &str,
        user_agent: &str,
        timeout_secs: u64,
        max_items: usize,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            client: build_client(user_agent, timeout_secs)?,
            url_template: url_template.to_string(),
            origin: origin_of(url_template),
            max_items,
        })
    }

    /// Fetch the listing page for a query and resolve its result blocks.
    pub async fn fetch(&self, query: &str) -> FetchResult<Vec<ListingHit>> {
        let url = self.url_template.replace("{query}", query);

        debug!(url = %url, "fetching fallback listing");

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let body = response.text().await?;
        if is_captcha(&body) {
            return Err(FetchError::Blocked("captcha challenge served".to_string()));
        }

        Ok(self.parse_listing(&body))
    }

    /// Extract result blocks from a listing document. Pure.
    fn parse_listing(&self, html: &str) -> Vec<ListingHit> {
        let document = Html::parse_document(html);
        let mut hits = Vec::new();

        for block in document.select(&BLOCK_SEL) {
            let Some((asin, href)) = detail_link(&block) else {
                continue;
            };

            let title = block
                .select(&IMG_SEL)
                .find_map(|img| img.value().attr("alt"))
                .map(str::trim)
                .unwrap_or_default()
                .to_string();

            let author = author_label(&block);

            if title.is_empty() || author.is_empty() {
                continue;
            }

            let detail_url = if href.starts_with("http") {
                href
            } else {
                format!("{}{}", self.origin, href)
            };

            hits.push(ListingHit {
                asin,
                title,
                author,
                detail_url,
            });

            if hits.len() >= self.max_items {
                break;
            }
        }

        hits
    }
}

/// First detail link in a block: the vendor item id plus the href with any
/// query string stripped.
fn detail_link(block: &ElementRef<'_>) -> Option<(String, String)> {
    for anchor in block.select(&LINK_SEL) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if let Some(captures) = ASIN_RE.captures(href) {
            let asin = captures.get(1)?.as_str().to_string();
            let href = href.split('?').next().unwrap_or(href).to_string();
            return Some((asin, href));
        }
    }
    None
}

/// First small-text label that is not a binding/format marker.
fn author_label(block: &ElementRef<'_>) -> String {
    for label in block.select(&LABEL_SEL) {
        let text = label.text().collect::<String>().trim().to_string();
        if text.is_empty() {
            continue;
        }
        let lower = text.to_lowercase();
        if BINDING_LABELS.iter().any(|binding| lower.contains(binding)) {
            continue;
        }
        return text;
    }
    String::new()
}

fn origin_of(url: &str) -> String {
    // scheme://host, i.e. everything before the third '/'
    let mut slashes = 0;
    for (index, c) in url.char_indices() {
        if c == '/' {
            slashes += 1;
            if slashes == 3 {
                return url[..index].to_string();
            }
        }
    }
    url.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn source() -> ListingSource {
        ListingSource::new(
            "https://market.example.com/best?q={query}",
            "test-agent",
            5,
            30,
        )
        .unwrap()
    }

    const PAGE: &str = r#"
        <html><body>
        <div class="zg-grid-general-faceout">
            <a href="/dp/B0EXAMPLE1/ref=zg?pf=1"><img alt="The First Title"></a>
            <span class="a-size-small">Paperback</span>
            <a class="a-size-small">Jane Author</a>
        </div>
        <div class="zg-grid-general-faceout">
            <a href="https://market.example.com/dp/B0EXAMPLE2"><img alt="The Second Title"></a>
            <span class="a-size-small">Second Author</span>
        </div>
        <div class="zg-grid-general-faceout">
            <a href="/gp/no-item-id"><img alt="No detail link"></a>
            <span class="a-size-small">Someone</span>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_listing_resolves_blocks() {
        let hits = source().parse_listing(PAGE);
        assert_eq!(hits.len(), 2);

        assert_eq!(hits[0].asin, "B0EXAMPLE1");
        assert_eq!(hits[0].title, "The First Title");
        assert_eq!(hits[0].author, "Jane Author");
        assert_eq!(
            hits[0].detail_url,
            "https://market.example.com/dp/B0EXAMPLE1/ref=zg"
        );

        assert_eq!(hits[1].asin, "B0EXAMPLE2");
        assert_eq!(hits[1].author, "Second Author");
    }

    #[test]
    fn test_parse_listing_skips_binding_labels() {
        let hits = source().parse_listing(PAGE);
        // "Paperback" was the first small label but must not become the author
        assert_eq!(hits[0].author, "Jane Author");
    }

    #[test]
    fn test_parse_listing_respects_item_bound() {
        let mut limited = source();
        limited.max_items = 1;
        assert_eq!(limited.parse_listing(PAGE).len(), 1);
    }

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://market.example.com/best?q={query}"),
            "https://market.example.com"
        );
    }
}
