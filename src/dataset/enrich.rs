use std::sync::OnceLock;

use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};

#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Fetches the page body at `url`. Non-2xx statuses are errors.
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpArticleFetcher {
    client: reqwest::Client,
}

impl HttpArticleFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpArticleFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

fn article_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("article").expect("article is a valid selector"))
}

/// Text content of the first `<article>` element in the page, empty if
/// the page has none. Must stay synchronous: the parsed document is not
/// `Send` and cannot be held across an await.
pub fn article_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(article_selector())
        .next()
        .map(|element| element.text().collect())
        .unwrap_or_default()
}

/// Cover image object name for a category: whitespace becomes `_`, with
/// a fixed `.jpg` extension.
pub fn cover_image(category: &str) -> String {
    let name: String = category
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{}.jpg", name)
}
