//! Sayfa-bağlantı çözücü.
//!
//! Listeleme sayfasını indirir, hedef uzantıyla biten ilk bağlantıyı bulur
//! ve mutlak adrese çevirir. Göreli href'ler sayfanın taban adresine göre
//! çözülür.

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::config::{RegistryConfig, SourceConfig};
use crate::error::ScraperError;
use crate::retry::with_retry;

/// HTML içinde uzantıyla biten ilk bağlantıyı arar ve taban adrese göre
/// mutlak hale getirir. Bağlantı yoksa `Ok(None)`.
pub fn find_file_link(
    html: &str,
    extension: &str,
    base_url: &str,
) -> Result<Option<String>, ScraperError> {
    let doc = Html::parse_document(html);
    let anchor_selector = Selector::parse("a[href]")
        .map_err(|_| ScraperError::Selector("a[href]".into()))?;

    let extension = extension.to_lowercase();
    let base = Url::parse(base_url)?;

    for anchor in doc.select(&anchor_selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.trim().to_lowercase().ends_with(&extension) {
            let absolute = base.join(href.trim())?;
            return Ok(Some(absolute.to_string()));
        }
    }

    Ok(None)
}

async fn fetch_page(client: &Client, url: &str) -> Result<String, ScraperError> {
    let resp = client.get(url).send().await?.error_for_status()?;
    Ok(resp.text().await?)
}

/// Kaynağın listeleme sayfasından güncel dosya adresini çözer.
///
/// - `Ok(Some(url))`: bağlantı bulundu.
/// - `Ok(None)`: sayfa indirildi ama beklenen uzantıda bağlantı yok
///   (yapısal durum; çağıran tanı için ham HTML'i alır).
/// - `Err(_)`: ağ hatası, deneme hakkı tükendi.
pub async fn resolve_file_link(
    client: &Client,
    config: &RegistryConfig,
    source: &SourceConfig,
) -> Result<ResolveOutcome, ScraperError> {
    info!("{}: liste sayfası çözülüyor: {}", source.key, source.page_url);

    let html = with_retry(&config.retry, &source.key, || {
        fetch_page(client, &source.page_url)
    })
    .await?;

    match find_file_link(&html, &source.file_extension, &config.base_url)? {
        Some(url) => {
            debug!("{}: bağlantı bulundu: {}", source.key, url);
            Ok(ResolveOutcome::Found(url))
        }
        None => Ok(ResolveOutcome::NotFound { page_html: html }),
    }
}

/// Çözme sonucu. `NotFound` ham HTML'i taşır ki çağıran tanı dosyası
/// olarak kalıcılaştırabilsin.
#[derive(Debug)]
pub enum ResolveOutcome {
    Found(String),
    NotFound { page_html: String },
}
