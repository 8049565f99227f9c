//! Dosya indirici.
//!
//! Yanıt gövdesi önce `.part` dosyasına akıtılır; HTTP durumu doğrulanıp
//! gövde tamamen yazıldıktan sonra hedefe taşınır. Yarım kalan indirme,
//! yerinde duran son sağlam dosyayı asla ezmez.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::header::COOKIE;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::ScraperError;
use crate::retry::with_retry;

/// `dest` için geçici indirme yolu.
fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "indirme".to_string());
    dest.with_file_name(format!("{name}.part"))
}

async fn discard_partial(part: &Path) {
    if let Err(e) = tokio::fs::remove_file(part).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Geçici dosya silinemedi {:?}: {}", part, e);
        }
    }
}

async fn fetch_once(
    client: &Client,
    url: &str,
    dest: &Path,
    cookie_header: Option<&str>,
) -> Result<(), ScraperError> {
    let part = partial_path(dest);

    let mut request = client.get(url);
    if let Some(cookie) = cookie_header {
        request = request.header(COOKIE, cookie);
    }

    let result = async {
        let resp = request.send().await?.error_for_status()?;

        let mut file = File::create(&part).await?;
        let mut stream = resp.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        debug!("{} bayt yazıldı: {:?}", written, part);
        Ok(())
    }
    .await;

    match result {
        Ok(()) => {
            tokio::fs::rename(&part, dest).await?;
            Ok(())
        }
        Err(e) => {
            discard_partial(&part).await;
            Err(e)
        }
    }
}

/// Dosyayı politikaya göre yeniden denemeli indirir ve hedefe taşır.
/// Girişli kaynaklar için tarayıcı oturumunun çerezleri `cookie_header`
/// ile geçilir.
pub async fn fetch_to_file(
    client: &Client,
    config: &RegistryConfig,
    url: &str,
    dest: &Path,
    cookie_header: Option<&str>,
) -> Result<PathBuf, ScraperError> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    info!("İndiriliyor: {} -> {:?}", url, dest);
    with_retry(&config.retry, "indirme", || {
        fetch_once(client, url, dest, cookie_header)
    })
    .await?;

    info!("İndirme tamamlandı: {:?}", dest);
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_path_naming() {
        let dest = PathBuf::from("ham_veriler/ruhsatli_ilaclar_listesi.xlsx");
        assert_eq!(
            partial_path(&dest),
            PathBuf::from("ham_veriler/ruhsatli_ilaclar_listesi.xlsx.part")
        );
    }

    #[tokio::test]
    async fn test_discard_partial_removes_file() {
        let dir = tempdir().unwrap();
        let part = dir.path().join("liste.xlsx.part");
        tokio::fs::write(&part, b"yarim").await.unwrap();

        discard_partial(&part).await;
        assert!(!part.exists());
    }

    #[tokio::test]
    async fn test_discard_partial_tolerates_missing_file() {
        let dir = tempdir().unwrap();
        discard_partial(&dir.path().join("yok.part")).await;
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("liste.xlsx");
        tokio::fs::write(&dest, b"onceki saglam icerik").await.unwrap();

        // Bağlantı kurulamayan bir adres: indirme başarısız olmalı ama
        // yerindeki dosyaya dokunulmamalı.
        let client = Client::new();
        let result = fetch_once(&client, "http://127.0.0.1:1/olmayan.xlsx", &dest, None).await;

        assert!(result.is_err());
        let kept = tokio::fs::read(&dest).await.unwrap();
        assert_eq!(kept, b"onceki saglam icerik");
        assert!(!partial_path(&dest).exists());
    }
}
