//! Yapısal hata tanı dosyaları.
//!
//! Beklenen bağlantı ya da sütun bulunamadığında, eşlemeyi güncelleyecek
//! kişiye sayfanın o anki halini göstermek için ham HTML parçası veya ekran
//! görüntüsü kalıcılaştırılır. Tanı yazımı hiçbir zaman çalışmayı düşürmez.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

/// Kaydedilen HTML parçasının üst sınırı; tam sayfa değil, teşhise yetecek
/// kadarı saklanır.
const HTML_SNIPPET_MAX_BYTES: usize = 64 * 1024;

fn artifact_path(debug_dir: &Path, key: &str, suffix: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    debug_dir.join(format!("{key}_{timestamp}.{suffix}"))
}

/// Beklenmeyen sayfa durumunun HTML parçasını kaydeder.
pub fn persist_html_snippet(debug_dir: &Path, key: &str, html: &str) {
    if let Err(e) = std::fs::create_dir_all(debug_dir) {
        warn!("Tanı klasörü oluşturulamadı {:?}: {}", debug_dir, e);
        return;
    }

    let mut end = html.len().min(HTML_SNIPPET_MAX_BYTES);
    while end < html.len() && !html.is_char_boundary(end) {
        end += 1;
    }

    let path = artifact_path(debug_dir, key, "html");
    match std::fs::write(&path, &html[..end]) {
        Ok(()) => info!("{}: tanı için HTML parçası kaydedildi: {:?}", key, path),
        Err(e) => warn!("{}: HTML parçası kaydedilemedi: {}", key, e),
    }
}

/// Tarayıcı oturumundan alınan ekran görüntüsünü kaydeder.
pub fn persist_screenshot(debug_dir: &Path, key: &str, png: &[u8]) {
    if let Err(e) = std::fs::create_dir_all(debug_dir) {
        warn!("Tanı klasörü oluşturulamadı {:?}: {}", debug_dir, e);
        return;
    }

    let path = artifact_path(debug_dir, key, "png");
    match std::fs::write(&path, png) {
        Ok(()) => info!("{}: ekran görüntüsü kaydedildi: {:?}", key, path),
        Err(e) => warn!("{}: ekran görüntüsü kaydedilemedi: {}", key, e),
    }
}
