use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP hatası: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Geçersiz URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Dosya işlemi hatası: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("JSON hatası: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Excel okuma hatası: {0}")]
    Excel(#[from] calamine::XlsxError),

    #[error("CSV yazma hatası: {0}")]
    Csv(#[from] csv::Error),

    #[error("Seçici ayrıştırılamadı: {0}")]
    Selector(String),

    #[error("Beklenen bağlantı bulunamadı: {0}")]
    AnchorNotFound(String),

    #[error("Sayfa bulunamadı: {0}")]
    SheetNotFound(String),

    #[error("Eşlenen sütunların hiçbiri kaynakta yok: {source_key} (beklenen: {expected})")]
    ColumnsNotFound { source_key: String, expected: String },

    #[error("Tarayıcı başlatma hatası: {0}")]
    BrowserInit(String),

    #[error("Gezinme hatası: {0}")]
    Navigation(String),

    #[error("Giriş hatası: {0}")]
    Login(String),

    #[error("CAPTCHA tespit edildi, çözücü anahtarı yok: {0}")]
    Captcha(String),

    #[error("İndirme hatası: {0}")]
    Download(String),

    #[error("Zaman aşımı: {0}")]
    Timeout(String),

    #[error("Kimlik bilgileri eksik: {0}")]
    MissingCredentials(String),
}

impl ScraperError {
    /// Geçici hata mı? (yeniden deneme döngüsü buna bakar)
    pub fn is_retryable(&self) -> bool {
        match self {
            ScraperError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            ScraperError::Timeout(_) | ScraperError::Download(_) => true,
            _ => false,
        }
    }

    /// Yapısal hata mı? Kaynak sayfanın/dosyanın biçimi değişmiş demektir;
    /// yeniden denemek anlamsızdır, eşleme elle güncellenmelidir.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ScraperError::AnchorNotFound(_)
                | ScraperError::SheetNotFound(_)
                | ScraperError::ColumnsNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        let err = ScraperError::ColumnsNotFound {
            source_key: "ruhsatli_ilaclar_listesi".into(),
            expected: "BARKOD, ÜRÜN ADI".into(),
        };
        assert!(err.is_structural());
        assert!(!err.is_retryable());

        let err = ScraperError::AnchorNotFound("dinamikmodul/85".into());
        assert!(err.is_structural());
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = ScraperError::Timeout("indirme 30 saniyede bitmedi".into());
        assert!(err.is_retryable());
        assert!(!err.is_structural());
    }
}
