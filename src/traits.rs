use async_trait::async_trait;

use crate::error::ScraperError;

/// Girişli kaynaklar için kimlik doğrulanmış oturum.
///
/// Oturum çalışma kapsamlıdır: bir kez açılır, girişli her kaynak için
/// kullanılır ve çalışmanın her çıkış yolunda kapatılır.
#[async_trait]
pub trait AuthSession: Send {
    /// Tarayıcıyı başlat
    async fn initialize(&mut self) -> Result<(), ScraperError>;

    /// Giriş yap
    async fn login(&mut self) -> Result<(), ScraperError>;

    /// Oturum çerezlerini `Cookie` başlığı olarak ver
    async fn cookie_header(&self) -> Result<String, ScraperError>;

    /// Kaynakları bırak
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// Toplu kurulum (initialize → login)
    async fn establish(&mut self) -> Result<(), ScraperError> {
        self.initialize().await?;
        self.login().await?;
        Ok(())
    }
}
