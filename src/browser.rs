//! TİTCK giriş oturumu.
//!
//! Girişli kaynaklar (fiyat listesi) tarayıcı üzerinden kimlik doğrular;
//! dosyanın kendisi yine düz HTTP ile, buradan alınan çerezlerle indirilir.
//! Sabit beklemeler yerine sayfanın hazır olması (readyState) ve DOM
//! kararlılığı yoklanır.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::diagnostics::persist_screenshot;
use crate::error::ScraperError;
use crate::traits::AuthSession;

const LOGIN_URL: &str = "https://www.titck.gov.tr/giris";

/// Sayfa hazır olana kadar yoklama sınırı.
const PAGE_READY_TIMEOUT_SECS: u64 = 30;
/// DOM kararlılık yoklaması için zaman aşımı (milisaniye).
const PAGE_STABLE_TIMEOUT_MS: u64 = 10_000;
const PAGE_STABLE_CHECK_INTERVAL_MS: u64 = 300;

pub struct TitckSession {
    credentials: Credentials,
    headless: bool,
    debug_dir: PathBuf,
    browser: Option<Browser>,
    page: Option<Page>,
}

impl TitckSession {
    pub fn new(credentials: Credentials, headless: bool, debug_dir: impl Into<PathBuf>) -> Self {
        Self {
            credentials,
            headless,
            debug_dir: debug_dir.into(),
            browser: None,
            page: None,
        }
    }

    fn get_page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("Tarayıcı başlatılmamış".into()))
    }

    /// Yapısal bir aksaklıkta sayfanın ekran görüntüsünü tanı klasörüne yazar.
    async fn capture_failure(&self, label: &str) {
        let Ok(page) = self.get_page() else { return };
        match page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(png) => {
                persist_screenshot(&self.debug_dir, label, &png);
                let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
                debug!("{} ekran görüntüsü: data:image/png;base64,{}", label, encoded);
            }
            Err(e) => warn!("Ekran görüntüsü alınamadı: {}", e),
        }
    }

    /// `document.readyState` complete olana kadar yoklar.
    async fn wait_ready(&self, page: &Page) -> Result<(), ScraperError> {
        for i in 0..PAGE_READY_TIMEOUT_SECS {
            let state = page
                .evaluate("document.readyState")
                .await
                .map_err(|e| ScraperError::Navigation(e.to_string()))?
                .into_value::<String>()
                .unwrap_or_default();

            if state == "complete" {
                debug!("Sayfa {} saniyede yüklendi", i);
                return Ok(());
            }
            sleep(Duration::from_secs(1)).await;
        }

        Err(ScraperError::Timeout(format!(
            "Sayfa {} saniyede yüklenmedi",
            PAGE_READY_TIMEOUT_SECS
        )))
    }

    /// HTML uzunluğu art arda üç yoklamada değişmeyene kadar bekler.
    async fn wait_stable(&self, page: &Page) -> Result<(), ScraperError> {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(PAGE_STABLE_TIMEOUT_MS);

        let mut last_len: Option<usize> = None;
        let mut stable_count = 0u32;
        const REQUIRED_STABLE_CHECKS: u32 = 3;

        while start.elapsed() < timeout {
            match page
                .evaluate("document.documentElement.outerHTML.length")
                .await
            {
                Ok(val) => {
                    let current = val.into_value::<usize>().unwrap_or(0);
                    if last_len == Some(current) {
                        stable_count += 1;
                        if stable_count >= REQUIRED_STABLE_CHECKS {
                            debug!("DOM {:?} sonra kararlı", start.elapsed());
                            return Ok(());
                        }
                    } else {
                        stable_count = 0;
                    }
                    last_len = Some(current);
                }
                Err(e) => {
                    debug!("Kararlılık yoklaması hatası: {}", e);
                    stable_count = 0;
                }
            }
            sleep(Duration::from_millis(PAGE_STABLE_CHECK_INTERVAL_MS)).await;
        }

        warn!("DOM {:?} içinde kararlı olmadı, devam ediliyor", start.elapsed());
        Ok(())
    }

    /// Sayfada CAPTCHA var mı?
    async fn has_captcha(&self, page: &Page) -> Result<bool, ScraperError> {
        let found = page
            .evaluate(
                r#"
                document.querySelector("iframe[src*='recaptcha']") !== null ||
                document.querySelector(".g-recaptcha") !== null
            "#,
            )
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?
            .into_value::<bool>()
            .unwrap_or(false);
        Ok(found)
    }
}

#[async_trait]
impl AuthSession for TitckSession {
    async fn initialize(&mut self) -> Result<(), ScraperError> {
        info!("Tarayıcı başlatılıyor...");

        // Paralel çalışmalar çakışmasın diye benzersiz profil klasörü
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("titck-oturum-{}", unique_id));

        let chrome_path = std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .unwrap_or_else(|_| "chromium".to_string());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&user_data_dir)
            .window_size(1280, 800)
            .no_sandbox()
            .request_timeout(Duration::from_secs(60))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if !self.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        self.browser = Some(browser);
        self.page = Some(page);

        info!("Tarayıcı hazır");
        Ok(())
    }

    async fn login(&mut self) -> Result<(), ScraperError> {
        let page = self.get_page()?.clone();
        info!("Giriş sayfasına gidiliyor: {}", LOGIN_URL);

        page.goto(LOGIN_URL)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        self.wait_ready(&page).await?;

        if self.has_captcha(&page).await? {
            if self.credentials.captcha_api_key.is_none() {
                self.capture_failure("giris_captcha").await;
                return Err(ScraperError::Captcha(
                    "giriş sayfası CAPTCHA istiyor, CAPTCHA_API_KEY tanımlı değil".into(),
                ));
            }
            // Çözücü entegrasyonu dış işbirlikçidir; anahtar varsa formun
            // insan/servis tarafından doldurulduğu varsayılır
            warn!("CAPTCHA tespit edildi, çözücü anahtarıyla devam ediliyor");
        }

        page.find_element("#kullaniciAdi")
            .await
            .map_err(|e| ScraperError::Login(format!("kullanıcı adı alanı: {}", e)))?
            .type_str(&self.credentials.username)
            .await
            .map_err(|e| ScraperError::Login(format!("kullanıcı adı girilemedi: {}", e)))?;

        page.find_element("#sifre")
            .await
            .map_err(|e| ScraperError::Login(format!("şifre alanı: {}", e)))?
            .type_str(&self.credentials.password)
            .await
            .map_err(|e| ScraperError::Login(format!("şifre girilemedi: {}", e)))?;

        page.find_element("button[type='submit']")
            .await
            .map_err(|e| ScraperError::Login(format!("giriş düğmesi: {}", e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Login(format!("giriş düğmesi tıklanamadı: {}", e)))?;

        self.wait_ready(&page).await?;
        self.wait_stable(&page).await?;

        // Form hâlâ duruyorsa giriş reddedilmiştir
        let still_on_form = page
            .evaluate("document.querySelector('#sifre') !== null")
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?
            .into_value::<bool>()
            .unwrap_or(true);

        if still_on_form {
            self.capture_failure("giris_basarisiz").await;
            return Err(ScraperError::Login("giriş doğrulanamadı".into()));
        }

        info!("Giriş başarılı");
        Ok(())
    }

    async fn cookie_header(&self) -> Result<String, ScraperError> {
        let page = self.get_page()?;
        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| ScraperError::Navigation(format!("çerezler okunamadı: {}", e)))?;

        let header = cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        debug!("{} çerez alındı", cookies.len());
        Ok(header)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Tarayıcı kapatılıyor...");
        self.page = None;
        self.browser = None;
        Ok(())
    }
}
