//! Sıralı çalışma düzeni.
//!
//! Bir çalışma: durum dosyasını oku → her kaynak için sırayla çöz / karşılaştır /
//! indir / ayıkla → durumu yaz → özet üret. Kaynaklar birbirinden yalıtıktır;
//! birinin hatası diğerlerini durdurmaz. Girişli oturum çalışma kapsamlıdır ve
//! her çıkış yolunda kapatılır.

use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::browser::TitckSession;
use crate::config::{Credentials, RegistryConfig, SourceConfig};
use crate::diagnostics::persist_html_snippet;
use crate::error::ScraperError;
use crate::extract::run_extraction;
use crate::fetcher::fetch_to_file;
use crate::resolver::{resolve_file_link, ResolveOutcome};
use crate::state::{plan, StateStore};
use crate::traits::AuthSession;

/// Tek kaynağın çalışma sonucu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Üst kaynak değişti, dosya indirildi ve ayıklandı.
    Updated { rows: usize },
    /// İlk çalışma: taban çizgisi kuruldu, "değişti" bildirilmedi.
    Bootstrapped { rows: usize },
    /// Adres aynı, yapılacak iş yok. Bu başarıdır, hata değil.
    Unchanged,
    /// Kimlik bilgisi/CAPTCHA eksikliği nedeniyle atlandı.
    Skipped { reason: String },
    Failed { reason: String, structural: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceOutcome {
    pub key: String,
    pub status: SourceStatus,
    /// Değişiklik bayrağı: önceki kayıt var VE yeni adres farklı.
    pub changed: bool,
}

/// Çalışmanın tamamının özeti. Hem insan hem makine tarafından okunur.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<SourceOutcome>,
}

impl RunSummary {
    pub fn updated(&self) -> bool {
        self.outcomes.iter().any(|o| o.changed)
    }

    pub fn changed_keys(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.changed)
            .map(|o| o.key.as_str())
            .collect()
    }

    /// Çalışma başarılı mı? Kısmi başarı özet metninde ayrıca görünür;
    /// ama tek bir kaynak bile sert hata verdiyse süreç sıfırdan farklı
    /// kodla çıkar. İstenen kaynakların tamamı atlandıysa çalışma hiçbir
    /// iş yapmamıştır; bu da sessiz başarı sayılmaz.
    pub fn is_success(&self) -> bool {
        let any_failed = self
            .outcomes
            .iter()
            .any(|o| matches!(o.status, SourceStatus::Failed { .. }));
        let all_skipped = !self.outcomes.is_empty()
            && self
                .outcomes
                .iter()
                .all(|o| matches!(o.status, SourceStatus::Skipped { .. }));
        !any_failed && !all_skipped
    }

    pub fn human_summary(&self) -> String {
        let mut lines = Vec::with_capacity(self.outcomes.len() + 1);
        for o in &self.outcomes {
            let line = match &o.status {
                SourceStatus::Updated { rows } => {
                    format!("{}: güncellendi ({} satır)", o.key, rows)
                }
                SourceStatus::Bootstrapped { rows } => {
                    format!("{}: ilk kayıt alındı ({} satır)", o.key, rows)
                }
                SourceStatus::Unchanged => format!("{}: değişiklik yok", o.key),
                SourceStatus::Skipped { reason } => format!("{}: atlandı ({})", o.key, reason),
                SourceStatus::Failed { reason, structural } => format!(
                    "{}: HATA{} ({})",
                    o.key,
                    if *structural { " [yapısal]" } else { "" },
                    reason
                ),
            };
            lines.push(line);
        }
        lines.push(format!(
            "toplam: {} kaynak, güncellenen: {}",
            self.outcomes.len(),
            self.changed_keys().len()
        ));
        lines.join("\n")
    }

    /// CI'nin okuduğu anahtar=değer çıktısı.
    fn render_github_output(&self) -> String {
        format!(
            "updated={}\nchanged_files={}\n",
            self.updated(),
            self.changed_keys().join(",")
        )
    }

    /// Özetin tamamını JSON olarak yazar. CI adımları ve sonraki araçlar
    /// kaynak başına durumu buradan okur; insan özeti serbest metindir,
    /// ayrıştırılmaz.
    pub fn write_json_report(&self, path: &std::path::Path) -> Result<(), ScraperError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// `GITHUB_OUTPUT` tanımlıysa makine okunur çıktıyı oraya ekler.
    pub fn write_github_output(&self) -> Result<(), ScraperError> {
        let Some(path) = std::env::var_os("GITHUB_OUTPUT") else {
            return Ok(());
        };
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(self.render_github_output().as_bytes())?;
        Ok(())
    }
}

/// Girişli oturumu tembelce kurar ve çerez başlığını önbelleğe alır.
async fn ensure_session_cookies(
    session: &mut Option<TitckSession>,
    cached: &mut Option<String>,
    credentials: &Credentials,
    config: &RegistryConfig,
) -> Result<String, ScraperError> {
    if let Some(cookie) = cached {
        return Ok(cookie.clone());
    }

    let mut new_session = TitckSession::new(
        credentials.clone(),
        config.headless,
        config.debug_dir.clone(),
    );
    new_session.establish().await?;
    let cookie = new_session.cookie_header().await?;

    *session = Some(new_session);
    *cached = Some(cookie.clone());
    Ok(cookie)
}

/// Tek kaynağı uçtan uca işler. Hatalar sonuca çevrilir, yukarı taşmaz.
async fn process_source(
    client: &Client,
    config: &RegistryConfig,
    source: &SourceConfig,
    state: &mut StateStore,
    cookie_header: Option<&str>,
) -> SourceOutcome {
    let key = source.key.clone();

    // 1. Güncel dosya adresini çöz
    let resolved = match resolve_file_link(client, config, source).await {
        Ok(ResolveOutcome::Found(url)) => url,
        Ok(ResolveOutcome::NotFound { page_html }) => {
            let err = ScraperError::AnchorNotFound(format!(
                "{} içinde {} uzantılı bağlantı yok",
                source.page_url, source.file_extension
            ));
            error!("{}: {}", key, err);
            persist_html_snippet(&config.debug_dir, &key, &page_html);
            return SourceOutcome {
                key,
                status: SourceStatus::Failed {
                    reason: err.to_string(),
                    structural: true,
                },
                changed: false,
            };
        }
        Err(e) => {
            error!("{}: sayfa çözülemedi: {}", key, e);
            return SourceOutcome {
                key,
                status: SourceStatus::Failed {
                    reason: e.to_string(),
                    structural: false,
                },
                changed: false,
            };
        }
    };

    // 2. Önceki kayıtla karşılaştır
    let decision = plan(state.last_known(&key), &resolved);
    if !decision.should_fetch {
        info!("{}: değişiklik yok ({})", key, resolved);
        return SourceOutcome {
            key,
            status: SourceStatus::Unchanged,
            changed: false,
        };
    }

    // 3. İndir; başarısızsa önceki kayıt olduğu gibi kalır
    let dest = config.raw_dir.join(&source.raw_filename);
    if let Err(e) = fetch_to_file(client, config, &resolved, &dest, cookie_header).await {
        error!("{}: indirme başarısız: {}", key, e);
        return SourceOutcome {
            key,
            status: SourceStatus::Failed {
                reason: e.to_string(),
                structural: false,
            },
            changed: false,
        };
    }

    // 4. İndirme başarılı: son bilinen adres artık bu
    state.record(&key, &resolved);

    // 5. Ayıkla ve çıktıyı yaz
    match run_extraction(config, source) {
        Ok(report) => {
            let status = if decision.changed {
                SourceStatus::Updated {
                    rows: report.rows_written,
                }
            } else {
                SourceStatus::Bootstrapped {
                    rows: report.rows_written,
                }
            };
            SourceOutcome {
                key,
                status,
                changed: decision.changed,
            }
        }
        Err(e) => {
            error!("{}: ayıklama başarısız: {}", key, e);
            SourceOutcome {
                key,
                status: SourceStatus::Failed {
                    reason: e.to_string(),
                    structural: e.is_structural(),
                },
                changed: decision.changed,
            }
        }
    }
}

/// Çalışmanın tamamı. Kaynaklar sırayla, tek tek işlenir; durum dosyası
/// sonunda koşulsuz yazılır.
pub async fn run(config: &RegistryConfig) -> Result<RunSummary, ScraperError> {
    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout)
        .build()?;

    let mut state = StateStore::load(&config.state_path);
    let credentials = Credentials::from_env();
    if credentials.is_none() {
        warn!("TITCK_USERNAME/TITCK_PASSWORD tanımlı değil, girişli kaynaklar atlanacak");
    }

    let mut session: Option<TitckSession> = None;
    let mut cached_cookies: Option<String> = None;
    let mut outcomes = Vec::with_capacity(config.sources.len());

    for source in &config.sources {
        let cookie_header = if source.requires_login {
            match &credentials {
                None => {
                    warn!("{}: kimlik bilgileri yok, atlanıyor", source.key);
                    outcomes.push(SourceOutcome {
                        key: source.key.clone(),
                        status: SourceStatus::Skipped {
                            reason: "kimlik bilgileri tanımlı değil".into(),
                        },
                        changed: false,
                    });
                    continue;
                }
                Some(creds) => {
                    match ensure_session_cookies(&mut session, &mut cached_cookies, creds, config)
                        .await
                    {
                        Ok(cookie) => Some(cookie),
                        Err(e @ (ScraperError::Captcha(_) | ScraperError::MissingCredentials(_))) => {
                            warn!("{}: oturum kurulamadı, atlanıyor: {}", source.key, e);
                            outcomes.push(SourceOutcome {
                                key: source.key.clone(),
                                status: SourceStatus::Skipped {
                                    reason: e.to_string(),
                                },
                                changed: false,
                            });
                            continue;
                        }
                        Err(e) => {
                            error!("{}: oturum kurulamadı: {}", source.key, e);
                            outcomes.push(SourceOutcome {
                                key: source.key.clone(),
                                status: SourceStatus::Failed {
                                    reason: e.to_string(),
                                    structural: false,
                                },
                                changed: false,
                            });
                            continue;
                        }
                    }
                }
            }
        } else {
            None
        };

        let outcome =
            process_source(&client, config, source, &mut state, cookie_header.as_deref()).await;
        outcomes.push(outcome);
    }

    // Oturum her çıkış yolunda kapanır: döngü kaynak hatalarını yutar,
    // tek kapanış noktası burasıdır
    if let Some(mut s) = session.take() {
        if let Err(e) = s.close().await {
            warn!("Tarayıcı kapatılamadı: {}", e);
        }
    }

    // Durum koşulsuz yazılır; ulaşılamayan kaynakların eski değerleri korunur
    state.save()?;

    let summary = RunSummary { outcomes };

    let report_path = config.output_dir.join("calisma_ozeti.json");
    if let Err(e) = summary.write_json_report(&report_path) {
        warn!("Özet raporu yazılamadı {:?}: {}", report_path, e);
    }

    info!("\n{}", summary.human_summary());
    Ok(summary)
}
