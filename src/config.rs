//! Çalışma yapılandırması.
//!
//! Kaynak başına sayfa adı, başlık satırı ve sütun haritası burada veri
//! olarak tutulur; koda gömülmez. Üst kaynak biçim değiştirdiğinde yalnızca
//! bu tablo güncellenir.

use std::path::PathBuf;
use std::time::Duration;

/// Ruhsat durumu kod -> etiket tablosunun sürümü. Kaynak eşlemesini kim
/// güncelliyorsa bu tabloyu ve sürüm numarasını da o günceller.
pub const RUHSAT_DURUMU_TABLE_VERSION: u32 = 2;

/// Ruhsat durumu kodunu metne çevirir. Bilinmeyen kod `None` döner,
/// sessizce bir etikete yuvarlanmaz.
pub fn ruhsat_durumu_label(code: i64) -> Option<&'static str> {
    match code {
        1 => Some("Aktif"),
        2 => Some("Pasif"),
        3 => Some("İptal Edilmiş"),
        4 => Some("Askıya Alınmış"),
        _ => None,
    }
}

/// Hücre değerine uygulanan kaynak-özel dönüşüm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Olduğu gibi bırak.
    None,
    /// Sayısal hücreyi ondalıksız metin olarak sakla (barkod gibi).
    AsText,
    /// 1 -> "TİTCK Onayı Gerekir", diğerleri -> "TİTCK Onayı Gerekmez".
    OnayFlag,
    /// Baştaki "3." / "4)" gibi sıra numarasını at, ilk harfi büyüt.
    StripLeadingIndex,
    /// Ruhsat durumu kodunu etikete çevir (bkz. `ruhsat_durumu_label`).
    RuhsatDurumu,
}

/// Tek bir sütun eşlemesi: kaynak başlığı -> normalize alan adı.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub title: String,
    pub field: String,
    pub transform: Transform,
}

impl ColumnSpec {
    pub fn new(title: &str, field: &str) -> Self {
        Self {
            title: title.to_string(),
            field: field.to_string(),
            transform: Transform::None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// Çıktı biçimi.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Satır başına bir JSON nesnesi, UTF-8, ASCII dışı karakterler olduğu gibi.
    Jsonl,
    Csv,
}

/// Takip edilen tek bir kaynak (yayınlanan bir liste).
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Durum dosyasındaki anahtar.
    pub key: String,
    /// Listeleme sayfası (dinamik modül) adresi.
    pub page_url: String,
    /// Aranan dosya uzantısı.
    pub file_extension: String,
    /// Ham dosyanın yerel adı.
    pub raw_filename: String,
    /// Çalışma sayfası adı.
    pub sheet_name: String,
    /// Başlık satırının sıfır tabanlı indeksi; üstü önsöz/başlık satırıdır.
    pub header_row: usize,
    /// Dosya sonunda atlanacak satır sayısı (toplam satırı vb.).
    pub skip_footer: usize,
    /// Sıralı sütun haritası.
    pub columns: Vec<ColumnSpec>,
    /// İşlenmiş çıktı dosyasının adı.
    pub output_filename: String,
    pub output_format: OutputFormat,
    /// Kaynak girişli alan arkasında mı?
    pub requires_login: bool,
}

/// Yeniden deneme politikası: (deneme sayısı, sabit bekleme).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Tüm çalışmanın yapılandırması.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    pub state_path: PathBuf,
    /// Ham Excel dosyalarının indirildiği klasör.
    pub raw_dir: PathBuf,
    /// Normalize edilmiş çıktıların yazıldığı klasör.
    pub output_dir: PathBuf,
    /// Yapısal hata tanı dosyaları (HTML parçası, ekran görüntüsü).
    pub debug_dir: PathBuf,
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub headless: bool,
    pub sources: Vec<SourceConfig>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.titck.gov.tr".to_string(),
            state_path: PathBuf::from("last_known_links.json"),
            raw_dir: PathBuf::from("ham_veriler"),
            output_dir: PathBuf::from("islenmis_veriler"),
            debug_dir: PathBuf::from("tani"),
            user_agent: concat!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
                "AppleWebKit/537.36 (KHTML, like Gecko) ",
                "Chrome/91.0.4472.124 Safari/537.36"
            )
            .to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            headless: true,
            sources: default_sources(),
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    pub fn with_raw_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.raw_dir = path.into();
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_debug_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_dir = path.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sources(mut self, sources: Vec<SourceConfig>) -> Self {
        self.sources = sources;
        self
    }
}

/// Girişli kaynaklar için kimlik bilgileri. Ortam değişkenlerinden okunur;
/// eksikse çalışma çökmez, ilgili kaynak atlanır.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Üçüncü taraf CAPTCHA çözücü API anahtarı.
    pub captcha_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("TITCK_USERNAME").ok()?;
        let password = std::env::var("TITCK_PASSWORD").ok()?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self {
            username,
            password,
            captcha_api_key: std::env::var("CAPTCHA_API_KEY").ok().filter(|k| !k.is_empty()),
        })
    }
}

/// Takip edilen beş TİTCK listesi.
///
/// Başlık satırı değerleri üst kaynağın geçmişte kaydırdığı değerlerdir;
/// kaydırma tekrarlanırsa burada güncellenir, yanlışsa çıkarım yapısal
/// hata olarak yüksek sesle bildirilir.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            key: "ilac_fiyat_listesi".to_string(),
            page_url: "https://www.titck.gov.tr/dinamikmodul/100".to_string(),
            file_extension: ".xlsx".to_string(),
            raw_filename: "ilac_fiyat_listesi.xlsx".to_string(),
            sheet_name: "AKTİF ÜRÜNLER LİSTESİ".to_string(),
            header_row: 2,
            skip_footer: 0,
            columns: vec![
                ColumnSpec::new("BARKOD", "barkod").with_transform(Transform::AsText),
                ColumnSpec::new("ÜRÜN ADI", "urun_adi"),
                ColumnSpec::new("FİRMA ADI", "firma_adi"),
                ColumnSpec::new("GERÇEK KAYNAK FİYAT", "gercek_kaynak_fiyat"),
                ColumnSpec::new("DEPOCUYA SATIŞ FİYATI", "depocuya_satis_fiyati"),
            ],
            output_filename: "ilac_fiyatlari.jsonl".to_string(),
            output_format: OutputFormat::Jsonl,
            requires_login: true,
        },
        SourceConfig {
            key: "ruhsatli_ilaclar_listesi".to_string(),
            page_url: "https://www.titck.gov.tr/dinamikmodul/85".to_string(),
            file_extension: ".xlsx".to_string(),
            raw_filename: "ruhsatli_ilaclar_listesi.xlsx".to_string(),
            sheet_name: "RUHSATLI ÜRÜNLER LİSTESİ".to_string(),
            header_row: 1,
            skip_footer: 0,
            columns: vec![
                ColumnSpec::new("BARKOD", "barkod").with_transform(Transform::AsText),
                ColumnSpec::new("ÜRÜN ADI", "urun_adi"),
                ColumnSpec::new("ETKİN MADDE", "etkin_madde"),
                ColumnSpec::new("ATC KODU", "atc_kodu"),
                ColumnSpec::new("RUHSAT SAHİBİ FİRMA", "ruhsat_sahibi_firma"),
                ColumnSpec::new("RUHSAT DURUMU", "ruhsat_durumu")
                    .with_transform(Transform::RuhsatDurumu),
            ],
            output_filename: "ruhsatli_urunler.jsonl".to_string(),
            output_format: OutputFormat::Jsonl,
            requires_login: false,
        },
        SourceConfig {
            key: "etkin_madde_listesi".to_string(),
            page_url: "https://www.titck.gov.tr/dinamikmodul/108".to_string(),
            file_extension: ".xlsx".to_string(),
            raw_filename: "etkin_madde_listesi.xlsx".to_string(),
            sheet_name: "Sheet1".to_string(),
            header_row: 5,
            skip_footer: 1,
            columns: vec![
                ColumnSpec::new("Etkin Madde Adı", "etkin_madde_adi"),
                ColumnSpec::new("Sayı", "basvuru_dosyasi_sayisi"),
            ],
            output_filename: "etkin_maddeler.jsonl".to_string(),
            output_format: OutputFormat::Jsonl,
            requires_login: false,
        },
        SourceConfig {
            key: "yurtdisi_etkin_madde_listesi".to_string(),
            page_url: "https://www.titck.gov.tr/dinamikmodul/126".to_string(),
            file_extension: ".xlsx".to_string(),
            raw_filename: "yurtdisi_etkin_madde_listesi.xlsx".to_string(),
            sheet_name: "YD-Etkin madde listesi".to_string(),
            header_row: 1,
            skip_footer: 0,
            columns: vec![
                ColumnSpec::new("Etkin Madde", "etkin_madde"),
                ColumnSpec::new("Farmasötik Form", "farmasotik_form"),
                ColumnSpec::new(
                    "TİTCK YAZILI ONAYI OLMADAN İTHAL EDİLEMEYECEK İLAÇLAR LİSTESİNDE YER ALAN ETKİN MADDELER",
                    "titck_onayi_gerekliligi",
                )
                .with_transform(Transform::OnayFlag),
                ColumnSpec::new("KULLANIM ŞARTLARI", "kullanim_sartlari")
                    .with_transform(Transform::StripLeadingIndex),
            ],
            output_filename: "yurtdisi_etkin_maddeler.jsonl".to_string(),
            output_format: OutputFormat::Jsonl,
            requires_login: false,
        },
        SourceConfig {
            key: "skrs_erecete_listesi".to_string(),
            page_url: "https://www.titck.gov.tr/dinamikmodul/43".to_string(),
            file_extension: ".xlsx".to_string(),
            raw_filename: "skrs_erecete_listesi.xlsx".to_string(),
            sheet_name: "SKRS".to_string(),
            header_row: 0,
            skip_footer: 0,
            columns: vec![
                ColumnSpec::new("BARKOD", "barkod").with_transform(Transform::AsText),
                ColumnSpec::new("İLAÇ ADI", "ilac_adi"),
                ColumnSpec::new("ATC KODU", "atc_kodu"),
                ColumnSpec::new("FİRMA", "firma"),
            ],
            output_filename: "skrs_erecete.csv".to_string(),
            output_format: OutputFormat::Csv,
            requires_login: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = RegistryConfig::new()
            .with_state_path("/tmp/state.json")
            .with_headless(false)
            .with_retry(RetryPolicy {
                max_attempts: 5,
                backoff: Duration::from_secs(1),
            });

        assert_eq!(config.state_path, PathBuf::from("/tmp/state.json"));
        assert!(!config.headless);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_default_sources_have_unique_keys() {
        let sources = default_sources();
        assert_eq!(sources.len(), 5);

        let mut keys: Vec<_> = sources.iter().map(|s| s.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn test_only_price_list_requires_login() {
        let sources = default_sources();
        let private: Vec<_> = sources
            .iter()
            .filter(|s| s.requires_login)
            .map(|s| s.key.as_str())
            .collect();
        assert_eq!(private, vec!["ilac_fiyat_listesi"]);
    }

    #[test]
    fn test_ruhsat_durumu_table() {
        assert_eq!(ruhsat_durumu_label(1), Some("Aktif"));
        assert_eq!(ruhsat_durumu_label(99), None);
    }
}
