//! Değişiklik tespiti ve kalıcı durum.
//!
//! Durum dosyası, kaynak anahtarından son bilinen dosya adresine giden tek
//! bir JSON nesnesidir. Çalışma başında bir kez okunur, sonunda bir kez
//! yazılır; sürümleme ve geri alma yoktur.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::ScraperError;

/// Bir kaynak için indirme kararı.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    /// Üst kaynak değişti mi? İlk çalışmada her zaman `false`:
    /// amaç ilk kurulumda sahte bildirim üretmemektir.
    pub changed: bool,
    /// Dosya indirilecek mi? İlk çalışmada taban çizgisi kurmak için
    /// yine indirilir.
    pub should_fetch: bool,
}

/// Önceki kayda ve yeni çözülen adrese bakarak kararı üretir.
pub fn plan(prior: Option<&str>, resolved: &str) -> FetchPlan {
    match prior {
        None => FetchPlan {
            changed: false,
            should_fetch: true,
        },
        Some(p) if p == resolved => FetchPlan {
            changed: false,
            should_fetch: false,
        },
        Some(_) => FetchPlan {
            changed: true,
            should_fetch: true,
        },
    }
}

/// Kalıcı son-bilinen-adres eşlemesi. Anahtarlar sıralı tutulur; aynı
/// içerik her çalışmada bayt bayt aynı dosyayı üretir, sahte fark olmaz.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    entries: BTreeMap<String, Option<String>>,
}

impl StateStore {
    /// Durum dosyasını okur. Dosya yoksa veya bozuksa ilk çalışma kabul
    /// edilir ve boş eşlemeyle başlanır.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, Option<String>>>(&text) {
                Ok(map) => {
                    info!("Durum dosyası okundu: {} kayıt", map.len());
                    map
                }
                Err(e) => {
                    warn!("Durum dosyası bozuk, ilk çalışma sayılıyor: {}", e);
                    BTreeMap::new()
                }
            },
            Err(_) => {
                info!("Durum dosyası yok, ilk çalışma: {:?}", path);
                BTreeMap::new()
            }
        };

        Self { path, entries }
    }

    /// Kaynağın son bilinen adresi. Kayıt yoksa ya da null ise `None`.
    pub fn last_known(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.as_deref())
    }

    /// Başarılı bir indirme sonrası kaydı günceller. İndirme veya çözme
    /// başarısız olan kaynaklar için çağrılmaz; önceki değer korunur.
    pub fn record(&mut self, key: &str, identifier: &str) {
        self.entries
            .insert(key.to_string(), Some(identifier.to_string()));
    }

    /// Eşlemeyi koşulsuz diske yazar. Ulaşılamayan kaynakların eski
    /// değerleri olduğu gibi kalır.
    pub fn save(&self) -> Result<(), ScraperError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_bootstrap_suppresses_changed_but_fetches() {
        let p = plan(None, "https://t/files/list_2024_03.xlsx");
        assert!(!p.changed);
        assert!(p.should_fetch);
    }

    #[test]
    fn test_same_identifier_is_noop() {
        let p = plan(
            Some("https://t/files/list_2024_03.xlsx"),
            "https://t/files/list_2024_03.xlsx",
        );
        assert!(!p.changed);
        assert!(!p.should_fetch);
    }

    #[test]
    fn test_different_identifier_triggers_fetch() {
        let p = plan(
            Some("https://t/files/list_2024_02.xlsx"),
            "https://t/files/list_2024_03.xlsx",
        );
        assert!(p.changed);
        assert!(p.should_fetch);
    }

    #[test]
    fn test_missing_file_is_first_run() {
        let dir = tempdir().unwrap();
        let store = StateStore::load(dir.path().join("yok.json"));
        assert!(store.last_known("ruhsatli_ilaclar_listesi").is_none());
    }

    #[test]
    fn test_corrupt_file_is_first_run() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{bozuk json").unwrap();

        let store = StateStore::load(&path);
        assert!(store.last_known("etkin_madde_listesi").is_none());
    }

    #[test]
    fn test_roundtrip_preserves_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = StateStore::load(&path);
        store.record("ruhsatli_ilaclar_listesi", "https://t/a.xlsx");
        store.save().unwrap();

        let reloaded = StateStore::load(&path);
        assert_eq!(
            reloaded.last_known("ruhsatli_ilaclar_listesi"),
            Some("https://t/a.xlsx")
        );
    }

    #[test]
    fn test_saved_file_is_deterministic_across_insert_orders() {
        let dir = tempdir().unwrap();
        let keys = ["h", "c", "a", "g", "e", "b", "f", "d"];

        // Aynı kayıtlar, iki farklı ekleme sırası
        let path1 = dir.path().join("durum1.json");
        let mut store1 = StateStore::load(&path1);
        for k in keys {
            store1.record(k, &format!("https://t/{k}.xlsx"));
        }
        store1.save().unwrap();

        let path2 = dir.path().join("durum2.json");
        let mut store2 = StateStore::load(&path2);
        for k in keys.iter().rev() {
            store2.record(k, &format!("https://t/{k}.xlsx"));
        }
        store2.save().unwrap();

        let text1 = std::fs::read_to_string(&path1).unwrap();
        let text2 = std::fs::read_to_string(&path2).unwrap();
        assert_eq!(text1, text2);

        // Anahtarlar dosyada sıralı durur
        let positions: Vec<_> = ["a", "b", "c", "d", "e", "f", "g", "h"]
            .iter()
            .map(|k| text1.find(&format!("\"{k}\"")).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_back_to_back_runs_are_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        // İlk çalışma: taban çizgisi kurulur
        let mut store = StateStore::load(&path);
        let first = plan(store.last_known("k"), "https://t/a.xlsx");
        assert!(first.should_fetch && !first.changed);
        store.record("k", "https://t/a.xlsx");
        store.save().unwrap();
        let after_first = std::fs::read_to_string(&path).unwrap();

        // İkinci çalışma: üst kaynak değişmedi, indirme yok, durum aynı
        let store2 = StateStore::load(&path);
        let second = plan(store2.last_known("k"), "https://t/a.xlsx");
        assert!(!second.should_fetch && !second.changed);
        store2.save().unwrap();
        let after_second = std::fs::read_to_string(&path).unwrap();

        assert_eq!(after_first, after_second);
    }
}
