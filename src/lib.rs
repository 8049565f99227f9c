//! TİTCK liste indirme ve normalizasyon kütüphanesi
//!
//! - Listeleme sayfalarından güncel Excel bağlantısını çözer
//! - Son bilinen adresle karşılaştırarak değişikliği tespit eder
//! - Değişen dosyayı indirir, sütun haritasına göre jsonl/csv üretir
//!
//! # Kullanım örneği
//!
//! ```rust,ignore
//! use titck_scraper::{pipeline, RegistryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RegistryConfig::new().with_headless(true);
//!     let summary = pipeline::run(&config).await.unwrap();
//!     println!("{}", summary.human_summary());
//! }
//! ```
//!
//! # tower::Service olarak
//!
//! ```rust,ignore
//! use titck_scraper::{RegistryService, RunRequest};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = RegistryService::new();
//!     let summary = service.call(RunRequest::new()).await.unwrap();
//!     println!("güncellendi: {}", summary.updated());
//! }
//! ```

pub mod browser;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod state;
pub mod traits;

// Ana türleri yeniden dışa aktar
pub use browser::TitckSession;
pub use config::{Credentials, RegistryConfig, SourceConfig};
pub use error::ScraperError;
pub use pipeline::{RunSummary, SourceOutcome, SourceStatus};
pub use service::{RegistryService, RunRequest};
pub use state::StateStore;
pub use traits::AuthSession;
