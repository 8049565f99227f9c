use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::config::RegistryConfig;
use crate::error::ScraperError;
use crate::pipeline::{run, RunSummary};

/// Çalışma isteği
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub config: RegistryConfig,
}

impl RunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }
}

/// tower::Service olarak çalıştırılabilen kayıt servisi
#[derive(Debug, Clone, Default)]
pub struct RegistryService {
    // İleride genişletme için (hız sınırı, önbellek vb.)
}

impl RegistryService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<RunRequest> for RegistryService {
    type Response = RunSummary;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RunRequest) -> Self::Future {
        info!(
            "Çalışma isteği alındı: {} kaynak",
            req.config.sources.len()
        );

        Box::pin(async move {
            let summary = run(&req.config).await?;

            info!(
                "Çalışma tamamlandı: güncellenen={}, başarılı={}",
                summary.changed_keys().len(),
                summary.is_success()
            );

            Ok(summary)
        })
    }
}
