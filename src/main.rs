use titck_scraper::{pipeline, RegistryConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,titck_scraper=debug")),
        )
        .init();

    let config = RegistryConfig::new();

    let summary = match pipeline::run(&config).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Çalışma başlatılamadı: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = summary.write_github_output() {
        eprintln!("GITHUB_OUTPUT yazılamadı: {}", e);
    }

    println!("{}", summary.human_summary());

    // Değişiklik olmaması başarıdır; tek bir sert hata bile sıfır dışı kod
    if !summary.is_success() {
        std::process::exit(1);
    }
}
