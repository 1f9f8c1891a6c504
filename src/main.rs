//! Los Libros Assembler
//!
//! Reads a publication manifest and its unpacked content, flattens every
//! page into one HTML document and writes it out.
//!
//! Usage: `los-libros-assembler [manifest.json]`

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use los_libros_assembler::{Config, FsLoader, HtmlDocumentLayout, Publication, PublicationAssembler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "los_libros_assembler=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let mut config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });
    if let Some(manifest) = std::env::args().nth(1) {
        config.source.manifest_path = manifest.into();
    }

    tracing::info!("Starting Los Libros Assembler v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Manifest: {}", config.source.manifest_path.display());

    let manifest = tokio::fs::read_to_string(&config.source.manifest_path)
        .await
        .with_context(|| format!("Failed to read {}", config.source.manifest_path.display()))?;
    let publication: Publication =
        serde_json::from_str(&manifest).context("Failed to parse publication manifest")?;

    let loader = FsLoader::new(config.source.content_root());
    tracing::info!("Content root: {}", loader.root().display());

    let assembler = PublicationAssembler::new(config.assembler.clone());
    let mut subscription = assembler.events().subscribe();
    tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            tracing::debug!(?event, "Publication event");
        }
    });

    let layout = HtmlDocumentLayout::new(publication.display_title())
        .with_bookmark(config.output.bookmark.clone());
    let loaded = assembler
        .load(&publication, &loader, layout)
        .await
        .context("Failed to assemble publication")?;

    let document = loaded.layout.render();
    match &config.output.path {
        Some(path) => {
            tokio::fs::write(path, &document)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {} bytes to {}", document.len(), path.display());
        }
        None => {
            use tokio::io::AsyncWriteExt;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(document.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    if !loaded.report.unresolved_references.is_empty() {
        tracing::warn!(
            "{} internal references point nowhere",
            loaded.report.unresolved_references.len()
        );
    }

    Ok(())
}
