//! OCR commands: backend status and single-image processing.

use std::path::Path;
use std::sync::Arc;

use console::style;

use crate::cli::helpers::print_json;
use crate::config::Config;
use crate::ocr::{create_backend, ImagePreprocessor, OcrBackend, RecognitionEngine, TesseractBackend};
use crate::repository::InMemoryStore;
use crate::services::ReceiptProcessor;

fn status_line(name: &str, backend: &dyn OcrBackend) {
    let status = if backend.is_available() {
        style("✓ available").green()
    } else {
        style("✗ not available").red()
    };
    println!("  {:<15} {}", name, status);
    if !backend.is_available() {
        println!("                  {}", style(backend.availability_hint()).dim());
    }
}

/// Check OCR backend availability.
pub async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let ocr_config = config.ocr_config().map_err(anyhow::Error::msg)?;

    println!("\n{}", style("OCR Backend Status").bold());
    println!("{}", "-".repeat(50));

    status_line("Tesseract", &TesseractBackend::new());

    #[cfg(feature = "ocr-ocrs")]
    {
        use crate::ocr::OcrsBackend;
        status_line("OCRS", &OcrsBackend::new());
    }
    #[cfg(not(feature = "ocr-ocrs"))]
    {
        println!(
            "  {:<15} {}",
            "OCRS",
            style("not compiled (enable ocr-ocrs feature)").dim()
        );
    }

    println!("\n{}", style("Configured engine:").cyan());
    println!("  {:<15} {}", "backend", ocr_config.backend);
    println!("  {:<15} {}", "language", ocr_config.language);
    println!("  {:<15} {}", "psm", ocr_config.page_segmentation_mode);
    println!("  {:<15} {}", "dpi", ocr_config.dpi);

    let mut backend = create_backend(&ocr_config)?;
    match tokio::task::spawn_blocking(move || backend.initialize()).await? {
        Ok(()) => println!("\n  {}", style("✓ engine ready").green()),
        Err(e) => {
            println!("\n  {} {}", style("✗ engine cannot start:").red(), e);
            anyhow::bail!("configured OCR backend is not usable");
        }
    }

    Ok(())
}

/// Preprocess, recognize and parse one image.
pub async fn cmd_process(
    config: &Config,
    image: &Path,
    no_preprocess: bool,
    show_text: bool,
) -> anyhow::Result<()> {
    if !image.exists() {
        anyhow::bail!("Image not found: {}", image.display());
    }

    let engine = Arc::new(RecognitionEngine::new(
        config.ocr_config().map_err(anyhow::Error::msg)?,
    ));
    if config.ocr.warm_up {
        engine.warm_up().await;
    }

    let preprocessor = (config.preprocess.enabled && !no_preprocess)
        .then(|| ImagePreprocessor::new(config.preprocess.options()));
    let processor = ReceiptProcessor::new(engine, Arc::new(InMemoryStore::new()))
        .with_preprocessor(preprocessor);

    let processed = tokio::time::timeout(
        config.pipeline.timeout(),
        processor.extract_from_path(image),
    )
    .await
    .map_err(|_| {
        anyhow::anyhow!(
            "Processing {} timed out after {}s",
            image.display(),
            config.pipeline.timeout_secs
        )
    })?;

    if processed.raw_text.is_empty() {
        eprintln!(
            "{} no text recognized (run `spendscan check`)",
            style("warning:").yellow()
        );
    }
    if show_text {
        eprintln!("{}\n{}\n", style("Recognized text:").cyan(), processed.raw_text);
    }

    print_json(&processed)
}
