//! Tesseract OCR backend implementation.
//!
//! Drives the `tesseract` command-line tool. Images are piped through stdin
//! from an in-memory buffer, so the engine never reads a file that might
//! still be in the middle of being written.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Tesseract OCR backend.
pub struct TesseractBackend {
    config: OcrConfig,
    version: Option<String>,
}

impl TesseractBackend {
    /// Create a new Tesseract backend with default configuration.
    pub fn new() -> Self {
        Self::with_config(OcrConfig::default())
    }

    /// Create a new Tesseract backend with custom configuration.
    pub fn with_config(config: OcrConfig) -> Self {
        Self {
            config,
            version: None,
        }
    }

    /// Tesseract version reported during initialization.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new("tesseract");
        cmd.args(["stdin", "stdout"])
            .args(["-l", &self.config.language])
            .args(["--psm", &self.config.page_segmentation_mode.to_string()])
            .args(["--dpi", &self.config.dpi.to_string()]);
        cmd
    }

    /// Run Tesseract on image bytes.
    fn run_tesseract(&self, image: &[u8]) -> Result<String, OcrError> {
        let child = self
            .base_command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::BackendNotAvailable(
                    "tesseract not found (install tesseract-ocr)".to_string(),
                ));
            }
            Err(e) => return Err(OcrError::Io(e)),
        };

        // Tesseract reads all of stdin before writing anything.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image)?;
        }

        let output = child.wait_with_output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr.trim())))
        }
    }

    /// Installed language packs, from `tesseract --list-langs`.
    fn installed_languages(&self) -> Result<Vec<String>, OcrError> {
        let output = Command::new("tesseract").arg("--list-langs").output()?;
        // Older releases print the list on stderr.
        let listing = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).to_string()
        };
        Ok(listing
            .lines()
            .skip_while(|l| l.starts_with("List of available languages"))
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBackend for TesseractBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Tesseract
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if !check_binary("tesseract") {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        } else {
            "Tesseract is available".to_string()
        }
    }

    fn initialize(&mut self) -> Result<(), OcrError> {
        if !self.is_available() {
            return Err(OcrError::BackendNotAvailable(self.availability_hint()));
        }

        let output = Command::new("tesseract").arg("--version").output()?;
        self.version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|l| l.trim().to_string());

        match self.installed_languages() {
            Ok(installed) => {
                for lang in self.config.language.split('+') {
                    if !installed.iter().any(|l| l == lang) {
                        return Err(OcrError::ModelNotFound(format!(
                            "tesseract language '{}' is not installed (apt install tesseract-ocr-{})",
                            lang, lang
                        )));
                    }
                }
            }
            Err(e) => tracing::debug!("Could not list tesseract languages: {}", e),
        }

        tracing::info!(
            "Tesseract ready ({}), lang={} psm={} dpi={}",
            self.version.as_deref().unwrap_or("unknown version"),
            self.config.language,
            self.config.page_segmentation_mode,
            self.config.dpi
        );
        Ok(())
    }

    fn ocr_bytes(&self, image: &[u8]) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let text = self.run_tesseract(image)?;
        let elapsed = start.elapsed();

        Ok(OcrResult {
            text,
            confidence: None,
            backend: OcrBackendType::Tesseract,
            processing_time_ms: elapsed.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_carries_receipt_hints() {
        let backend = TesseractBackend::with_config(OcrConfig {
            language: "eng+fra".to_string(),
            ..OcrConfig::default()
        });
        let cmd = backend.base_command();
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec!["stdin", "stdout", "-l", "eng+fra", "--psm", "6", "--dpi", "300"]
        );
    }
}
