//! CAPTCHA image decoding.

use crate::error::{PortalError, Result};
use einvoice_core::config::CaptchaConfig;
use std::collections::HashMap;
use std::io::Write;

/// CAPTCHA solver for pluggable implementations.
///
/// Implementations must be deterministic for a given image, bounded in
/// latency, and must not reach for the network. A zero- or low-confidence
/// read is the typed [`PortalError::CaptchaUnreadable`] error, never an
/// empty-string success; the login flow decides whether to refresh and
/// retry.
pub trait CaptchaSolver: Send + Sync {
    /// Decode a CAPTCHA image (PNG bytes) into its text, restricted to
    /// the given character allowlist.
    fn solve(&self, image_png: &[u8], allowlist: &str) -> Result<String>;
}

/// Tesseract-backed solver.
///
/// Runs the locally installed Tesseract engine over an element screenshot
/// with the allowlist as a character whitelist. The screenshot is staged
/// through a named temp file which is removed on drop, success or not.
pub struct TesseractSolver {
    language: String,
    min_confidence: f32,
}

impl TesseractSolver {
    /// Create a solver from CAPTCHA configuration.
    #[must_use]
    pub fn new(config: &CaptchaConfig) -> Self {
        Self {
            language: config.ocr_language.clone(),
            min_confidence: config.min_confidence,
        }
    }
}

impl Default for TesseractSolver {
    fn default() -> Self {
        Self::new(&CaptchaConfig::default())
    }
}

impl CaptchaSolver for TesseractSolver {
    fn solve(&self, image_png: &[u8], allowlist: &str) -> Result<String> {
        let mut artifact = tempfile::Builder::new()
            .prefix("captcha-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| PortalError::Ocr(format!("captcha artifact: {e}")))?;
        artifact
            .write_all(image_png)
            .map_err(|e| PortalError::Ocr(format!("captcha artifact: {e}")))?;

        let image = rusty_tesseract::Image::from_path(artifact.path())
            .map_err(|e| PortalError::Ocr(e.to_string()))?;

        let args = rusty_tesseract::Args {
            lang: self.language.clone(),
            config_variables: HashMap::from([(
                "tessedit_char_whitelist".to_string(),
                allowlist.to_string(),
            )]),
            dpi: Some(150),
            // Single text line; the widget renders one row of digits
            psm: Some(7),
            oem: Some(3),
        };

        let output = rusty_tesseract::image_to_data(&image, &args)
            .map_err(|e| PortalError::Ocr(e.to_string()))?;

        let text = confident_text(
            output.data.iter().map(|d| (d.conf, d.text.as_str())),
            allowlist,
            self.min_confidence,
        );

        if text.is_empty() {
            tracing::debug!("OCR produced no confident read");
            return Err(PortalError::CaptchaUnreadable);
        }

        tracing::debug!(chars = text.len(), "OCR read captcha");
        Ok(text)
    }
}

/// Keep confident reads, drop everything outside the allowlist, and join
/// what is left in reading order.
fn confident_text<'a>(
    reads: impl Iterator<Item = (f32, &'a str)>,
    allowlist: &str,
    min_confidence: f32,
) -> String {
    reads
        .filter(|(conf, text)| *conf >= min_confidence && !text.trim().is_empty())
        .flat_map(|(_, text)| text.chars())
        .filter(|c| allowlist.contains(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confident_text_joins_reads_in_order() {
        let reads = vec![(95.0, "12"), (88.0, "34")];
        assert_eq!(
            confident_text(reads.into_iter(), "0123456789", 40.0),
            "1234"
        );
    }

    #[test]
    fn test_confident_text_drops_low_confidence() {
        let reads = vec![(95.0, "12"), (12.0, "99")];
        assert_eq!(confident_text(reads.into_iter(), "0123456789", 40.0), "12");
    }

    #[test]
    fn test_confident_text_strips_non_allowlist_chars() {
        let reads = vec![(90.0, "1a2 b3")];
        assert_eq!(confident_text(reads.into_iter(), "0123456789", 40.0), "123");
    }

    #[test]
    fn test_confident_text_empty_when_nothing_survives() {
        let reads = vec![(-1.0, ""), (20.0, "77"), (90.0, "xyz")];
        assert_eq!(confident_text(reads.into_iter(), "0123456789", 40.0), "");
    }
}
