//! Extracción de texto de un documento vía OCR, con reintentos y backoff
//! exponencial.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::OcrConfig;
use crate::error::{ExtractionError, OcrError};
use crate::models::Document;
use crate::ocr::{OcrInput, OcrProvider};

/// Política de reintentos: `max_retries` intentos extra tras el primero,
/// esperando `initial_delay × 2^n` antes del reintento `n` (desde 0).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Cliente de extracción de texto.
#[derive(Clone)]
pub struct TextExtractor {
    provider: Arc<dyn OcrProvider>,
    policy: RetryPolicy,
}

impl TextExtractor {
    pub fn new(provider: Arc<dyn OcrProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn from_config(provider: Arc<dyn OcrProvider>, cfg: &OcrConfig) -> Self {
        Self::new(
            provider,
            RetryPolicy {
                max_retries: cfg.max_retries,
                initial_delay: cfg.initial_delay,
            },
        )
    }

    /// Extrae el texto del documento. El documento se consume: sus bytes se
    /// liberan al terminar, tanto si la extracción tiene éxito como si no.
    pub async fn extract(
        &self,
        document: Document,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError> {
        let input = OcrInput {
            filename: document.filename,
            data: document.content,
        };
        let mut retry = 0;

        loop {
            if retry == 0 {
                info!(
                    file = %input.filename,
                    provider = self.provider.name(),
                    "Iniciando procesamiento OCR..."
                );
            } else {
                info!(
                    file = %input.filename,
                    "Reintento {}/{} de procesamiento OCR...",
                    retry,
                    self.policy.max_retries
                );
            }

            let attempt = async {
                let response = self.provider.process(&input).await?;
                response.into_text()
            };
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(OcrError::Cancelled),
                result = attempt => result,
            };

            let err = match result {
                Ok(text) => {
                    info!(file = %input.filename, chars = text.chars().count(), "Texto extraído");
                    return Ok(text);
                }
                Err(err) => err,
            };

            if matches!(err, OcrError::Cancelled) {
                return Err(self.give_up(&input, retry, err));
            }

            warn!(
                file = %input.filename,
                error = %err,
                "Error de OCR (intento {}/{})",
                retry + 1,
                self.policy.max_retries + 1
            );

            if retry >= self.policy.max_retries {
                error!(file = %input.filename, "Máximo de reintentos alcanzado. Abandonando.");
                return Err(self.give_up(&input, retry, err));
            }

            let delay = self.policy.delay_for(retry);
            info!("Esperando {}ms antes de reintentar...", delay.as_millis());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.give_up(&input, retry, OcrError::Cancelled));
                }
                _ = tokio::time::sleep(delay) => {}
            }

            retry += 1;
        }
    }

    fn give_up(&self, input: &OcrInput, retry: u32, source: OcrError) -> ExtractionError {
        ExtractionError {
            filename: input.filename.clone(),
            attempts: retry + 1,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrResponse;
    use crate::testing::StubOcr;
    use tokio::time::Instant;

    fn document() -> Document {
        Document::new("poliza.pdf", b"%PDF-1.7".to_vec())
    }

    #[test]
    fn backoff_doubles_from_initial_delay() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (0..3).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000]);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_twice_then_succeeds_after_two_retries() {
        let ocr = Arc::new(StubOcr::new(|_, call| {
            if call < 2 {
                Err(OcrError::Network("timeout".into()))
            } else {
                Ok(OcrResponse::from_pages(["X"]))
            }
        }));
        let extractor = TextExtractor::new(ocr.clone(), RetryPolicy::default());

        let start = Instant::now();
        let text = extractor
            .extract(document(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(text, "X");
        assert_eq!(ocr.calls(), 3);
        // 1s + 2s de espera entre intentos.
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(3000), "{waited:?}");
        assert!(waited < Duration::from_millis(3100), "{waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries_with_last_error() {
        let ocr = Arc::new(StubOcr::new(|_, call| {
            Err(OcrError::Api {
                status: 503,
                body: format!("fallo {call}"),
            })
        }));
        let extractor = TextExtractor::new(ocr.clone(), RetryPolicy::default());

        let start = Instant::now();
        let err = extractor
            .extract(document(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(ocr.calls(), 4);
        assert_eq!(err.attempts, 4);
        assert_eq!(err.filename, "poliza.pdf");
        assert!(matches!(err.source, OcrError::Api { ref body, .. } if body == "fallo 3"));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(7000), "{waited:?}");
        assert!(waited < Duration::from_millis(7100), "{waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_is_retried() {
        let ocr = Arc::new(StubOcr::new(|_, call| {
            if call == 0 {
                Ok(OcrResponse::default())
            } else {
                Ok(OcrResponse {
                    pages: None,
                    content: Some("contenido".into()),
                })
            }
        }));
        let extractor = TextExtractor::new(ocr.clone(), RetryPolicy::default());
        let text = extractor
            .extract(document(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "contenido");
        assert_eq!(ocr.calls(), 2);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let ocr = Arc::new(StubOcr::new(|_, _| Err(OcrError::Network("down".into()))));
        let policy = RetryPolicy {
            max_retries: 0,
            initial_delay: Duration::from_millis(1),
        };
        let err = TextExtractor::new(ocr.clone(), policy)
            .extract(document(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(ocr.calls(), 1);
        assert_eq!(err.attempts, 1);
    }

    #[tokio::test]
    async fn cancellation_stops_retrying() {
        let ocr = Arc::new(StubOcr::new(|_, _| Err(OcrError::Network("down".into()))));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = TextExtractor::new(ocr.clone(), RetryPolicy::default())
            .extract(document(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err.source, OcrError::Cancelled));
        assert_eq!(ocr.calls(), 0);
    }
}
