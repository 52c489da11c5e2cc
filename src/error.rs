//! Taxonomía de errores del pipeline de análisis.
//!
//! Los errores de biblioteca son tipados (`thiserror`); sólo la carga de
//! configuración y `main` trabajan con `anyhow`.

use thiserror::Error;

/// Error de una única consulta al modelo de lenguaje.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Fallo de transporte (conexión, timeout, corte del stream).
    #[error("error de red: {0}")]
    Network(String),

    /// Respuesta no-2xx del backend.
    #[error("error de la API ({status}): {body}")]
    Api { status: u16, body: String },

    /// Fragmento SSE o JSON con formato inesperado.
    #[error("respuesta con formato inesperado: {0}")]
    Parse(String),

    #[error("consulta cancelada")]
    Cancelled,
}

/// Fallo de una entrada concreta dentro de un lote de consultas.
///
/// Nunca aborta el lote: se conserva junto a la clave y se renderiza
/// como texto en línea.
#[derive(Debug, Error)]
#[error("Error en esta consulta: {source}")]
pub struct BatchEntryError {
    #[source]
    pub source: QueryError,
}

/// Error de un intento individual contra el backend OCR.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("error de red OCR: {0}")]
    Network(String),

    #[error("error de la API OCR ({status}): {body}")]
    Api { status: u16, body: String },

    /// El resultado no contiene ni `pages` ni `content`, o está vacío.
    #[error("no se pudo extraer contenido del resultado OCR: {0}")]
    Format(String),

    #[error("extracción cancelada")]
    Cancelled,
}

/// La extracción de texto agotó sus reintentos.
#[derive(Debug, Error)]
#[error("error de extracción OCR en '{filename}' tras {attempts} intentos: {source}")]
pub struct ExtractionError {
    pub filename: String,
    pub attempts: u32,
    #[source]
    pub source: OcrError,
}

/// Errores terminales de una petición completa.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(ExtractionError),

    /// Número de documentos fuera de rango, o entrada no procesable.
    #[error("entrada no válida: {0}")]
    InvalidInput(String),

    /// Falló la llamada de síntesis final de la comparación.
    #[error("Error generating comparison: {0}")]
    Synthesis(#[source] QueryError),

    #[error("solicitud cancelada")]
    Cancelled,
}

impl PipelineError {
    /// Categoría estable para el payload de error de la API.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "extraction",
            Self::InvalidInput(_) => "invalid_input",
            Self::Synthesis(_) => "synthesis",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<ExtractionError> for PipelineError {
    fn from(err: ExtractionError) -> Self {
        match err.source {
            OcrError::Cancelled => Self::Cancelled,
            _ => Self::Extraction(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_entry_error_renders_inline_marker() {
        let err = BatchEntryError {
            source: QueryError::Network("connection reset".into()),
        };
        assert_eq!(
            err.to_string(),
            "Error en esta consulta: error de red: connection reset"
        );
    }

    #[test]
    fn synthesis_error_keeps_original_prefix() {
        let err = PipelineError::Synthesis(QueryError::Api {
            status: 429,
            body: "rate limited".into(),
        });
        assert!(err.to_string().starts_with("Error generating comparison: "));
        assert_eq!(err.category(), "synthesis");
    }

    #[test]
    fn cancelled_extraction_becomes_cancelled_request() {
        let cancelled = ExtractionError {
            filename: "a.pdf".into(),
            attempts: 1,
            source: OcrError::Cancelled,
        };
        assert!(matches!(PipelineError::from(cancelled), PipelineError::Cancelled));

        let failed = ExtractionError {
            filename: "a.pdf".into(),
            attempts: 4,
            source: OcrError::Network("down".into()),
        };
        let err = PipelineError::from(failed);
        assert_eq!(err.category(), "extraction");
        assert!(err.to_string().contains("a.pdf"));
    }
}
