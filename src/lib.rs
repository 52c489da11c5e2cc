//! Insurance Copilot: análisis de pólizas de seguros con OCR y modelos de
//! lenguaje.
//!
//! Un documento se extrae por OCR, se analiza por temas en paralelo, se
//! completa con búsquedas complementarias y se verifica y resume en un
//! informe final. En modo comparación, varios documentos recorren las
//! primeras etapas en paralelo y se sintetizan en un informe comparativo.

pub mod analyzer;
pub mod api;
pub mod app_state;
pub mod compare;
pub mod config;
pub mod error;
pub mod extractor;
pub mod gaps;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod openrouter;
pub mod pipeline;
pub mod prompts;
pub mod streaming;
pub mod summary;
pub mod testing;
