//! Carga y gestión de configuración de la aplicación (OpenRouter + Mistral OCR).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

pub const DEFAULT_CHAT_MODEL: &str = "google/gemini-2.0-flash-001:floor";
pub const DEFAULT_OCR_MODEL: &str = "mistral-ocr-latest";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Configuración del backend de modelos de lenguaje.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub comparison_model: String,
    pub max_tokens: u32,
    /// Cabecera opcional `HTTP-Referer`.
    pub site_url: Option<String>,
    /// Cabecera opcional `X-Title`.
    pub site_name: Option<String>,
}

/// Configuración del backend OCR y de su política de reintentos.
#[derive(Clone, Debug)]
pub struct OcrConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_retries: u32,
    pub initial_delay: Duration,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub max_upload_bytes: usize,
    pub llm: LlmConfig,
    pub ocr: OcrConfig,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());
        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let chat_model =
            env::var("LLM_CHAT_MODEL").unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());
        let comparison_model =
            env::var("COMPARISON_MODEL").unwrap_or_else(|_| chat_model.clone());

        let llm = LlmConfig {
            api_key: env::var("OPENROUTER_API_KEY")
                .map_err(|_| anyhow!("Falta OPENROUTER_API_KEY en el entorno"))?,
            base_url: base_url("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1")?,
            chat_model,
            comparison_model,
            max_tokens: parse_or("LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            site_url: env::var("SITE_URL").ok().filter(|s| !s.is_empty()),
            site_name: env::var("SITE_NAME").ok().filter(|s| !s.is_empty()),
        };

        let ocr = OcrConfig {
            api_key: env::var("MISTRAL_API_KEY")
                .map_err(|_| anyhow!("Falta MISTRAL_API_KEY en el entorno"))?,
            base_url: base_url("MISTRAL_BASE_URL", "https://api.mistral.ai/v1")?,
            model: env::var("OCR_MODEL").unwrap_or_else(|_| DEFAULT_OCR_MODEL.to_string()),
            max_retries: parse_or("OCR_MAX_RETRIES", 3)?,
            initial_delay: Duration::from_millis(parse_or("OCR_INITIAL_DELAY_MS", 1000)?),
        };

        Ok(Self {
            server_addr,
            max_upload_bytes,
            llm,
            ocr,
        })
    }
}

/// Lee una URL base, la valida y elimina la barra final.
fn base_url(var: &str, default: &str) -> Result<String> {
    let raw = env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).with_context(|| format!("{var} no es una URL válida: {raw}"))?;
    Ok(raw.trim_end_matches('/').to_string())
}

fn parse_or<T>(var: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Valor inválido para {var} ('{raw}'): {e}")),
        Err(_) => Ok(default),
    }
}
