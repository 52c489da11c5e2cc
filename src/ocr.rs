//! Backend OCR: abstracción del proveedor y cliente de Mistral OCR.
//!
//! Un intento de OCR con Mistral son tres llamadas: subida del fichero,
//! obtención de una URL firmada y procesamiento OCR sobre esa URL.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::error::OcrError;

/// Entrada a un proveedor OCR.
#[derive(Debug, Clone)]
pub struct OcrInput {
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OcrPage {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl OcrPage {
    /// Markdown si existe y no está vacío; si no, texto plano.
    fn content(&self) -> &str {
        self.markdown
            .as_deref()
            .filter(|m| !m.is_empty())
            .or(self.text.as_deref())
            .unwrap_or_default()
    }
}

/// Respuesta del backend: lista de páginas o un campo `content` global.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub pages: Option<Vec<OcrPage>>,
    #[serde(default)]
    pub content: Option<String>,
}

impl OcrResponse {
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: Some(
                pages
                    .into_iter()
                    .map(|p| OcrPage {
                        markdown: Some(p.into()),
                        text: None,
                    })
                    .collect(),
            ),
            content: None,
        }
    }

    /// Ensambla el texto del documento: páginas separadas por una línea en
    /// blanco, o el `content` global si no hay lista de páginas.
    pub fn into_text(self) -> Result<String, OcrError> {
        let text = if let Some(pages) = self.pages {
            debug!("Contenido extraído de {} páginas", pages.len());
            pages
                .iter()
                .map(OcrPage::content)
                .collect::<Vec<_>>()
                .join("\n\n")
        } else if let Some(content) = self.content {
            content
        } else {
            return Err(OcrError::Format(
                "la respuesta no contiene 'pages' ni 'content'".into(),
            ));
        };

        if text.trim().is_empty() {
            return Err(OcrError::Format("el documento no contiene texto".into()));
        }
        Ok(text)
    }
}

/// Proveedor OCR intercambiable.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn process(&self, input: &OcrInput) -> Result<OcrResponse, OcrError>;
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

/// Cliente de Mistral OCR.
#[derive(Clone)]
pub struct MistralOcr {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl MistralOcr {
    pub fn new(cfg: &OcrConfig) -> Self {
        Self {
            http_client: Client::new(),
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
        }
    }

    async fn upload(&self, input: &OcrInput) -> Result<UploadedFile, OcrError> {
        let filename = if input.filename.is_empty() {
            "document.pdf".to_string()
        } else {
            input.filename.clone()
        };
        let part = multipart::Part::bytes(input.data.to_vec())
            .file_name(filename)
            .mime_str("application/pdf")
            .map_err(|e| OcrError::Network(e.to_string()))?;
        let form = multipart::Form::new().text("purpose", "ocr").part("file", part);

        let response = self
            .http_client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OcrError::Network(e.to_string()))?;
        parse_json(response).await
    }

    async fn signed_url(&self, file_id: &str) -> Result<SignedUrl, OcrError> {
        let response = self
            .http_client
            .get(format!("{}/files/{}/url", self.base_url, file_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| OcrError::Network(e.to_string()))?;
        parse_json(response).await
    }

    async fn ocr(&self, document_url: &str) -> Result<OcrResponse, OcrError> {
        let body = json!({
            "model": self.model,
            "document": {
                "type": "document_url",
                "document_url": document_url,
            },
            "include_image_base64": true,
        });
        let response = self
            .http_client
            .post(format!("{}/ocr", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OcrError::Network(e.to_string()))?;
        parse_json(response).await
    }
}

#[async_trait]
impl OcrProvider for MistralOcr {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn process(&self, input: &OcrInput) -> Result<OcrResponse, OcrError> {
        info!(file = %input.filename, "Subiendo fichero a Mistral...");
        let uploaded = self.upload(input).await?;
        debug!(file_id = %uploaded.id, "Fichero subido");

        let signed = self.signed_url(&uploaded.id).await?;
        debug!("URL firmada obtenida");

        let response = self.ocr(&signed.url).await?;
        info!(file = %input.filename, "OCR completado");
        Ok(response)
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, OcrError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, error = %body, "Error de la API de Mistral");
        return Err(OcrError::Api {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| OcrError::Format(e.to_string()))
}
