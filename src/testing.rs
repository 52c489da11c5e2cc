//! Utilidades de prueba: backends simulados de chat y OCR.
//!
//! Permiten ejercitar el pipeline completo sin llamadas reales a OpenRouter
//! ni a Mistral.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{OcrError, QueryError};
use crate::llm::{ChatBackend, ChatRequest, FragmentStream};
use crate::ocr::{OcrInput, OcrProvider, OcrResponse};

type ChatResponder =
    Arc<dyn Fn(&ChatRequest) -> Result<Vec<Result<String, QueryError>>, QueryError> + Send + Sync>;

/// Backend de chat simulado. Registra todas las peticiones recibidas.
pub struct StubChat {
    responder: ChatResponder,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StubChat {
    /// Responde con la lista de fragmentos devuelta, o falla al abrir el stream.
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<Vec<String>, QueryError> + Send + Sync + 'static,
    {
        Self::from_responder(Arc::new(move |req| {
            respond(req).map(|fragments| fragments.into_iter().map(Ok).collect())
        }))
    }

    /// Responde con un stream cuyos elementos pueden fallar a mitad.
    pub fn with_stream<F>(respond: F) -> Self
    where
        F: Fn(&ChatRequest) -> Vec<Result<String, QueryError>> + Send + Sync + 'static,
    {
        Self::from_responder(Arc::new(move |req| Ok(respond(req))))
    }

    /// Devuelve `"ECHO:"` seguido de los 10 primeros caracteres del prompt.
    pub fn echo() -> Self {
        Self::new(|req| {
            let prompt = user_prompt(req);
            let head: String = prompt.chars().take(10).collect();
            Ok(vec!["ECHO:".to_string(), head])
        })
    }

    fn from_responder(responder: ChatResponder) -> Self {
        Self {
            responder,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ChatBackend for StubChat {
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, QueryError> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request.clone());
        let items = (self.responder)(&request)?;
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Contenido del último mensaje de usuario de una petición.
pub fn user_prompt(request: &ChatRequest) -> &str {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

type OcrResponder = Box<dyn Fn(&OcrInput, u32) -> Result<OcrResponse, OcrError> + Send + Sync>;

/// Proveedor OCR simulado. El responder recibe la entrada y el número de
/// llamada (desde 0).
pub struct StubOcr {
    responder: OcrResponder,
    calls: AtomicU32,
}

impl StubOcr {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&OcrInput, u32) -> Result<OcrResponse, OcrError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(respond),
            calls: AtomicU32::new(0),
        }
    }

    /// Devuelve como única página el nombre del fichero precedido de `texto de`.
    pub fn by_filename() -> Self {
        Self::new(|input, _| Ok(OcrResponse::from_pages([format!("texto de {}", input.filename)])))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrProvider for StubOcr {
    fn name(&self) -> &str {
        "stub"
    }

    async fn process(&self, input: &OcrInput) -> Result<OcrResponse, OcrError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(input, call)
    }
}
