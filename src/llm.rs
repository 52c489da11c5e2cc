//! Cliente de consultas a modelos de lenguaje.
//!
//! `LlmClient` envía un prompt (con instrucción de sistema opcional) a un
//! backend de chat en streaming y devuelve la respuesta ya ensamblada. El
//! lote (`ask_batch`) lanza todas las consultas a la vez y conserva el fallo
//! de cada entrada junto a su clave, sin abortar las demás.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{LlmConfig, DEFAULT_CHAT_MODEL, DEFAULT_MAX_TOKENS};
use crate::error::{BatchEntryError, QueryError};

/// Fragmentos de texto tal como los entrega el backend.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, QueryError>> + Send>>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Cuerpo de la petición de chat (`/chat/completions`).
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub max_tokens: u32,
}

/// Backend de modelos con respuesta incremental.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, QueryError>;
}

/// Modelo e instrucción de sistema de una consulta. Sin modelo se usa el
/// modelo por defecto del cliente.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions<'a> {
    pub model: Option<&'a str>,
    pub system: Option<&'a str>,
}

impl<'a> QueryOptions<'a> {
    pub fn with_system(system: &'a str) -> Self {
        Self {
            model: None,
            system: Some(system),
        }
    }

    pub fn model(mut self, model: &'a str) -> Self {
        self.model = Some(model);
        self
    }
}

/// Resultado de un lote: una entrada por clave, con éxito o fallo.
#[derive(Debug)]
pub struct BatchResults<K> {
    entries: HashMap<K, Result<String, BatchEntryError>>,
}

impl<K: Eq + Hash> BatchResults<K> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.entries.values().filter(|r| r.is_err()).count()
    }

    /// Texto de una entrada, o su marcador de error en línea.
    pub fn text(&self, key: &K) -> String {
        match self.entries.get(key) {
            Some(Ok(text)) => text.clone(),
            Some(Err(err)) => err.to_string(),
            None => String::new(),
        }
    }

    /// Convierte el lote en un mapa clave → texto, con los fallos
    /// renderizados como `"Error en esta consulta: ..."`.
    pub fn into_texts(self) -> HashMap<K, String> {
        self.entries
            .into_iter()
            .map(|(key, result)| {
                let text = result.unwrap_or_else(|err| err.to_string());
                (key, text)
            })
            .collect()
    }
}

/// Cliente de consultas. Su configuración es inmutable tras construirse y
/// se comparte entre peticiones concurrentes.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn ChatBackend>,
    default_model: String,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            default_model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Construye el cliente a partir de la configuración.
    pub fn from_config(backend: Arc<dyn ChatBackend>, cfg: &LlmConfig) -> Self {
        Self {
            backend,
            default_model: cfg.chat_model.clone(),
            max_tokens: cfg.max_tokens,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn build_request(&self, prompt: &str, options: QueryOptions<'_>) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        ChatRequest {
            model: options.model.unwrap_or(&self.default_model).to_string(),
            messages,
            stream: true,
            max_tokens: self.max_tokens,
        }
    }

    /// Envía un prompt y devuelve la respuesta completa. Los fragmentos
    /// parciales nunca se exponen; tampoco se reintenta.
    pub async fn ask(
        &self,
        prompt: &str,
        options: QueryOptions<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, QueryError> {
        let request = self.build_request(prompt, options);
        let model = request.model.clone();
        debug!(
            model = %model,
            prompt_tokens = estimate_token_count(prompt),
            "Enviando consulta al modelo"
        );

        let collect = async {
            let mut stream = self.backend.stream_chat(request).await?;
            let mut full_response = String::new();
            while let Some(fragment) = stream.next().await {
                full_response.push_str(&fragment?);
            }
            Ok::<_, QueryError>(full_response)
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(QueryError::Cancelled),
            result = collect => result,
        };

        if let Err(err) = &result {
            warn!(model = %model, error = %err, "Error en solicitud streaming al modelo");
        }
        result
    }

    /// Lanza todas las consultas en paralelo y espera a que terminen.
    ///
    /// El lote nunca falla: cada error queda asociado a su clave.
    pub async fn ask_batch<K>(
        &self,
        queries: Vec<(K, String)>,
        options: QueryOptions<'_>,
        cancel: &CancellationToken,
    ) -> BatchResults<K>
    where
        K: Eq + Hash + Display + Send,
    {
        let total = queries.len();
        let futures = queries.into_iter().map(|(key, prompt)| async move {
            info!(query = %key, "Iniciando consulta");
            let result = self.ask(&prompt, options, cancel).await;
            match &result {
                Ok(_) => info!(query = %key, "Consulta completada correctamente"),
                Err(err) => warn!(query = %key, error = %err, "Error en consulta"),
            }
            (key, result.map_err(|source| BatchEntryError { source }))
        });

        let entries: HashMap<K, Result<String, BatchEntryError>> =
            join_all(futures).await.into_iter().collect();

        let results = BatchResults { entries };
        debug!(total, failures = results.failures(), "Lote de consultas terminado");
        results
    }
}

/// Estimación simple de tokens: ~4 caracteres por token.
pub fn estimate_token_count(content: &str) -> usize {
    content.chars().count().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubChat;

    #[tokio::test]
    async fn ask_concatenates_fragments_in_order() {
        let backend = StubChat::new(|_| Ok(vec!["INFORME ".into(), "de ".into(), "prueba".into()]));
        let client = LlmClient::new(Arc::new(backend));
        let text = client
            .ask("hola", QueryOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "INFORME de prueba");
    }

    #[tokio::test]
    async fn ask_sends_system_then_user_with_default_model() {
        let backend = Arc::new(StubChat::echo());
        let client = LlmClient::new(backend.clone());
        client
            .ask("prompt", QueryOptions::with_system("sistema"), &CancellationToken::new())
            .await
            .unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model, DEFAULT_CHAT_MODEL);
        assert!(request.stream);
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(
            request.messages,
            vec![ChatMessage::system("sistema"), ChatMessage::user("prompt")]
        );
    }

    #[tokio::test]
    async fn explicit_model_overrides_default() {
        let backend = Arc::new(StubChat::echo());
        let client = LlmClient::new(backend.clone());
        let options = QueryOptions::default().model("otro/modelo");
        client.ask("x", options, &CancellationToken::new()).await.unwrap();
        assert_eq!(backend.requests()[0].model, "otro/modelo");
        assert_eq!(backend.requests()[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn stream_error_mid_response_fails_the_query() {
        let backend = StubChat::with_stream(|_| {
            vec![Ok("parcial".to_string()), Err(QueryError::Network("reset".into()))]
        });
        let client = LlmClient::new(Arc::new(backend));
        let err = client
            .ask("x", QueryOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Network(_)));
    }

    #[tokio::test]
    async fn batch_keeps_every_key_when_some_entries_fail() {
        let backend = StubChat::new(|req| {
            let prompt = &req.messages.last().unwrap().content;
            if prompt.contains("falla") {
                Err(QueryError::Api {
                    status: 500,
                    body: "boom".into(),
                })
            } else {
                Ok(vec![format!("ok:{prompt}")])
            }
        });
        let client = LlmClient::new(Arc::new(backend));
        let queries = vec![
            ("a".to_string(), "uno".to_string()),
            ("b".to_string(), "falla dos".to_string()),
            ("c".to_string(), "tres".to_string()),
            ("d".to_string(), "falla cuatro".to_string()),
        ];

        let results = client
            .ask_batch(queries, QueryOptions::default(), &CancellationToken::new())
            .await;
        assert_eq!(results.len(), 4);
        assert_eq!(results.failures(), 2);

        let texts = results.into_texts();
        assert_eq!(texts.len(), 4);
        assert_eq!(texts["a"], "ok:uno");
        assert_eq!(texts["c"], "ok:tres");
        assert!(texts["b"].starts_with("Error en esta consulta: "));
        assert!(texts["d"].contains("boom"));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_the_query() {
        let client = LlmClient::new(Arc::new(StubChat::echo()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.ask("x", QueryOptions::default(), &cancel).await.unwrap_err();
        assert!(matches!(err, QueryError::Cancelled));
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_token_count(""), 0);
        assert_eq!(estimate_token_count("abcd"), 1);
        assert_eq!(estimate_token_count("abcde"), 2);
    }
}
