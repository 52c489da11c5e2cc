//! Analizador por secciones: nueve consultas temáticas en paralelo sobre el
//! texto extraído.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::llm::{LlmClient, QueryOptions};
use crate::models::{Topic, TopicAnalysis};
use crate::prompts;

/// Analiza el documento tema a tema.
///
/// Los fallos de cada tema quedan como texto de error en su entrada; la
/// única causa de error es la cancelación de la petición.
pub async fn analyze_document(
    llm: &LlmClient,
    content: &str,
    cancel: &CancellationToken,
) -> Result<TopicAnalysis> {
    let queries: Vec<(Topic, String)> = Topic::ALL
        .iter()
        .map(|topic| (*topic, prompts::topic_prompt(*topic, content)))
        .collect();

    info!("Iniciando análisis en paralelo de todas las secciones...");
    let results = llm
        .ask_batch(
            queries,
            QueryOptions::with_system(prompts::ANALYST_SYSTEM_PROMPT),
            cancel,
        )
        .await;

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    info!(failures = results.failures(), "Todas las secciones han sido analizadas");
    Ok(results.into_texts().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::testing::{user_prompt, StubChat};
    use std::sync::Arc;

    #[tokio::test]
    async fn echo_backend_yields_nine_echoed_topics() {
        let backend = Arc::new(StubChat::echo());
        let llm = LlmClient::new(backend.clone());
        let analysis = analyze_document(
            &llm,
            "PÓLIZA #123, vigencia 01/01/2025-01/01/2026",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(analysis.len(), 9);
        for topic in Topic::ALL {
            assert!(analysis.get(topic).starts_with("ECHO:"), "{topic}");
        }
        assert_eq!(backend.calls(), 9);
        for request in backend.requests() {
            assert_eq!(request.messages[0].content, prompts::ANALYST_SYSTEM_PROMPT);
            assert!(user_prompt(&request).contains("PÓLIZA #123"));
        }
    }

    #[tokio::test]
    async fn failing_topics_keep_their_key() {
        let backend = StubChat::new(|req| {
            if user_prompt(req).starts_with("Identifica y detalla todas las exclusiones") {
                Err(QueryError::Network("timeout".into()))
            } else {
                Ok(vec!["ok".into()])
            }
        });
        let llm = LlmClient::new(Arc::new(backend));
        let analysis = analyze_document(&llm, "texto", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(analysis.len(), 9);
        assert!(analysis
            .get(Topic::Exclusiones)
            .starts_with("Error en esta consulta:"));
        assert_eq!(analysis.get(Topic::Condiciones), "ok");
    }

    #[tokio::test]
    async fn cancellation_is_reported() {
        let llm = LlmClient::new(Arc::new(StubChat::echo()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = analyze_document(&llm, "texto", &cancel).await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }
}
