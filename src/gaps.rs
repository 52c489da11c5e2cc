//! Búsqueda complementaria: contrasta grupos de temas ya extraídos con el
//! documento original para recuperar lo que la primera pasada omitió.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::llm::{LlmClient, QueryOptions};
use crate::models::{GapFindings, GapTopic, TopicAnalysis};
use crate::prompts;

pub async fn find_gaps(
    llm: &LlmClient,
    content: &str,
    analysis: &TopicAnalysis,
    cancel: &CancellationToken,
) -> Result<GapFindings> {
    let queries: Vec<(GapTopic, String)> = GapTopic::ALL
        .iter()
        .map(|gap| (*gap, prompts::gap_prompt(*gap, content, analysis)))
        .collect();

    info!("Iniciando búsquedas complementarias en paralelo...");
    let results = llm
        .ask_batch(
            queries,
            QueryOptions::with_system(prompts::GAP_SYSTEM_PROMPT),
            cancel,
        )
        .await;

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    info!(failures = results.failures(), "Búsquedas complementarias completadas");
    Ok(results.into_texts().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Topic;
    use crate::testing::{user_prompt, StubChat};
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_exactly_the_four_gap_keys() {
        let backend = Arc::new(StubChat::new(|req| {
            let prompt = user_prompt(req);
            let topic = prompt.rsplit("sobre ").next().unwrap_or_default();
            Ok(vec![format!("faltante: {topic}")])
        }));
        let llm = LlmClient::new(backend.clone());
        let analysis: TopicAnalysis = Topic::ALL
            .iter()
            .map(|t| (*t, format!("extraído {}", t.key())))
            .collect::<HashMap<_, _>>()
            .into();

        let gaps = find_gaps(&llm, "ORIGINAL", &analysis, &CancellationToken::new())
            .await
            .unwrap();

        let keys: HashSet<GapTopic> = gaps.keys().copied().collect();
        assert_eq!(keys, GapTopic::ALL.into_iter().collect::<HashSet<_>>());
        assert!(gaps
            .get(GapTopic::CoberturasYLimites)
            .starts_with("faltante: coberturas y límites"));

        assert_eq!(backend.calls(), 4);
        for request in backend.requests() {
            assert_eq!(request.messages[0].content, prompts::GAP_SYSTEM_PROMPT);
            assert!(user_prompt(&request).contains("<Original> ORIGINAL </Original>"));
        }
    }

    #[tokio::test]
    async fn partial_analysis_still_produces_all_prompts() {
        let llm = LlmClient::new(Arc::new(StubChat::echo()));
        let gaps = find_gaps(&llm, "texto", &TopicAnalysis::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(gaps.len(), 4);
    }
}
