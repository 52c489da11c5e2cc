//! Comparación de varios documentos: validación de la entrada y síntesis
//! del informe comparativo a partir de los bundles de cada documento.

use std::ops::RangeInclusive;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{PipelineError, QueryError, Result};
use crate::llm::{LlmClient, QueryOptions};
use crate::models::DocumentBundle;
use crate::prompts;

pub const COMPARISON_DOCUMENTS: RangeInclusive<usize> = 2..=4;

pub fn check_document_count(count: usize) -> Result<()> {
    if COMPARISON_DOCUMENTS.contains(&count) {
        Ok(())
    } else {
        Err(PipelineError::InvalidInput(format!(
            "la comparación requiere entre {} y {} documentos, se recibieron {count}",
            COMPARISON_DOCUMENTS.start(),
            COMPARISON_DOCUMENTS.end()
        )))
    }
}

/// Genera el informe comparativo. El texto del modelo se devuelve tal cual,
/// sin recortar ningún preámbulo.
pub async fn synthesize(
    llm: &LlmClient,
    model: Option<&str>,
    bundles: &[DocumentBundle],
    cancel: &CancellationToken,
) -> Result<String> {
    let blocks: Vec<(String, String)> = bundles
        .iter()
        .map(|bundle| (bundle.filename.clone(), bundle.complete_info()))
        .collect();
    let report_date = prompts::format_report_date(chrono::Local::now().date_naive());
    let prompt = prompts::comparison_prompt(&blocks, &report_date);

    let mut options = QueryOptions::with_system(prompts::COMPARISON_SYSTEM_PROMPT);
    if let Some(model) = model {
        options = options.model(model);
    }

    info!(documents = bundles.len(), "Generando informe comparativo...");
    match llm.ask(&prompt, options, cancel).await {
        Ok(comparison) => Ok(comparison),
        Err(QueryError::Cancelled) => Err(PipelineError::Cancelled),
        Err(err) => {
            error!(error = %err, "Error generando la comparación");
            Err(PipelineError::Synthesis(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GapFindings, TopicAnalysis};
    use crate::testing::{user_prompt, StubChat};
    use std::sync::Arc;

    fn bundle(n: usize) -> DocumentBundle {
        DocumentBundle {
            id: format!("doc{n}"),
            filename: format!("poliza_{n}.pdf"),
            text: String::new(),
            analysis: TopicAnalysis::default(),
            gaps: GapFindings::default(),
        }
    }

    #[test]
    fn only_two_to_four_documents_are_accepted() {
        for count in [0, 1, 5] {
            assert!(matches!(
                check_document_count(count),
                Err(PipelineError::InvalidInput(_))
            ));
        }
        for count in [2, 3, 4] {
            assert!(check_document_count(count).is_ok());
        }
    }

    #[tokio::test]
    async fn synthesis_keeps_the_raw_model_output() {
        let backend = Arc::new(StubChat::new(|_| {
            Ok(vec!["Preámbulo\n".into(), "**INFORME COMPARATIVO**".into()])
        }));
        let llm = LlmClient::new(backend.clone());

        let comparison = synthesize(
            &llm,
            Some("modelo/comparador"),
            &[bundle(1), bundle(2)],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(comparison, "Preámbulo\n**INFORME COMPARATIVO**");
        let request = &backend.requests()[0];
        assert_eq!(request.model, "modelo/comparador");
        assert_eq!(request.messages[0].content, prompts::COMPARISON_SYSTEM_PROMPT);
        let prompt = user_prompt(request);
        assert!(prompt.contains("DOCUMENTO: poliza_1.pdf"));
        assert!(prompt.contains("DOCUMENTO: poliza_2.pdf"));
    }

    #[tokio::test]
    async fn synthesis_failure_is_terminal() {
        let llm = LlmClient::new(Arc::new(StubChat::new(|_| {
            Err(QueryError::Network("reset".into()))
        })));
        let err = synthesize(&llm, None, &[bundle(1), bundle(2)], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis(_)));
        assert!(err.to_string().starts_with("Error generating comparison:"));
    }
}
