//! Verificación y resumen final de un documento.
//!
//! Etapa A: verificación y dos resúmenes parciales en paralelo.
//! Etapa B: informe final firmado a partir de la verificación y el resumen
//! combinado.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{PipelineError, QueryError, Result};
use crate::llm::{LlmClient, QueryOptions};
use crate::models::{GapFindings, SummaryReport, TopicAnalysis};
use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SummaryQuery {
    Verification,
    Part1,
    Part2,
}

impl fmt::Display for SummaryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SummaryQuery::Verification => "verification",
            SummaryQuery::Part1 => "summaryPart1",
            SummaryQuery::Part2 => "summaryPart2",
        })
    }
}

pub async fn summarize(
    llm: &LlmClient,
    content: &str,
    analysis: &TopicAnalysis,
    gaps: &GapFindings,
    cancel: &CancellationToken,
) -> Result<SummaryReport> {
    let queries = vec![
        (
            SummaryQuery::Verification,
            prompts::verification_prompt(content, analysis, gaps),
        ),
        (SummaryQuery::Part1, prompts::summary_part1_prompt(analysis)),
        (
            SummaryQuery::Part2,
            prompts::summary_part2_prompt(analysis, gaps),
        ),
    ];

    info!("Generando verificación y resúmenes parciales en paralelo...");
    let results = llm
        .ask_batch(
            queries,
            QueryOptions::with_system(prompts::VERIFY_SYSTEM_PROMPT),
            cancel,
        )
        .await;
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let verification = results.text(&SummaryQuery::Verification);
    let combined_summary = format!(
        "{}\n\n{}",
        results.text(&SummaryQuery::Part1),
        results.text(&SummaryQuery::Part2)
    );

    info!("Generando informe final...");
    let report_date = prompts::format_report_date(chrono::Local::now().date_naive());
    let prompt = prompts::final_report_prompt(&verification, &combined_summary, &report_date);
    let final_summary = match llm
        .ask(
            &prompt,
            QueryOptions::with_system(prompts::REPORT_SYSTEM_PROMPT),
            cancel,
        )
        .await
    {
        Ok(text) => clean_final_summary(&text).to_string(),
        Err(QueryError::Cancelled) => return Err(PipelineError::Cancelled),
        Err(err) => {
            warn!(error = %err, "Error en la generación del informe final");
            format!("Error in final summary generation: {err}")
        }
    };

    Ok(SummaryReport {
        verification,
        final_summary,
    })
}

/// Descarta cualquier preámbulo anterior al título del informe. Sin título,
/// el texto se devuelve intacto.
pub fn clean_final_summary(text: &str) -> &str {
    match text.find(prompts::REPORT_TITLE_MARKER) {
        Some(start) => &text[start..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Topic;
    use crate::testing::{user_prompt, StubChat};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn analysis() -> TopicAnalysis {
        Topic::ALL
            .iter()
            .map(|t| (*t, format!("dato {}", t.key())))
            .collect::<HashMap<_, _>>()
            .into()
    }

    #[test]
    fn preamble_before_title_is_dropped() {
        let raw = "Claro, aquí tienes:\n\n**INFORME DE PÓLIZA - ACME**\ncontenido";
        let cleaned = clean_final_summary(raw);
        assert_eq!(cleaned, "**INFORME DE PÓLIZA - ACME**\ncontenido");
        assert_eq!(clean_final_summary(cleaned), cleaned);
    }

    #[test]
    fn text_without_title_is_left_alone() {
        assert_eq!(clean_final_summary("sin título"), "sin título");
        assert_eq!(clean_final_summary(""), "");
    }

    #[tokio::test]
    async fn final_report_uses_verification_and_both_parts() {
        let backend = Arc::new(StubChat::new(|req| {
            let prompt = user_prompt(req);
            let answer = if prompt.contains("RESUMEN COMBINADO") {
                "Preámbulo\n**INFORME DE PÓLIZA - ACME**\ncuerpo"
            } else if prompt.contains("<Original>") {
                "VERIFICADO"
            } else if prompt.contains("(PARTE 2)") {
                "PARTE2"
            } else {
                "PARTE1"
            };
            Ok(vec![answer.to_string()])
        }));
        let llm = LlmClient::new(backend.clone());

        let report = summarize(
            &llm,
            "ORIGINAL",
            &analysis(),
            &GapFindings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.verification, "VERIFICADO");
        assert_eq!(report.final_summary, "**INFORME DE PÓLIZA - ACME**\ncuerpo");
        assert_eq!(backend.calls(), 4);

        let requests = backend.requests();
        let last = requests.last().unwrap();
        assert_eq!(last.messages[0].content, prompts::REPORT_SYSTEM_PROMPT);
        let prompt = user_prompt(last);
        assert!(prompt.contains("VERIFICADO"));
        assert!(prompt.contains("PARTE1\n\nPARTE2"));
    }

    #[tokio::test]
    async fn final_report_failure_is_embedded_in_the_result() {
        let llm = LlmClient::new(Arc::new(StubChat::new(|req| {
            if user_prompt(req).contains("RESUMEN COMBINADO") {
                Err(QueryError::Api {
                    status: 500,
                    body: "boom".into(),
                })
            } else {
                Ok(vec!["ok".into()])
            }
        })));

        let report = summarize(
            &llm,
            "texto",
            &analysis(),
            &GapFindings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.verification, "ok");
        assert!(report
            .final_summary
            .starts_with("Error in final summary generation:"));
        assert!(report.final_summary.contains("boom"));
    }

    #[tokio::test]
    async fn cancellation_is_not_degraded() {
        let llm = LlmClient::new(Arc::new(StubChat::echo()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = summarize(
            &llm,
            "texto",
            &analysis(),
            &GapFindings::default(),
            &cancel,
        )
        .await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }
}
