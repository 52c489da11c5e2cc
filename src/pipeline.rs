//! Orquestación completa: documento único y comparación.
//!
//! Documento único: extracción → análisis por secciones → búsqueda
//! complementaria → verificación y resumen. Comparación: las tres primeras
//! etapas por documento, en paralelo entre documentos, y una síntesis final.

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

use crate::analyzer::analyze_document;
use crate::compare;
use crate::error::{PipelineError, Result};
use crate::extractor::TextExtractor;
use crate::gaps::find_gaps;
use crate::llm::LlmClient;
use crate::models::{ComparisonReport, Document, DocumentBundle, SummaryReport};
use crate::summary::summarize;

pub struct InsurancePipeline {
    llm: LlmClient,
    extractor: TextExtractor,
    comparison_model: Option<String>,
}

impl InsurancePipeline {
    pub fn new(llm: LlmClient, extractor: TextExtractor) -> Self {
        Self {
            llm,
            extractor,
            comparison_model: None,
        }
    }

    /// Modelo usado solo para la síntesis comparativa.
    pub fn with_comparison_model(mut self, model: impl Into<String>) -> Self {
        self.comparison_model = Some(model.into());
        self
    }

    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }

    pub async fn summarize_document(
        &self,
        document: Document,
        cancel: &CancellationToken,
    ) -> Result<SummaryReport> {
        let bundle = self.build_bundle("doc1", document, cancel).await?;

        info!(file = %bundle.filename, "Verificando y generando el resumen final...");
        let report = summarize(&self.llm, &bundle.text, &bundle.analysis, &bundle.gaps, cancel).await?;
        info!(file = %bundle.filename, "Resumen final completado");
        Ok(report)
    }

    pub async fn compare_documents(
        &self,
        documents: Vec<Document>,
        cancel: &CancellationToken,
    ) -> Result<ComparisonReport> {
        compare::check_document_count(documents.len())?;
        info!(documents = documents.len(), "Iniciando comparación de documentos");

        let pipelines = documents.into_iter().enumerate().map(|(index, document)| {
            let id = format!("doc{}", index + 1);
            async move { self.build_bundle(&id, document, cancel).await }
        });
        let bundles = try_join_all(pipelines).await?;

        let comparison = compare::synthesize(
            &self.llm,
            self.comparison_model.as_deref(),
            &bundles,
            cancel,
        )
        .await?;
        info!("Comparación completada");

        Ok(ComparisonReport {
            comparison,
            document_infos: bundles,
        })
    }

    /// Extracción, análisis y búsqueda complementaria de un documento.
    pub async fn build_bundle(
        &self,
        id: &str,
        document: Document,
        cancel: &CancellationToken,
    ) -> Result<DocumentBundle> {
        let filename = document.filename.clone();
        let span = tracing::info_span!("document", id, file = %filename);

        async move {
            let text = self.extractor.extract(document, cancel).await?;
            let analysis = analyze_document(&self.llm, &text, cancel).await?;
            let gaps = find_gaps(&self.llm, &text, &analysis, cancel).await?;
            Ok::<_, PipelineError>(DocumentBundle {
                id: id.to_string(),
                filename,
                text,
                analysis,
                gaps,
            })
        }
        .instrument(span)
        .await
    }
}
