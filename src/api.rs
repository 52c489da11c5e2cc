use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    compare::COMPARISON_DOCUMENTS,
    error::PipelineError,
    models::Document,
};

type ApiError = (StatusCode, Json<Value>);

/// Campos de fichero aceptados, en el orden en que se comparan.
const FILE_FIELDS: [&str; 4] = ["pdf", "pdf_2", "pdf_3", "pdf_4"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Single,
    Comparison,
}

impl UploadMode {
    fn parse(raw: &str) -> Result<Self, ApiError> {
        match raw.trim() {
            "" | "single" => Ok(Self::Single),
            "comparison" => Ok(Self::Comparison),
            other => Err(bad_request(format!("Modo desconocido: '{other}'"))),
        }
    }
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    // Margen para las cabeceras y campos de texto del multipart.
    let body_limit = app_state
        .config
        .max_upload_bytes
        .saturating_mul(FILE_FIELDS.len())
        .saturating_add(1024 * 1024);

    Router::new()
        .route("/api/upload", post(upload_handler))
        .route("/api/health", get(health_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn upload_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("upload", %request_id);

    async move {
        let (mode, files) = read_upload(multipart, state.config.max_upload_bytes).await?;
        let documents = select_documents(mode, files)?;
        info!(?mode, documents = documents.len(), "Documentos recibidos");

        // Si el cliente se desconecta, el futuro se descarta y el guard
        // cancela todas las llamadas en curso.
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();

        let response = match mode {
            UploadMode::Single => {
                let document = documents.into_iter().next().ok_or_else(|| {
                    bad_request("No se ha subido ningún documento".to_string())
                })?;
                let report = state
                    .pipeline
                    .summarize_document(document, &cancel)
                    .await
                    .map_err(pipeline_error)?;
                json!({ "finalSummary": report.final_summary })
            }
            UploadMode::Comparison => {
                let report = state
                    .pipeline
                    .compare_documents(documents, &cancel)
                    .await
                    .map_err(pipeline_error)?;
                json!({
                    "comparison": report.comparison,
                    "documentCount": report.document_infos.len(),
                    "filenames": report.filenames(),
                })
            }
        };

        guard.disarm();
        info!("Procesamiento completado");
        Ok::<_, ApiError>(Json(response))
    }
    .instrument(span)
    .await
}

#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model": state.pipeline.llm().default_model(),
    }))
}

// --- Subida de ficheros ---

/// Lee el formulario completo. Los campos de fichero vacíos (sin fichero
/// seleccionado) se ignoran.
async fn read_upload(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<(UploadMode, Vec<(String, Document)>), ApiError> {
    let mut mode = UploadMode::Single;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Formulario multipart inválido");
        bad_request(e.body_text())
    })? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "mode" {
            let raw = field.text().await.map_err(|e| bad_request(e.body_text()))?;
            mode = UploadMode::parse(&raw)?;
        } else if FILE_FIELDS.contains(&name.as_str()) {
            if let Some(document) = read_file(field, max_bytes).await? {
                info!(
                    field = %name,
                    file = %document.filename,
                    size = document.size(),
                    "Archivo recibido"
                );
                files.push((name, document));
            }
        }
    }

    Ok((mode, files))
}

async fn read_file(field: Field<'_>, max_bytes: usize) -> Result<Option<Document>, ApiError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);
    let data = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;

    if filename.is_empty() && data.is_empty() {
        return Ok(None);
    }
    if !is_pdf(content_type.as_deref(), &filename) {
        return Err(bad_request(format!(
            "'{filename}' no es un PDF. Solo se permiten archivos PDF."
        )));
    }
    if data.len() > max_bytes {
        return Err(bad_request(format!(
            "'{filename}' supera el tamaño máximo de {} MB",
            max_bytes / (1024 * 1024)
        )));
    }

    Ok(Some(Document::new(filename, data)))
}

/// Acepta el tipo declarado del campo o, si no lo trae, el deducido de la
/// extensión del fichero.
pub fn is_pdf(content_type: Option<&str>, filename: &str) -> bool {
    match content_type {
        Some(content_type) => content_type
            .split(';')
            .next()
            .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/pdf")),
        None => mime_guess::from_path(filename)
            .first()
            .is_some_and(|mime| mime == mime_guess::mime::APPLICATION_PDF),
    }
}

fn select_documents(
    mode: UploadMode,
    mut files: Vec<(String, Document)>,
) -> Result<Vec<Document>, ApiError> {
    files.sort_by_key(|(name, _)| FILE_FIELDS.iter().position(|f| *f == name.as_str()));

    let documents: Vec<Document> = match mode {
        UploadMode::Single => files
            .into_iter()
            .filter(|(name, _)| name == FILE_FIELDS[0])
            .map(|(_, document)| document)
            .take(1)
            .collect(),
        UploadMode::Comparison => files.into_iter().map(|(_, document)| document).collect(),
    };
    let documents: Vec<Document> = documents
        .into_iter()
        .enumerate()
        .map(|(index, mut document)| {
            if document.filename.trim().is_empty() {
                document.filename = default_filename(mode, index);
            }
            document
        })
        .collect();

    match mode {
        UploadMode::Single if documents.is_empty() => Err(bad_request(
            "No se ha subido ningún documento".to_string(),
        )),
        UploadMode::Comparison if !COMPARISON_DOCUMENTS.contains(&documents.len()) => {
            Err(bad_request(format!(
                "Se necesitan entre {} y {} documentos para comparar",
                COMPARISON_DOCUMENTS.start(),
                COMPARISON_DOCUMENTS.end()
            )))
        }
        _ => Ok(documents),
    }
}

/// Nombre para ficheros subidos sin nombre.
fn default_filename(mode: UploadMode, index: usize) -> String {
    match mode {
        UploadMode::Single => "Document".to_string(),
        UploadMode::Comparison => format!("Document {}", index + 1),
    }
}

// --- Errores ---

fn bad_request(details: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "Solicitud no válida",
            "category": "invalid_input",
            "details": details,
        })),
    )
}

pub fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PipelineError::Extraction(_) | PipelineError::Synthesis(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn pipeline_error(err: PipelineError) -> ApiError {
    let status = status_for(&err);
    error!(category = err.category(), error = %err, "Error procesando la solicitud");
    (
        status,
        Json(json!({
            "error": "Error al procesar el documento",
            "category": err.category(),
            "details": err.to_string(),
        })),
    )
}
