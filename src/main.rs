use std::sync::Arc;

use anyhow::{Context, Result};
use insurance_copilot::{
    api,
    app_state::AppState,
    config::AppConfig,
    extractor::TextExtractor,
    llm::LlmClient,
    ocr::MistralOcr,
    openrouter::OpenRouterBackend,
    pipeline::InsurancePipeline,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Clientes de modelos y de OCR
    let llm = LlmClient::from_config(Arc::new(OpenRouterBackend::new(&cfg.llm)), &cfg.llm);
    let extractor = TextExtractor::from_config(Arc::new(MistralOcr::new(&cfg.ocr)), &cfg.ocr);
    let pipeline = InsurancePipeline::new(llm, extractor)
        .with_comparison_model(cfg.llm.comparison_model.clone());
    info!(
        model = %cfg.llm.chat_model,
        comparison_model = %cfg.llm.comparison_model,
        ocr_model = %cfg.ocr.model,
        "Pipeline inicializado"
    );

    // 4. Estado compartido y router
    let server_addr = cfg.server_addr.clone();
    let app_state = AppState::new(cfg, pipeline);
    let app = api::create_router(app_state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    // 5. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .context("Error en el servidor HTTP")?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
