//! # Application State
//!
//! Defines the shared application state (`AppState`) and the logic for
//! building it at startup. All shared services (database provider, chat
//! providers, index client, pipeline components) are constructed once here
//! and passed by reference to handlers; there is no hidden global state.

use crate::config::AppConfig;
use docchat::{
    conversations::ConversationStore,
    disabled::{DisabledSet, SqliteMembershipStore},
    ingest::{IngestionPipeline, IngestionSettings},
    providers::{
        db::sqlite::SqliteProvider,
        embedding::EmbeddingClient,
        llm::{gemini::GeminiProvider, openai::OpenAiProvider, ChatProvider},
        vector::{rest::RestVectorIndex, VectorIndex},
    },
    registry::DocumentRegistry,
    retrieval::{JudgeStrategy, RetrievalConfig, RetrievalCoordinator},
    rewrite::QueryRewriter,
    synthesis::AnswerSynthesizer,
};
use std::{path::PathBuf, sync::Arc, time::Duration};

/// The shared application state, accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub conversations: ConversationStore,
    pub registry: DocumentRegistry,
    pub disabled: DisabledSet,
    pub pipeline: Arc<IngestionPipeline>,
    pub rewriter: Arc<QueryRewriter>,
    pub coordinator: Arc<RetrievalCoordinator>,
    pub synthesizer: Arc<AnswerSynthesizer>,
}

/// Instantiates a chat provider from its named configuration entry.
fn build_chat_provider(
    name: &str,
    config: &AppConfig,
) -> anyhow::Result<Box<dyn ChatProvider>> {
    let provider_config = config
        .providers
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("Chat provider '{name}' is not configured"))?;

    let provider: Box<dyn ChatProvider> = match provider_config.provider.as_str() {
        "gemini" => {
            let api_key = provider_config.api_key.clone().ok_or_else(|| {
                anyhow::anyhow!("api_key is required for gemini provider '{name}'")
            })?;
            // If api_url is not provided, construct it from the model name.
            let api_url = provider_config.api_url.clone().unwrap_or_else(|| {
                format!(
                    "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                    provider_config.model_name
                )
            });
            Box::new(GeminiProvider::new(api_url, api_key)?)
        }
        "openai" => {
            let api_url = provider_config.api_url.clone().ok_or_else(|| {
                anyhow::anyhow!("api_url is required for openai provider '{name}'")
            })?;
            Box::new(OpenAiProvider::new(
                api_url,
                provider_config.api_key.clone(),
                Some(provider_config.model_name.clone()),
            )?)
        }
        other => {
            return Err(anyhow::anyhow!(
                "Unsupported chat provider type '{other}' for provider '{name}'"
            ));
        }
    };
    Ok(provider)
}

/// Builds the shared application state from the configuration.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let sqlite_provider = SqliteProvider::new(&config.db_url).await?;
    tracing::info!(db_path = %config.db_url, "Initialized local storage provider (SQLite).");
    sqlite_provider.initialize_schema().await?;

    let conversations = ConversationStore::new(sqlite_provider.clone());
    let registry = DocumentRegistry::new(sqlite_provider.clone());
    let disabled = DisabledSet::new(
        registry.clone(),
        Arc::new(SqliteMembershipStore::new(sqlite_provider.clone())),
    );

    let index: Arc<dyn VectorIndex> = Arc::new(RestVectorIndex::new(
        config.vector_index.api_url.clone(),
        config.vector_index.rerank_api_url.clone(),
    ));
    let embedding = EmbeddingClient::new(
        config.embedding.api_url.clone(),
        config.embedding.model_name.clone(),
        config.embedding.api_key.clone(),
    );

    let pipeline = IngestionPipeline::new(
        registry.clone(),
        Arc::clone(&index),
        embedding.clone(),
        IngestionSettings {
            collection: config.vector_index.collection.clone(),
            dense_dim: config.vector_index.dense_dim,
            upload_dir: PathBuf::from(&config.upload_dir),
            allowed_extensions: config.ingestion.allowed_extensions.clone(),
        },
    );

    let chat = build_chat_provider(&config.chat.provider, &config)?;

    let judge_strategy = match config.retrieval.judge_strategy.as_str() {
        "threshold" => JudgeStrategy::Threshold {
            min_score: config.retrieval.judge_threshold,
        },
        _ => JudgeStrategy::Llm,
    };
    let retrieval_config = RetrievalConfig {
        top_k: config.retrieval.top_k,
        gate_enabled: config.retrieval.gate_enabled,
        use_reranker: config.retrieval.use_reranker,
        judge_strategy,
        call_timeout: Duration::from_secs(config.retrieval.call_timeout_secs),
        stage_deadline: Duration::from_secs(config.retrieval.stage_deadline_secs),
    };

    let rewriter = QueryRewriter::new(
        chat.clone(),
        config.chat.temperature,
        config.retrieval.rewrite_max_attempts,
    );
    let coordinator = RetrievalCoordinator::new(
        Arc::clone(&index),
        chat.clone(),
        embedding,
        disabled.clone(),
        config.vector_index.collection.clone(),
        retrieval_config,
    );
    let synthesizer = AnswerSynthesizer::new(chat, config.chat.temperature);

    // Validate every configured provider eagerly so a typo fails at startup,
    // not on the first request that selects it.
    for name in config.providers.keys() {
        build_chat_provider(name, &config)?;
    }

    Ok(AppState {
        config: Arc::new(config),
        conversations,
        registry,
        disabled,
        pipeline: Arc::new(pipeline),
        rewriter: Arc::new(rewriter),
        coordinator: Arc::new(coordinator),
        synthesizer: Arc::new(synthesizer),
    })
}
