use std::sync::Arc;

use anyhow::Result;

use crate::config::BackendConfig;
use crate::llm_client::LlmClient;
use crate::local_engine::PatternTable;
use crate::persona::Persona;
use crate::remote::{GenerationClient, Generator, VerificationClient, Verifier};
use crate::resolver::ReplyResolver;

/// Process-wide state built once at startup and shared read-only by every
/// request.
pub struct BackendRuntime {
    pub config: BackendConfig,
    pub resolver: ReplyResolver,
    pub key_present: bool,
}

pub struct BackendRuntimeBuilder {
    config: BackendConfig,
    patterns: Option<PatternTable>,
    generator: Option<Arc<dyn Generator>>,
    verifier: Option<Arc<dyn Verifier>>,
}

impl BackendRuntimeBuilder {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            patterns: None,
            generator: None,
            verifier: None,
        }
    }

    pub fn with_patterns(mut self, patterns: PatternTable) -> Self {
        self.patterns = Some(patterns);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn build(self) -> Result<BackendRuntime> {
        let config = self.config;
        let key_present = config.api_key().is_some();
        if !key_present {
            tracing::warn!(
                "No LLM API key configured (LLM_API_KEY / GOOGLE_API_KEY); only canned replies will succeed"
            );
        }

        let patterns = match self.patterns {
            Some(patterns) => patterns,
            None => load_patterns(&config),
        };
        tracing::info!("Loaded {} local response pattern(s)", patterns.len());

        // Verification needs a concrete persona for its audit template; an
        // unknown id still surfaces per request from the generation client.
        let persona = match Persona::from_id(&config.persona) {
            Ok(persona) => persona,
            Err(e) => {
                tracing::warn!("{}; verification falls back to '{}'", e, Persona::Caligula.id());
                Persona::Caligula
            }
        };

        let (generator, verifier) = match (self.generator, self.verifier) {
            (Some(generator), Some(verifier)) => (generator, verifier),
            (generator, verifier) => {
                let llm = LlmClient::from_config(&config)?;
                let generator: Arc<dyn Generator> = match generator {
                    Some(generator) => generator,
                    None => Arc::new(GenerationClient::new(
                        llm.clone(),
                        config.generation_model.clone(),
                    )),
                };
                let verifier: Arc<dyn Verifier> = match verifier {
                    Some(verifier) => verifier,
                    None => Arc::new(VerificationClient::new(
                        llm,
                        config.verification_model.clone(),
                        persona,
                    )),
                };
                (generator, verifier)
            }
        };

        tracing::info!(
            "LLM endpoint {} (generation: {}, verification: {})",
            config.llm_api_url,
            config.generation_model,
            config.verification_model
        );

        let resolver = ReplyResolver::new(
            Arc::new(patterns),
            generator,
            verifier,
            config.persona.clone(),
        );

        Ok(BackendRuntime {
            config,
            resolver,
            key_present,
        })
    }
}

impl BackendRuntime {
    pub fn bootstrap(config: BackendConfig) -> Result<Self> {
        BackendRuntimeBuilder::new(config).build()
    }
}

/// Configured table if one is set and readable, otherwise the built-in one.
/// A broken configured table leaves the matcher empty rather than
/// silently swapping in different replies.
fn load_patterns(config: &BackendConfig) -> PatternTable {
    let Some(path) = config.local_responses_path.as_deref() else {
        return PatternTable::builtin();
    };
    match PatternTable::load(path) {
        Ok(table) => table,
        Err(e) => {
            tracing::error!("{:#}; local replies disabled", e);
            PatternTable::empty()
        }
    }
}
