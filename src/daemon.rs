//! Daemon - the conversation driver
//!
//! Wires configuration into the model client, skill registry and router,
//! then runs the read-route-render loop while reacting to background events
//! raised by skills.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;

use crate::config::{Config, EmbedderKind};
use crate::db;
use crate::events::{BackgroundEvent, EventBus, EventKind};
use crate::memory::ConversationMemory;
use crate::model::{
    ConnectivityProbe, HttpProbe, LocalBackend, ModelBackend, ModelClient, RemoteBackend, StaticProbe,
};
use crate::pattern::PatternMatcher;
use crate::persona::Persona;
use crate::profile::ProfileStore;
use crate::response::EXIT_INTENT;
use crate::router::{RouteKind, Router};
use crate::semantic::{
    Embedder, HashingEmbedder, INTENT_COLLECTION, OpenAiEmbedder, SemanticMatcher, SqliteVectorIndex, VectorIndex,
};
use crate::skills::builtin::{self, KNOWLEDGE_COLLECTION};
use crate::skills::{SkillContext, SkillRegistry, SystemLauncher};
use crate::{Error, Result};

/// Applies a validated log level to the running subscriber
pub type LogControl = Box<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Outcome of one routed utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub intent: String,
    pub route: RouteKind,
}

impl Reply {
    /// Whether the conversation should end
    #[must_use]
    pub fn is_exit(&self) -> bool {
        self.intent == EXIT_INTENT
    }
}

/// The voxshell daemon
pub struct Daemon {
    router: Router,
    events: EventBus,
    memory: ConversationMemory,
    log_control: Option<LogControl>,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("router", &self.router)
            .field("turns", &self.memory.len())
            .finish_non_exhaustive()
    }
}

impl Daemon {
    /// Build every component from configuration and load the skills
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or a backend cannot be
    /// constructed
    pub async fn new(config: Config) -> Result<Self> {
        let profile = Arc::new(ProfileStore::load(config.skills.profile_path()));
        let persona =
            Persona::new(&config.persona.name, &config.persona.system_prompt).with_profile(Arc::clone(&profile));

        let remote = match &config.model.api_key {
            Some(key) => Some(Arc::new(RemoteBackend::new(
                key.clone(),
                &config.model.remote_url,
                &config.model.remote_model,
                config.model.remote_timeout,
            )?) as Arc<dyn ModelBackend>),
            None => {
                tracing::info!("no remote credential, using local model only");
                None
            }
        };
        let local = Arc::new(LocalBackend::new(
            &config.model.local_url,
            &config.model.local_model,
            config.model.local_timeout,
        )?);
        let probe: Arc<dyn ConnectivityProbe> = match &config.model.probe_url {
            Some(url) => Arc::new(HttpProbe::new(url, config.model.probe_ttl)),
            None => Arc::new(StaticProbe(true)),
        };
        let model = Arc::new(
            ModelClient::new(remote, local, probe, Arc::new(persona)).with_max_tokens(config.model.max_tokens),
        );

        let (semantic, knowledge) = if config.semantic.enabled {
            let (semantic, knowledge) = open_indexes(&config)?;
            (Some(semantic), Some(knowledge))
        } else {
            tracing::info!("semantic matching disabled");
            (None, None)
        };

        let events = EventBus::new();
        let ctx = SkillContext {
            config: config.skills.clone(),
            model: Arc::clone(&model),
            events: events.clone(),
            profile,
            knowledge,
            launcher: Arc::new(SystemLauncher),
        };

        let registry = Arc::new(SkillRegistry::new(builtin::catalog(&ctx), semantic));
        registry.load().await;

        let router = Router::new(config.routing, PatternMatcher::default(), registry, model);
        Ok(Self::from_parts(router, events))
    }

    /// Assemble a daemon from prebuilt parts
    #[must_use]
    pub fn from_parts(router: Router, events: EventBus) -> Self {
        Self {
            router,
            events,
            memory: ConversationMemory::default(),
            log_control: None,
        }
    }

    /// Hook used to apply `set_log_level` requests
    #[must_use]
    pub fn with_log_control(mut self, control: LogControl) -> Self {
        self.log_control = Some(control);
        self
    }

    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub const fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Route one utterance, passing its text to `on_chunk` as it arrives
    ///
    /// A complete response arrives as a single chunk. The finished turn is
    /// recorded in conversation memory.
    pub async fn respond<F>(&mut self, text: &str, mut on_chunk: F) -> Reply
    where
        F: FnMut(&str),
    {
        let mut routed = self.router.route_traced(text).await;
        let reply = if routed.response.streaming {
            routed.response.drain_with(&mut on_chunk).await.to_string()
        } else {
            on_chunk(&routed.response.text);
            routed.response.text.clone()
        };
        self.memory.save_context(text, &reply);

        Reply {
            text: reply,
            intent: routed.response.intent,
            route: routed.kind,
        }
    }

    /// React to a background event
    ///
    /// Workflow steps are routed in order, printing each reply.
    pub async fn handle_event(&mut self, event: BackgroundEvent) {
        tracing::debug!(id = %event.id, kind = ?event.kind, "handling background event");
        match event.kind {
            EventKind::ReminderDue { message, due_at } => {
                println!("\nReminder: {message} (due {})", due_at.with_timezone(&chrono::Local).format("%H:%M"));
            }
            EventKind::ReloadRequested => {
                let intents = self.router.registry().reload().await;
                println!("Reloaded {intents} intents.");
            }
            EventKind::LogLevelRequested { level } => match &self.log_control {
                Some(control) => {
                    if let Err(e) = control(&level) {
                        tracing::error!(level = %level, error = %e, "failed to change log level");
                    }
                }
                None => tracing::warn!(level = %level, "no log control installed"),
            },
            EventKind::WorkflowRequested { name, steps } => {
                tracing::info!(workflow = %name, steps = steps.len(), "running workflow");
                for step in steps {
                    println!("> {step}");
                    let reply = self.respond(&step, print_chunk).await;
                    end_reply(&reply);
                }
            }
        }
    }

    /// Read utterances line by line until input ends or the user exits
    ///
    /// # Errors
    ///
    /// Returns error if reading input fails
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut background = self.events.subscribe();

        loop {
            prompt();
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let reply = self.respond(text, print_chunk).await;
                    end_reply(&reply);
                    if reply.is_exit() {
                        break;
                    }
                }
                event = background.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "background events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(Error::NotFound("background event bus closed".to_string()));
                    }
                },
            }
        }

        tracing::info!(turns = self.memory.len(), "conversation ended");
        Ok(())
    }
}

fn open_indexes(config: &Config) -> Result<(SemanticMatcher, Arc<dyn VectorIndex>)> {
    let pool = db::init(&config.semantic.db_path)?;
    let embedder: Arc<dyn Embedder> = match config.semantic.embedder {
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::default()),
        EmbedderKind::OpenAi => {
            let key = config
                .model
                .api_key
                .clone()
                .ok_or_else(|| Error::Config("openai embedder requires OPENAI_API_KEY".to_string()))?;
            Arc::new(OpenAiEmbedder::new(
                key,
                &config.model.remote_url,
                &config.semantic.embedding_model,
            )?)
        }
    };
    tracing::info!(
        path = %config.semantic.db_path.display(),
        embedder = embedder.model_id(),
        "semantic index opened"
    );

    let intents = SqliteVectorIndex::new(pool.clone(), INTENT_COLLECTION, Arc::clone(&embedder));
    let knowledge = SqliteVectorIndex::new(pool, KNOWLEDGE_COLLECTION, embedder);
    Ok((SemanticMatcher::new(Arc::new(intents)), Arc::new(knowledge)))
}

fn prompt() {
    print!("you> ");
    let _ = std::io::stdout().flush();
}

fn print_chunk(chunk: &str) {
    print!("{chunk}");
    let _ = std::io::stdout().flush();
}

fn end_reply(reply: &Reply) {
    println!();
    tracing::debug!(route = %reply.route, intent = %reply.intent, "reply rendered");
}
