use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::reply::Reply;
use warp::Filter;

use crate::errors::ErrorBody;
use crate::events::Notifier;
use crate::handlers;
use crate::registry::SessionRegistry;
use crate::scheduler::Scheduler;
use crate::settings::{Settings, SettingsError};
use crate::signer::SignerClient;

/// Request-level budget; if it fires the client sees a failure while any
/// already-committed mutation stands.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl From<SettingsError> for ServerError {
    fn from(err: SettingsError) -> Self {
        ServerError::ConfigError(err.to_string())
    }
}

/// Process-wide components, initialised at startup and injected into the
/// routes. No global singletons.
#[derive(Debug, Clone)]
pub struct AppContext {
    settings: Settings,
    scheduler: Arc<Scheduler>,
    notifier: Arc<Notifier>,
    signer: Arc<SignerClient>,
    registry: Arc<SessionRegistry>,
}

impl AppContext {
    pub fn new(settings: Settings) -> Result<Self, ServerError> {
        settings.validate()?;
        let scheduler = Scheduler::new();
        let notifier = Arc::new(Notifier::new());
        let signer = Arc::new(SignerClient::new(&settings));
        let registry = SessionRegistry::new(
            settings.clone(),
            Arc::clone(&scheduler),
            Arc::clone(&notifier),
            Arc::clone(&signer),
        );
        Ok(Self {
            settings,
            scheduler,
            notifier,
            signer,
            registry,
        })
    }

    pub fn new_for_tests() -> Self {
        Self::new(Settings::for_tests()).expect("test context")
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn notifier(&self) -> Arc<Notifier> {
        Arc::clone(&self.notifier)
    }

    pub fn signer(&self) -> Arc<SignerClient> {
        Arc::clone(&self.signer)
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(settings: Settings) -> Result<Self, ServerError> {
        Ok(Self {
            context: AppContext::new(settings)?,
        })
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let bind_addr = Self::bind_addr(context.settings())?;

        context.registry().spawn_gc();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = Self::routes(&context);
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(address = %addr, "game session server listening");

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(settings: &Settings) -> Result<SocketAddr, ServerError> {
        let raw = &settings.listen_addr;
        if let Ok(addr) = raw.parse::<SocketAddr>() {
            return Ok(addr);
        }
        let mut addrs = raw.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve LISTEN_ADDR `{raw}`: {err}"))
        })?;
        addrs
            .next()
            .ok_or_else(|| ServerError::ConfigError(format!("failed to resolve LISTEN_ADDR `{raw}`")))
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }
        ServerError::ConfigError(err.to_string())
    }

    fn routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let health = warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .map(|| handlers::health().into_response());

        let events = warp::path("events")
            .and(warp::get())
            .and(warp::path::end())
            .and(Self::query_map())
            .and(Self::with_notifier(context.notifier()))
            .and_then(|query: HashMap<String, String>, notifier| async move {
                let since = query
                    .get("since")
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(0);
                let query = handlers::EventsQuery { since };
                Ok::<_, Infallible>(
                    with_deadline(handlers::poll_events(notifier, query)).await,
                )
            });

        let start_session = warp::path("start_session")
            .and(warp::post())
            .and(warp::path::end())
            .and(Self::json_or_null())
            .and(Self::with_registry(context.registry()))
            .and_then(|body, registry| async move {
                Ok::<_, Infallible>(
                    with_deadline(handlers::start_session(registry, body)).await,
                )
            });

        let tournament_lookup = warp::path("get_tournament_session")
            .and(warp::get())
            .and(warp::path::end())
            .and(Self::query_map())
            .and(Self::with_registry(context.registry()))
            .and_then(|query, registry| async move {
                Ok::<_, Infallible>(
                    with_deadline(handlers::get_tournament_session(registry, query)).await,
                )
            });

        let session_info = warp::path("get_session_info")
            .and(warp::get())
            .and(warp::path::end())
            .and(Self::query_map())
            .and(Self::with_registry(context.registry()))
            .and_then(|query, registry| async move {
                Ok::<_, Infallible>(
                    with_deadline(handlers::get_session_info(registry, query)).await,
                )
            });

        // Flat per-kind endpoints (`/chess_move`, `/join_arena_session`,
        // `/arena_game_state`, ...) dispatch on the path segment.
        let dynamic_get = warp::get()
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(Self::query_map())
            .and(Self::with_registry(context.registry()))
            .and_then(|segment, query, registry| async move {
                Ok::<_, Infallible>(
                    with_deadline(handlers::dispatch_get(segment, query, registry)).await,
                )
            });

        let dynamic_post = warp::post()
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(Self::query_map())
            .and(Self::json_or_null())
            .and(Self::with_registry(context.registry()))
            .and_then(|segment, query, body, registry| async move {
                Ok::<_, Infallible>(
                    with_deadline(handlers::dispatch_post(segment, query, body, registry)).await,
                )
            });

        health
            .or(events)
            .unify()
            .or(start_session)
            .unify()
            .or(tournament_lookup)
            .unify()
            .or(session_info)
            .unify()
            .or(dynamic_get)
            .unify()
            .or(dynamic_post)
            .unify()
            .boxed()
    }

    fn with_registry(
        registry: Arc<SessionRegistry>,
    ) -> impl Filter<Extract = (Arc<SessionRegistry>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&registry))
    }

    fn with_notifier(
        notifier: Arc<Notifier>,
    ) -> impl Filter<Extract = (Arc<Notifier>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&notifier))
    }

    /// Accepts requests with or without a query string.
    fn query_map(
    ) -> impl Filter<Extract = (HashMap<String, String>,), Error = Infallible> + Clone {
        warp::query::<HashMap<String, String>>().or_else(|_| async {
            Ok::<(HashMap<String, String>,), Infallible>((HashMap::new(),))
        })
    }

    /// Body as JSON; an empty or unparseable body becomes `null` and the
    /// handlers answer with a 400 naming the missing field.
    fn json_or_null(
    ) -> impl Filter<Extract = (serde_json::Value,), Error = warp::Rejection> + Clone {
        warp::body::bytes().map(|bytes: warp::hyper::body::Bytes| {
            if bytes.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
            }
        })
    }
}

async fn with_deadline(
    future: impl std::future::Future<Output = warp::reply::Response>,
) -> warp::reply::Response {
    match tokio::time::timeout(REQUEST_TIMEOUT, future).await {
        Ok(response) => response,
        Err(_) => ErrorBody::new("request timed out")
            .into_response(warp::http::StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
