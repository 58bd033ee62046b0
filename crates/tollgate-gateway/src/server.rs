//! Gateway HTTP server.
//!
//! One tokio task per connection. Each request goes through the same flow:
//!
//! 1. internal endpoints under `/_tollgate/`
//! 2. body buffering up to `max_request_body_size`
//! 3. anti-forgery check for unsafe methods
//! 4. backend routes: auth pipeline, then the proxy
//! 5. local endpoints under `/api/`
//!
//! Whatever ends the request, queued cookies and `x-request-id` are written
//! onto the response and request metrics are recorded.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use tollgate_auth::{AntiForgery, Authenticator, CookieManager, Cookies, SupportedLanguages};
use tollgate_config::{ConfigError, GatewayConfig};
use tollgate_telemetry::metrics::record_request;

use crate::context::GatewayContext;
use crate::csrf::CsrfGuard;
use crate::datastore::{Datastore, MemoryDatastore};
use crate::error::{GatewayError, GatewayResult};
use crate::handlers::{self, AccountHandlers};
use crate::health::HealthChecker;
use crate::pipeline::AuthPipeline;
use crate::proxy::ProxyRouter;
use crate::types::{BoxError, GatewayRequest, GatewayResponse};

/// Prefix of the gateway's own endpoints.
pub const INTERNAL_PREFIX: &str = "/_tollgate/";

/// How long shutdown waits for open connections.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Local endpoints and the one method each accepts.
const LOCAL_ENDPOINTS: &[(&str, Method)] = &[
    ("/api/login", Method::POST),
    ("/api/register", Method::POST),
    ("/api/get-csrf-token", Method::GET),
    ("/api/check-credentials", Method::GET),
];

/// Everything a request needs, shared read-only across connections.
pub struct GatewayState {
    config: Arc<GatewayConfig>,
    pipeline: AuthPipeline,
    proxy: ProxyRouter,
    csrf: CsrfGuard,
    accounts: AccountHandlers,
    health: HealthChecker,
}

impl GatewayState {
    /// Build state from config with an in-memory datastore.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        Self::with_datastore(config, Arc::new(MemoryDatastore::new()))
    }

    /// Build state from config with the given datastore.
    pub fn with_datastore(
        config: GatewayConfig,
        datastore: Arc<dyn Datastore>,
    ) -> GatewayResult<Self> {
        config.validate()?;

        let authenticator: Arc<dyn Authenticator> =
            Arc::new(CookieManager::from_secret(config.auth.jwt_key.expose())?);
        let languages = Arc::new(SupportedLanguages::new(
            config.languages.supported.iter().map(String::as_str),
        ));
        let tokens = Arc::new(AntiForgery::new(
            config.csrf.key.expose(),
            config.csrf.token_ttl,
        )?);
        let csrf = CsrfGuard::new(tokens.clone(), config.csrf.enforce);

        let pipeline = AuthPipeline::new(authenticator.clone(), languages.clone());
        let proxy = ProxyRouter::new(&config, tokens)?;
        let accounts = AccountHandlers::new(authenticator, datastore, languages, csrf.clone())?;
        let health = HealthChecker::new(config.telemetry.service_name.clone(), config.routes.len());

        Ok(Self {
            config: Arc::new(config),
            pipeline,
            proxy,
            csrf,
            accounts,
            health,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The health checker.
    pub fn health(&self) -> &HealthChecker {
        &self.health
    }

    /// Handle one request end to end.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn handle<B>(&self, request: Request<B>, peer: Option<SocketAddr>) -> GatewayResponse
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        let mut ctx = GatewayContext::new(Cookies::from_headers(request.headers()));
        let span = info_span!(
            "request",
            request_id = %ctx.request_id(),
            method = %request.method(),
            path = %request.uri().path(),
            peer = ?peer,
        );

        async move {
            let response = match self.dispatch(&mut ctx, request).await {
                Ok(response) => response,
                Err(e) => {
                    if e.is_server_error() {
                        error!(error = %e, category = e.category(), "request failed");
                    } else {
                        debug!(error = %e, category = e.category(), "request rejected");
                    }
                    e.to_response(ctx.request_id())
                }
            };

            let response = ctx.finish(response);
            let elapsed = ctx.elapsed();
            record_request(ctx.route(), response.status().as_u16(), elapsed);
            info!(
                status = response.status().as_u16(),
                route = ctx.route(),
                duration_ms = elapsed.as_millis() as u64,
                "request completed"
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn dispatch<B>(
        &self,
        ctx: &mut GatewayContext,
        request: Request<B>,
    ) -> GatewayResult<GatewayResponse>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        if let Some(endpoint) = request.uri().path().strip_prefix(INTERNAL_PREFIX) {
            ctx.set_route("internal");
            return self.internal(endpoint, request.method());
        }

        let request = self.buffer(request).await?;
        self.csrf.check(request.method(), request.headers())?;

        if let Some(route) = self.proxy.resolve(request.uri().path()) {
            ctx.set_route(route.prefix());
            ctx.set_backend(route.backend());
            let proxy = &self.proxy;
            return self
                .pipeline
                .process(ctx, request, |_, request| proxy.forward(request, route))
                .await;
        }

        self.local(ctx, request).await
    }

    async fn local(
        &self,
        ctx: &mut GatewayContext,
        request: GatewayRequest,
    ) -> GatewayResult<GatewayResponse> {
        let path = request.uri().path();
        let Some((name, allowed)) = LOCAL_ENDPOINTS.iter().find(|(name, _)| *name == path) else {
            return Err(GatewayError::NotFound {
                path: path.to_string(),
            });
        };
        if request.method() != allowed {
            return Err(GatewayError::MethodNotAllowed {
                method: request.method().to_string(),
            });
        }
        ctx.set_route(*name);

        match *name {
            "/api/login" => self.accounts.login(ctx, &request).await,
            "/api/register" => self.accounts.register(&request).await,
            "/api/get-csrf-token" => Ok(self.accounts.csrf_token()),
            "/api/check-credentials" => {
                self.pipeline
                    .process(ctx, request, |_, _| async {
                        Ok(handlers::check_credentials())
                    })
                    .await
            }
            other => Err(GatewayError::internal(format!(
                "local endpoint {other} has no handler"
            ))),
        }
    }

    fn internal(&self, endpoint: &str, method: &Method) -> GatewayResult<GatewayResponse> {
        if method != Method::GET {
            return Err(GatewayError::MethodNotAllowed {
                method: method.to_string(),
            });
        }
        match endpoint {
            "health" => Ok(handlers::health(&self.health)),
            "version" => Ok(handlers::version(&self.health)),
            "metrics" => Ok(handlers::metrics()),
            _ => Err(GatewayError::NotFound {
                path: format!("{INTERNAL_PREFIX}{endpoint}"),
            }),
        }
    }

    async fn buffer<B>(&self, request: Request<B>) -> GatewayResult<GatewayRequest>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        let limit = self.config.server.max_request_body_size;
        let (parts, body) = request.into_parts();
        let bytes = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(GatewayError::PayloadTooLarge { limit });
            }
            Err(e) => {
                return Err(GatewayError::bad_request(format!(
                    "failed to read request body: {e}"
                )));
            }
        };
        Ok(Request::from_parts(parts, bytes))
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("pipeline", &self.pipeline)
            .field("proxy", &self.proxy)
            .field("csrf", &self.csrf)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

/// The gateway server.
#[derive(Debug, Clone)]
pub struct GatewayServer {
    state: Arc<GatewayState>,
}

impl GatewayServer {
    /// Create a server from config.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        Ok(Self::with_state(GatewayState::new(config)?))
    }

    /// Create a server around prepared state.
    pub fn with_state(state: GatewayState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Shared request state.
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM.
    pub async fn run(self) -> GatewayResult<()> {
        let address = self.state.config.listen_address();
        let addr: SocketAddr = address.parse().map_err(|e| {
            ConfigError::invalid_value("server.listen_addr", format!("'{address}': {e}"))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::server(format!("failed to bind {addr}: {e}")))?;

        self.serve(listener, wait_for_signal()).await
    }

    /// Serve connections from `listener` until `shutdown` completes.
    ///
    /// Open connections get [`SHUTDOWN_GRACE`] to finish in-flight requests.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()>,
    {
        let local = listener.local_addr()?;
        info!(
            address = %local,
            routes = self.state.proxy.routes().len(),
            "tollgate listening"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };
                    connections.spawn(serve_connection(
                        self.state.clone(),
                        stream,
                        peer,
                        stop_rx.clone(),
                    ));
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                () = &mut shutdown => {
                    info!("shutdown requested, draining connections");
                    break;
                }
            }
        }

        self.state.health.set_draining();
        drop(listener);
        let _ = stop_tx.send(true);

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(open = connections.len(), "shutdown grace period elapsed");
            connections.abort_all();
        }

        info!("tollgate stopped");
        Ok(())
    }
}

async fn serve_connection(
    state: Arc<GatewayState>,
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    mut stop: watch::Receiver<bool>,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |request: Request<Incoming>| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(state.handle(request, Some(peer)).await) }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = stop.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        debug!(peer = %peer, error = %e, "connection closed with error");
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received Ctrl+C");
    }
}
