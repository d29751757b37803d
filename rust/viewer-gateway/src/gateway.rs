use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use std::{net::TcpListener, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use url::Url;
use viewer_core::{
    cache::{MemoryCache, ResponseCache},
    job::{JobClient, JobRunnerRegistry},
};
use viewer_worker::{
    inspector::HubInspector,
    runners::{default_processing_graph, default_registry},
    start_worker_queue, JobExecutor,
};

use crate::{
    authority::AccessGate,
    endpoint::{EndpointConfig, EndpointStepMapping},
    handlers::{endpoint_route, healthcheck_route},
    ApiConfig, MaxAge,
};

/// The shared, read-only state of every request handler
pub struct ApiState<C, J>
where
    C: ResponseCache,
    J: JobClient,
{
    pub mapping: Arc<EndpointStepMapping>,
    pub gate: AccessGate,
    pub registry: JobRunnerRegistry,
    pub cache: C,
    pub job_client: J,
    pub max_age: MaxAge,
}

impl<C, J> Clone for ApiState<C, J>
where
    C: ResponseCache,
    J: JobClient,
{
    fn clone(&self) -> Self {
        ApiState {
            mapping: self.mapping.clone(),
            gate: self.gate.clone(),
            registry: self.registry.clone(),
            cache: self.cache.clone(),
            job_client: self.job_client.clone(),
            max_age: self.max_age,
        }
    }
}

/// Route `/healthcheck` and every mapped endpoint to their handlers
pub fn build_router<C, J>(state: ApiState<C, J>, cors_origin: Option<&Url>) -> Result<Router>
where
    C: ResponseCache + 'static,
    J: JobClient + 'static,
{
    let mut cors = CorsLayer::new();

    if let Some(cors_origin) = cors_origin {
        cors = cors
            .allow_origin(
                cors_origin
                    .origin()
                    .unicode_serialization()
                    .as_str()
                    .parse::<HeaderValue>()?,
            )
            .allow_headers(Any)
            .allow_methods(vec![Method::GET, Method::HEAD, Method::OPTIONS])
            .expose_headers(Any);
    }

    let mut app = Router::new().route("/healthcheck", get(healthcheck_route));
    for endpoint in state.mapping.endpoints() {
        app = app.route(endpoint, get(endpoint_route::<C, J>));
    }

    Ok(app
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serve the API on `listener` until the server stops
pub async fn start_gateway<C, J>(
    listener: TcpListener,
    state: ApiState<C, J>,
    cors_origin: Option<&Url>,
) -> Result<()>
where
    C: ResponseCache + 'static,
    J: JobClient + 'static,
{
    let app = build_router(state, cors_origin)?;

    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;

    info!("Dataset viewer API listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Start the workers and the API described by `config`, with an in-memory
/// response cache shared by both
pub async fn serve(config: ApiConfig) -> Result<()> {
    let inspector = HubInspector::new(&config.hf_endpoint, config.hub_timeout)?;
    let registry = default_registry(inspector, config.hf_token.clone())?;
    let graph = default_processing_graph()?;
    let mapping = EndpointStepMapping::new(&EndpointConfig::default(), &graph)?;
    let cache = MemoryCache::default();

    let executor = JobExecutor::new(registry.clone(), graph, cache.clone());
    let job_client = start_worker_queue(executor, &config.workers)?;

    let gate = match &config.authority {
        Some(authority) => AccessGate::new(authority, config.unreachable_policy)?,
        None => {
            warn!("Access to datasets is not checked");
            AccessGate::disabled()
        }
    };

    let state = ApiState {
        mapping: Arc::new(mapping),
        gate,
        registry,
        cache,
        job_client,
        max_age: config.max_age,
    };

    let listener = TcpListener::bind((config.interface, config.port))?;
    start_gateway(listener, state, config.cors_origin.as_ref()).await
}
