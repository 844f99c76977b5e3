mod auth;
mod clients;
mod errors;
mod routes;

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use clients::{ClientRecord, ClientStore, SharedClientStore};
use routes::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreBackend {
    Memory,
    Couchdb,
}

#[derive(Parser, Debug)]
#[command(name = "keyturn")]
#[command(about = "client credential authentication and scoped access token issuer")]
struct Args {
    /// Host to bind to
    #[arg(long, env = "KEYTURN_HOST", default_value = "localhost")]
    host: String,

    /// Port to bind to
    #[arg(short, long, env = "KEYTURN_PORT", default_value = "3000")]
    port: u16,

    /// Issuer (`iss`) written into every token
    #[arg(long, env = "JWT_ISSUER")]
    jwt_issuer: String,

    /// HMAC signing secret for tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Public base URL for metadata (e.g., https://auth.example.com)
    /// If not set, defaults to http://HOST:PORT
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<String>,

    /// Where client records live
    #[arg(long, value_enum, env = "CLIENT_STORE", default_value = "memory")]
    client_store: StoreBackend,

    /// CouchDB URL
    #[arg(long, env = "COUCHDB_URL", default_value = "http://localhost:5984")]
    couchdb_url: String,

    /// CouchDB database name
    #[arg(long, env = "COUCHDB_DATABASE", default_value = "keyturn")]
    couchdb_database: String,

    /// CouchDB username
    #[arg(long, env = "COUCHDB_USER")]
    couchdb_user: Option<String>,

    /// CouchDB password
    #[arg(long, env = "COUCHDB_PASSWORD", hide_env_values = true)]
    couchdb_password: Option<String>,

    /// Id of a client to create (or overwrite) at startup
    #[arg(long, env = "BOOTSTRAP_CLIENT_ID")]
    bootstrap_client_id: Option<Uuid>,

    /// Secret for the bootstrap client
    #[arg(long, env = "BOOTSTRAP_CLIENT_SECRET", hide_env_values = true)]
    bootstrap_client_secret: Option<String>,

    /// Comma separated scopes for the bootstrap client (default: every client:* scope)
    #[arg(long, env = "BOOTSTRAP_CLIENT_SCOPES", value_delimiter = ',')]
    bootstrap_client_scopes: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyturn=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if args.jwt_secret.is_empty() {
        return Err(anyhow!("JWT_SECRET must not be empty"));
    }

    let base_url = base_url(&args)?;
    let store = build_store(&args).await?;
    bootstrap_client(&args, &store).await?;

    let auth_service = Arc::new(auth::AuthService::new(
        auth::AuthConfig {
            issuer: args.jwt_issuer.clone(),
            jwt_secret: args.jwt_secret.clone(),
        },
        store.clone(),
    ));

    let state = AppState {
        auth_service,
        store,
        base_url: base_url.clone(),
    };

    run_server(&args.host, args.port, state).await
}

fn base_url(args: &Args) -> Result<String> {
    match &args.public_url {
        Some(url) => {
            Url::parse(url).map_err(|e| anyhow!("PUBLIC_URL is not a valid URL: {}", e))?;
            Ok(url.trim_end_matches('/').to_string())
        }
        None => Ok(format!("http://{}:{}", args.host, args.port)),
    }
}

async fn build_store(args: &Args) -> Result<SharedClientStore> {
    match args.client_store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory client store, clients will not survive a restart");
            Ok(Arc::new(clients::MemoryClientStore::new()))
        }
        StoreBackend::Couchdb => {
            Url::parse(&args.couchdb_url)
                .map_err(|e| anyhow!("COUCHDB_URL is not a valid URL: {}", e))?;
            let user = args
                .couchdb_user
                .as_ref()
                .ok_or_else(|| anyhow!("COUCHDB_USER required for the couchdb client store"))?;
            let password = args.couchdb_password.as_ref().ok_or_else(|| {
                anyhow!("COUCHDB_PASSWORD required for the couchdb client store")
            })?;

            tracing::info!(
                "Connecting to CouchDB at {}/{}",
                args.couchdb_url,
                args.couchdb_database
            );
            let store = clients::CouchDbClientStore::new(
                &args.couchdb_url,
                &args.couchdb_database,
                user,
                password,
            )?;
            store.test_connection().await?;
            tracing::info!("Successfully connected to CouchDB");
            Ok(Arc::new(store))
        }
    }
}

async fn bootstrap_client(args: &Args, store: &SharedClientStore) -> Result<()> {
    let (id, secret) = match (&args.bootstrap_client_id, &args.bootstrap_client_secret) {
        (Some(id), Some(secret)) => (*id, secret.clone()),
        (None, None) => return Ok(()),
        _ => {
            return Err(anyhow!(
                "BOOTSTRAP_CLIENT_ID and BOOTSTRAP_CLIENT_SECRET must be set together"
            ));
        }
    };

    let scopes = args.bootstrap_client_scopes.clone().unwrap_or_else(|| {
        clients::scopes::ALL
            .iter()
            .map(|s| s.to_string())
            .collect()
    });
    let scopes: Vec<String> = scopes.into_iter().map(|s| s.trim().to_string()).collect();

    let record = ClientRecord::with_credentials(id, "bootstrap".to_string(), secret, scopes)?;
    let scope_count = record.scopes.len();
    store.upsert(record).await?;

    tracing::info!(
        "Bootstrap client {} ready with {} scope(s)",
        id,
        scope_count
    );
    Ok(())
}

async fn run_server(host: &str, port: u16, state: AppState) -> Result<()> {
    // we pass this to TcpListener::bind() which accepts ToSocketAddrs,
    // so hostnames like "localhost" get resolved properly (unlike SocketAddr::parse)
    let bind_addr = format!("{}:{}", host, port);

    // Rate limiting: 10 requests per second per IP, burst of 30
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .per_second(10)
            .burst_size(30)
            .finish()
            .ok_or_else(|| anyhow!("Failed to build rate limiter config"))?,
    );
    let governor_limiter = governor_conf.limiter().clone();
    let rate_limit_layer = GovernorLayer::new(governor_conf);

    // Stricter rate limiting for the token endpoint: 5 requests per second, burst of 10
    let token_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .per_second(5)
            .burst_size(10)
            .finish()
            .ok_or_else(|| anyhow!("Failed to build token rate limiter config"))?,
    );
    let token_governor_limiter = token_governor_conf.limiter().clone();
    let token_rate_limit_layer = GovernorLayer::new(token_governor_conf);

    // Periodically drop rate limiter state for idle IPs
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
            token_governor_limiter.retain_recent();
        }
    });

    let app = routes::token_routes(&state)
        .layer(token_rate_limit_layer)
        .merge(
            routes::metadata_routes(&state)
                .merge(routes::client_routes(&state))
                .layer(rate_limit_layer),
        )
        .layer(TraceLayer::new_for_http());

    tracing::info!("Token endpoint: {}/token", state.base_url);
    tracing::info!(
        "Authorization server metadata: {}/.well-known/oauth-authorization-server",
        state.base_url
    );
    tracing::info!("Client API: {}/api/client", state.base_url);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server ready at {}", state.base_url);

    // connect info is the rate limiter's fallback key when there are no proxy headers
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec![
            "keyturn",
            "--jwt-issuer",
            "issuer",
            "--jwt-secret",
            "secret",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_base_url_defaults_to_bind_address() {
        let a = args(&["--host", "0.0.0.0", "--port", "8080"]);
        assert_eq!(base_url(&a).unwrap(), "http://0.0.0.0:8080");
    }

    #[test]
    fn test_public_url_trimmed_and_validated() {
        let a = args(&["--public-url", "https://auth.example.com/"]);
        assert_eq!(base_url(&a).unwrap(), "https://auth.example.com");

        let bad = args(&["--public-url", "not a url"]);
        assert!(base_url(&bad).is_err());
    }

    #[test]
    fn test_bootstrap_scopes_split_on_commas() {
        let a = args(&["--bootstrap-client-scopes", "client:fetch,client:delete"]);
        assert_eq!(
            a.bootstrap_client_scopes,
            Some(vec!["client:fetch".to_string(), "client:delete".to_string()])
        );
    }

    #[tokio::test]
    async fn test_bootstrap_client_upserted() {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let a = args(&[
            "--bootstrap-client-id",
            &id_str,
            "--bootstrap-client-secret",
            "boot-secret",
        ]);
        let store: SharedClientStore = Arc::new(clients::MemoryClientStore::new());
        bootstrap_client(&a, &store).await.unwrap();
        // twice, to prove restarts don't fail on an existing record
        bootstrap_client(&a, &store).await.unwrap();

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.secret, "boot-secret");
        assert_eq!(record.scopes.len(), clients::scopes::ALL.len());
    }

    #[tokio::test]
    async fn test_bootstrap_requires_both_halves() {
        let id_str = Uuid::new_v4().to_string();
        let a = args(&["--bootstrap-client-id", &id_str]);
        let store: SharedClientStore = Arc::new(clients::MemoryClientStore::new());
        assert!(bootstrap_client(&a, &store).await.is_err());
    }
}
