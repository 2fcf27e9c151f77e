//! Connection pool registry.
//!
//! Pools are keyed by `(user, host, port, database)` so write- and
//! read-routing to the same endpoint share one pool. The registry hands out
//! [`PgExecutor`] handles and closes every pool exactly once in `close_all`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use rustls::ClientConfig;
use tokio::sync::Mutex;
use tokio_postgres::Config as PgConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::error::{Result, SyncError};
use crate::executor::PgExecutor;

/// Connection timeout for new pool clients.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool size when a node does not set `poolMax`.
const DEFAULT_POOL_MAX: usize = 8;

/// Database used by the admin executor: existence probes and CREATE DATABASE
/// run without selecting a target database.
const ADMIN_DATABASE: &str = "postgres";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    user: String,
    host: String,
    port: u16,
    database: String,
}

/// Registry of shared connection pools.
#[derive(Default)]
pub struct PoolRegistry {
    pools: Mutex<HashMap<PoolKey, Pool>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor bound to the node's own database.
    pub async fn executor(&self, node: &NodeConfig) -> Result<PgExecutor> {
        self.executor_for_database(node, &node.name).await
    }

    /// Admin executor bound to the server's meta database.
    pub async fn admin_executor(&self, node: &NodeConfig) -> Result<PgExecutor> {
        self.executor_for_database(node, ADMIN_DATABASE).await
    }

    /// Executor for an arbitrary database on the node's endpoint.
    pub async fn executor_for_database(
        &self,
        node: &NodeConfig,
        database: &str,
    ) -> Result<PgExecutor> {
        let key = PoolKey {
            user: node.user.clone(),
            host: node.primary_host().to_string(),
            port: node.port,
            database: database.to_string(),
        };
        let context = format!("{}@{}:{}/{}", key.user, key.host, key.port, key.database);

        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&key) {
            return Ok(PgExecutor::new(pool.clone(), context));
        }

        let pool = build_pool(node, database)?;

        // Probe the connection up front so a bad endpoint fails here and not
        // in the middle of a statement run.
        let client = pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e, format!("connecting to {}", context)))?;
        client.simple_query("SELECT 1").await?;
        drop(client);

        info!("connected to {}", context);
        pools.insert(key, pool.clone());
        Ok(PgExecutor::new(pool, context))
    }

    /// Close every pool. Called once when the engine is done with a run.
    pub async fn close_all(&self) {
        let mut pools = self.pools.lock().await;
        for (key, pool) in pools.drain() {
            pool.close();
            tracing::debug!("closed pool for {}@{}:{}/{}", key.user, key.host, key.port, key.database);
        }
    }
}

fn build_pool(node: &NodeConfig, database: &str) -> Result<Pool> {
    let mut pg_config = PgConfig::new();
    pg_config.host(node.primary_host());
    pg_config.port(node.port);
    pg_config.dbname(database);
    pg_config.user(&node.user);
    pg_config.password(&node.pass);
    pg_config.keepalives(true);
    pg_config.keepalives_idle(Duration::from_secs(30));
    pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let max_size = node.pool_max.unwrap_or(DEFAULT_POOL_MAX);

    let pool = match node.ssl_mode.to_lowercase().as_str() {
        "disable" => {
            let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
            Pool::builder(mgr)
                .max_size(max_size)
                .build()
                .map_err(|e| SyncError::pool(e, format!("creating pool for {}", node.endpoint())))?
        }
        other => {
            let tls_config = build_tls_config(other)?;
            let tls_connector = MakeRustlsConnect::new(tls_config);
            let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
            Pool::builder(mgr)
                .max_size(max_size)
                .build()
                .map_err(|e| SyncError::pool(e, format!("creating pool for {}", node.endpoint())))?
        }
    };

    Ok(pool)
}

/// Build TLS configuration for the node's ssl_mode.
fn build_tls_config(ssl_mode: &str) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = match ssl_mode {
        "require" => {
            warn!("ssl_mode=require: TLS enabled but server certificate is not verified.");
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(RequireModeVerifier::new()))
                .with_no_client_auth()
        }
        "verify-ca" | "verify-full" => {
            info!("ssl_mode={}: certificate verification enabled", ssl_mode);
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        other => {
            return Err(SyncError::Config(format!(
                "Invalid ssl_mode '{}'. Valid options: disable, require, verify-ca, verify-full",
                other
            )));
        }
    };

    Ok(config)
}

/// Certificate verifier for the `require` rung of the ssl_mode ladder.
///
/// Mirrors libpq's sslmode=require: the link is encrypted and handshake
/// signatures are still checked against the crypto provider's algorithms,
/// but the certificate chain and server name are not validated. The
/// verify-ca / verify-full rungs use the webpki root store instead.
#[derive(Debug)]
struct RequireModeVerifier {
    provider: rustls::crypto::CryptoProvider,
}

impl RequireModeVerifier {
    fn new() -> Self {
        Self {
            provider: rustls::crypto::ring::default_provider(),
        }
    }
}

impl rustls::client::danger::ServerCertVerifier for RequireModeVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        // Chain and name validation intentionally skipped on this rung.
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_ssl_mode_rejected() {
        assert!(build_tls_config("sometimes").is_err());
        assert!(build_tls_config("require").is_ok());
        assert!(build_tls_config("verify-full").is_ok());
    }

    #[test]
    fn test_require_mode_verifier_advertises_provider_schemes() {
        use rustls::client::danger::ServerCertVerifier;
        let verifier = RequireModeVerifier::new();
        assert!(!verifier.supported_verify_schemes().is_empty());
    }
}
