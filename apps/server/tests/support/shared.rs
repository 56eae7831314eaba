use ris_server::config::{Config, StoreBackend};
use std::sync::OnceLock;

/// Base configuration for tests backed by the in-memory store.
///
/// Built from defaults rather than `Config::load` so that a developer's `.env`
/// or `RIS__*` variables cannot change test behavior.
pub fn memory_config() -> Config {
    init_tracing();

    let mut config = Config::default();
    config.database.backend = StoreBackend::Memory;
    config.database.run_migrations = false;
    config
}

/// PostgreSQL test database, if `RIS__DATABASE__TEST_DATABASE_URL` is configured.
pub fn test_database_url() -> Option<String> {
    init_tracing();

    Config::load()
        .ok()
        .and_then(|config| config.database.test_database_url)
        .filter(|url| !url.trim().is_empty())
}

fn init_tracing() {
    use tracing_subscriber::prelude::*;
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "ris_server=info,sqlx=warn".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
