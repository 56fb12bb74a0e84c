pub mod api;
pub mod config;
pub mod db;
pub mod rules;

pub use config::Config;
pub use db::DbPool;

/// Shared application state handed to every request handler.
pub struct AppState {
    pub config: Config,
    pub db: DbPool,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        Self { config, db }
    }
}

#[cfg(test)]
pub(crate) async fn test_state() -> std::sync::Arc<AppState> {
    let pool = db::test_pool().await;
    std::sync::Arc::new(AppState::new(Config::default(), pool))
}
