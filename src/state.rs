//! Application state shared across web handlers.

use crate::suggestions::SuggestionService;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub suggestions: SuggestionService,
}

impl AppState {
    pub fn new(db_pool: PgPool, suggestions: SuggestionService) -> Self {
        Self {
            db_pool,
            suggestions,
        }
    }
}
