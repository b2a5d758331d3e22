use crate::services::mailer::Mailer;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub mailer: Arc<Mailer>,
    pub session_key: Vec<u8>,
}

pub type SharedState = Arc<AppState>;
