pub mod launch;
pub mod models;
pub mod respond;
