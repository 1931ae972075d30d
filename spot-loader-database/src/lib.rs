pub mod candle;
pub mod cursor;
mod memory_store;
mod store;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../migrations");

pub use candle::Candle;
pub use cursor::Cursor;
pub use memory_store::MemoryKlineStore;
pub use store::{KlineStore, PgKlineStore};
