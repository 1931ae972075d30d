use crate::setting::Setting;
use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

#[derive(Debug)]
pub struct AppContext {
    pub setting: Setting,
    pub db: Arc<PgPool>,
}

impl AppContext {
    // 连接池按需建立连接, 这里不会访问数据库
    pub fn try_new(setting: Setting) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(setting.database.max_connections)
            .connect_lazy(&setting.database.url)?;

        Ok(Self {
            setting,
            db: Arc::new(db),
        })
    }
}
