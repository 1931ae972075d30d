mod app_context;
mod setting;

pub use app_context::AppContext;
pub use setting::{
    load_dotenv, DatabaseSetting, LoaderSetting, LogSetting, Setting, SettingOverrides,
    SourceSetting,
};
