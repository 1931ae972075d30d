use clap::Parser;
use spot_loader_config::SettingOverrides;

/// Incrementally loads Binance spot klines into PostgreSQL.
#[derive(Parser, Debug)]
#[command(name = "spot-loader", version)]
pub struct Cli {
    /// Keep polling until interrupted instead of running a single pass
    #[arg(long, env = "AS_SERVICE")]
    pub as_service: bool,

    /// Upstream connection string, "API_KEY=<key> SECRET_KEY=<secret>"
    #[arg(long, env = "SOURCE")]
    pub source: Option<String>,

    /// PostgreSQL connection url
    #[arg(long, env = "TARGET")]
    pub target: Option<String>,

    /// Kline interval to load (1m, 1h)
    #[arg(long, env = "INTERVAL")]
    pub interval: Option<String>,

    /// Comma separated quote assets, e.g. "USDT,BUSD"
    #[arg(long, env = "QUOTE_SYMBOLS")]
    pub quote_symbols: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    // 只有命令行 (或对应环境变量) 给出的值才覆盖配置文件
    pub fn overrides(&self) -> SettingOverrides {
        SettingOverrides {
            as_service: self.as_service.then_some(true),
            source: self.source.clone(),
            target: self.target.clone(),
            interval: self.interval.clone(),
            quote_symbols: self.quote_symbols.clone(),
            log_level: self.log_level.clone(),
        }
    }
}
