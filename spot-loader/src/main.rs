mod cli;
mod helper;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use helper::init_tracing_subscriber;
use spot_loader_config::{load_dotenv, AppContext, Setting};
use spot_loader_database::{KlineStore, PgKlineStore, MIGRATOR};
use spot_loader_exchange::{BinanceClient, BinanceKlineSource, Credentials, KlineSource};
use spot_loader_task::{LoaderConfig, SpotLoader};
use std::{sync::Arc, time::Duration};

const SERVICE_NAME: &str = "spot-loader";

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    let cli = Cli::parse();
    let setting = Setting::try_new(&cli.overrides())?;
    let _guard = init_tracing_subscriber(SERVICE_NAME, &setting.log)?;

    // 周期和计价币种不合法时直接退出
    let interval = setting.loader.kline_interval()?;
    let quote_symbols = setting.loader.quote_symbols()?;
    let credentials = setting.source.connection.parse::<Credentials>()?;

    let config = LoaderConfig::builder()
        .interval(interval)
        .quote_symbols(quote_symbols)
        .source_name(setting.source.name.clone())
        .page_limit(setting.loader.page_limit)
        .request_limit(setting.loader.request_limit)
        .cooldown(Duration::from_secs(setting.loader.cooldown_secs))
        .status_check_passes(setting.loader.status_check_passes)
        .build();
    let as_service = setting.loader.as_service;

    let context = AppContext::try_new(setting)?;

    if context.setting.database.migrate {
        MIGRATOR.run(&*context.db).await?;
        tracing::info!("database migrations applied");
    }

    let source = BinanceKlineSource::new(BinanceClient::with_credentials(credentials));
    source.ping().await?;

    let store = PgKlineStore::new(Arc::clone(&context.db));
    store.ping().await?;

    tracing::info!(
        interval = %config.interval,
        quote_symbols = %config.quote_symbols,
        as_service,
        "starting {}",
        SERVICE_NAME
    );

    let mut loader = SpotLoader::new(source, store, config);

    if as_service {
        loader.run_as_service().await?;
    } else {
        loader.run_single().await?;
    }

    Ok(())
}
