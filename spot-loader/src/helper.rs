use anyhow::Result;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{self, RandomIdGenerator},
    Resource,
};
use spot_loader_config::LogSetting;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

// RUST_LOG 优先, 否则使用配置中的日志级别
fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

pub fn init_tracing_subscriber(service_name: &str, log: &LogSetting) -> Result<TracingGuard> {
    let console = fmt::Layer::new().with_filter(env_filter(&log.level)?);

    // 按天滚动的日志文件
    let (file, file_guard) = match log.directory {
        Some(ref directory) => {
            let file_appender =
                tracing_appender::rolling::daily(directory, format!("{}.log", service_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::Layer::new()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter(&log.level)?);

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let opentelemetry = match log.otlp_endpoint {
        Some(ref endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(
                    trace::config()
                        .with_id_generator(RandomIdGenerator::default())
                        .with_max_events_per_span(32)
                        .with_max_attributes_per_span(64)
                        .with_resource(Resource::new(vec![KeyValue::new(
                            "service.name",
                            service_name.to_string(),
                        )])),
                )
                .install_batch(runtime::Tokio)?;

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let otel_enabled = opentelemetry.is_some();

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(opentelemetry)
        .try_init()?;

    Ok(TracingGuard {
        _file_guard: file_guard,
        otel_enabled,
    })
}

/// Keeps the file writer alive and flushes the OTLP exporter on drop.
pub struct TracingGuard {
    _file_guard: Option<WorkerGuard>,
    otel_enabled: bool,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if self.otel_enabled {
            global::shutdown_tracer_provider();
        }
    }
}
