use super::{Credentials, Spot};
use binance::config::Config;
use bon::bon;

#[derive(Debug, Clone)]
pub struct BinanceClient {
    pub(crate) api_key: Option<String>,
    pub(crate) secret_key: Option<String>,
    pub(crate) config: Option<Config>,
}

#[bon]
impl BinanceClient {
    #[builder(on(String, into))]
    pub fn new(
        api_key: Option<String>,
        secret_key: Option<String>,
        config: Option<Config>,
    ) -> Self {
        BinanceClient {
            api_key,
            secret_key,
            config,
        }
    }
}

impl BinanceClient {
    pub fn with_credentials(credentials: Credentials) -> Self {
        BinanceClient::builder()
            .maybe_api_key(credentials.api_key)
            .maybe_secret_key(credentials.secret_key)
            .build()
    }

    pub fn spot(&self) -> Spot {
        Spot::new(self)
    }

    // 根据是否有自定义配置创建对应的 API 对象
    pub(crate) fn create_api<T>(
        &self,
        new: impl FnOnce(Option<String>, Option<String>) -> T,
        new_with_config: impl FnOnce(Option<String>, Option<String>, &Config) -> T,
    ) -> T {
        let api_key = self.api_key.clone();
        let secret_key = self.secret_key.clone();

        match self.config {
            Some(ref config) => new_with_config(api_key, secret_key, config),
            None => new(api_key, secret_key),
        }
    }
}
