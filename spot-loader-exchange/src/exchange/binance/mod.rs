mod client;
mod credentials;
mod spot;

pub use client::BinanceClient;
pub use credentials::Credentials;
pub use spot::Spot;
