use super::Symbol;
use anyhow::{anyhow, Result};
use std::{collections::BTreeMap, fmt, str::FromStr};

// 计价币种及其长度, 例如 "USDT,BUSD" => {"BUSD": 4, "USDT": 4}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSymbols(BTreeMap<String, usize>);

impl QuoteSymbols {
    pub fn new<I, S>(quotes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let quotes = quotes
            .into_iter()
            .map(|quote| {
                let quote: String = quote.into();
                let len = quote.len();
                (quote, len)
            })
            .collect();

        QuoteSymbols(quotes)
    }

    // 交易对以某个计价币种结尾, 且比计价币种本身更长
    pub fn matches(&self, symbol: &str) -> bool {
        self.0
            .iter()
            .any(|(quote, len)| symbol.len() > *len && symbol.ends_with(quote.as_str()))
    }

    pub fn filter<I>(&self, symbols: I) -> Vec<Symbol>
    where
        I: IntoIterator,
        I::Item: Into<Symbol>,
    {
        symbols
            .into_iter()
            .map(|symbol| -> Symbol { symbol.into() })
            .filter(|symbol| self.matches(symbol.as_ref()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(quote, len)| (quote.as_str(), *len))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for QuoteSymbols {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let quotes = s
            .split(',')
            .map(str::trim)
            .filter(|quote| !quote.is_empty())
            .map(str::to_uppercase)
            .collect::<Vec<_>>();

        if quotes.is_empty() {
            return Err(anyhow!("no quote symbols in {:?}", s));
        }

        Ok(QuoteSymbols::new(quotes))
    }
}

impl fmt::Display for QuoteSymbols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quotes = self.0.keys().cloned().collect::<Vec<_>>();
        write!(f, "{}", quotes.join(","))
    }
}
