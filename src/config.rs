//! Runtime configuration loaded from environment variables

use std::path::PathBuf;
use std::time::Duration;

/// How accepted bids are written to the shared document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidWriteMode {
    /// Unconditional field write; concurrent bids can clobber or reorder each other
    LastWriteWins,
    /// Write only at the expected next index, re-validating and retrying on conflict
    Conditional,
}

impl BidWriteMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "last_write_wins" | "lww" => Some(Self::LastWriteWins),
            "conditional" => Some(Self::Conditional),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuctionConfig {
    pub port: u16,
    /// Shown in the sign-up modal and the winners report title
    pub auction_name: String,
    /// Snapshot file for the document store (None = in-memory)
    pub data_file: Option<PathBuf>,
    /// Item catalog applied with a bulk update at startup
    pub items_file: Option<PathBuf>,
    pub assets_dir: PathBuf,
    pub static_dir: PathBuf,
    /// Delay before a modal closes itself after a finished submission
    pub auto_close: Duration,
    pub bid_write_mode: BidWriteMode,
    /// Attempts for a conditional bid write before giving up
    pub bid_retries: u32,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auction_name: "CC Silent Auction".to_string(),
            data_file: None,
            items_file: None,
            assets_dir: PathBuf::from("assets"),
            static_dir: PathBuf::from("static"),
            auto_close: Duration::from_millis(1000),
            bid_write_mode: BidWriteMode::LastWriteWins,
            bid_retries: 3,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match non_empty_var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}

impl AuctionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bid_write_mode = match non_empty_var("AUCTION_BID_WRITE_MODE") {
            Some(raw) => BidWriteMode::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown AUCTION_BID_WRITE_MODE {:?}, using last_write_wins",
                    raw
                );
                BidWriteMode::LastWriteWins
            }),
            None => defaults.bid_write_mode,
        };

        let config = Self {
            port: parsed_var("AUCTION_PORT", defaults.port),
            auction_name: non_empty_var("AUCTION_NAME").unwrap_or(defaults.auction_name),
            data_file: non_empty_var("AUCTION_DATA_FILE").map(PathBuf::from),
            items_file: non_empty_var("AUCTION_ITEMS_FILE").map(PathBuf::from),
            assets_dir: non_empty_var("AUCTION_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.assets_dir),
            static_dir: non_empty_var("AUCTION_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            auto_close: Duration::from_millis(parsed_var("AUCTION_AUTO_CLOSE_MS", 1000)),
            bid_write_mode,
            bid_retries: parsed_var("AUCTION_BID_RETRIES", defaults.bid_retries).max(1),
        };

        tracing::info!(
            port = config.port,
            auction_name = %config.auction_name,
            data_file = ?config.data_file,
            bid_write_mode = ?config.bid_write_mode,
            "Auction config loaded"
        );

        if config.bid_write_mode == BidWriteMode::Conditional {
            tracing::warn!("Conditional bid writes enabled; bids may be retried on conflict");
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "AUCTION_PORT",
        "AUCTION_NAME",
        "AUCTION_DATA_FILE",
        "AUCTION_ITEMS_FILE",
        "AUCTION_ASSETS_DIR",
        "AUCTION_STATIC_DIR",
        "AUCTION_AUTO_CLOSE_MS",
        "AUCTION_BID_WRITE_MODE",
        "AUCTION_BID_RETRIES",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear_env();
        let config = AuctionConfig::from_env();

        assert_eq!(config.port, 8080);
        assert_eq!(config.auction_name, "CC Silent Auction");
        assert!(config.data_file.is_none());
        assert_eq!(config.auto_close, Duration::from_millis(1000));
        assert_eq!(config.bid_write_mode, BidWriteMode::LastWriteWins);
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear_env();
        std::env::set_var("AUCTION_PORT", "9000");
        std::env::set_var("AUCTION_NAME", "Spring Fair");
        std::env::set_var("AUCTION_DATA_FILE", "/tmp/auction.json");
        std::env::set_var("AUCTION_AUTO_CLOSE_MS", "250");
        std::env::set_var("AUCTION_BID_WRITE_MODE", "Conditional");
        std::env::set_var("AUCTION_BID_RETRIES", "0");

        let config = AuctionConfig::from_env();
        clear_env();

        assert_eq!(config.port, 9000);
        assert_eq!(config.auction_name, "Spring Fair");
        assert_eq!(config.data_file, Some(PathBuf::from("/tmp/auction.json")));
        assert_eq!(config.auto_close, Duration::from_millis(250));
        assert_eq!(config.bid_write_mode, BidWriteMode::Conditional);
        assert_eq!(config.bid_retries, 1);
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("AUCTION_PORT", "not-a-port");
        std::env::set_var("AUCTION_BID_WRITE_MODE", "optimistic");

        let config = AuctionConfig::from_env();
        clear_env();

        assert_eq!(config.port, 8080);
        assert_eq!(config.bid_write_mode, BidWriteMode::LastWriteWins);
    }
}
