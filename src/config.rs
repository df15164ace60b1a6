//! Runtime configuration from environment variables (after `.env` is loaded).

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::modules;
use crate::platform::conversion::{ConversionResolver, DEFAULT_HEALTH_FAILURE_BPS};
use crate::platform::oracle::SimulatedOracle;
use crate::platform::{Platform, TxContext};
use crate::types::Address;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

/// Deployer used when `SEAS_DEPLOYER` is unset.
pub const DEFAULT_DEPLOYER: Address = Address::new([
    0xde, 0xa1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub bind_addr: SocketAddr,
    /// Holds DEFAULT_ADMIN_ROLE and ADMIN_ROLE at startup
    pub deployer: Address,
    pub health_failure_bps: u32,
    /// Deploy, register and initialize the reference modules at startup
    pub bootstrap: bool,
    /// Simulated oracle quotes; each seeded token also gets its primary source enabled
    pub oracle_rates: Vec<(Address, u128)>,
}

impl PlatformConfig {
    /// Read `SEAS_*` variables from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("SEAS_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("SEAS_BIND_ADDR is not a socket address")?;

        let deployer = match lookup("SEAS_DEPLOYER") {
            Some(raw) => raw.parse::<Address>().context("SEAS_DEPLOYER is not an address")?,
            None => DEFAULT_DEPLOYER,
        };

        let health_failure_bps = match lookup("SEAS_HEALTH_FAILURE_BPS") {
            Some(raw) => {
                let bps = raw
                    .trim()
                    .parse::<u32>()
                    .context("SEAS_HEALTH_FAILURE_BPS is not an integer")?;
                anyhow::ensure!(bps <= 10_000, "SEAS_HEALTH_FAILURE_BPS must be at most 10000");
                bps
            }
            None => DEFAULT_HEALTH_FAILURE_BPS,
        };

        let bootstrap = match lookup("SEAS_BOOTSTRAP") {
            Some(raw) => parse_bool(&raw).context("SEAS_BOOTSTRAP must be true or false")?,
            None => true,
        };

        let oracle_rates = match lookup("SEAS_ORACLE_RATES") {
            Some(raw) => parse_rates(&raw).context("SEAS_ORACLE_RATES is malformed")?,
            None => Vec::new(),
        };

        Ok(Self {
            bind_addr,
            deployer,
            health_failure_bps,
            bootstrap,
            oracle_rates,
        })
    }

    /// Build the platform and its simulated oracle from this configuration.
    pub fn build(&self) -> anyhow::Result<(Platform, SimulatedOracle)> {
        let oracle = SimulatedOracle::new();
        let resolver = ConversionResolver::new(
            Some(Arc::new(oracle.clone())),
            self.health_failure_bps,
        );
        let mut platform = Platform::new(self.deployer, resolver);
        let tx = TxContext::new(self.deployer);

        for (token, rate) in &self.oracle_rates {
            oracle.set_rate(*token, *rate);
            platform
                .configure_primary_source(&tx, *token, true)
                .with_context(|| format!("enabling primary source for {}", token))?;
            tracing::info!("Oracle seeded: {} = {}", token, rate);
        }

        if self.bootstrap {
            let report = modules::bootstrap(&mut platform, &tx)
                .context("bootstrapping reference modules")?;
            for (id, ok) in &report {
                if *ok {
                    tracing::info!("  {} - active", id);
                } else {
                    tracing::warn!("  {} - initialization failed, retry individually", id);
                }
            }
        }

        Ok((platform, oracle))
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognized boolean {:?}", other),
    }
}

/// `token=rate,token=rate`; rates are 18-decimal fixed point integers.
fn parse_rates(raw: &str) -> anyhow::Result<Vec<(Address, u128)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> anyhow::Result<(Address, u128)> {
            let (token, rate) = entry
                .split_once('=')
                .with_context(|| format!("expected token=rate, got {:?}", entry))?;
            let token = token.trim().parse::<Address>()?;
            let rate = rate
                .trim()
                .parse::<u128>()
                .with_context(|| format!("invalid rate for {}", token))?;
            anyhow::ensure!(rate > 0, "rate for {} must be positive", token);
            Ok((token, rate))
        })
        .collect()
}
