// Service configuration, read from environment variables.
// An empty environment gives a single-instance server on 0.0.0.0:3000.

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use crate::event::DispatchPolicy;
use crate::hub::HubConfig;
use crate::relay::Backoff;
use crate::room::LeaveNoticePolicy;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_RELAY_CHANNEL: &str = "roomcast:relay";
pub const DEFAULT_JWT_SECRET: &str = "roomcast-development-secret";

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub listen_addr: SocketAddr,
    pub jwt_secret: String,
    /// `None` runs the instance without a relay
    pub redis_url: Option<String>,
    pub relay_channel: String,
    pub relay_queue_capacity: usize,
    pub relay_retry_step: Duration,
    pub relay_retry_max: Duration,
    /// `None` allows every collection
    pub collections: Option<Vec<String>>,
    pub leave_notice_prefixes: Vec<String>,
}

impl RealtimeConfig {
    /// Fails only when LISTEN_ADDR is set to something unparseable
    pub fn from_env() -> Result<Self, AddrParseError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AddrParseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse()?;

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string());
        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        let relay_channel =
            lookup("RELAY_CHANNEL").unwrap_or_else(|| DEFAULT_RELAY_CHANNEL.to_string());
        let relay_queue_capacity = parse_or(&lookup, "RELAY_QUEUE_CAPACITY", 1024).max(1);

        let relay_retry_step = Duration::from_millis(parse_or(&lookup, "RELAY_RETRY_STEP_MS", 50));
        let relay_retry_max = Duration::from_millis(parse_or(&lookup, "RELAY_RETRY_MAX_MS", 2000));

        let collections = lookup("REALTIME_COLLECTIONS").map(|raw| split_list(&raw));
        let leave_notice_prefixes = lookup("LEAVE_NOTICE_PREFIXES")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|| vec!["room:".to_string()]);

        Ok(Self {
            listen_addr,
            jwt_secret,
            redis_url,
            relay_channel,
            relay_queue_capacity,
            relay_retry_step,
            relay_retry_max,
            collections,
            leave_notice_prefixes,
        })
    }

    /// Hub settings derivable from the environment; hooks are added in code
    pub fn hub_config(&self) -> HubConfig {
        let policy = match &self.collections {
            Some(collections) => {
                DispatchPolicy::new().with_collections(collections.iter().cloned())
            }
            None => DispatchPolicy::new(),
        };

        HubConfig::new()
            .with_policy(policy)
            .with_leave_notices(LeaveNoticePolicy::from_prefixes(
                self.leave_notice_prefixes.iter().cloned(),
            ))
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.relay_retry_step, self.relay_retry_max)
    }
}

// Missing and invalid values both fall back to the default
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
