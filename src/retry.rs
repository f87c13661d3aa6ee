//! Delay scheduling for waiting callers
//!
//! While one caller computes a missing value, every other caller for the
//! same key polls the store on a shaped schedule. The schedule is a pure
//! function of the attempt index and the policy; `None` signals that the
//! attempt budget is spent.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::CacheError;

/// Delay-shaping algorithm selector, as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    /// Fixed sleep between attempts, independent of the timeout budget
    Aggressive,
    /// The timeout budget spread evenly across the attempts
    Diffused,
    /// Exponentially growing delays normalized to fit the timeout budget
    #[default]
    Progressive,
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryMode::Aggressive => write!(f, "aggressive"),
            RetryMode::Diffused => write!(f, "diffused"),
            RetryMode::Progressive => write!(f, "progressive"),
        }
    }
}

impl FromStr for RetryMode {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aggressive" => Ok(RetryMode::Aggressive),
            "diffused" => Ok(RetryMode::Diffused),
            "progressive" => Ok(RetryMode::Progressive),
            _ => Err(CacheError::configuration(format!(
                "Unknown retry mode: {}. Valid modes: aggressive, diffused, progressive",
                s
            ))),
        }
    }
}

/// A fully-resolved retry policy: how many times a waiting caller re-checks
/// the store and how long it sleeps before each check
///
/// Policies are validated and precomputed at construction, so `delay` never
/// fails; it only signals exhaustion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    Aggressive { times: u32, sleep: Duration },
    Diffused { times: u32, delay: Duration },
    Progressive { schedule: Vec<Duration> },
}

impl RetryPolicy {
    /// Fixed `sleep` before each of `times` checks
    pub fn aggressive(times: u32, sleep: Duration) -> Result<Self, CacheError> {
        Self::check_times(times)?;
        Ok(Self::Aggressive { times, sleep })
    }

    /// `times` checks spaced evenly across `timeout`
    ///
    /// A timeout of zero collapses every delay to zero: poll immediately.
    pub fn diffused(times: u32, timeout: Duration) -> Result<Self, CacheError> {
        Self::check_times(times)?;
        let delay = Duration::from_millis(timeout.as_millis() as u64 / u64::from(times));
        Ok(Self::Diffused { times, delay })
    }

    /// `times` geometrically increasing delays whose sum fits within
    /// `timeout`
    ///
    /// With `step = floor(timeout / (2^times - 1))`, attempt `i` sleeps
    /// `step * 2^i`. The whole schedule is computed here and reused across
    /// attempts.
    pub fn progressive(times: u32, timeout: Duration) -> Result<Self, CacheError> {
        Self::check_times(times)?;
        let span = 2u128
            .checked_pow(times)
            .ok_or_else(|| {
                CacheError::configuration(format!("retry_times {} is too large for progressive mode", times))
            })?
            - 1;
        let step = timeout.as_millis() / span;
        let schedule = (0..times)
            .map(|i| Duration::from_millis((step << i) as u64))
            .collect();
        Ok(Self::Progressive { schedule })
    }

    /// Builds the policy described by a mode and its raw settings
    pub fn from_mode(
        mode: RetryMode,
        times: u32,
        sleep: Duration,
        timeout: Duration,
    ) -> Result<Self, CacheError> {
        match mode {
            RetryMode::Aggressive => Self::aggressive(times, sleep),
            RetryMode::Diffused => Self::diffused(times, timeout),
            RetryMode::Progressive => Self::progressive(times, timeout),
        }
    }

    /// How long to sleep before re-checking the store on the given
    /// zero-based attempt, or `None` once the attempt budget is spent
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Aggressive { times, sleep } => (attempt < *times).then_some(*sleep),
            Self::Diffused { times, delay } => (attempt < *times).then_some(*delay),
            Self::Progressive { schedule } => schedule.get(attempt as usize).copied(),
        }
    }

    /// The attempt budget
    pub fn times(&self) -> u32 {
        match self {
            Self::Aggressive { times, .. } | Self::Diffused { times, .. } => *times,
            Self::Progressive { schedule } => schedule.len() as u32,
        }
    }

    fn check_times(times: u32) -> Result<(), CacheError> {
        if times == 0 {
            return Err(CacheError::configuration(
                "retry_times must be at least 1",
            ));
        }
        Ok(())
    }
}
