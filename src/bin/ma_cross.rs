//! Moving-average crossover strategy job
//!
//! Reads `STRATEGY_ID`, `STRATEGY_NAME` and `STRATEGY_PARAMETERS` from the
//! environment, evaluates a crossover over simulated closes, and reports
//! through stdout and its exit code. Orders are simulated only.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::process::ExitCode;

/// Parameters with their defaults; any subset may be overridden
#[derive(Debug, Clone, PartialEq)]
struct MaCrossParams {
    symbol: String,
    exchange: String,
    quantity: u64,
    short_ma_period: usize,
    long_ma_period: usize,
    max_position_size: f64,
    stop_loss_percent: f64,
    take_profit_percent: f64,
}

impl Default for MaCrossParams {
    fn default() -> Self {
        Self {
            symbol: "SBIN-EQ".to_string(),
            exchange: "NSE".to_string(),
            quantity: 1,
            short_ma_period: 5,
            long_ma_period: 20,
            max_position_size: 10_000.0,
            stop_loss_percent: 2.0,
            take_profit_percent: 4.0,
        }
    }
}

impl MaCrossParams {
    fn apply_overrides(mut self, overrides: &Value) -> Result<Self> {
        let map = match overrides {
            Value::Object(map) => map,
            Value::Null => return self.checked(),
            other => bail!("parameters must be a JSON object, got {}", other),
        };

        if let Some(v) = text(map, "symbol")? {
            self.symbol = v;
        }
        if let Some(v) = text(map, "exchange")? {
            self.exchange = v;
        }
        if let Some(v) = whole(map, "quantity")? {
            self.quantity = v;
        }
        if let Some(v) = whole(map, "short_ma_period")? {
            self.short_ma_period = v as usize;
        }
        if let Some(v) = whole(map, "long_ma_period")? {
            self.long_ma_period = v as usize;
        }
        if let Some(v) = number(map, "max_position_size")? {
            self.max_position_size = v;
        }
        if let Some(v) = number(map, "stop_loss_percent")? {
            self.stop_loss_percent = v;
        }
        if let Some(v) = number(map, "take_profit_percent")? {
            self.take_profit_percent = v;
        }

        self.checked()
    }

    fn checked(self) -> Result<Self> {
        if self.short_ma_period == 0 || self.short_ma_period >= self.long_ma_period {
            bail!(
                "short_ma_period ({}) must be positive and below long_ma_period ({})",
                self.short_ma_period,
                self.long_ma_period
            );
        }
        if self.quantity == 0 {
            bail!("quantity must be positive");
        }
        Ok(self)
    }
}

fn text(map: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => bail!("{} must be a string, got {}", key, other),
    }
}

fn whole(map: &Map<String, Value>, key: &str) -> Result<Option<u64>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .with_context(|| format!("{} must be a non-negative integer, got {}", key, v)),
    }
}

fn number(map: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .with_context(|| format!("{} must be a number, got {}", key, v)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Buy,
    Sell,
    Hold,
}

fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Crossover between the last two bars
fn crossover(closes: &[f64], short: usize, long: usize) -> Signal {
    if closes.len() < long + 1 {
        return Signal::Hold;
    }
    let previous = &closes[..closes.len() - 1];
    let (Some(short_now), Some(long_now), Some(short_prev), Some(long_prev)) = (
        sma(closes, short),
        sma(closes, long),
        sma(previous, short),
        sma(previous, long),
    ) else {
        return Signal::Hold;
    };

    if short_prev <= long_prev && short_now > long_now {
        Signal::Buy
    } else if short_prev >= long_prev && short_now < long_now {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Deterministic pseudo-random walk seeded by the symbol
fn simulated_closes(symbol: &str, bars: usize) -> Vec<f64> {
    let mut state = symbol
        .bytes()
        .fold(0x2545_f491_4f6c_dd1d_u64, |acc, b| acc.rotate_left(5) ^ u64::from(b));
    let mut price = 500.0;
    (0..bars)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let step = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            price *= 1.0 + step * 0.02;
            price
        })
        .collect()
}

fn run() -> Result<()> {
    let strategy_id = std::env::var("STRATEGY_ID").context("STRATEGY_ID is not set")?;
    let strategy_name = std::env::var("STRATEGY_NAME").unwrap_or_else(|_| "MA Crossover".to_string());
    let raw = std::env::var("STRATEGY_PARAMETERS").unwrap_or_else(|_| "{}".to_string());
    let overrides: Value = serde_json::from_str(&raw).context("STRATEGY_PARAMETERS is not valid JSON")?;
    let params = MaCrossParams::default().apply_overrides(&overrides)?;

    println!("strategy_id={}", strategy_id);
    println!(
        "Running {} on {}:{} (short={}, long={})",
        strategy_name, params.exchange, params.symbol, params.short_ma_period, params.long_ma_period
    );
    if std::env::var("ANGEL_SESSION_TOKEN").map_or(true, |t| t.is_empty()) {
        eprintln!("warning: no venue session token provided");
    }

    let closes = simulated_closes(&params.symbol, params.long_ma_period * 3);
    let last = closes.last().copied().unwrap_or_default();
    let signal = crossover(&closes, params.short_ma_period, params.long_ma_period);
    println!("signal={:?} last_close={:.2}", signal, last);

    if signal != Signal::Hold {
        let notional = last * params.quantity as f64;
        if notional > params.max_position_size {
            println!(
                "Skipping order: notional {:.2} exceeds max_position_size {:.2}",
                notional, params.max_position_size
            );
        } else {
            let (stop, target) = match signal {
                Signal::Buy => (
                    last * (1.0 - params.stop_loss_percent / 100.0),
                    last * (1.0 + params.take_profit_percent / 100.0),
                ),
                _ => (
                    last * (1.0 + params.stop_loss_percent / 100.0),
                    last * (1.0 - params.take_profit_percent / 100.0),
                ),
            };
            println!(
                "Simulated {:?} {} x {} @ {:.2} (stop {:.2}, target {:.2})",
                signal, params.quantity, params.symbol, last, stop, target
            );
        }
    }

    println!("SUCCESS");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
