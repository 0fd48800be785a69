//! The toy tools exposed by the server.
//!
//! Everything here is a plain function over already-extracted arguments and
//! returns the text the tool reports. Argument extraction and the mapping to
//! `CallToolResult` live in [`crate::registry`].

use crate::calculator::{self, CalcError, Number};
use crate::ServerConfig;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Characters `calculate` accepts
pub const CALC_ALLOWED_CHARS: &str = "0123456789+-*/.() ";

/// Longest expression `calculate` evaluates
pub const CALC_MAX_LEN: usize = 100;

/// Upper bound on the `async_calculation` delay
pub const MAX_ASYNC_DELAY: Duration = Duration::from_secs(10);

pub const DEFAULT_LANGUAGE: &str = "zh";

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: String,
    pub description: String,
    pub amount: f64,
}

impl Transaction {
    fn new(date: &str, description: &str, amount: f64) -> Self {
        Self {
            date: date.to_string(),
            description: description.to_string(),
            amount,
        }
    }
}

/// Fake account data: transactions by user id, rates by `"{BASE}_{TARGET}"`
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    transactions: HashMap<String, Vec<Transaction>>,
    rates: HashMap<String, f64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sample data served by the bundled tool server
    pub fn sample() -> Self {
        Self::new()
            .with_transactions(
                "user123",
                vec![
                    Transaction::new("2024-01-15", "Coffee Shop", -4.50),
                    Transaction::new("2024-01-16", "Salary Deposit", 2500.00),
                    Transaction::new("2024-01-18", "Grocery Store", -82.35),
                ],
            )
            .with_transactions(
                "user456",
                vec![
                    Transaction::new("2024-01-10", "Online Subscription", -12.99),
                    Transaction::new("2024-01-12", "Refund", 45.00),
                ],
            )
            .with_rate("USD", "TWD", 32.15)
            .with_rate("TWD", "USD", 0.0311)
            .with_rate("USD", "JPY", 149.5)
            .with_rate("EUR", "USD", 1.09)
            .with_rate("USD", "EUR", 0.92)
            .with_rate("JPY", "TWD", 0.215)
    }

    pub fn with_transactions(mut self, user_id: impl Into<String>, entries: Vec<Transaction>) -> Self {
        self.transactions.insert(user_id.into(), entries);
        self
    }

    pub fn with_rate(mut self, base: &str, target: &str, rate: f64) -> Self {
        self.rates.insert(rate_key(base, target), rate);
        self
    }

    pub fn transactions(&self, user_id: &str) -> Option<&[Transaction]> {
        self.transactions.get(user_id).map(Vec::as_slice)
    }

    pub fn rate(&self, base: &str, target: &str) -> Option<f64> {
        self.rates.get(&rate_key(base, target)).copied()
    }
}

fn rate_key(base: &str, target: &str) -> String {
    format!("{}_{}", base.to_uppercase(), target.to_uppercase())
}

pub fn add_numbers(a: Number, b: Number) -> String {
    format!("{} + {} = {}", a, b, calculator::add(a, b))
}

/// Unknown languages fall back to the default greeting
pub fn greet(name: &str, language: &str) -> String {
    match language {
        "en" => format!("Hello, {}!", name),
        "ja" => format!("こんにちは、{}さん！", name),
        _ => format!("你好，{}！", name),
    }
}

pub fn hello_world(name: &str) -> String {
    format!("Hello, {}! Greetings from the restmcp tool server", name)
}

/// `UTC` unless `Asia/Taipei` is asked for
pub fn current_time(timezone: &str) -> String {
    let now = Utc::now();
    let (local, label) = match timezone {
        "Asia/Taipei" => (now + ChronoDuration::hours(8), "Asia/Taipei (UTC+8)"),
        _ => (now, "UTC"),
    };
    format!("Current time: {} ({})", local.format("%Y-%m-%d %H:%M:%S"), label)
}

pub fn echo_message(message: &str, repeat: i64) -> String {
    let repeat = repeat.clamp(1, 5);
    (1..=repeat)
        .map(|i| format!("{}. {}", i, message))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_json(json_string: &str) -> String {
    match serde_json::from_str::<Value>(json_string) {
        Ok(value) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|e| format!("JSON format error: {}", e)),
        Err(e) => format!("JSON format error: {}", e),
    }
}

/// Filters the input before evaluating; rejected input is never parsed
pub fn calculate(expression: &str) -> String {
    if !expression.chars().all(|c| CALC_ALLOWED_CHARS.contains(c)) {
        return "Error: expression contains disallowed characters".to_string();
    }
    if expression.chars().count() > CALC_MAX_LEN {
        return "Error: expression is too long".to_string();
    }

    match calculator::evaluate(expression) {
        Ok(value) => format!("{} = {}", expression, value),
        Err(CalcError::DivisionByZero) => "Error: division by zero".to_string(),
        Err(e) => format!("Error: {}", e),
    }
}

pub fn get_transactions(ledger: &Ledger, user_id: &str) -> String {
    let Some(entries) = ledger.transactions(user_id) else {
        return format!("No transactions found for user '{}'", user_id);
    };

    let mut lines = vec![format!("Transactions for {}:", user_id)];
    lines.extend(
        entries
            .iter()
            .map(|t| format!("{} | {} | {:.2}", t.date, t.description, t.amount)),
    );
    lines.join("\n")
}

pub fn get_exchange_rate(ledger: &Ledger, base: &str, target: &str) -> String {
    let (base, target) = (base.to_uppercase(), target.to_uppercase());
    match ledger.rate(&base, &target) {
        Some(rate) => format!("1 {} = {} {}", base, rate, target),
        None => format!("Exchange rate for {} to {} is not supported", base, target),
    }
}

pub fn server_info(config: &ServerConfig) -> String {
    let info = json!({
        "server_name": config.name,
        "version": config.version,
        "environment": config.environment,
        "timestamp": Utc::now().to_rfc3339(),
        "port": config.port,
        "status": "running",
    });
    serde_json::to_string_pretty(&info).unwrap_or_else(|_| info.to_string())
}

pub fn health_status(config: &ServerConfig) -> String {
    json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": config.environment,
        "port": config.port,
        "message": format!("{} is running", config.name),
    })
    .to_string()
}

/// Square `x` after sleeping for `delay` seconds (clamped to [`MAX_ASYNC_DELAY`])
pub async fn async_calculation(x: Number, delay: f64) -> String {
    let delay = if delay.is_finite() && delay > 0.0 {
        Duration::from_secs_f64(delay).min(MAX_ASYNC_DELAY)
    } else {
        Duration::ZERO
    };
    tokio::time::sleep(delay).await;

    format!("{} squared = {}", x, calculator::mul(x, x))
}
