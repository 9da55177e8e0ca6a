//! Console commands, one per stdin line.

use anyhow::{Result, anyhow, bail};
use sto_core::types::OrderKey;
use sto_stage::Line;

pub const HELP: &str = "\
status | buy <usd> | sell <usd> | press <y> | move <y> | release | drag <sl|tp> <y> | drop <sl|tp> | \
confirm | clear | cancel-all | cancel <clientOrderId|algoId> | orders | positions | tab <name> | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Status,
    Buy(f64),
    Sell(f64),
    Press(f64),
    Move(f64),
    Release,
    Drag(Line, f64),
    Drop(Line),
    Confirm,
    Clear,
    CancelAll,
    Cancel(OrderKey),
    Orders,
    Positions,
    Tab(String),
    Help,
    Quit,
}

/// Parse one line. Blank lines give `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let cmd = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("status", []) => Command::Status,
        ("buy", [usd]) => Command::Buy(amount(usd)?),
        ("sell", [usd]) => Command::Sell(amount(usd)?),
        ("press", [y]) => Command::Press(number(y)?),
        ("move", [y]) => Command::Move(number(y)?),
        ("release", []) => Command::Release,
        ("drag", [line, y]) => Command::Drag(line_name(line)?, number(y)?),
        ("drop", [line]) => Command::Drop(line_name(line)?),
        ("confirm", []) => Command::Confirm,
        ("clear", []) => Command::Clear,
        ("cancel-all", []) => Command::CancelAll,
        ("cancel", [id]) => Command::Cancel(OrderKey::parse(id)),
        ("orders", []) => Command::Orders,
        ("positions", []) => Command::Positions,
        ("tab", [name]) => Command::Tab(name.to_string()),
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => bail!("unrecognized command '{}'; try 'help'", line.trim()),
    };
    Ok(Some(cmd))
}

fn number(raw: &str) -> Result<f64> {
    let v: f64 = raw.parse().map_err(|_| anyhow!("'{raw}' is not a number"))?;
    if !v.is_finite() {
        bail!("'{raw}' is not a finite number");
    }
    Ok(v)
}

fn amount(raw: &str) -> Result<f64> {
    let v = number(raw)?;
    if v <= 0.0 {
        bail!("amount must be > 0, got {v}");
    }
    Ok(v)
}

fn line_name(raw: &str) -> Result<Line> {
    match raw.to_ascii_lowercase().as_str() {
        "sl" | "stop" => Ok(Line::StopLoss),
        "tp" | "take" => Ok(Line::TakeProfit),
        "entry" => Ok(Line::Entry),
        _ => bail!("unknown line '{raw}', expected sl or tp"),
    }
}
