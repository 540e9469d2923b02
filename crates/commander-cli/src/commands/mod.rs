pub mod action;
pub mod client;
pub mod dispatch;
pub mod list;
pub mod status;

use anyhow::Result;
use serde::Serialize;

/// Print a value as indented JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
