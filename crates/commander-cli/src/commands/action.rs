//! Per-command schema and configuration routes
//!
//! These answer with whatever JSON the command defines, so output is always
//! printed as JSON regardless of `--format`.

use crate::commands::{client, print_json};
use anyhow::{Context, Result};
use commander_client::ClientConfig;
use serde_json::Value;

pub async fn describe(config: ClientConfig, command: &str) -> Result<()> {
    let socket = config.socket_path.clone();
    let mut client = client::connect(config)?;

    let schema = client
        .describe_command(command)
        .await
        .map_err(|e| client::explain(e, &socket))?;
    client.close();

    print_json(&schema)
}

pub async fn get_config(config: ClientConfig, command: &str) -> Result<()> {
    let socket = config.socket_path.clone();
    let mut client = client::connect(config)?;

    let current = client
        .retrieve_config(command)
        .await
        .map_err(|e| client::explain(e, &socket))?;
    client.close();

    print_json(&current)
}

pub async fn set_config(config: ClientConfig, command: &str, payload: &str) -> Result<()> {
    let payload: Value = serde_json::from_str(payload).context("payload is not valid JSON")?;

    let socket = config.socket_path.clone();
    let mut client = client::connect(config)?;

    let result = client
        .submit_config(command, &payload)
        .await
        .map_err(|e| client::explain(e, &socket))?;
    client.close();

    print_json(&result)
}
