use crate::OutputFormat;
use crate::commands::{client, print_json};
use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Table};
use commander_client::{ClientConfig, DispatchResponse, Parameters};
use serde_json::Value;

pub async fn run(
    config: ClientConfig,
    format: OutputFormat,
    command: &str,
    params: &str,
) -> Result<()> {
    // Reject bad input before touching the socket.
    let parameters = parse_parameters(params)?;

    let socket = config.socket_path.clone();
    let mut client = client::connect(config)?;
    let response = client
        .dispatch(command, parameters)
        .await
        .map_err(|e| client::explain(e, &socket))?;
    client.close();

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => println!("{}", response_table(&response)),
    }

    if response.success() == Some(false) {
        bail!("Command '{}' reported failure", command);
    }
    Ok(())
}

fn parse_parameters(params: &str) -> Result<Parameters> {
    let value: Value = serde_json::from_str(params).context("--params is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("--params must be a JSON object"),
    }
}

fn response_table(response: &DispatchResponse) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);

    for (key, value) in &response.0 {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        table.add_row(vec![Cell::new(key), Cell::new(rendered)]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_parameters() {
        let parameters = parse_parameters(r#"{"title":"hi","message":"there"}"#).unwrap();
        assert_eq!(parameters.get("title"), Some(&json!("hi")));

        assert!(parse_parameters("{}").unwrap().is_empty());
        assert!(parse_parameters("[1,2]").is_err());
        assert!(parse_parameters("\"echo\"").is_err());
        assert!(parse_parameters("{not json").is_err());
    }

    #[test]
    fn test_response_table_renders_strings_unquoted() {
        let response =
            DispatchResponse::from_slice(br#"{"message":"hello","retries":2}"#).unwrap();
        let rendered = response_table(&response).to_string();

        assert!(rendered.contains("hello"));
        assert!(!rendered.contains("\"hello\""));
        assert!(rendered.contains("retries"));
    }
}
