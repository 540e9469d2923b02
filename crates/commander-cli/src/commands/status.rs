use crate::OutputFormat;
use crate::commands::{client, print_json};
use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use commander_client::{ClientConfig, StatusResponse};

pub async fn run(config: ClientConfig, format: OutputFormat) -> Result<()> {
    let socket = config.socket_path.clone();
    let mut client = client::connect(config)?;

    let status = client
        .status()
        .await
        .map_err(|e| client::explain(e, &socket))?;
    client.close();

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => println!("{}", status_table(&status)),
    }
    Ok(())
}

fn status_table(status: &StatusResponse) -> Table {
    let failed_color = if status.executions.failed > 0 {
        Color::Red
    } else {
        Color::Green
    };

    let mut table = Table::new();
    table.set_header(vec!["METRIC", "VALUE"]);
    table.add_row(vec![Cell::new("Uptime"), Cell::new(&status.uptime)]);
    table.add_row(vec![
        Cell::new("Registered commands"),
        Cell::new(status.registered_commands),
    ]);
    table.add_row(vec![
        Cell::new("Successful executions"),
        Cell::new(status.executions.successful),
    ]);
    table.add_row(vec![
        Cell::new("Failed executions"),
        Cell::new(status.executions.failed).fg(failed_color),
    ]);
    table.add_row(vec![
        Cell::new("Total executions"),
        Cell::new(status.executions.total),
    ]);
    table
}
