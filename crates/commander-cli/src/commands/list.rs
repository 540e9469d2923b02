use crate::OutputFormat;
use crate::commands::{client, print_json};
use anyhow::Result;
use comfy_table::{Cell, Table};
use commander_client::{ClientConfig, ListingResponse};

pub async fn run(config: ClientConfig, format: OutputFormat) -> Result<()> {
    let socket = config.socket_path.clone();
    let mut client = client::connect(config)?;

    let listing = client
        .list_commands()
        .await
        .map_err(|e| client::explain(e, &socket))?;
    client.close();

    match format {
        OutputFormat::Json => print_json(&listing)?,
        OutputFormat::Table => {
            println!("Available Commander Commands ({}):", listing.count);
            if !listing.commands.is_empty() {
                println!("{}", listing_table(&listing));
            }
        }
    }
    Ok(())
}

fn listing_table(listing: &ListingResponse) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Name", "Command", "Description"]);

    for command in &listing.commands {
        table.add_row(vec![
            Cell::new(&command.name),
            Cell::new(&command.command),
            Cell::new(&command.description),
        ]);
    }

    table
}
