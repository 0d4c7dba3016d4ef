use tabled::Tabled;

use crate::client::HelpdeskClient;
use crate::error::Result;
use crate::output::{print_table, truncate};
use crate::types::Category;

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub async fn list(client: &HelpdeskClient) -> Result<()> {
    let categories = client.list_categories().await?;

    print_table(
        &categories,
        |c: &Category| CategoryRow {
            id: c.id,
            name: c.label(),
            description: truncate(c.description.as_deref().unwrap_or("-"), 60),
        },
        |c| format!("{}\t{}", c.id, c.label()),
    );
    Ok(())
}
