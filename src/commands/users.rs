use std::sync::Arc;

use colored::Colorize;
use tabled::Tabled;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::TicketApi;
use crate::client::HelpdeskClient;
use crate::config::Config;
use crate::error::Result;
use crate::output::{self, print_table, truncate};
use crate::search::{SearchState, UserSearch};
use crate::types::{classify_role, User};

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Department")]
    department: String,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: truncate(user.display_name().unwrap_or("-"), 30),
            email: user.email.clone().unwrap_or_else(|| "-".to_string()),
            role: classify_role(user).colored(),
            department: user.department.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub async fn search(
    client: &HelpdeskClient,
    config: &Config,
    term: &str,
    limit: Option<u32>,
) -> Result<()> {
    let limit = limit.unwrap_or_else(|| config.search_limit()).max(1);
    let page = client.search_users(term, limit).await?;

    if page.data.is_empty() && !output::is_json() {
        println!("No users match \"{term}\".");
        return Ok(());
    }

    print_table(&page.data, |u| UserRow::from(u), |u| {
        format!("{}\t{}", u.id, u.display_name().unwrap_or("-"))
    });
    Ok(())
}

/// Interactive debounced lookup on stdin. Each line replaces the query; a
/// listed number picks that user; an empty line gives up.
pub async fn pick_user(
    api: Arc<dyn TicketApi>,
    config: &Config,
    initial: Option<&str>,
    accept: impl Fn(&User) -> bool,
) -> Result<Option<User>> {
    let mut search = UserSearch::new(api, config.search_debounce(), config.search_limit());
    let mut rx = search.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown: Vec<User> = Vec::new();

    println!("Type to search, enter a number to choose, or an empty line to cancel.");
    if let Some(term) = initial {
        search.input(term);
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(None);
                }
                let state = rx.borrow_and_update().clone();
                let query = state.query().unwrap_or_default();
                match &state {
                    SearchState::Loading { .. } => println!("Searching \"{query}\"..."),
                    SearchState::Ready { users, .. } => {
                        shown = users.iter().filter(|u| accept(u)).cloned().collect();
                        print_choices(query, &shown);
                    }
                    SearchState::Failed { message, .. } => {
                        eprintln!("{} {message}", format!("Search for \"{query}\" failed:").red());
                    }
                    SearchState::Idle | SearchState::Pending { .. } => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    search.cancel();
                    return Ok(None);
                };
                let line = line.trim();
                if line.is_empty() {
                    search.cancel();
                    return Ok(None);
                }
                match line.parse::<usize>() {
                    Ok(n) if (1..=shown.len()).contains(&n) => {
                        search.cancel();
                        return Ok(Some(shown.swap_remove(n - 1)));
                    }
                    _ => search.input(line),
                }
            }
        }
    }
}

fn print_choices(query: &str, users: &[User]) {
    if users.is_empty() {
        println!("No matches for \"{query}\".");
        return;
    }
    for (i, user) in users.iter().enumerate() {
        let email = user
            .email
            .as_deref()
            .map(|e| format!(" <{e}>"))
            .unwrap_or_default();
        println!(
            "  {:>2}. {}{} {}",
            i + 1,
            user.display_name().unwrap_or("(no name)").bold(),
            email.dimmed(),
            classify_role(user).colored()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_fills_missing_fields() {
        let users: Vec<User> = serde_json::from_value(json!([
            { "id": 3, "name": "Ana", "email": "ana@example.com", "department": "IT" },
            { "id": 4 }
        ]))
        .unwrap();

        let rows: Vec<UserRow> = users.iter().map(|u| UserRow::from(u)).collect();
        assert_eq!(rows[0].name, "Ana");
        assert_eq!(rows[0].department, "IT");
        assert_eq!(rows[1].email, "-");
        assert_eq!(rows[1].department, "-");
    }
}
