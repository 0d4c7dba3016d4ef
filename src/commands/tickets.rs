use std::sync::Arc;

use colored::Colorize;
use tabled::Tabled;

use super::confirm;
use super::users::pick_user;
use crate::api::TicketApi;
use crate::cli::{TicketCreateArgs, TicketListArgs};
use crate::client::HelpdeskClient;
use crate::config::Config;
use crate::error::{HelpdeskError, Result};
use crate::output::{
    self, date_or_dash, format_date, format_relative, print_item, print_table, truncate,
};
use crate::responses::{NewTicket, TicketFilters};
use crate::session::AuthUser;
use crate::types::{Ticket, TicketStatus, User, UserRef};
use crate::upload::UploadSet;
use crate::workflow::assignment::{resolve_history_names, resolve_user_name};
use crate::workflow::guard::{ensure_admin, ensure_mutable};
use crate::workflow::{
    can_mutate, can_reopen, resolve_assignee_name, submit_mutation, ticket_for_viewer,
    AssigneePicker, KnownUsers, Mutation, TicketView,
};

#[derive(Tabled)]
struct TicketRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Assignee")]
    assignee: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl TicketRow {
    fn new(ticket: &Ticket, known: &KnownUsers) -> Self {
        Self {
            id: format!("#{}", ticket.id),
            title: truncate(&ticket.title, 40),
            status: ticket.status.colored(),
            priority: ticket.priority.colored(),
            category: ticket
                .category
                .as_ref()
                .map(|c| c.label())
                .unwrap_or_else(|| "-".to_string()),
            assignee: truncate(&resolve_assignee_name(ticket, known), 20),
            updated: ticket
                .updated_at
                .as_deref()
                .map(format_relative)
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Counts shown under the list: open covers open and assigned, done covers
/// resolved and closed.
#[derive(Debug, Default, PartialEq, Eq)]
struct TicketStats {
    total: usize,
    open: usize,
    in_progress: usize,
    done: usize,
}

impl TicketStats {
    fn count(tickets: &[Ticket]) -> Self {
        tickets.iter().fold(Self::default(), |mut stats, ticket| {
            stats.total += 1;
            match ticket.status {
                TicketStatus::Open | TicketStatus::Assigned => stats.open += 1,
                TicketStatus::InProgress => stats.in_progress += 1,
                TicketStatus::Resolved | TicketStatus::Closed => stats.done += 1,
                TicketStatus::AwaitingUser => {}
            }
            stats
        })
    }
}

pub async fn list(client: &HelpdeskClient, args: TicketListArgs) -> Result<()> {
    let viewer = client.session().require()?;
    let filters = TicketFilters {
        status: args.status,
        priority: args.priority,
        assigned_to: args.assigned_to,
        page: args.page,
    };
    let page = client.fetch_tickets(&filters).await?;
    let tickets: Vec<Ticket> = page
        .data
        .iter()
        .map(|t| ticket_for_viewer(t, viewer.role))
        .collect();

    let mut known = KnownUsers::new();
    for ticket in &tickets {
        known.learn_from(ticket);
    }

    if tickets.is_empty() && !output::is_json() {
        println!("No tickets found.");
        return Ok(());
    }

    print_table(
        &tickets,
        |t| TicketRow::new(t, &known),
        |t| format!("#{}\t{}\t{}", t.id, t.status.as_str(), t.title),
    );

    if !output::is_json() {
        let stats = TicketStats::count(&tickets);
        println!(
            "{} open  {} in progress  {} done  ({} on this page)",
            stats.open.to_string().cyan(),
            stats.in_progress.to_string().yellow(),
            stats.done.to_string().green(),
            stats.total
        );
        if page.has_more() {
            println!(
                "Page {} of {} ({} tickets). Use --page {} for more.",
                page.current_page,
                page.last_page,
                page.total,
                page.current_page + 1
            );
        }
    }
    Ok(())
}

pub async fn view(client: &HelpdeskClient, id: u64) -> Result<()> {
    let viewer = client.session().require()?;
    let ticket = ticket_for_viewer(&client.fetch_ticket(id).await?, viewer.role);

    let mut known = KnownUsers::new();
    known.learn_from(&ticket);
    known.insert(viewer.user.clone());

    print_item(&ticket, |t| print_ticket(t, &known));
    Ok(())
}

fn print_ticket(ticket: &Ticket, known: &KnownUsers) {
    println!("{} {}", format!("#{}", ticket.id).cyan(), ticket.title.bold());
    println!("{}", "-".repeat(60));
    println!("Status:     {}", ticket.status.colored());
    println!("Priority:   {}", ticket.priority.colored());
    if let Some(category) = &ticket.category {
        println!("Category:   {}", category.label());
    }
    let requester = ticket
        .owner
        .as_ref()
        .and_then(User::display_name)
        .map(String::from)
        .or_else(|| known.get(ticket.user_id).and_then(User::display_name).map(String::from))
        .unwrap_or_else(|| format!("User #{}", ticket.user_id));
    println!("Requester:  {requester}");
    println!("Assignee:   {}", resolve_assignee_name(ticket, known));
    println!("Created:    {}", date_or_dash(ticket.created_at.as_deref()));
    println!("Updated:    {}", date_or_dash(ticket.updated_at.as_deref()));
    if let Some(due) = &ticket.due_at {
        println!("Due:        {}", format_date(due));
    }
    if let Some(resolved) = &ticket.resolved_at {
        println!("Resolved:   {}", format_date(resolved));
    }
    if ticket.reopens > 0 {
        println!(
            "Reopened:   {} time{} (last {})",
            ticket.reopens,
            if ticket.reopens == 1 { "" } else { "s" },
            date_or_dash(ticket.last_reopened_at.as_deref())
        );
    }

    if !ticket.description.is_empty() {
        println!("\n{}", ticket.description);
    }

    if !ticket.responses.is_empty() {
        println!("\n{} ({})", "Responses".bold(), ticket.responses.len());
        for response in &ticket.responses {
            super::responses::print_response(response, known);
        }
    }

    let files = ticket.attachments.len()
        + ticket
            .responses
            .iter()
            .map(|r| r.attachments.len())
            .sum::<usize>();
    if files > 0 {
        println!(
            "\n{} file{} attached. See `helpdesk ticket attachments {}`.",
            files,
            if files == 1 { "" } else { "s" },
            ticket.id
        );
    }
    if can_mutate(ticket) || !can_reopen(ticket) {
        return;
    }
    println!(
        "\n{}",
        format!(
            "This ticket is {}. Run `helpdesk ticket reopen {}` to work on it again.",
            ticket.status.label().to_lowercase(),
            ticket.id
        )
        .dimmed()
    );
}

fn required_fields(title: &str, description: &str) -> Result<(String, String)> {
    let (title, description) = (title.trim(), description.trim());
    if title.is_empty() || description.is_empty() {
        return Err(HelpdeskError::guard("A ticket needs a title and a description."));
    }
    Ok((title.to_string(), description.to_string()))
}

pub async fn create(
    client: &Arc<HelpdeskClient>,
    config: &Config,
    args: TicketCreateArgs,
) -> Result<()> {
    let viewer = client.session().require()?;
    let (title, description) = required_fields(&args.title, &args.description)?;
    let uploads = UploadSet::from_paths(&args.attachments)?;

    let on_behalf_of = match args.on_behalf_of.as_deref() {
        Some(term) => {
            ensure_admin(&viewer, "open tickets for other users")?;
            let api: Arc<dyn TicketApi> = client.clone();
            match pick_user(api, config, Some(term), |_| true).await? {
                Some(user) => Some(user),
                None => {
                    output::print_message("Cancelled.");
                    return Ok(());
                }
            }
        }
        None => None,
    };

    let new_ticket = NewTicket {
        title,
        description,
        priority: args.priority,
        ticket_category_id: args.category,
        user_id: on_behalf_of.as_ref().map(|u| u.id),
    };
    let ticket = client.create_ticket(&new_ticket, uploads.as_slice()).await?;
    drop(uploads);
    let ticket = ticket_for_viewer(&ticket, viewer.role);

    if output::is_json() {
        output::print_json(&ticket);
        return Ok(());
    }
    let owner = on_behalf_of
        .as_ref()
        .and_then(User::display_name)
        .map(|name| format!(" for {name}"))
        .unwrap_or_default();
    output::print_message(&format!(
        "Created ticket #{}{}: {}",
        ticket.id, owner, ticket.title
    ));
    Ok(())
}

/// Load the ticket and run the change through the reconciler. The view is
/// returned either way so the caller can show what is in effect.
async fn reconcile(
    api: &dyn TicketApi,
    viewer: &AuthUser,
    id: u64,
    mutation: Mutation,
) -> Result<(TicketView, Result<()>)> {
    let mut view = TicketView::load(api, id).await?;
    let outcome = submit_mutation(api, &mut view, viewer, mutation).await;
    Ok((view, outcome))
}

/// The reconciled ticket, cut down to what the acting user may see.
fn shown(view: &TicketView, viewer: &AuthUser) -> Ticket {
    ticket_for_viewer(view.ticket(), viewer.role)
}

pub async fn mutate(client: &HelpdeskClient, id: u64, mutation: Mutation) -> Result<()> {
    let viewer = client.session().require()?;
    let (view, outcome) = reconcile(client, &viewer, id, mutation.clone()).await?;

    let mut known = KnownUsers::new();
    known.learn_from(view.confirmed());

    if let Err(e) = outcome {
        // Set only when the server refused and the view rolled back.
        if view.last_error().is_some() && !output::is_json() {
            eprintln!("Ticket #{id} unchanged:\n{}", summary(view.confirmed(), &known));
        }
        return Err(e);
    }

    print_item(&shown(&view, &viewer), |t| {
        output::print_message(&format!("Ticket #{} updated ({mutation})", t.id));
        println!("{}", summary(t, &known));
    });
    Ok(())
}

fn summary(ticket: &Ticket, known: &KnownUsers) -> String {
    let category = ticket
        .category
        .as_ref()
        .map(|c| c.label())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "  {} | {} | {} | {}",
        ticket.status.colored(),
        ticket.priority.colored(),
        category,
        resolve_assignee_name(ticket, known)
    )
}

pub async fn assign(
    client: &Arc<HelpdeskClient>,
    config: &Config,
    id: u64,
    user_id: Option<u64>,
) -> Result<()> {
    let viewer = client.session().require()?;
    ensure_admin(&viewer, "assign tickets")?;

    let ticket = client.fetch_ticket(id).await?;
    ensure_mutable(&ticket, "reassign")?;

    let staff = client.list_staff().await?;
    let mut known_staff: KnownUsers = staff.iter().cloned().collect();
    known_staff.learn_from(&ticket);
    let mut picker = AssigneePicker::open(&ticket, staff);

    match user_id {
        Some(user_id) => picker.select(user_id)?,
        None => {
            println!(
                "Currently assigned to {}.",
                resolve_assignee_name(&ticket, &known_staff)
            );

            picker.reassign();
            let candidate_ids: Vec<u64> = picker.candidates().iter().map(|u| u.id).collect();
            let api: Arc<dyn TicketApi> = client.clone();
            let chosen = pick_user(api, config, None, |u| candidate_ids.contains(&u.id)).await?;
            let Some(user) = chosen else {
                output::print_message("No change.");
                return Ok(());
            };
            picker.select(user.id)?;
        }
    }

    let selected = picker.selected();
    match picker.into_mutation() {
        Some(mutation) => mutate(client, id, mutation).await,
        None => {
            let name = selected
                .map(|user_id| resolve_user_name(Some(&UserRef::Id(user_id)), &known_staff))
                .unwrap_or_else(|| "nobody".to_string());
            output::print_message(&format!("Ticket #{id} is already assigned to {name}."));
            Ok(())
        }
    }
}

pub async fn delete(client: &HelpdeskClient, id: u64, yes: bool) -> Result<()> {
    client.session().require()?;
    if !yes && !confirm(&format!("Delete ticket #{id}? This cannot be undone."))? {
        println!("Aborted.");
        return Ok(());
    }
    client.delete_ticket(id).await?;
    output::print_message(&format!("Deleted ticket #{id}"));
    Ok(())
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Assigned to")]
    assigned_to: String,
    #[tabled(rename = "Assigned by")]
    assigned_by: String,
    #[tabled(rename = "When")]
    when: String,
}

pub async fn history(client: &HelpdeskClient, id: u64) -> Result<()> {
    let ticket = client.fetch_ticket(id).await?;
    let mut known = KnownUsers::new();
    known.learn_from(&ticket);

    if output::is_json() {
        output::print_json(&ticket.assignments);
        return Ok(());
    }
    if ticket.assignments.is_empty() {
        println!("Ticket #{id} has never been assigned.");
        return Ok(());
    }

    let entries: Vec<_> = ticket.assignments.iter().cloned().collect();
    print_table(
        &entries,
        |entry| {
            let (assigned_to, assigned_by) = resolve_history_names(entry, &known);
            HistoryRow {
                assigned_to,
                assigned_by,
                when: date_or_dash(entry.created_at.as_deref()),
            }
        },
        |entry| {
            let (to, by) = resolve_history_names(entry, &known);
            format!("{}\t{to}\t{by}", entry.created_at.as_deref().unwrap_or("-"))
        },
    );
    Ok(())
}
