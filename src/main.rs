mod api;
mod cli;
mod client;
mod commands;
mod config;
mod error;
mod output;
mod responses;
mod search;
mod session;
mod types;
mod upload;
mod workflow;

use std::error::Error;
use std::io;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{AttachmentCommands, Cli, Commands, TicketCommands, UserCommands};
use client::HelpdeskClient;
use config::Config;
use error::{HelpdeskError, Result};
use session::{FileStorage, SessionStore};
use workflow::Mutation;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    init_tracing(verbose);

    if let Err(e) = run(cli).await {
        if e.is_guard_violation() {
            eprintln!("{} {e}", "Not allowed:".yellow());
        } else {
            eprintln!("Error: {e}");
        }

        if let HelpdeskError::ValidationFailed { errors, .. } = &e {
            commands::report_validation(errors);
        }

        // Show error chain if verbose flag was passed
        if verbose {
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("Caused by: {cause}");
                source = cause.source();
            }
        }

        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "helpdesk_cli=debug" } else { "warn" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default.into());

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    // Set global output format
    output::set_format(cli.output_format());
    output::set_quiet(cli.quiet);

    match cli.command {
        // Commands that don't need a session or client
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "helpdesk", &mut io::stdout());
        }
        Commands::Init => {
            commands::init::run().await?;
        }
        command => {
            let config = Config::load()?;
            let session = Arc::new(match Config::session_path() {
                Ok(path) => SessionStore::restore(Box::new(FileStorage::new(path))),
                Err(e) => {
                    warn!("session will not persist: {e}");
                    SessionStore::in_memory()
                }
            });
            let client = Arc::new(HelpdeskClient::new(&config, Arc::clone(&session))?);

            let was_authenticated = session.is_authenticated();
            let mut session_changes = session.subscribe();

            let result = dispatch(command, &client, &config).await;

            // A 401 on a regular call drops the session; send the user back to login.
            if was_authenticated
                && session_changes.has_changed().unwrap_or(false)
                && !session_changes.borrow_and_update().authenticated
                && matches!(result, Err(HelpdeskError::Unauthorized { .. }))
            {
                eprintln!(
                    "{}",
                    "Your session has expired. Run `helpdesk login` to sign in again.".yellow()
                );
            }
            result?;
        }
    }

    Ok(())
}

async fn dispatch(
    command: Commands,
    client: &Arc<HelpdeskClient>,
    config: &Config,
) -> Result<()> {
    match command {
        Commands::Login { email } => commands::auth::login(client, email).await,
        Commands::Register(args) => commands::auth::register(client, args).await,
        Commands::Logout => commands::auth::logout(client),
        Commands::Whoami => commands::auth::whoami(client),
        Commands::Tickets(args) => commands::tickets::list(client, args).await,
        Commands::Ticket { action } => match action {
            TicketCommands::List(args) => commands::tickets::list(client, args).await,
            TicketCommands::View { id } => commands::tickets::view(client, id).await,
            TicketCommands::Create(args) => commands::tickets::create(client, config, args).await,
            TicketCommands::Status { id, status } => {
                commands::tickets::mutate(client, id, Mutation::Status(status)).await
            }
            TicketCommands::Priority { id, priority } => {
                commands::tickets::mutate(client, id, Mutation::Priority(priority)).await
            }
            TicketCommands::Category { id, category, clear } => {
                let category = if clear { None } else { category };
                commands::tickets::mutate(client, id, Mutation::Category(category)).await
            }
            TicketCommands::Assign { id, user_id } => {
                commands::tickets::assign(client, config, id, user_id).await
            }
            TicketCommands::Reopen { id } => {
                commands::tickets::mutate(client, id, Mutation::Reopen).await
            }
            TicketCommands::Delete { id, yes } => commands::tickets::delete(client, id, yes).await,
            TicketCommands::Respond(args) => commands::responses::respond(client, args).await,
            TicketCommands::Responses { id } => commands::responses::list(client, id).await,
            TicketCommands::History { id } => commands::tickets::history(client, id).await,
            TicketCommands::Attachments { id } => commands::attachments::list(client, id).await,
        },
        Commands::Attachment { action } => match action {
            AttachmentCommands::Download { id, output } => {
                commands::attachments::download(client, id, output).await
            }
            AttachmentCommands::Delete {
                ticket_id,
                attachment_id,
            } => commands::attachments::delete(client, ticket_id, attachment_id).await,
        },
        Commands::Users { action } => match action {
            UserCommands::Search { term, limit } => {
                commands::users::search(client, config, &term, limit).await
            }
        },
        Commands::Categories => commands::categories::list(client).await,
        // Handled before the client is built
        Commands::Completions { .. } | Commands::Init => Ok(()),
    }
}
