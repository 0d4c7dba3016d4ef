use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::types::{Priority, TicketStatus};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Compact,
}

#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(about = "A CLI for the help-desk ticketing service", version)]
#[command(after_help = "EXAMPLES:
    helpdesk login --email ana@example.com     Sign in
    helpdesk tickets --status open             List open tickets
    helpdesk ticket view 42                    Show a ticket with its replies
    helpdesk ticket assign 42                  Pick an assignee interactively
    helpdesk ticket respond 42 \"On it\"         Reply to a ticket")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (table, json, compact)
    #[arg(long, short = 'o', global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Output as JSON (alias for --format json)
    #[arg(long, global = true, hide = true)]
    pub json: bool,

    /// Suppress success messages
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Show debug logs and detailed error information
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Get the effective output format, considering --json flag
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    #[command(after_help = "EXAMPLES:
    helpdesk login
    helpdesk login --email ana@example.com")]
    Login {
        /// Account email (prompted when omitted)
        #[arg(long, short)]
        email: Option<String>,
    },
    /// Create an account and sign in
    Register(RegisterArgs),
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user and role
    Whoami,
    /// Manage tickets
    #[command(
        alias = "t",
        after_help = "EXAMPLES:
    helpdesk ticket list --status in_progress
    helpdesk ticket create -t \"VPN down\" -d \"Since 9am\" --priority high
    helpdesk ticket priority 42 urgent
    helpdesk ticket reopen 42"
    )]
    Ticket {
        #[command(subcommand)]
        action: TicketCommands,
    },
    /// List tickets (alias for 'ticket list')
    #[command(after_help = "EXAMPLES:
    helpdesk tickets
    helpdesk tickets --status open --priority urgent
    helpdesk tickets --assigned-to 7 --page 2")]
    Tickets(TicketListArgs),
    /// Download or delete attachments
    Attachment {
        #[command(subcommand)]
        action: AttachmentCommands,
    },
    /// Look up users
    Users {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// List active ticket categories
    Categories,
    /// Generate shell completions
    #[command(after_help = "EXAMPLES:
    helpdesk completions bash > ~/.bash_completion.d/helpdesk
    helpdesk completions zsh > ~/.zfunc/_helpdesk")]
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
    /// Initialize configuration file interactively
    Init,
}

#[derive(Subcommand)]
pub enum TicketCommands {
    /// List tickets
    List(TicketListArgs),
    /// Show a ticket with its visible replies
    View {
        /// Ticket number
        id: u64,
    },
    /// Open a new ticket
    #[command(after_help = "EXAMPLES:
    helpdesk ticket create -t \"Printer jam\" -d \"Third floor\"
    helpdesk ticket create -t \"Laptop\" -d \"Screen\" --attach photo.jpg --category 3
    helpdesk ticket create -t \"Access\" -d \"VPN\" --on-behalf-of ana")]
    Create(TicketCreateArgs),
    /// Change the status (administrators)
    Status {
        id: u64,
        #[arg(value_enum)]
        status: TicketStatus,
    },
    /// Change the priority (administrators)
    Priority {
        id: u64,
        #[arg(value_enum)]
        priority: Priority,
    },
    /// Change or clear the category (administrators)
    Category {
        id: u64,
        /// Category id (see `helpdesk categories`)
        #[arg(required_unless_present = "clear")]
        category: Option<u64>,
        /// Remove the category
        #[arg(long, conflicts_with = "category")]
        clear: bool,
    },
    /// Assign to a staff member; opens a search picker without a user id
    Assign {
        id: u64,
        user_id: Option<u64>,
    },
    /// Reopen a resolved or closed ticket
    Reopen { id: u64 },
    /// Delete a ticket
    Delete {
        id: u64,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Reply to a ticket
    #[command(after_help = "EXAMPLES:
    helpdesk ticket respond 42 \"Restarted the router\"
    helpdesk ticket respond 42 \"Escalated to vendor\" --internal
    helpdesk ticket respond 42 \"Screenshot attached\" --attach error.png")]
    Respond(RespondArgs),
    /// List the replies you can see
    Responses { id: u64 },
    /// Show the assignment history
    History { id: u64 },
    /// List files attached to a ticket and its replies
    Attachments { id: u64 },
}

#[derive(Subcommand)]
pub enum AttachmentCommands {
    /// Save an attachment to disk
    Download {
        /// Attachment id
        id: u64,
        /// Output file or directory (default: current directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Remove an attachment from an active ticket
    Delete {
        /// Ticket the attachment belongs to
        ticket_id: u64,
        /// Attachment id
        attachment_id: u64,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Search active users by name, email, department or employee id
    Search {
        term: String,
        /// Maximum number of results (default from config)
        #[arg(long, short)]
        limit: Option<u32>,
    },
}

#[derive(Args, Clone, Debug, Default)]
pub struct TicketListArgs {
    #[arg(long, value_enum)]
    pub status: Option<TicketStatus>,

    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    /// Only tickets assigned to this user id
    #[arg(long)]
    pub assigned_to: Option<u64>,

    #[arg(long)]
    pub page: Option<u32>,
}

#[derive(Args)]
pub struct TicketCreateArgs {
    #[arg(long, short)]
    pub title: String,

    #[arg(long, short)]
    pub description: String,

    #[arg(long, value_enum, default_value = "medium")]
    pub priority: Priority,

    /// Category id
    #[arg(long)]
    pub category: Option<u64>,

    /// File to attach (repeatable, up to 5)
    #[arg(long = "attach", value_name = "FILE")]
    pub attachments: Vec<PathBuf>,

    /// File for another user, found by search (administrators)
    #[arg(long, value_name = "TERM")]
    pub on_behalf_of: Option<String>,
}

#[derive(Args)]
pub struct RespondArgs {
    pub id: u64,

    pub body: String,

    /// Staff-only note, hidden from the requester
    #[arg(long)]
    pub internal: bool,

    /// File to attach (repeatable, up to 5)
    #[arg(long = "attach", value_name = "FILE")]
    pub attachments: Vec<PathBuf>,
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub employee_id: Option<String>,

    #[arg(long)]
    pub department: Option<String>,
}
