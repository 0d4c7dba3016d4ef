use colored::Colorize;

use super::prompt;
use crate::api::TicketApi;
use crate::cli::RegisterArgs;
use crate::client::HelpdeskClient;
use crate::error::{HelpdeskError, Result};
use crate::output::{self, print_item};
use crate::responses::{Credentials, Registration};
use crate::session::AuthUser;

/// Read from `HELPDESK_PASSWORD` when set, otherwise ask.
fn password(label: &str) -> Result<String> {
    if let Ok(password) = std::env::var("HELPDESK_PASSWORD") {
        return Ok(password);
    }
    let password = prompt(label)?;
    if password.is_empty() {
        return Err(HelpdeskError::guard("A password is required."));
    }
    Ok(password)
}

pub async fn login(client: &HelpdeskClient, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    if email.is_empty() {
        return Err(HelpdeskError::guard("An email is required."));
    }

    let credentials = Credentials {
        email,
        password: password("Password: ")?,
    };
    let login = client.authenticate(&credentials).await?;
    let user = client.session().establish(login.jwt, login.user)?;

    output::print_message(&format!(
        "Logged in as {} ({})",
        user.display_name(),
        user.role.label()
    ));
    Ok(())
}

pub async fn register(client: &HelpdeskClient, args: RegisterArgs) -> Result<()> {
    let password = password("Password: ")?;
    let confirmation = match std::env::var("HELPDESK_PASSWORD") {
        Ok(_) => password.clone(),
        Err(_) => prompt("Confirm password: ")?,
    };
    if password != confirmation {
        return Err(HelpdeskError::guard("Passwords do not match."));
    }

    let registration = Registration {
        name: args.name,
        email: args.email,
        password,
        password_confirmation: confirmation,
        phone: args.phone,
        employee_id: args.employee_id,
        department: args.department,
    };
    let login = client.register(&registration).await?;
    let user = client.session().establish(login.jwt, login.user)?;

    output::print_message(&format!("Account created. Logged in as {}", user.display_name()));
    Ok(())
}

pub fn logout(client: &HelpdeskClient) -> Result<()> {
    if !client.session().is_authenticated() {
        output::print_message("Not logged in.");
        return Ok(());
    }
    client.session().clear();
    output::print_message("Logged out.");
    Ok(())
}

pub fn whoami(client: &HelpdeskClient) -> Result<()> {
    let user = client.session().require()?;
    print_item(&user, print_user);
    Ok(())
}

fn print_user(user: &AuthUser) {
    println!("{}", user.display_name().bold());
    println!("{}", "-".repeat(40));
    println!("ID:         {}", user.id());
    println!("Role:       {}", user.role.colored());
    if let Some(email) = &user.user.email {
        println!("Email:      {email}");
    }
    if let Some(profile) = user.user.profile_name() {
        println!("Profile:    {profile}");
    }
    if let Some(department) = &user.user.department {
        println!("Department: {department}");
    }
    if let Some(employee_id) = &user.user.employee_id {
        println!("Employee:   {employee_id}");
    }
}
