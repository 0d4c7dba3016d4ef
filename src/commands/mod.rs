pub mod attachments;
pub mod auth;
pub mod categories;
pub mod init;
pub mod responses;
pub mod tickets;
pub mod users;

use std::io::{self, Write};

use crate::error::{FieldErrors, Result};

/// Server field names and the argument that supplies each.
const FORM_FIELDS: &[(&str, &str)] = &[
    ("title", "--title"),
    ("description", "--description"),
    ("priority", "--priority"),
    ("ticket_category_id", "--category"),
    ("attachments", "--attach"),
    ("body", "<BODY>"),
    ("internal", "--internal"),
    ("name", "--name"),
    ("email", "--email"),
    ("password", "password"),
];

/// Print a label and read one trimmed line from stdin.
pub(crate) fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub(crate) fn confirm(question: &str) -> Result<bool> {
    Ok(prompt(&format!("{question} [y/N] "))?.eq_ignore_ascii_case("y"))
}

/// Print validation messages next to the argument they belong to.
pub(crate) fn report_validation(errors: &FieldErrors) {
    for line in validation_lines(errors) {
        eprintln!("  {line}");
    }
}

fn validation_lines(errors: &FieldErrors) -> Vec<String> {
    let mut lines: Vec<String> = FORM_FIELDS
        .iter()
        .filter_map(|(field, arg)| {
            let messages = errors.for_field(field);
            (!messages.is_empty()).then(|| format!("{arg}: {}", messages.join("; ")))
        })
        .collect();

    lines.extend(
        errors
            .fields()
            .filter(|(field, _)| !FORM_FIELDS.iter().any(|(known, _)| known == field))
            .map(|(field, messages)| format!("{field}: {}", messages.join("; "))),
    );
    lines
}
