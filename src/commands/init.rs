use url::Url;

use super::{confirm, prompt};
use crate::config::Config;
use crate::error::{HelpdeskError, Result};

const DEFAULT_API_URL: &str = "http://localhost:8000/api";

pub async fn run() -> Result<()> {
    let config_path = Config::config_path()?;

    if config_path.exists()
        && !confirm(&format!(
            "Config file already exists at {}. Overwrite?",
            config_path.display()
        ))?
    {
        println!("Aborted.");
        return Ok(());
    }

    println!("Helpdesk CLI Configuration");
    println!("==========================\n");

    let api_url = prompt(&format!("API base URL [{DEFAULT_API_URL}]: "))?;
    let api_url = if api_url.is_empty() {
        DEFAULT_API_URL.to_string()
    } else {
        api_url
    };
    match Url::parse(&api_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => return Err(HelpdeskError::InvalidUrl(api_url)),
    }

    let debounce = prompt("Search debounce in ms [300]: ")?;
    let debounce = if debounce.is_empty() {
        None
    } else {
        Some(
            debounce
                .parse::<u64>()
                .map_err(|_| HelpdeskError::guard(format!("Not a number: {debounce}")))?,
        )
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HelpdeskError::ConfigRead {
            path: config_path.clone(),
            source: e,
        })?;
    }

    std::fs::write(&config_path, render(&api_url, debounce)).map_err(|e| {
        HelpdeskError::ConfigRead {
            path: config_path.clone(),
            source: e,
        }
    })?;

    println!("\nConfig saved to {}", config_path.display());
    println!("Next: run 'helpdesk login'.");

    Ok(())
}

fn render(api_url: &str, search_debounce_ms: Option<u64>) -> String {
    let mut content = format!("api_url = \"{api_url}\"\n");
    if let Some(ms) = search_debounce_ms {
        content.push_str(&format!("search_debounce_ms = {ms}\n"));
    }
    content
}
