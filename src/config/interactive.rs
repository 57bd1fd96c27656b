use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password};
use std::path::Path;

use super::settings::Config;

/// Interactively edit and save the configuration.
///
/// Prompts for the values an operator actually has to supply by hand (API
/// key, forum cookies, bind address); everything else keeps its current
/// value and can be edited in `config.toml` directly.
#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<Config> {
    let mut config = Config::load(config_dir).context("Failed to load existing configuration")?;

    println!(
        "{}",
        style(format!("Configuring {}", config.app_name)).bold()
    );
    println!("Config file: {}", config.config_file_path().display());
    println!();

    let api_key: String = Password::new()
        .with_prompt("API key for the hosted LLM endpoint (blank keeps current)")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.api.api_key = api_key.trim().to_string();
    }

    let auth_token: String = Input::new()
        .with_prompt("Forum `_t` auth cookie")
        .default(config.forum.auth_token.clone())
        .allow_empty(true)
        .interact_text()
        .context("Failed to read forum auth cookie")?;
    config.forum.auth_token = auth_token.trim().to_string();

    let session_token: String = Input::new()
        .with_prompt("Forum `_forum_session` cookie")
        .default(config.forum.session_token.clone())
        .allow_empty(true)
        .interact_text()
        .context("Failed to read forum session cookie")?;
    config.forum.session_token = session_token.trim().to_string();

    let bind: String = Input::new()
        .with_prompt("Server bind address")
        .default(config.server.bind.clone())
        .interact_text()
        .context("Failed to read bind address")?;
    config.server.bind = bind.trim().to_string();

    config.debug = Confirm::new()
        .with_prompt("Enable debug output?")
        .default(config.debug)
        .interact()
        .context("Failed to read debug flag")?;

    config.save().context("Failed to save configuration")?;
    println!();
    println!("{}", style("Configuration saved.").green());

    Ok(config)
}

/// Print the current configuration, masking the secrets.
#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    println!("{}", style(&config.app_name).bold());
    println!("Config file: {}", config.config_file_path().display());
    println!();
    println!("Server bind:        {}", config.server.bind);
    println!("Static dir:         {}", config.server.static_dir.display());
    println!("API base URL:       {}", config.api.base_url);
    println!("API key:            {}", mask(&config.api.api_key));
    println!("Embedding model:    {}", config.api.embedding_model);
    println!("Chat model:         {}", config.api.chat_model);
    println!("Embedding dim:      {}", config.api.embedding_dimension);
    println!("Forum base URL:     {}", config.forum.base_url);
    println!("Forum auth cookie:  {}", mask(&config.forum.auth_token));
    println!("Forum session:      {}", mask(&config.forum.session_token));
    println!(
        "Embeddings file:    {}",
        config.paths.embeddings_file.display()
    );
    println!("API log dir:        {}", config.paths.api_log_dir.display());
    println!(
        "Question log dir:   {}",
        config.paths.question_log_dir.display()
    );
    println!("Debug:              {}", config.debug);

    Ok(())
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        "(unset)".to_string()
    } else {
        format!("{}…", &secret.chars().take(4).collect::<String>())
    }
}
