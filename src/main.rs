use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dialoguer::{Input, Password, Select};
use log::info;

use smartsecure::config::{self, Settings};
use smartsecure::error::AuthError;
use smartsecure::models::Role;
use smartsecure::notify::ConsoleNotifier;
use smartsecure::security::capture::ConsoleCapture;
use smartsecure::store::memory::InMemoryStore;
use smartsecure::{AuthPolicy, AuthService};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a KEY=VALUE configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    smartsecure::utils::logging::init_logger();

    let cli = Cli::parse();
    let settings = config::load_config(cli.config.as_deref())?;
    info!("engine configured, model path {}", settings.model_path.display());

    let store = Arc::new(InMemoryStore::new());
    let service = AuthService::new(
        store,
        Arc::new(ConsoleNotifier),
        AuthPolicy::from(&settings),
    );

    println!("=== SmartSecure System ===");
    println!("A trusted student platform with layered authentication");

    loop {
        let choice = Select::new()
            .with_prompt("Select an option")
            .items(&["Sign Up", "Sign In", "Exit"])
            .default(0)
            .interact()?;

        match choice {
            0 => sign_up(&service, &settings).await?,
            1 => sign_in(&service, &settings).await?,
            _ => {
                println!("Exiting...");
                break;
            }
        }
    }

    Ok(())
}

async fn sign_up(service: &AuthService, settings: &Settings) -> Result<()> {
    let role = prompt_role()?;
    if role == Role::Admin {
        let passphrase = Password::new().with_prompt("Admin Passphrase").interact()?;
        if passphrase != settings.admin_passphrase {
            println!("Wrong passphrase!");
            return Ok(());
        }
    }

    let email: String = Input::new().with_prompt("Email").interact_text()?;
    let name: String = Input::new().with_prompt("Name").interact_text()?;
    let password = Password::new().with_prompt("Set password").interact()?;
    let phrase: String = Input::new()
        .with_prompt(format!(
            "Enrollment phrase (optional, default '{}')",
            settings.target_phrase
        ))
        .allow_empty(true)
        .interact_text()?;
    let phrase = Some(phrase.trim()).filter(|p| !p.is_empty());

    if role == Role::Student {
        println!(
            "Type '{}' {} times (press Enter after each):",
            phrase.unwrap_or(&settings.target_phrase),
            settings.enroll_samples
        );
    }

    let mut capture = ConsoleCapture;
    match service
        .register(role.as_str(), &email, &name, &password, phrase, &mut capture)
        .await
    {
        Ok(account_id) => println!("Registration successful! Your ID: {}", account_id),
        Err(e) => report(&e),
    }
    Ok(())
}

async fn sign_in(service: &AuthService, settings: &Settings) -> Result<()> {
    let role = prompt_role()?;
    let email: String = Input::new().with_prompt("Email").interact_text()?;
    let account_id: String = Input::new().with_prompt("User ID").interact_text()?;
    let password = Password::new().with_prompt("Password").interact()?;

    if role == Role::Student {
        println!(
            "Type '{}' {} times (press Enter after each):",
            settings.target_phrase, settings.login_samples
        );
    }

    let mut capture = ConsoleCapture;
    match service
        .login(role.as_str(), &email, &account_id, &password, &mut capture)
        .await
    {
        Ok(account) => {
            println!("Login successful! Welcome, {}.", account.name);
            if account.role == Role::Admin {
                admin_menu(service).await?;
            }
        }
        Err(e) => report(&e),
    }
    Ok(())
}

async fn admin_menu(service: &AuthService) -> Result<()> {
    loop {
        let choice = Select::new()
            .with_prompt("Admin menu")
            .items(&["Train typing model", "Logout"])
            .default(0)
            .interact()?;

        match choice {
            0 => match service.train_classifier().await {
                Ok(count) => println!("Typing model trained over {} profiles.", count),
                Err(e) => println!("{}", e),
            },
            _ => {
                println!("Logging out...");
                break;
            }
        }
    }
    Ok(())
}

fn prompt_role() -> Result<Role> {
    let index = Select::new()
        .with_prompt("Role")
        .items(&["admin", "student"])
        .default(1)
        .interact()?;
    Ok(if index == 0 { Role::Admin } else { Role::Student })
}

fn report(err: &AuthError) {
    println!("{}", err);
    if let AuthError::FactorFailed {
        advisory: Some(message),
        ..
    } = err
    {
        println!("{}", message);
    }
}
