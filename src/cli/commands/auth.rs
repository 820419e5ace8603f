use clap::Subcommand;
use serde_json::json;

use crate::api::RegisterRequest;
use crate::auth::Role;
use crate::cli::config::{clear_session, load_session, save_session, CliSession};
use crate::cli::utils::{authenticated_client, client, output_success, read_line};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Sign in with email or username")]
    Login {
        #[arg(help = "Email or username")]
        identifier: String,
        #[arg(long, env = "PORTAL_PASSWORD", help = "Password (read from stdin if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Forget the stored session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Show the signed-in user's profile")]
    Whoami,

    #[command(about = "Register a new account")]
    Register {
        #[arg(help = "Full name")]
        full_name: String,
        #[arg(help = "Username")]
        username: String,
        #[arg(help = "Email")]
        email: String,
        #[arg(long, default_value = "murid", help = "Role: admin, guru or murid")]
        role: Role,
        #[arg(long, env = "PORTAL_PASSWORD", help = "Password (read from stdin if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Activate an account with the emailed code")]
    Activate {
        #[arg(help = "Activation code")]
        code: String,
    },
}

pub async fn handle(cmd: AuthCommands, api_url: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { identifier, password } => {
            let password = match password {
                Some(p) => p,
                None => read_line("Password: ")?,
            };

            let client = client(api_url)?;
            let user = client.authorize(&identifier, &password).await?;
            let (email, role) = (user.email.clone(), user.role.clone());
            save_session(&CliSession::signed_in(client.base_url(), user))?;

            output_success(
                &output_format,
                &format!("Signed in as {} ({})", email, role),
                Some(json!({ "email": email, "role": role })),
            )
        }
        AuthCommands::Logout => {
            let removed = clear_session()?;
            let message = if removed { "Signed out" } else { "No stored session" };
            output_success(&output_format, message, None)
        }
        AuthCommands::Status => {
            let session = load_session()?;
            match (&session.user, session.is_signed_in()) {
                (Some(user), true) => match output_format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&json!({
                            "signed_in": true,
                            "base_url": session.base_url,
                            "user": user,
                            "logged_in_at": session.logged_in_at,
                        }))?);
                        Ok(())
                    }
                    OutputFormat::Text => {
                        println!("Signed in as {} <{}> ({})", user.full_name, user.email, user.role);
                        if let Some(url) = &session.base_url {
                            println!("Server: {}", url);
                        }
                        if let Some(at) = session.logged_in_at {
                            println!("Since: {}", at.to_rfc3339());
                        }
                        Ok(())
                    }
                },
                _ => match output_format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&json!({ "signed_in": false }))?);
                        Ok(())
                    }
                    OutputFormat::Text => {
                        println!("Not signed in");
                        Ok(())
                    }
                },
            }
        }
        AuthCommands::Whoami => {
            let profile = authenticated_client(api_url)?.profile().await?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&profile)?),
                OutputFormat::Text => {
                    println!("{} <{}>", profile.full_name, profile.email);
                    println!("Username: {}", profile.username);
                    println!("Role: {}", profile.role);
                    println!("Active: {}", profile.is_active);
                }
            }
            Ok(())
        }
        AuthCommands::Register { full_name, username, email, role, password } => {
            let password = match password {
                Some(p) => p,
                None => read_line("Password: ")?,
            };
            let request = RegisterRequest {
                full_name,
                username,
                email: email.clone(),
                confirm_password: password.clone(),
                password,
                role: role.to_string(),
            };
            client(api_url)?.register(&request).await?;
            output_success(
                &output_format,
                &format!("Registered {}; check the inbox for the activation code", email),
                Some(json!({ "email": email, "role": role.as_str() })),
            )
        }
        AuthCommands::Activate { code } => {
            client(api_url)?.activate(&code).await?;
            output_success(&output_format, "Account activated", None)
        }
    }
}
