//! Command-line parsing and the command implementations.

use std::io::{self, Write};

use anyhow::{bail, Result};
use authkeep_core::{
    Config, Credentials, PasswordChange, ProfileUpdate, Registration, SessionPhase, SessionStore,
};

pub const USAGE: &str = "\
Usage: authkeep <command>

Commands:
  login [username]                     Sign in and remember the session
  register                             Create an account (does not sign in)
  logout                               Forget the session
  whoami                               Show the signed-in user
  status                               Show session state without contacting the server
  passwd                               Change your password
  profile [--email <e>] [--username <u>]  Update your profile
  help                                 Show this message

Environment:
  AUTHKEEP_BASE_URL       Service URL (overrides config)
  AUTHKEEP_TOKEN_BACKEND  file | keyring | memory | none
  AUTHKEEP_LOG_DIR        Also write logs to daily files in this directory
  RUST_LOG                Log filter (default: warn)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: Option<String> },
    Register,
    Logout,
    Whoami,
    Status,
    Passwd,
    Profile(ProfileArgs),
    Help,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileArgs {
    pub email: Option<String>,
    pub username: Option<String>,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some(name) = args.first() else {
            return Ok(Command::Help);
        };
        let rest = &args[1..];

        let command = match name.as_str() {
            "login" => Command::Login {
                username: rest.first().cloned(),
            },
            "register" => Command::Register,
            "logout" => Command::Logout,
            "whoami" => Command::Whoami,
            "status" => Command::Status,
            "passwd" => Command::Passwd,
            "profile" => Command::Profile(Self::parse_profile(rest)?),
            "help" | "-h" | "--help" => Command::Help,
            other => bail!("Unknown command: {}\n\n{}", other, USAGE),
        };
        Ok(command)
    }

    fn parse_profile(args: &[String]) -> Result<ProfileArgs> {
        let mut parsed = ProfileArgs::default();
        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let value = iter
                .next()
                .ok_or_else(|| anyhow::anyhow!("Missing value for {}", flag))?
                .clone();
            match flag.as_str() {
                "--email" => parsed.email = Some(value),
                "--username" => parsed.username = Some(value),
                other => bail!("Unknown profile option: {}", other),
            }
        }
        if parsed.email.is_none() && parsed.username.is_none() {
            bail!("profile needs --email and/or --username");
        }
        Ok(parsed)
    }

    /// Route the command runs on, as seen by the request pipeline
    pub fn route(&self, config: &Config) -> String {
        match self {
            Command::Login { .. } => config.routes.login.clone(),
            Command::Register => config.routes.register.clone(),
            Command::Logout => "/cli/logout".to_string(),
            Command::Whoami => "/cli/whoami".to_string(),
            Command::Status => "/cli/status".to_string(),
            Command::Passwd => "/cli/passwd".to_string(),
            Command::Profile(_) => "/cli/profile".to_string(),
            Command::Help => "/cli".to_string(),
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    Ok(rpassword::prompt_password(format!("{}: ", label))?)
}

/// Run a command. Returns whether it succeeded.
pub async fn run(session: &SessionStore, command: Command) -> Result<bool> {
    match command {
        Command::Help => {
            println!("{}", USAGE);
            Ok(true)
        }
        Command::Status => {
            session.dispose();
            let state = session.snapshot();
            let label = match state.phase() {
                SessionPhase::Unauthenticated => "signed out",
                SessionPhase::Pending | SessionPhase::Authenticated => "token stored",
            };
            println!("Session: {} ({} store)", label, session.api().tokens().name());
            Ok(true)
        }
        Command::Login { username } => {
            session.dispose();
            let username = match username {
                Some(u) => u,
                None => prompt("Username")?,
            };
            let password = prompt_password("Password")?;
            if username.is_empty() || password.is_empty() {
                eprintln!("Username and password required");
                return Ok(false);
            }

            if session.login(&Credentials::new(username, password)).await {
                if let Some(user) = session.user() {
                    println!("Signed in as {}", user.display_name());
                }
                Ok(true)
            } else {
                eprintln!("Login failed. Check your username and password.");
                Ok(false)
            }
        }
        Command::Register => {
            session.dispose();
            let username = prompt("Username")?;
            let email = prompt("Email")?;
            let password = prompt_password("Password")?;
            let confirm = prompt_password("Confirm password")?;
            if password != confirm {
                eprintln!("Passwords do not match");
                return Ok(false);
            }

            let details = Registration {
                username,
                email,
                password,
            };
            if session.register(&details).await {
                println!("Account created. Run `authkeep login` to sign in.");
                Ok(true)
            } else {
                eprintln!("Registration failed.");
                Ok(false)
            }
        }
        Command::Logout => {
            session.dispose();
            session.logout();
            println!("Signed out");
            Ok(true)
        }
        Command::Whoami => {
            session.settle().await;
            match session.user() {
                Some(user) => {
                    println!("{}", serde_json::to_string_pretty(&user)?);
                    Ok(true)
                }
                None => {
                    eprintln!("Not signed in");
                    Ok(false)
                }
            }
        }
        Command::Passwd => {
            if !ensure_signed_in(session).await {
                return Ok(false);
            }
            let password = prompt_password("New password")?;
            let confirm = prompt_password("Confirm new password")?;
            if password != confirm {
                eprintln!("Passwords do not match");
                return Ok(false);
            }

            if session.change_password(&PasswordChange { password }).await {
                println!("Password changed");
                Ok(true)
            } else {
                eprintln!("Password change failed");
                Ok(false)
            }
        }
        Command::Profile(args) => {
            if !ensure_signed_in(session).await {
                return Ok(false);
            }
            let update = ProfileUpdate {
                username: args.username,
                email: args.email,
                password: None,
            };
            if session.update_profile(&update).await {
                if let Some(user) = session.user() {
                    println!("Profile updated: {} <{}>", user.username, user.email);
                }
                Ok(true)
            } else {
                eprintln!("Profile update failed");
                Ok(false)
            }
        }
    }
}

/// Wait for the startup sync and report whether a user is signed in
async fn ensure_signed_in(session: &SessionStore) -> bool {
    session.settle().await;
    if session.phase() == SessionPhase::Authenticated {
        true
    } else {
        eprintln!("Not signed in. Run `authkeep login` first.");
        false
    }
}
