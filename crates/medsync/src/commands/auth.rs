//! Account sessions. Tokens live in the system keyring per profile.

use std::io::BufRead;

use dialoguer::Input;
use secrecy::{ExposeSecret, SecretString};

use medsync_api::models::{LoginResponse, RegisterUserRequest, UserDto};
use medsync_core::{CoreError, MedSync};

use crate::cli::{AccountRole, GlobalOpts, LoginArgs, SignupArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn detail(u: &UserDto) -> String {
    format!("Logged in as {} <{}> ({})", u.name, u.email, u.role)
}

fn prompt_text(prompt: &str) -> Result<String, CliError> {
    Input::<String>::new()
        .with_prompt(prompt)
        .interact_text()
        .map_err(prompt_err)
}

fn read_password(from_stdin: bool) -> Result<SecretString, CliError> {
    let password = if from_stdin {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        line.trim_end_matches(['\r', '\n']).to_owned()
    } else {
        rpassword::prompt_password("Password: ").map_err(prompt_err)?
    };
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(SecretString::from(password))
}

pub async fn login(app: &MedSync, args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let (profile_name, profile) = config::active_profile(global, &cfg)?;

    let email = match args.email.or(profile.email) {
        Some(email) => email,
        None => prompt_text("Email")?,
    };
    let password = read_password(args.password_stdin)?;

    let session = app
        .api()
        .login(&email, &password)
        .await
        .map_err(CoreError::from)?;
    tracing::info!(profile = %profile_name, user = %session.user.id, "logged in");

    keep_session(&profile_name, &session, args.print_token, global)
}

pub async fn signup(app: &MedSync, args: SignupArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let (profile_name, profile) = config::active_profile(global, &cfg)?;

    let email = match args.email.or(profile.email) {
        Some(email) => email,
        None => prompt_text("Email")?,
    };
    let name = match args.name {
        Some(name) => name,
        None => prompt_text("Name")?,
    };
    if name.trim().is_empty() {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: "name cannot be empty".into(),
        });
    }
    let password = read_password(args.password_stdin)?;

    let req = RegisterUserRequest {
        email: &email,
        password: password.expose_secret(),
        name: name.trim(),
        role: args.role.map(AccountRole::as_str),
    };
    let session = app
        .api()
        .register_user(&req)
        .await
        .map_err(CoreError::from)?;
    tracing::info!(profile = %profile_name, user = %session.user.id, "account created");

    keep_session(&profile_name, &session, args.print_token, global)
}

/// Print or store the token of a fresh session.
fn keep_session(
    profile_name: &str,
    session: &LoginResponse,
    print_token: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if print_token {
        // stdout carries only the token.
        output::print_output(&session.token, false);
        util::status(global, &detail(&session.user));
        return Ok(());
    }

    config::store_token(profile_name, &session.token)?;
    util::status(
        global,
        &format!("Token stored in the system keyring for profile '{profile_name}'"),
    );
    let out = output::render_single(&global.output, &session.user, detail, |u| u.id.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn logout(app: &MedSync, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let (profile_name, profile) = config::active_profile(global, &cfg)?;

    if app.config().token.is_some() {
        // The server-side session is best effort; the local token goes regardless.
        if let Err(e) = app.api().logout().await {
            tracing::warn!(error = %e, "server-side logout failed");
        }
    }
    config::clear_token(&profile_name)?;
    util::status(global, &format!("Logged out of profile '{profile_name}'"));

    if global.token.is_some() || profile.token.is_some() {
        util::status(
            global,
            "A token passed via --token/MEDSYNC_TOKEN or stored in the config file was left in place",
        );
    }
    Ok(())
}
