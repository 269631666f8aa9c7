//! Session commands.

use std::io::{self, BufRead, Write};

use ecomall_client::NewAccount;
use secrecy::SecretString;

use super::{CommandError, Context};

/// Log in and load the account's cart and wishlist.
///
/// The password is only ever read from stdin, never from arguments.
#[allow(clippy::print_stdout)]
pub async fn login(ctx: &Context, email: &str) -> Result<(), CommandError> {
    let password = prompt_secret("Password")?;

    let user = ctx.session.login(&ctx.api, email, &password).await?;
    ctx.sync.handle_session_change(Some(user.user_id)).await;

    println!("Logged in as {}", user.display_name());
    Ok(())
}

/// Create an account and log in as it.
#[allow(clippy::print_stdout)]
pub async fn register(
    ctx: &Context,
    email: &str,
    name: &str,
    phone: &str,
) -> Result<(), CommandError> {
    let password = prompt_secret("Choose a password")?;
    let account = NewAccount::from_full_name(name, email, phone, password);

    let user = ctx.session.register(&ctx.api, &account).await?;
    ctx.sync.handle_session_change(Some(user.user_id)).await;

    println!("Registered and logged in as {}", user.display_name());
    Ok(())
}

/// End the session. The cart and wishlist are cleared locally.
#[allow(clippy::print_stdout)]
pub async fn logout(ctx: &Context) {
    ctx.session.logout();
    ctx.sync.handle_session_change(None).await;
    println!("Logged out");
}

#[allow(clippy::print_stdout)]
pub fn whoami(ctx: &Context) {
    match ctx.session.current() {
        Some(user) => println!("{} (user #{})", user.display_name(), user.user_id),
        None => println!("Not logged in"),
    }
}

#[allow(clippy::print_stdout)]
fn prompt_secret(label: &str) -> Result<SecretString, CommandError> {
    print!("{label}: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(SecretString::from(
        line.trim_end_matches(['\r', '\n']).to_string(),
    ))
}
