//!
//! portal-probe
//! ------------
//! One-shot command-line probe for the session subsystem against a live
//! identity backend. Restores the persisted session, runs a single command,
//! and prints the resulting session snapshot as JSON.

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use mediportal_session::config::PortalConfig;
use mediportal_session::identity::{HttpIdentityClient, Role, SessionManager};
use mediportal_session::store::FileSessionStore;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} status                                  # restore, verify against backend, print session\n  {program} login <email> <password> [--remember]   # sign in (optionally remember the email for prefill)\n  {program} signup <email> <password> <name> <role> # register; role is patient|doctor|admin\n  {program} logout                                  # purge the persisted session\n  {program} whoami                                  # print the verified profile, or 'not signed in'\n\nEnvironment:\n  MEDIPORTAL_API_URL            backend base URL (default http://127.0.0.1:5000)\n  MEDIPORTAL_STATE_DIR          session state directory (default .mediportal)\n  MEDIPORTAL_HTTP_TIMEOUT_SECS  per-request timeout (default 10)\n  RUST_LOG                      tracing filter (e.g. mediportal=debug)"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("portal-probe").to_string();
    let Some(command) = args.get(1) else {
        print_usage(&program);
        return Err(anyhow!("missing command"));
    };

    let cfg = PortalConfig::from_env();
    info!(
        target: "mediportal",
        "portal-probe starting: api_url={} state_dir={}",
        cfg.api_url,
        cfg.state_dir.display()
    );

    let store = Arc::new(FileSessionStore::new(&cfg.state_dir));
    let identity = Arc::new(HttpIdentityClient::from_config(&cfg)?);
    let manager = SessionManager::new(store, identity);

    match command.as_str() {
        "status" => {
            manager.verify_restored().await;
        }
        "login" => {
            let (Some(email), Some(password)) = (args.get(2), args.get(3)) else {
                print_usage(&program);
                return Err(anyhow!("login requires <email> <password>"));
            };
            let remember = args.iter().any(|a| a == "--remember");
            match manager.login(email, password).await {
                Ok(profile) => {
                    if remember {
                        manager.remember_login(email, password);
                    }
                    println!("signed in as {} ({})", profile.display_name, profile.role);
                }
                Err(e) => return Err(anyhow!("{e}")),
            }
        }
        "signup" => {
            let (Some(email), Some(password), Some(name), Some(role)) =
                (args.get(2), args.get(3), args.get(4), args.get(5))
            else {
                print_usage(&program);
                return Err(anyhow!("signup requires <email> <password> <name> <role>"));
            };
            let role = Role::parse(role);
            let profile = manager
                .signup(email, password, name, role)
                .await
                .map_err(|e| anyhow!("{e}"))?;
            println!("registered {} ({})", profile.display_name, profile.role);
        }
        "logout" => {
            manager.logout();
            println!("signed out");
        }
        "whoami" => {
            manager.verify_restored().await;
            match manager.session().profile {
                Some(profile) => println!("{} <{}> role={}", profile.display_name, profile.email, profile.role),
                None => println!("not signed in"),
            }
        }
        other => {
            print_usage(&program);
            return Err(anyhow!("unknown command: {other}"));
        }
    }

    println!("{}", serde_json::to_string_pretty(&manager.session())?);
    Ok(())
}
