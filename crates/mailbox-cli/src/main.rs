//! # mailbox
//!
//! Terminal front end for the anonymous mailbox.
//!
//! Runs the client core against the in-process backend:
//! - **write view** where anyone can leave a note
//! - **read view** behind the passphrase gate, with a live feed
//! - **notices** for blocking failures, inline errors and confirmations

mod commands;
mod config;
mod error;

use std::io::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{debug, info};

use mailbox_client::{
    notice_channel, share_instructions, BackendRegistry, ClientSettings, ConfigResolver,
    MailboxApp, Notice, NoticeBoard, NoticeLevel, RuntimeInputs,
};
use mailbox_shared::constants::APP_NAME;
use mailbox_shared::{Message, View};
use mailbox_store::{MemoryBackend, MemoryConnector};

use crate::commands::{Command, HELP};
use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    mailbox_client::init_tracing();

    info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let cli = CliConfig::from_env();
    let settings = ClientSettings::from_env();
    let inputs = RuntimeInputs::from_env();
    info!(?cli, ?settings, token = inputs.auth_token.is_some(), "Loaded configuration");

    let mut resolver = ConfigResolver::standard(&inputs);
    if cli.local_demo {
        resolver = resolver.with_fallback(Box::new(cli.demo_defaults()));
    }

    // -----------------------------------------------------------------------
    // 3. Start the client over the in-process backend
    // -----------------------------------------------------------------------
    let connector = Arc::new(MemoryConnector::new(MemoryBackend::new()));
    let (notice_tx, mut notice_rx) = notice_channel();

    let mut app = MailboxApp::bootstrap(
        &inputs,
        &resolver,
        BackendRegistry::new(),
        connector,
        settings,
        notice_tx,
    )
    .await;

    if let Some(notice) = app.blocking_notice() {
        print_notice(&notice);
        anyhow::bail!("{}", notice.title);
    }

    // -----------------------------------------------------------------------
    // 4. Command loop
    // -----------------------------------------------------------------------
    let mut board = NoticeBoard::new();
    let mut messages_rx = app.messages();
    let mut name = cli.default_name.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");
    prompt(&app);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        run_command(&mut app, command, &mut name, &cli, &mut board).await;
                    }
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
                prompt(&app);
            }
            Some(notice) = notice_rx.recv() => {
                print_notice(&notice);
                board.push(notice, Instant::now());
                prompt(&app);
            }
            Ok(()) = messages_rx.changed() => {
                let messages = messages_rx.borrow_and_update().clone();
                if app.status().feed_live {
                    print_messages(&messages);
                    prompt(&app);
                }
            }
            identity = app.next_identity_change() => {
                debug!(signed_in = identity.is_some(), "Identity change handled");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn run_command(
    app: &mut MailboxApp,
    command: Command,
    name: &mut String,
    cli: &CliConfig,
    board: &mut NoticeBoard,
) {
    match command {
        Command::Write => {
            app.set_view(View::Write);
            println!("Write view. Use `send <text>` to leave a note.");
        }
        Command::Read => {
            app.set_view(View::Read);
            if !app.is_unlocked() {
                println!("The read view is locked. Use `unlock <passphrase>`.");
            }
        }
        Command::Unlock(phrase) => {
            if app.unlock(&phrase) {
                println!("Unlocked.");
                if app.view() == View::Write {
                    println!("Switch to `read` to see the messages.");
                }
            }
        }
        Command::Name(new_name) => {
            app.composer().set_name(&new_name);
            *name = app.composer().draft().name().to_string();
            println!("Sending as {}", app.composer().draft().display_name());
        }
        Command::Send(text) => match app.send(name, &text).await {
            Ok(receipt) => debug!(id = %receipt.id, attempt = receipt.attempt, "Send confirmed"),
            Err(e) => debug!(error = %e, "Send did not complete"),
        },
        Command::List => {
            print_messages(&app.latest_messages());
            if let Some(error) = app.feed_error() {
                println!("(feed stopped: {error})");
            }
        }
        Command::Status => {
            match serde_json::to_string_pretty(&app.status()) {
                Ok(json) => println!("{json}"),
                Err(e) => println!("status unavailable: {e}"),
            }
            for notice in board.visible(Instant::now()) {
                print_notice(notice);
            }
        }
        Command::Share => println!("{}", share_instructions(&cli.share_url)),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn prompt(app: &MailboxApp) {
    let view = match app.view() {
        View::Write => "write",
        View::Read if app.is_unlocked() => "read",
        View::Read => "read (locked)",
    };
    print!("[{view}] > ");
    let _ = std::io::stdout().flush();
}

fn print_notice(notice: &Notice) {
    let tag = match notice.level {
        NoticeLevel::Blocking => "!!",
        NoticeLevel::Banner => "!",
        NoticeLevel::Toast => "ok",
    };
    match &notice.detail {
        Some(detail) => println!("\n[{tag}] {}: {detail}", notice.title),
        None => println!("\n[{tag}] {}", notice.title),
    }
}

fn print_messages(messages: &[Message]) {
    println!();
    if messages.is_empty() {
        println!("(no messages yet)");
        return;
    }
    for message in messages {
        println!(
            "{:<19}  {} [{}]\n    {}",
            message.display_time(),
            message.display_name(),
            message.theme().label(),
            message.content
        );
    }
}
