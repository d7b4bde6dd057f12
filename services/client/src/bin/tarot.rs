//! services/client/src/bin/tarot.rs

use clap::{Parser, Subcommand};
use client_lib::{
    config::Config,
    error::ClientError,
    flow::{AppState, EventSink, FlowEvent, ReadingFlow, RevealOutcome},
};
use tarot_reading_core::domain::{ReadingSession, Stage};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tarot", version, about = "Ask the cards a question from your terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Request a verification code for a phone number.
    SendCode {
        #[arg(long)]
        phone: String,
    },
    /// Log in with a phone number and verification code.
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        code: String,
    },
    /// Forget the stored credentials.
    Logout,
    /// Show who is logged in.
    Whoami,
    /// Show how many free readings are left.
    Quota,
    /// Run a full reading for a question.
    Read { question: String },
    /// Show the stored reading.
    Status,
    /// Discard the stored reading.
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Using {}", config.api_base_url);

    // --- 2. Build the Shared AppState ---
    let app_state = AppState::build(config)?;

    // --- 3. Dispatch ---
    match cli.command {
        Command::SendCode { phone } => {
            match app_state.account_flow().send_code(&phone).await? {
                Some(code) => println!("Verification code sent. Test code: {}", code),
                None => println!("Verification code sent."),
            }
        }
        Command::Login { phone, code } => {
            let user = app_state.account_flow().login_with_code(&phone, &code).await?;
            println!(
                "Logged in as {}.",
                user.nickname.as_deref().unwrap_or(&user.id)
            );
        }
        Command::Logout => {
            app_state.account_flow().logout().await;
            println!("Logged out.");
        }
        Command::Whoami => match app_state.account_flow().current_user().await {
            Some(user) => println!("{}", user.nickname.as_deref().unwrap_or(&user.id)),
            None => println!("Not logged in."),
        },
        Command::Quota => {
            let quota = app_state.account_flow().fetch_quota().await?;
            println!(
                "Free readings: {}/{} ({:.0}%)",
                quota.remaining,
                quota.total,
                quota.percentage()
            );
            if let Some(reset_at) = quota.reset_at {
                println!("Resets at {}", reset_at.to_rfc3339());
            }
        }
        Command::Read { question } => run_reading(&app_state, &question).await?,
        Command::Status => print_session(app_state.reading.lock().await.session()),
        Command::Reset => {
            app_state.reading_flow(EventSink::default()).new_reading().await;
            println!("Reading cleared.");
        }
    }

    Ok(())
}

/// Plays the whole reading: validate, shuffle, draw, reveal every card.
async fn run_reading(app_state: &AppState, question: &str) -> Result<(), ClientError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                FlowEvent::StageChanged { stage } => println!("[{}]", stage),
                FlowEvent::CardsDrawn { count } => println!("{} cards lie face down.", count),
                FlowEvent::CardRevealed { index } => println!("Card {} turned over.", index + 1),
                FlowEvent::InterpretationReady => println!("The interpretation has arrived."),
                FlowEvent::Notice { message } => eprintln!("{}", message),
            }
        }
    });

    let flow = app_state.reading_flow(EventSink::new(tx));
    let outcome = play(&flow, question).await;

    flow.settle().await;
    let session = flow.store().lock().await.session().clone();
    drop(flow);
    let _ = printer.await;

    outcome?;
    print_session(&session);
    Ok(())
}

async fn play(flow: &ReadingFlow, question: &str) -> Result<(), ClientError> {
    if flow.store().lock().await.session().stage() != Stage::Input {
        flow.new_reading().await;
    }
    flow.submit_question(question).await?;
    flow.finish_shuffle().await?;
    let count = flow.draw().await?;

    for index in 0..count {
        if flow.reveal(index).await? == RevealOutcome::AwaitingInterpretation {
            // Background interpretation still running. If it fails, ask again.
            flow.settle().await;
            if flow.store().lock().await.session().stage() == Stage::Revealing {
                flow.retry_interpretation().await?;
            }
        }
    }
    Ok(())
}

fn print_session(session: &ReadingSession) {
    println!("Stage: {}", session.stage());
    if !session.question().is_empty() {
        println!("Question: {}", session.question());
    }
    for (i, card) in session.cards().iter().enumerate() {
        if card.is_revealed {
            println!("  {}. {} ({:?})", i + 1, card.name, card.position);
        } else {
            println!("  {}. (face down)", i + 1);
        }
    }
    for interp in session.interpretations() {
        let label = interp
            .card_name
            .clone()
            .or_else(|| interp.card_index.map(|i| format!("Card {}", i + 1)))
            .or_else(|| interp.card_id.clone())
            .unwrap_or_else(|| "Spread".to_string());
        println!("{}: {}", label, interp.text);
    }
    if let Some(overall) = session.overall_interpretation() {
        println!("\n{}", overall);
    }
    if let Some(id) = session.reading_id() {
        println!("Reading id: {}", id);
    }
}
