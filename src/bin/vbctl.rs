//! Operator CLI: thin wrappers over the vendor adapter and the contest
//! orchestrator, printing JSON.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::sync::Arc;

use voterbowl_backend::config::Config;
use voterbowl_backend::database::create_pool;
use voterbowl_backend::external::{AgcodClient, SendgridMailer};
use voterbowl_backend::services::{
    ContestService, EntryService, SchoolService, StudentService,
};
use voterbowl_backend::utils::{EmailPolicy, hash_email, is_valid_for_school, make_token};

#[derive(Parser)]
#[command(name = "vbctl", about = "Voter Bowl operator commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mint a fresh gift card for the given amount.
    CreateGiftCard {
        #[arg(long)]
        amount: i64,
    },
    /// Check an existing gift card by amount and creation request id.
    CheckGiftCard {
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        creation_request_id: String,
    },
    /// Query the partner account's available funds.
    GetAvailableFunds,
    /// Force-enter the given email addresses into a contest.
    EnterContest {
        #[arg(long)]
        contest_id: i64,
        /// Email addresses to enter; each must belong to the contest's
        /// school.
        emails: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::from_toml()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("loading configuration")?;
    let agcod = AgcodClient::from_config(&config.agcod).context("building AGCOD client")?;

    match cli.command {
        Command::CreateGiftCard { amount } => {
            // An operator mint is not tied to a contest entry, so it gets a
            // fresh request id.
            let request_id = agcod.make_request_id(&make_token(32));
            let response = agcod.create_gift_card(amount, &request_id, "USD").await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::CheckGiftCard {
            amount,
            creation_request_id,
        } => {
            let response = agcod.check_gift_card(amount, &creation_request_id).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::GetAvailableFunds => {
            let response = agcod.get_available_funds().await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::EnterContest { contest_id, emails } => {
            let pool = create_pool(&config.database).await?;
            let schools = SchoolService::new(pool.clone());
            let contests = ContestService::new(pool.clone());
            let students = StudentService::new(pool.clone());
            let mailer = Arc::new(SendgridMailer::new(config.email.clone()));
            let entries = EntryService::new(
                pool,
                agcod,
                mailer,
                config.email.gift_card_template_id.clone(),
            );

            let contest = contests.get_by_id(contest_id).await?;
            let school = schools.get_by_id(contest.school_id).await?;
            let policy = EmailPolicy::from(&school);
            let now = Utc::now();

            for email in emails {
                if !is_valid_for_school(&email, &policy) {
                    println!(
                        "{}",
                        json!({"email": email, "error": "not a school address"})
                    );
                    continue;
                }
                let hash = hash_email(&email, &policy);
                let student = students
                    .get_or_create_student(&school, &hash, &email, "", "")
                    .await?;
                let (entry, is_new) = entries.enter_contest(&student, &contest, now).await?;
                println!(
                    "{}",
                    json!({
                        "email": email,
                        "entry_id": entry.id,
                        "roll": entry.roll,
                        "amount_won": entry.amount_won,
                        "newly_created": is_new,
                    })
                );
            }
        }
    }

    Ok(())
}
