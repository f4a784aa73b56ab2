use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;

use beforework::config::AppConfig;
use beforework::reminders::DuePolicy;

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(SocketAddr, AppConfig),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    if let Some(Command::Init(args)) = cli.command {
        return RunOutcome::Exit(run_init(args));
    }

    let due_policy = match parse_due_policy(&cli.due_policy) {
        Ok(due_policy) => due_policy,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };

    RunOutcome::Serve(
        cli.listen,
        AppConfig {
            cron_secret: cli.cron_secret,
            vapid_private_key: cli.vapid_private_key,
            vapid_public_key: cli.vapid_public_key,
            vapid_subject: cli.vapid_subject,
            kv_url: cli.kv_url,
            kv_token: cli.kv_token,
            kv_key: cli.kv_key,
            due_policy,
            internal_ticker: cli.internal_ticker,
        },
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "beforework",
    version,
    about = "Daily workout reminder push server"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, env = "BEFOREWORK_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    #[arg(long, env = "BEFOREWORK_CRON_SECRET")]
    cron_secret: Option<String>,
    #[arg(long, env = "BEFOREWORK_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "BEFOREWORK_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "BEFOREWORK_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    #[arg(long, env = "BEFOREWORK_KV_URL")]
    kv_url: Option<String>,
    #[arg(long, env = "BEFOREWORK_KV_TOKEN")]
    kv_token: Option<String>,
    #[arg(
        long,
        env = "BEFOREWORK_KV_KEY",
        default_value = "beforework:subscriptions"
    )]
    kv_key: String,
    #[arg(long, env = "BEFOREWORK_DUE_POLICY", default_value = "exact-minute")]
    due_policy: String,
    #[arg(long, env = "BEFOREWORK_INTERNAL_TICKER")]
    internal_ticker: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    Init(InitArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

fn run_init(args: InitArgs) -> i32 {
    let credentials = match beforework::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("BEFOREWORK_VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("BEFOREWORK_VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("BEFOREWORK_VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace BEFOREWORK_VAPID_SUBJECT with a contact URI you control.");
    }
    0
}

fn parse_due_policy(raw: &str) -> Result<DuePolicy, String> {
    match raw.trim() {
        "exact-minute" => Ok(DuePolicy::ExactMinute),
        "catch-up" => Ok(DuePolicy::CatchUp),
        other => Err(format!(
            "invalid due policy '{other}'; expected exact-minute or catch-up"
        )),
    }
}
