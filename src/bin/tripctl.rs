use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use tripbid::{
    config::{create_default_config_file, AppConfig},
    error::ErrorKind,
    model::{CallerIdentity, Pin, QuotationStatus},
    SqliteLedger, TripContract, TripError,
};

#[derive(Parser)]
#[command(name = "tripctl")]
#[command(about = "Submit trip bidding transactions against a local ledger")]
struct Args {
    #[arg(short, long, default_value = "tripbid.toml")]
    config: String,

    /// Caller identity as issued by the certificate authority
    #[arg(long, env = "TRIPBID_IDENTITY", default_value = "x509::CN=local")]
    identity: String,

    /// Value of the caller's company attribute
    #[arg(long, env = "TRIPBID_COMPANY")]
    company: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default configuration file to --config
    InitConfig,
    /// Show the caller as the contract sees it
    Whoami,
    /// List a trip for bidding (JSON payload)
    CreateItinerary { payload: String },
    /// Quote against an open itinerary (JSON payload)
    CreateQuotation { payload: String },
    /// Accept, decline or withdraw a quotation
    ChangeState {
        quotation_id: String,
        state: QuotationStatus,
        mpin: String,
    },
    /// Close an itinerary to further bids
    CloseItinerary { itinerary_id: String, mpin: String },
    /// Print a stored itinerary or quotation
    Show { id: String },
    /// List stored keys, optionally filtered by prefix (IT- or QT-)
    List {
        #[arg(default_value = "")]
        prefix: String,
    },
}

fn load_config(path: &str) -> tripbid::Result<AppConfig> {
    let config = if Path::new(path).exists() {
        AppConfig::load_with_env_overrides(path)?
    } else {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.is_json_logging() {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::BadRequest => 2,
        ErrorKind::Forbidden => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::Internal => 1,
    }
}

async fn run(args: Args, config: AppConfig) -> tripbid::Result<serde_json::Value> {
    let mut caller = CallerIdentity::new(args.identity);
    if let Some(company) = args.company {
        caller = caller.with_attribute(config.identity.company_attribute.clone(), company);
    }

    let ledger = SqliteLedger::new(&config.ledger.url).await?;
    let contract = TripContract::from_config(ledger, &config);

    let value = match args.command {
        Command::InitConfig => unreachable!("handled before the ledger is opened"),
        Command::Whoami => serde_json::to_value(contract.instantiate(&caller))?,
        Command::CreateItinerary { payload } => {
            serde_json::to_value(contract.create_itinerary(&caller, &payload).await?)?
        }
        Command::CreateQuotation { payload } => {
            serde_json::to_value(contract.create_quotation(&caller, &payload).await?)?
        }
        Command::ChangeState { quotation_id, state, mpin } => {
            let pin = Pin::new(mpin)?;
            serde_json::to_value(
                contract
                    .change_quotation_state(&caller, &quotation_id, state, &pin)
                    .await?,
            )?
        }
        Command::CloseItinerary { itinerary_id, mpin } => {
            let pin = Pin::new(mpin)?;
            serde_json::to_value(contract.close_itinerary(&caller, &itinerary_id, &pin).await?)?
        }
        Command::Show { id } => {
            if id.starts_with(tripbid::model::QUOTATION_PREFIX) {
                serde_json::to_value(contract.get_quotation(&id).await?)?
            } else {
                serde_json::to_value(contract.get_itinerary(&id).await?)?
            }
        }
        Command::List { prefix } => serde_json::to_value(contract.ledger().keys_with_prefix(&prefix).await?)?,
    };

    Ok(value)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Command::InitConfig = args.command {
        create_default_config_file(&args.config)
            .with_context(|| format!("writing {}", args.config))?;
        println!("Wrote default configuration to {}", args.config);
        return Ok(());
    }

    let config = load_config(&args.config).context("loading configuration")?;
    init_tracing(&config);

    match run(args, config).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            let code = exit_code(e.kind());
            report(&e);
            std::process::exit(code);
        }
    }
}

fn report(error: &TripError) {
    tracing::error!("Transaction failed: {}", error);
    eprintln!("{:?}: {}", error.kind(), error);
}
