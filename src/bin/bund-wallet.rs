#![forbid(unsafe_code)]
use bundchain::blockchain::AccountId;
use bundchain::crypto::KeyPair;
use bundchain::transaction::UserTx;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "bundchain wallet", long_about = None)]
struct Cli {
    /// Hex secret key file of the account to use
    #[arg(long, short = 'k', global = true, default_value = "zblock/accounts/wallet.key")]
    key: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates a new key file
    Generate,
    /// Prints the account id of the key
    Account,
    /// Signs a transfer and submits it to a node
    Send {
        /// Public address of the node
        #[arg(long, short = 'u', default_value = "http://localhost:8080")]
        url: String,
        #[arg(long, short = 'n')]
        nonce: u64,
        #[arg(long, short = 't')]
        to: String,
        #[arg(long, short = 'v', default_value_t = 0)]
        value: u64,
        #[arg(long, short = 'c', default_value_t = 0)]
        tip: u64,
        /// Hex encoded payload
        #[arg(long, short = 'd', default_value = "")]
        data: String,
        #[arg(long, default_value_t = 1)]
        chain_id: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate => {
            if cli.key.exists() {
                return Err(format!("{} already exists", cli.key.display()).into());
            }
            if let Some(parent) = cli.key.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let keypair = KeyPair::generate();
            keypair.save(&cli.key)?;
            println!("{}", keypair.account_id());
        }
        Commands::Account => {
            println!("{}", KeyPair::load(&cli.key)?.account_id());
        }
        Commands::Send {
            url,
            nonce,
            to,
            value,
            tip,
            data,
            chain_id,
        } => {
            let keypair = KeyPair::load(&cli.key)?;
            let to = AccountId::parse(&to)?;
            let data = hex::decode(data.trim_start_matches("0x"))?;

            let signed =
                UserTx::new(chain_id, nonce, keypair.account_id(), to, value, tip, data)
                    .sign(&keypair);

            let response = reqwest::Client::new()
                .post(format!("{}/v1/tx/submit", url.trim_end_matches('/')))
                .json(&signed)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(format!("node rejected transaction ({}): {}", status, body).into());
            }
            println!("{}", body);
        }
    }

    Ok(())
}
