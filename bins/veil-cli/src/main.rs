//! veil-cli — Terminal front end for the Veil recovery-phrase vault.
//!
//! Thin presentation glue over `veil-vault`: PIN prompts, the timed reveal
//! ritual with a cosmetic countdown, and rotation progress output. All
//! vault logic lives in the library.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use veil_vault::{FileStore, PinRotationOrchestrator, RevealController, SecretVault, VaultConfig};

/// Veil command-line vault interface.
#[derive(Parser)]
#[command(name = "veil-cli")]
#[command(version, about = "PIN-protected recovery-phrase vault")]
struct Cli {
    /// Vault data directory (default: platform data dir + /veil).
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the vault PIN.
    Init,
    /// Store a recovery phrase for an account.
    Save(AccountArgs),
    /// List accounts with a stored phrase.
    List,
    /// Delete an account's stored phrase.
    Remove(AccountArgs),
    /// Reveal an account's phrase after the mandatory wait.
    Reveal(RevealArgs),
    /// Change the vault PIN, re-encrypting every stored phrase.
    ChangePin,
    /// Move a phrase stored under a legacy plain key into the vault.
    Migrate(AccountArgs),
    /// Erase the entire vault.
    Wipe,
}

#[derive(Args)]
struct AccountArgs {
    /// Account identifier.
    account: String,
}

#[derive(Args)]
struct RevealArgs {
    /// Account identifier.
    account: String,

    /// Shorten the wait and window for demos.
    #[arg(long)]
    fast: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let vault = open_vault(cli.dir)?;

    match cli.command {
        Commands::Init => cmd_init(&vault),
        Commands::Save(args) => cmd_save(&vault, &args.account),
        Commands::List => cmd_list(&vault),
        Commands::Remove(args) => cmd_remove(&vault, &args.account),
        Commands::Reveal(args) => cmd_reveal(&vault, &args.account, args.fast),
        Commands::ChangePin => cmd_change_pin(&vault),
        Commands::Migrate(args) => cmd_migrate(&vault, &args.account),
        Commands::Wipe => cmd_wipe(&vault),
    }
}

fn open_vault(dir: Option<PathBuf>) -> Result<SecretVault<FileStore>> {
    let dir = match dir {
        Some(d) => d,
        None => dirs::data_dir()
            .context("could not determine a data directory, pass --dir")?
            .join("veil"),
    };
    let store = FileStore::open(&dir)
        .with_context(|| format!("failed to open vault directory {}", dir.display()))?;
    Ok(SecretVault::new(store))
}

fn cmd_init(vault: &SecretVault<FileStore>) -> Result<()> {
    if vault.has_pin()? {
        bail!("a PIN is already set; use change-pin to replace it");
    }
    let pin = prompt_pin("Choose a 6-digit PIN")?;
    let confirm = prompt_pin("Confirm PIN")?;
    if pin != confirm {
        bail!("PINs did not match");
    }
    vault.set_pin(&pin, VaultConfig::default().pin_iterations)?;
    println!("Vault initialized.");
    Ok(())
}

fn cmd_save(vault: &SecretVault<FileStore>, account: &str) -> Result<()> {
    let pin = prompt_verified_pin(vault)?;
    let secret = rpassword::prompt_password("Recovery phrase (hidden): ")
        .context("failed to read phrase")?;
    vault.save(account, &secret, &pin)?;
    println!("Stored phrase for {account}.");
    Ok(())
}

fn cmd_list(vault: &SecretVault<FileStore>) -> Result<()> {
    let accounts = vault.list_accounts_with_data()?;
    if accounts.is_empty() {
        println!("No stored phrases.");
        return Ok(());
    }
    for account in &accounts {
        println!("{account}");
    }
    println!("({} account(s))", accounts.len());
    Ok(())
}

fn cmd_remove(vault: &SecretVault<FileStore>, account: &str) -> Result<()> {
    let _pin = prompt_verified_pin(vault)?;
    vault.delete(account)?;
    println!("Removed phrase for {account}.");
    Ok(())
}

fn cmd_reveal(vault: &SecretVault<FileStore>, account: &str, fast: bool) -> Result<()> {
    let pin = prompt_verified_pin(vault)?;

    let config = if fast {
        VaultConfig::fast()
    } else {
        VaultConfig::default()
    };
    let mut controller = RevealController::new(config);
    controller.schedule(account)?;

    // Cosmetic countdown: correctness comes from the controller's own
    // status computation, not from this loop.
    loop {
        let status = controller.status(account);
        if status.is_available {
            break;
        }
        if status.is_expired {
            bail!("reveal window expired before execution");
        }
        if let Some(remaining) = status.wait_remaining {
            print!("\rAvailable in {:>3}s…", remaining.as_secs() + 1);
            use std::io::Write;
            std::io::stdout().flush().ok();
        }
        thread::sleep(Duration::from_millis(50));
    }
    println!();

    let secret = controller.execute(account, &pin, vault)?;
    println!("--- {account} ---");
    println!("{secret}");
    println!("--- hidden in {}s ---", controller.display_duration().as_secs());

    thread::sleep(controller.display_duration());
    // Push the phrase off a default-height terminal.
    print!("{}", "\n".repeat(50));
    println!("Phrase hidden.");
    Ok(())
}

fn cmd_change_pin(vault: &SecretVault<FileStore>) -> Result<()> {
    let config = VaultConfig::default();
    let orchestrator = PinRotationOrchestrator::new(vault, &config);

    let old_pin = prompt_pin("Current PIN")?;
    if !orchestrator.validate_old_pin(&old_pin)? {
        bail!("current PIN did not verify");
    }
    let new_pin = prompt_pin("New 6-digit PIN")?;
    let confirm = prompt_pin("Confirm new PIN")?;
    if new_pin != confirm {
        bail!("PINs did not match");
    }

    let outcome = orchestrator.rotate(&old_pin, &new_pin, |progress| {
        println!(
            "[{}/{}] {}",
            progress.completed + progress.failed.len(),
            progress.total,
            progress.current.as_deref().unwrap_or("-"),
        );
    })?;

    if outcome.success {
        println!("PIN changed; {} phrase(s) re-encrypted.", outcome.rotated_count);
    } else if let Some(err) = outcome.error {
        bail!("rotation did not run: {err}");
    } else {
        println!(
            "PIN changed with failures: {} rotated, {} still under the OLD pin: {}",
            outcome.rotated_count,
            outcome.failed_accounts.len(),
            outcome.failed_accounts.join(", "),
        );
        println!("Re-enter those phrases manually with `veil-cli save`.");
    }
    Ok(())
}

fn cmd_migrate(vault: &SecretVault<FileStore>, account: &str) -> Result<()> {
    match vault.migrate_legacy_account(account)? {
        Some(key) => println!("Migrated {account} to {key}."),
        None => println!("Nothing to migrate for {account}."),
    }
    Ok(())
}

fn cmd_wipe(vault: &SecretVault<FileStore>) -> Result<()> {
    print!("Type 'erase' to wipe the vault: ");
    use std::io::Write;
    std::io::stdout().flush().ok();
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    if answer.trim() != "erase" {
        bail!("aborted");
    }
    vault.wipe()?;
    println!("Vault erased.");
    Ok(())
}

/// Prompt for a PIN without echoing it.
fn prompt_pin(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{prompt}: ")).context("failed to read PIN")
}

/// Prompt for the PIN and verify it against the stored credential.
fn prompt_verified_pin(vault: &SecretVault<FileStore>) -> Result<String> {
    if !vault.has_pin()? {
        bail!("no PIN set; run `veil-cli init` first");
    }
    let pin = prompt_pin("PIN")?;
    if !vault.verify_pin(&pin)? {
        bail!("wrong PIN");
    }
    Ok(pin)
}
