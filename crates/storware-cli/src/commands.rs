//! Subcommand implementations.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use storware_core::auth::KeyStore;
use storware_core::models::{TaskFilter, VmFilter, VolumetryQuery};
use storware_core::report::{DocumentRenderer, JsonRenderer};
use storware_core::{
    connect, encrypt, HttpTransport, InventoryFailureMode, ReportCollector, SecretKey,
    ServiceConfig, StorwareClient,
};
use tracing::{debug, info, warn};

use crate::cli::{CollectArgs, Command, EncryptSecretArgs, TasksArgs, VmArgs, VmsArgs};
use crate::output::render_table;

pub async fn run(command: Command) -> Result<()> {
    match command {
        Command::Collect(args) => collect(args).await,
        Command::Vms(args) => list_vms(args).await,
        Command::Vm(args) => show_vm(args).await,
        Command::Tasks(args) => list_tasks(args).await,
        Command::EncryptSecret(args) => encrypt_secret(args),
    }
}

/// Read the configuration, falling back to the keychain for the encryption key
fn load_config() -> Result<ServiceConfig> {
    let mut config = ServiceConfig::from_env().context("Invalid configuration")?;
    if config.credentials.encryption_key.is_empty() {
        match KeyStore::default().load_key() {
            Ok(Some(key)) => {
                debug!("Using encryption key from the OS keychain");
                config.credentials.encryption_key = key;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not read the encryption key from the keychain"),
        }
    }
    Ok(config)
}

async fn connect_client() -> Result<StorwareClient<HttpTransport>> {
    let config = load_config()?;
    let session = connect(&config).await.context(
        "Failed to create the authenticated session. Check the logs above and your configuration (environment variables, .env)",
    )?;
    Ok(StorwareClient::new(session))
}

/// Name of the `--save` file, e.g. `volumetria_2024-05-01_-_2024-05-02.json`
fn report_file_name(from: DateTime<Utc>, to: DateTime<Utc>, extension: &str) -> String {
    format!(
        "volumetria_{}_-_{}.{}",
        from.format("%Y-%m-%d"),
        to.format("%Y-%m-%d"),
        extension
    )
}

async fn collect(args: CollectArgs) -> Result<()> {
    let (from, to) = args.window(Utc::now())?;
    let client = connect_client().await?;

    let mode = if args.fail_fast_inventory {
        InventoryFailureMode::FailFast
    } else {
        InventoryFailureMode::BestEffort
    };
    let reports = ReportCollector::new(&client, &client)
        .with_inventory_mode(mode)
        .collect(&VolumetryQuery::new(from, to), args.include_vms)
        .await
        .context("The final report could not be generated")?;

    let renderer = JsonRenderer;
    let document = renderer.render(&reports)?;

    let path = match (args.output, args.save) {
        (Some(path), _) => Some(path),
        (None, true) => Some(PathBuf::from(report_file_name(from, to, renderer.file_extension()))),
        (None, false) => None,
    };

    match path {
        Some(path) => {
            info!(
                projects = reports.len(),
                path = %path.display(),
                content_type = renderer.content_type(),
                "Saving report"
            );
            std::fs::write(&path, &document).with_context(|| {
                format!(
                    "Failed to save the report to {} - check write permissions",
                    path.display()
                )
            })?;
            info!(path = %path.display(), "Report saved");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&document)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn list_vms(args: VmsArgs) -> Result<()> {
    let client = connect_client().await?;
    let vms = client.list_vms().await.context("Failed to fetch the VM list")?;

    let filter = VmFilter {
        name_contains: args.filter_name,
        head: args.head,
        tail: args.tail,
    };
    let shown = filter.apply(&vms);

    println!("\n--- Virtual Machine Inventory ---");
    if shown.is_empty() {
        println!("No VMs found matching the filters.");
    } else {
        let rows: Vec<Vec<String>> = shown
            .iter()
            .map(|vm| {
                vec![
                    vm.display_name().to_string(),
                    vm.display_guid().to_string(),
                    vm.display_protection_status().to_string(),
                ]
            })
            .collect();
        println!("{}", render_table(&["VM Name", "GUID", "Protection Status"], &rows));
    }
    println!("\nShowing {} of {} VMs found.", shown.len(), vms.len());
    Ok(())
}

async fn show_vm(args: VmArgs) -> Result<()> {
    let client = connect_client().await?;
    match client
        .vm_details(&args.guid)
        .await
        .context("Failed to fetch VM details")?
    {
        Some(details) => {
            println!("\n--- VM Details (GUID: {}) ---", args.guid);
            println!("{}", serde_json::to_string_pretty(&details)?);
            Ok(())
        }
        None => bail!("No VM found with GUID '{}'", args.guid),
    }
}

async fn list_tasks(args: TasksArgs) -> Result<()> {
    let client = connect_client().await?;
    let tasks = client.list_tasks().await.context("Failed to fetch the task list")?;

    let filter = TaskFilter {
        status: args.status,
        vm_guid: args.vm_guid,
    };
    let shown = filter.apply(&tasks);

    println!("\n--- Task Monitor ---");
    if shown.is_empty() {
        println!("No tasks found matching the filters.");
    } else {
        let rows: Vec<Vec<String>> = shown
            .iter()
            .map(|task| {
                vec![
                    task.display_guid().to_string(),
                    task.display_type().to_string(),
                    task.display_state().to_string(),
                    task.display_progress(),
                    task.display_target().to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            render_table(&["Task GUID", "Type", "Status", "Progress %", "Target VM"], &rows)
        );
    }
    println!("\nShowing {} of {} tasks found.", shown.len(), tasks.len());
    Ok(())
}

/// Store the key and read it back, `false` if the keychain did not keep it
fn store_in_keychain(key: &SecretKey) -> Result<bool> {
    let store = KeyStore::default();
    store
        .store_key(key)
        .context("Failed to store the key in the OS keychain")?;
    match store.load_key() {
        Ok(Some(stored)) if stored == key.encoded() => Ok(true),
        Ok(_) => {
            warn!("The OS keychain did not keep the key, set ENCRYPTION_KEY instead");
            Ok(false)
        }
        Err(e) => {
            warn!(error = %e, "Could not read the key back from the OS keychain");
            Ok(false)
        }
    }
}

fn prompt_secret(prompt: &str) -> Result<String> {
    let value = rpassword::prompt_password(prompt).context("Could not read input")?;
    if value.is_empty() {
        bail!("Input must not be empty");
    }
    Ok(value)
}

fn encrypt_secret(args: EncryptSecretArgs) -> Result<()> {
    println!("--- Secret Encryption Utility ---");
    println!("A new key will be generated to encrypt the username and password you enter.");

    let username = prompt_secret("Backup service USERNAME (input hidden): ")?;
    let password = prompt_secret("Backup service PASSWORD (input hidden): ")?;

    let key = SecretKey::generate();
    let encrypted_username = encrypt(&key, &username).context("Failed to encrypt the username")?;
    let encrypted_password = encrypt(&key, &password).context("Failed to encrypt the password")?;

    let rule = "=".repeat(50);
    println!("\n{}", rule);
    println!("1. SET THE ENCRYPTION KEY (do not save it in a text file):");
    if args.store_key && store_in_keychain(&key)? {
        println!("   The key was stored in the OS keychain; ENCRYPTION_KEY can stay unset.");
    } else {
        println!("   Linux/macOS:        export ENCRYPTION_KEY=\"{}\"", key.encoded());
        println!("   Windows PowerShell: $env:ENCRYPTION_KEY=\"{}\"", key.encoded());
    }
    println!("\n2. ADD THESE TWO LINES TO YOUR .env FILE:");
    println!("   STORWARE_ENCRYPTED_USERNAME=\"{}\"", encrypted_username);
    println!("   STORWARE_ENCRYPTED_PASSWORD=\"{}\"", encrypted_password);
    println!("{}", rule);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_report_file_name() {
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 5, 2, 13, 45, 0).unwrap();
        assert_eq!(
            report_file_name(from, to, "json"),
            "volumetria_2024-05-01_-_2024-05-02.json"
        );
    }
}
