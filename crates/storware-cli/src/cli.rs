//! Command-line interface definitions for the `storware` binary.

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use storware_core::models::TaskStatus;

/// Default reporting window when no start date is given
const DEFAULT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Parser)]
#[command(
    name = "storware",
    version,
    about = "Volumetry and inventory reports for the Storware backup service",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect backup volumetry grouped by project and print it as JSON.
    Collect(CollectArgs),
    /// List the VM inventory.
    Vms(VmsArgs),
    /// Show the details of one VM.
    Vm(VmArgs),
    /// Show recent tasks executed by the backup service.
    Tasks(TasksArgs),
    /// Generate an encryption key and encrypt the service username and password.
    EncryptSecret(EncryptSecretArgs),
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Start of the report (YYYY-MM-DD, UTC midnight).
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub from_date: Option<NaiveDate>,
    /// End of the report (YYYY-MM-DD, UTC midnight). Defaults to now.
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub to_date: Option<NaiveDate>,
    /// Window length used when --from-date is not given.
    #[arg(
        long,
        value_name = "HOURS",
        default_value_t = DEFAULT_WINDOW_HOURS,
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    pub hours: i64,
    /// Include the list of VMs of each project.
    #[arg(long)]
    pub include_vms: bool,
    /// Abort when the VM inventory cannot be fetched instead of reporting without VMs.
    #[arg(long, requires = "include_vms")]
    pub fail_fast_inventory: bool,
    /// Write the report to this file instead of stdout.
    #[arg(long, short, value_name = "PATH", conflicts_with = "save")]
    pub output: Option<PathBuf>,
    /// Write the report to volumetria_<from>_-_<to>.json in the current directory.
    #[arg(long)]
    pub save: bool,
}

impl CollectArgs {
    /// Resolve the reporting window relative to `now`
    pub fn window(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let to = self.to_date.map(start_of_day).unwrap_or(now);
        let from = self
            .from_date
            .map(start_of_day)
            .unwrap_or_else(|| to - Duration::hours(self.hours));
        if from > to {
            bail!("--from-date must not be after --to-date");
        }
        Ok((from, to))
    }
}

#[derive(Debug, Args)]
pub struct VmsArgs {
    /// Only show VMs whose name contains this text (case-insensitive).
    #[arg(long, value_name = "TEXT")]
    pub filter_name: Option<String>,
    /// Show the first N VMs.
    #[arg(long, value_name = "N", conflicts_with = "tail")]
    pub head: Option<usize>,
    /// Show the last N VMs.
    #[arg(long, value_name = "N")]
    pub tail: Option<usize>,
}

#[derive(Debug, Args)]
pub struct VmArgs {
    /// GUID of the VM.
    #[arg(value_name = "GUID")]
    pub guid: String,
}

#[derive(Debug, Args)]
pub struct TasksArgs {
    /// Only show tasks in this state (QUEUED, RUNNING, FINISHED, FAILED, CANCELLED).
    #[arg(long, value_name = "STATUS")]
    pub status: Option<TaskStatus>,
    /// Only show tasks of the VM with this GUID.
    #[arg(long, value_name = "GUID")]
    pub vm_guid: Option<String>,
}

#[derive(Debug, Args)]
pub struct EncryptSecretArgs {
    /// Also store the generated key in the OS keychain.
    #[arg(long)]
    pub store_key: bool,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", value))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
