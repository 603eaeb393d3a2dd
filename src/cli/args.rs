use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Inspect and maintain the tether offline sync queue")]
#[command(long_about = "tether - offline-first sync engine

Inspect and maintain the durable operation queue that holds mutations made
while offline, and try out conflict resolution on local/server record pairs.

QUICK START:
  tether status                         Queue and sync status
  tether list                           Pending operations in execution order
  tether add send-message '{\"thread_id\":\"t-1\",\"body\":\"hi\"}'
  tether resolve merge local.json server.json

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

LOGGING:
  Set TETHER_LOG (e.g. TETHER_LOG=debug) to see engine logs on stderr.")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub output: OutputFormat,

    /// Database file (default: ~/.tether/tether.db)
    #[arg(long, global = true, env = "TETHER_DB")]
    pub db: Option<PathBuf>,

    /// Configuration override file (default: ~/.tether/config.yaml)
    #[arg(long, global = true, env = "TETHER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show queue and sync status
    ///
    /// Displays retryable, waiting and failed operation counts, the oldest
    /// pending operation and the time of the last sync pass.
    #[command(alias = "s")]
    Status,

    /// List queued operations
    ///
    /// Operations are listed in execution order: highest priority first,
    /// oldest first within a priority.
    ///
    /// # Examples
    ///
    ///   tether list                 All queued operations
    ///   tether list --retryable     Only those the next pass would attempt
    ///   tether list -o json         Full records as JSON
    #[command(alias = "ls")]
    List {
        /// Only operations eligible for the next sync pass
        #[arg(long)]
        retryable: bool,

        /// Maximum operations to show
        #[arg(long, short = 'n', default_value = "50")]
        limit: usize,
    },

    /// Queue an operation
    ///
    /// The payload is the JSON body for the operation type.
    ///
    /// # Examples
    ///
    ///   tether add accept-assignment '{"assignment_id":"as-7"}'
    ///   tether add update-profile '{"changes":{"phone":"555-0100"}}'
    Add {
        /// Operation type (e.g. create-incident, send-message, update-profile)
        operation_type: String,

        /// Payload as JSON
        payload: String,
    },

    /// Remove an operation from the queue
    #[command(alias = "rm")]
    Remove {
        /// Operation ID
        id: String,
    },

    /// Reset retry bookkeeping so failed operations are attempted again
    Retry {
        /// Reset every operation that exhausted its retries
        #[arg(long, conflicts_with = "id")]
        all: bool,

        /// Operation ID
        id: Option<String>,
    },

    /// Delete operations that exhausted their retries
    Purge {
        /// Delete every queued operation, not only failed ones
        #[arg(long)]
        all: bool,

        /// Required with --all
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    ///
    /// # Examples
    ///
    ///   tether config              Whole configuration
    ///   tether config retry        One section
    Config {
        /// Section name (features, cache, retry, sync, conflict, security)
        section: Option<String>,
    },

    /// Resolve a conflict between two JSON documents
    ///
    /// STRATEGY is one of server-wins, client-wins, last-write-wins or
    /// merge; unknown names resolve as server-wins. The field-priority
    /// tables are available as incident-report and safety-plan.
    ///
    /// # Examples
    ///
    ///   tether resolve last-write-wins local.json server.json
    ///   tether resolve incident-report local.json server.json
    Resolve {
        /// Strategy or field table
        strategy: String,

        /// File holding the local version
        local: PathBuf,

        /// File holding the server version
        server: PathBuf,
    },

    /// Delete every value stored under a sensitive key
    ClearSensitive {
        /// Confirm deletion
        #[arg(long)]
        force: bool,
    },
}
