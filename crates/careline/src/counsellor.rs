// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `careline counsellor` command implementation.
//!
//! Maintains counsellor records and their delivery channels directly in
//! the store, producing the same rows as the admin API.

use clap::Subcommand;

use careline_config::model::CarelineConfig;
use careline_core::{CarelineError, ChannelBinding, Counsellor, CounsellorId, Store};
use careline_storage::SqliteStore;

/// Counsellor management subcommands.
#[derive(Subcommand, Debug)]
pub enum CounsellorCommand {
    /// Register a new counsellor.
    Add {
        /// Unique counsellor id.
        id: String,
        /// Display name.
        #[arg(long)]
        name: String,
        /// Login username; defaults to the id.
        #[arg(long)]
        username: Option<String>,
        /// Contact address for the roster (phone number or console handle).
        #[arg(long, default_value = "")]
        contact: String,
    },
    /// List counsellors with their current load.
    List {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// Remove a counsellor.
    Remove {
        /// Counsellor id to remove.
        id: String,
    },
    /// Attach a delivery channel to a counsellor.
    AddChannel {
        /// Counsellor id the channel belongs to.
        id: String,
        /// Channel kind (whatsapp or webchat).
        #[arg(long)]
        kind: String,
        /// Provider-side address reaching this counsellor.
        #[arg(long)]
        channel_id: String,
        /// Failover order; lower tries first.
        #[arg(long, default_value_t = 1)]
        priority: i64,
        /// Per-binding token override for the transport.
        #[arg(long)]
        auth_key: Option<String>,
    },
}

/// Run the `careline counsellor` command against the configured store.
pub async fn run_counsellor(
    config: &CarelineConfig,
    command: CounsellorCommand,
) -> Result<(), CarelineError> {
    let store = SqliteStore::open(&config.storage).await?;

    match command {
        CounsellorCommand::Add {
            id,
            name,
            username,
            contact,
        } => {
            let counsellor = Counsellor {
                id: CounsellorId(id.clone()),
                name,
                username: username.unwrap_or_else(|| id.clone()),
                contact,
                current_ticket: None,
                last_assigned_at: None,
            };
            store.add_counsellor(&counsellor).await?;
            println!("counsellor {id} added");
        }
        CounsellorCommand::List { json } => {
            let counsellors = store.list_counsellors().await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&counsellors)
                        .unwrap_or_else(|_| "[]".to_string())
                );
            } else if counsellors.is_empty() {
                println!("no counsellors registered");
            } else {
                println!(
                    "{:<12} {:<20} {:<20} {}",
                    "ID", "NAME", "CONTACT", "CURRENT TICKET"
                );
                for counsellor in &counsellors {
                    let load = counsellor
                        .current_ticket
                        .as_ref()
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<12} {:<20} {:<20} {load}",
                        counsellor.id, counsellor.name, counsellor.contact
                    );
                }
            }
        }
        CounsellorCommand::Remove { id } => {
            if store.remove_counsellor(&CounsellorId(id.clone())).await? {
                println!("counsellor {id} removed");
            } else {
                return Err(CarelineError::NotFound {
                    entity: "counsellor",
                    id,
                });
            }
        }
        CounsellorCommand::AddChannel {
            id,
            kind,
            channel_id,
            priority,
            auth_key,
        } => {
            let counsellor_id = CounsellorId(id.clone());
            if store.get_counsellor(&counsellor_id).await?.is_none() {
                return Err(CarelineError::NotFound {
                    entity: "counsellor",
                    id,
                });
            }
            store
                .add_channel(&ChannelBinding {
                    counsellor_id,
                    kind: kind.clone(),
                    channel_id: channel_id.clone(),
                    auth_key,
                    order_priority: priority,
                })
                .await?;
            println!("channel {kind}:{channel_id} attached to {id}");
        }
    }

    Ok(())
}
