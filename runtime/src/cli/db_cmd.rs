// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pagewright db init|clients|add-appointment|history`

use super::{output, App};
use crate::store::{Appointment, Store};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime};
use pagewright::canonicalize_phone;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, clap::Subcommand)]
pub enum DbAction {
    /// Create the database and its tables if missing
    Init {
        /// Database file (defaults to the configured store)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// List known clients
    Clients,
    /// Book an appointment for a client
    AddAppointment {
        phone: String,
        /// When, e.g. `2026-11-02 15:30` or an RFC 3339 timestamp
        at: String,
        /// Client name; creates the client when the phone is new
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Appointments and messages recorded for one client
    History { phone: String },
}

const SCHEDULE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Normalize an appointment time so stored values sort chronologically.
fn parse_schedule(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local().format(SCHEDULE_FORMAT).to_string());
    }
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt.format(SCHEDULE_FORMAT).to_string());
        }
    }
    bail!("unrecognized appointment time {raw:?}; use YYYY-MM-DD HH:MM")
}

/// Attach an appointment to the client with `phone`, creating the client
/// when `name` is given.
pub fn add_appointment(
    store: &Store,
    country_code: u8,
    phone: &str,
    name: Option<&str>,
    at: &str,
    note: Option<&str>,
) -> Result<Appointment> {
    let canonical = canonicalize_phone(phone, country_code)
        .with_context(|| format!("unrecognized phone {phone:?}"))?;
    let scheduled_at = parse_schedule(at)?;
    let client_id = match (store.find_client_by_phone(&canonical)?, name) {
        (Some(client), _) => client.id,
        (None, Some(name)) => store.upsert_client(name, &canonical)?,
        (None, None) => bail!("no client with phone {canonical}; pass --name to create one"),
    };
    let id = store.add_appointment(client_id, &scheduled_at, note)?;
    Ok(Appointment {
        id,
        client_id,
        scheduled_at,
        note: note.map(str::to_string),
    })
}

fn store_path<'a>(app: &'a App, explicit: Option<&'a PathBuf>) -> &'a Path {
    explicit.map(PathBuf::as_path).unwrap_or(app.config.store_path.as_path())
}

pub async fn run(app: &App, action: &DbAction) -> Result<()> {
    match action {
        DbAction::Init { path } => {
            let path = store_path(app, path.as_ref());
            Store::open(path)?;
            if app.json {
                output::print_json(&serde_json::json!({ "store": path }));
            } else {
                println!("Store ready at {}", path.display());
            }
        }
        DbAction::Clients => {
            let store = Store::open(&app.config.store_path)?;
            let clients = store.list_clients()?;
            if app.json {
                output::print_json(&clients);
            } else if clients.is_empty() {
                println!("No clients recorded.");
            } else {
                for c in &clients {
                    println!("  {:>5}  {:<16} {}", c.id, c.phone, c.name);
                }
            }
        }
        DbAction::AddAppointment {
            phone,
            at,
            name,
            note,
        } => {
            let store = Store::open(&app.config.store_path)?;
            let appointment = add_appointment(
                &store,
                app.config.default_country_code,
                phone,
                name.as_deref(),
                at,
                note.as_deref(),
            )?;
            if app.json {
                output::print_json(&appointment);
            } else {
                println!(
                    "Appointment {} booked for {}",
                    appointment.id, appointment.scheduled_at
                );
            }
        }
        DbAction::History { phone } => {
            let canonical = canonicalize_phone(phone, app.config.default_country_code)
                .with_context(|| format!("unrecognized phone {phone:?}"))?;
            let store = Store::open(&app.config.store_path)?;
            let client = store
                .find_client_by_phone(&canonical)?
                .with_context(|| format!("no client with phone {canonical}"))?;
            let appointments = store.appointments_for_client(client.id)?;
            let messages = store.messages_for_client(client.id)?;

            if app.json {
                output::print_json(&serde_json::json!({
                    "client": client,
                    "appointments": appointments,
                    "messages": messages,
                }));
            } else {
                println!("{} ({})", client.name, client.phone);
                for a in &appointments {
                    println!(
                        "  appointment {}  {}",
                        a.scheduled_at,
                        a.note.as_deref().unwrap_or("")
                    );
                }
                for m in &messages {
                    println!(
                        "  message {}  {:<10} x{}  {}",
                        m.sent_at, m.status, m.attempts, m.body
                    );
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_formats_normalize() {
        assert_eq!(parse_schedule("2026-11-02 15:30").unwrap(), "2026-11-02 15:30");
        assert_eq!(parse_schedule("2026-11-02T15:30:00").unwrap(), "2026-11-02 15:30");
        assert_eq!(
            parse_schedule("2026-11-02T15:30:00-05:00").unwrap(),
            "2026-11-02 15:30"
        );
        assert!(parse_schedule("next tuesday").is_err());
    }

    #[test]
    fn test_add_appointment_shows_in_history() {
        let store = Store::open_in_memory().unwrap();
        let appt = add_appointment(
            &store,
            1,
            "(212) 555-1234",
            Some("Ana"),
            "2026-11-02 15:30",
            Some("cleaning"),
        )
        .unwrap();

        let client = store.find_client_by_phone("+12125551234").unwrap().unwrap();
        assert_eq!(appt.client_id, client.id);
        let booked = store.appointments_for_client(client.id).unwrap();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].scheduled_at, "2026-11-02 15:30");
        assert_eq!(booked[0].note.as_deref(), Some("cleaning"));

        // Existing client: name not required.
        add_appointment(&store, 1, "212-555-1234", None, "2026-11-09 09:00", None).unwrap();
        assert_eq!(store.appointments_for_client(client.id).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_client_without_name_rejected() {
        let store = Store::open_in_memory().unwrap();
        let err = add_appointment(&store, 1, "2125551234", None, "2026-11-02 15:30", None)
            .unwrap_err();
        assert!(err.to_string().contains("--name"));
        assert!(store.list_clients().unwrap().is_empty());
    }
}
