//! Line-oriented edit session.
//!
//! Reads one command per line from stdin and drives an [`EditSession`]:
//! typed input, blur, discard, save and per-row sync. Errors of a single
//! command are reported on stderr and the session keeps going.

use std::io::BufRead;

use chrono::NaiveDate;
use clap::Args;
use rategrid_core::error::CommitError;
use rategrid_core::reconcile::OperationOutcome;
use rategrid_core::{
    CellKey, ChannelManager, Config, EditSession, GridAssembler, HttpChannelManager, Reconciler,
    RecordStore, RowKey, RowKind, RowSyncer, SyncEligibility,
};
use tracing::{debug, warn};

use super::grid::{build_filter, render_grid};
use super::{open_store, parse_date, runtime, CliResult};

type CommandResult = Result<String, Box<dyn std::error::Error>>;

const HELP: &str = "\
commands:
  set <kind> <owner> <date> [value]    typed input (empty value clears)
  blur <kind> <owner> <date> [value]   input on leaving the cell (clamps)
  discard <kind> <owner> <date>        drop a pending edit
  pending                              list pending edits
  save                                 persist pending edits
  sync <kind> <owner>                  push one row to the channel manager
  status                               dirty rows and sync eligibility
  show                                 print the grid
  reload                               reload the grid from the store
  quit
kind is 'availability' or 'rate'";

#[derive(Args)]
pub struct SessionArgs {
    /// Property id
    #[arg(long)]
    property: String,
    /// First date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    from: NaiveDate,
    /// Last date, inclusive (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    to: NaiveDate,
    /// Only load these room types (repeatable)
    #[arg(long = "room-type")]
    room_types: Vec<String>,
    /// Only load these rate plans (repeatable)
    #[arg(long = "rate-plan")]
    rate_plans: Vec<String>,
    /// Push every dirty row after a successful save
    #[arg(long)]
    sync: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Set { key: CellKey, raw: String },
    Blur { key: CellKey, raw: String },
    Discard { key: CellKey },
    Pending,
    Save,
    Sync { row: RowKey },
    Status,
    Show,
    Reload,
    Help,
    Quit,
}

impl SessionCommand {
    /// Parse one input line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        if verb.starts_with('#') {
            return Ok(None);
        }
        let rest: Vec<&str> = words.collect();

        let command = match verb {
            "set" | "blur" => {
                let key = parse_cell_key(&rest)?;
                let raw = rest[3..].join(" ");
                if verb == "set" {
                    SessionCommand::Set { key, raw }
                } else {
                    SessionCommand::Blur { key, raw }
                }
            }
            "discard" => SessionCommand::Discard {
                key: parse_cell_key(&rest)?,
            },
            "sync" => {
                let [kind, owner] = rest[..] else {
                    return Err("usage: sync <kind> <owner>".into());
                };
                SessionCommand::Sync {
                    row: RowKey::new(parse_kind(kind)?, owner),
                }
            }
            "pending" => SessionCommand::Pending,
            "save" => SessionCommand::Save,
            "status" => SessionCommand::Status,
            "show" => SessionCommand::Show,
            "reload" => SessionCommand::Reload,
            "help" | "?" => SessionCommand::Help,
            "quit" | "exit" => SessionCommand::Quit,
            other => return Err(format!("unknown command '{other}' (try 'help')")),
        };
        Ok(Some(command))
    }
}

fn parse_kind(s: &str) -> Result<RowKind, String> {
    s.parse::<RowKind>().map_err(|e| e.to_string())
}

fn parse_cell_key(words: &[&str]) -> Result<CellKey, String> {
    if words.len() < 3 {
        return Err("expected <kind> <owner> <date>".into());
    }
    let kind = parse_kind(words[0])?;
    let date = parse_date(words[2])?;
    Ok(CellKey::new(kind, words[1], date))
}

/// Session state plus the collaborators it saves and syncs through.
pub struct SessionRepl<'a, S: RecordStore + ?Sized> {
    session: EditSession,
    assembler: GridAssembler<'a, S>,
    reconciler: Reconciler<'a, S>,
    channel: Result<&'a dyn ChannelManager, String>,
    sync_after_save: bool,
}

impl<'a, S: RecordStore + ?Sized> SessionRepl<'a, S> {
    pub fn new(
        session: EditSession,
        assembler: GridAssembler<'a, S>,
        reconciler: Reconciler<'a, S>,
        channel: Result<&'a dyn ChannelManager, String>,
        sync_after_save: bool,
    ) -> Self {
        Self {
            session,
            assembler,
            reconciler,
            channel,
            sync_after_save,
        }
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    /// Run one command and return what to print.
    pub async fn execute(&mut self, command: SessionCommand) -> CommandResult {
        match command {
            SessionCommand::Set { key, raw } => {
                let edit = self.session.set_cell(key, &raw)?;
                Ok(format!(
                    "{} = {} (was {})",
                    edit.key, edit.new_value, edit.original_value
                ))
            }
            SessionCommand::Blur { key, raw } => {
                let edit = self.session.finalize_cell(key, &raw)?;
                Ok(format!(
                    "{} = {} (was {})",
                    edit.key, edit.new_value, edit.original_value
                ))
            }
            SessionCommand::Discard { key } => {
                if self.session.discard(&key) {
                    Ok(format!("discarded {key}"))
                } else {
                    Ok(format!("no pending edit for {key}"))
                }
            }
            SessionCommand::Pending => Ok(self.pending()),
            SessionCommand::Save => self.save().await,
            SessionCommand::Sync { row } => self.sync(&row).await,
            SessionCommand::Status => self.status(),
            SessionCommand::Show => Ok(render_grid(
                self.session.grid(),
                Some(self.session.ledger()),
            )
            .trim_end()
            .to_string()),
            SessionCommand::Reload => {
                self.session.reload(&self.assembler).await?;
                Ok("reloaded".into())
            }
            SessionCommand::Help => Ok(HELP.into()),
            SessionCommand::Quit => Ok(String::new()),
        }
    }

    fn pending(&self) -> String {
        let ledger = self.session.ledger();
        if ledger.is_empty() {
            return "no pending edits".into();
        }
        ledger
            .iter()
            .map(|edit| {
                format!(
                    "{}: {} -> {}",
                    edit.key, edit.original_value, edit.new_value
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn save(&mut self) -> CommandResult {
        let report = match self.session.commit(&self.reconciler).await {
            Ok(report) => report,
            Err(err @ CommitError::Partial { .. }) => {
                let mut message = err.to_string();
                if let CommitError::Partial { report } = &err {
                    for failed in report.failures() {
                        if let OperationOutcome::Failed { reason } = &failed.outcome {
                            message.push_str(&format!("\n  {}: {reason}", failed.key));
                        }
                    }
                }
                return Err(message.into());
            }
            Err(e) => return Err(e.into()),
        };

        if report.is_empty() {
            return Ok("nothing to save".into());
        }
        let mut out = format!(
            "saved {} change(s) (commit {})",
            report.success_count(),
            report.commit_id
        );

        if self.sync_after_save {
            for row in self.session.tracker().dirty_rows() {
                match self.sync(&row).await {
                    Ok(line) => out.push_str(&format!("\n{line}")),
                    Err(e) => {
                        warn!(row = %row, error = %e, "sync after save failed");
                        out.push_str(&format!("\nnot synced {row}: {e}"));
                    }
                }
            }
        }
        Ok(out)
    }

    async fn sync(&mut self, row: &RowKey) -> CommandResult {
        let channel = match &self.channel {
            Ok(channel) => *channel,
            Err(reason) => return Err(reason.clone().into()),
        };
        let outcome = self
            .session
            .sync_row(&RowSyncer::new(channel), row)
            .await?;
        Ok(format!(
            "synced {}: {} day(s) in {} range(s)",
            outcome.row, outcome.days, outcome.ranges
        ))
    }

    fn status(&self) -> CommandResult {
        let mut lines = vec![format!(
            "{} pending edit(s){}",
            self.session.ledger().len(),
            if self.session.commit_in_flight() {
                ", save in progress"
            } else {
                ""
            }
        )];
        for row in self.session.grid().rows() {
            let state = if self.session.tracker().is_dirty(&row) {
                "dirty"
            } else {
                "clean"
            };
            let sync = match self.session.eligibility(&row)? {
                SyncEligibility::Enabled => "sync enabled".to_string(),
                SyncEligibility::Disabled(reason) => format!("sync disabled: {reason}"),
            };
            lines.push(format!("{row}: {state}, {sync}"));
        }
        Ok(lines.join("\n"))
    }
}

pub fn run(args: SessionArgs) -> CliResult {
    let config = Config::load()?;
    let store = open_store(&config)?;

    let http = HttpChannelManager::from_config(&config.channel_manager);
    let channel: Result<&dyn ChannelManager, String> = match &http {
        Ok(client) => Ok(client as &dyn ChannelManager),
        Err(e) => {
            debug!(error = %e, "channel manager unavailable, sync is off");
            Err(e.to_string())
        }
    };

    let assembler = GridAssembler::new(&store).with_max_range_days(config.grid.max_range_days);
    let reconciler = Reconciler::new(&store).with_batch_size(config.commit.batch_size);
    let filter = build_filter(args.room_types, args.rate_plans);

    let rt = runtime()?;
    let session = rt.block_on(EditSession::open(
        &assembler,
        &args.property,
        args.from,
        args.to,
        filter,
    ))?;
    let mut repl = SessionRepl::new(session, assembler, reconciler, channel, args.sync);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let command = match SessionCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };
        if command == SessionCommand::Quit {
            break;
        }
        match rt.block_on(repl.execute(command)) {
            Ok(text) if text.is_empty() => {}
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    let unsaved = repl.session().ledger().len();
    if unsaved > 0 {
        eprintln!("warning: {unsaved} unsaved edit(s) discarded");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rategrid_core::{GridFilter, MemoryRecordStore, Property, RatePlan, RoomType};

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn store() -> MemoryRecordStore {
        let store = MemoryRecordStore::new();
        store
            .insert_property(Property {
                id: "H1".into(),
                title: "Harbour Hotel".into(),
                channel_id: Some("cm-h1".into()),
            })
            .unwrap();
        store
            .insert_room_type(RoomType {
                id: "R1".into(),
                property_id: "H1".into(),
                title: "Double".into(),
                room_count: 4,
                channel_id: Some("cm-r1".into()),
            })
            .unwrap();
        store
            .insert_rate_plan(RatePlan {
                id: "P1".into(),
                room_type_id: "R1".into(),
                title: "Flexible".into(),
                code: None,
                channel_id: Some("cm-p1".into()),
            })
            .unwrap();
        store
    }

    async fn repl(store: &MemoryRecordStore) -> SessionRepl<'_, MemoryRecordStore> {
        let assembler = GridAssembler::new(store);
        let session = EditSession::open(
            &assembler,
            "H1",
            d("2024-06-01"),
            d("2024-06-03"),
            GridFilter::all(),
        )
        .await
        .unwrap();
        SessionRepl::new(
            session,
            assembler,
            Reconciler::new(store),
            Err("Channel manager not configured".into()),
            false,
        )
    }

    fn parse(line: &str) -> SessionCommand {
        SessionCommand::parse(line).unwrap().unwrap()
    }

    #[test]
    fn parses_cell_commands() {
        assert_eq!(
            parse("set availability R1 2024-06-01 5"),
            SessionCommand::Set {
                key: CellKey::new(RowKind::Availability, "R1", d("2024-06-01")),
                raw: "5".into(),
            }
        );
        assert_eq!(
            parse("set rate P1 2024-06-02"),
            SessionCommand::Set {
                key: CellKey::new(RowKind::Rate, "P1", d("2024-06-02")),
                raw: String::new(),
            }
        );
        assert_eq!(
            parse("sync avail R1"),
            SessionCommand::Sync {
                row: RowKey::availability("R1")
            }
        );
    }

    #[test]
    fn blank_lines_and_comments_are_skipped() {
        assert_eq!(SessionCommand::parse("   ").unwrap(), None);
        assert_eq!(SessionCommand::parse("# note").unwrap(), None);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(SessionCommand::parse("set availability R1").is_err());
        assert!(SessionCommand::parse("set rooms R1 2024-06-01 3").is_err());
        assert!(SessionCommand::parse("sync rate").is_err());
        assert!(SessionCommand::parse("dance").is_err());
    }

    #[tokio::test]
    async fn save_marks_rows_dirty() {
        let store = store();
        let mut repl = repl(&store).await;

        repl.execute(parse("set availability R1 2024-06-02 4"))
            .await
            .unwrap();
        let pending = repl.execute(parse("pending")).await.unwrap();
        assert_eq!(pending, "availability R1 2024-06-02: 0 -> 4");

        let saved = repl.execute(parse("save")).await.unwrap();
        assert!(saved.starts_with("saved 1 change(s)"));
        assert_eq!(store.availability_value("R1", d("2024-06-02")), Some(4));

        let status = repl.execute(parse("status")).await.unwrap();
        assert!(status.contains("availability R1: dirty, sync enabled"));
        assert!(status.contains("rate P1: clean, sync disabled: row has no values to sync"));
    }

    #[tokio::test]
    async fn rejected_input_leaves_the_ledger_alone() {
        let store = store();
        let mut repl = repl(&store).await;

        assert!(repl
            .execute(parse("set availability R1 2024-06-01 13"))
            .await
            .is_err());
        assert!(repl.session().ledger().is_empty());

        let out = repl
            .execute(parse("blur availability R1 2024-06-01 13"))
            .await
            .unwrap();
        assert!(out.ends_with("= 12 (was 0)"));
    }

    #[tokio::test]
    async fn sync_without_a_channel_reports_why() {
        let store = store();
        let mut repl = repl(&store).await;
        repl.execute(parse("set availability R1 2024-06-01 2"))
            .await
            .unwrap();
        repl.execute(parse("save")).await.unwrap();

        let err = repl.execute(parse("sync availability R1")).await.unwrap_err();
        assert_eq!(err.to_string(), "Channel manager not configured");
        assert!(repl
            .session()
            .tracker()
            .is_dirty(&RowKey::availability("R1")));
    }
}
