use chrono::NaiveDate;
use clap::Subcommand;
use rategrid_core::{CellKey, Config, EditLedger, GridAssembler, GridFilter, InventoryGrid, RowKind};

use super::{open_store, parse_date, runtime, CliResult};

const LABEL_WIDTH: usize = 28;
const CELL_WIDTH: usize = 9;

#[derive(Subcommand)]
pub enum GridAction {
    /// Print availability and rates for a property and date range
    Show {
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
        /// Print the grid as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: GridAction) -> CliResult {
    match action {
        GridAction::Show {
            property,
            from,
            to,
            room_types,
            rate_plans,
            json,
        } => {
            let config = Config::load()?;
            let store = open_store(&config)?;
            let assembler =
                GridAssembler::new(&store).with_max_range_days(config.grid.max_range_days);
            let filter = build_filter(room_types, rate_plans);
            let grid = runtime()?.block_on(assembler.assemble(&property, from, to, &filter))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&grid)?);
            } else {
                print!("{}", render_grid(&grid, None));
            }
        }
    }
    Ok(())
}

/// Empty id lists mean "no restriction".
pub fn build_filter(room_types: Vec<String>, rate_plans: Vec<String>) -> GridFilter {
    let mut filter = GridFilter::all();
    if !room_types.is_empty() {
        filter = filter.with_room_types(room_types);
    }
    if !rate_plans.is_empty() {
        filter = filter.with_rate_plans(rate_plans);
    }
    filter
}

/// Plain-text table of the grid. Cells with a pending edit show the edited
/// value followed by `*`.
pub fn render_grid(grid: &InventoryGrid, pending: Option<&EditLedger>) -> String {
    let mut out = format!(
        "{} ({})  {}\n",
        grid.property.title, grid.property.id, grid.range
    );

    out.push_str(&format!("{:<LABEL_WIDTH$}", ""));
    for date in &grid.dates {
        out.push_str(&format!("{:>CELL_WIDTH$}", date.format("%m-%d").to_string()));
    }
    out.push('\n');

    let cell_text = |kind: RowKind, owner: &str, date: NaiveDate, stored: String| {
        let key = CellKey::new(kind, owner, date);
        match pending.and_then(|ledger| ledger.get(&key)) {
            Some(edit) => format!("{}*", edit.new_value),
            None => stored,
        }
    };

    for room in &grid.room_types {
        let id = &room.room_type.id;
        out.push_str(&label(&format!("{id} {} avail", room.room_type.title)));
        for cell in &room.availability {
            let text = cell_text(RowKind::Availability, id, cell.date, cell.value.to_string());
            out.push_str(&format!("{text:>CELL_WIDTH$}"));
        }
        out.push('\n');

        for plan in &room.rate_plans {
            let id = &plan.rate_plan.id;
            out.push_str(&label(&format!("  {id} {} rate", plan.rate_plan.title)));
            for cell in &plan.rates {
                let text = cell_text(RowKind::Rate, id, cell.date, format!("{:.2}", cell.value));
                out.push_str(&format!("{text:>CELL_WIDTH$}"));
            }
            out.push('\n');
        }
    }
    out
}

fn label(text: &str) -> String {
    let truncated: String = text.chars().take(LABEL_WIDTH - 1).collect();
    format!("{truncated:<LABEL_WIDTH$}")
}
