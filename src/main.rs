use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use roster_core::config::{load_config, AppConfig};
use roster_core::model::pattern::{RecurrenceKind, RecurringShiftPattern, ShiftTemplate};
use roster_core::model::requirement::{ShiftSkillRequirement, SkillWeights};
use roster_core::model::shift::Shift;
use roster_core::model::staff::{QualificationType, StaffMember, StaffRole};
use roster_core::schedule::generate_bulk_shifts_from_patterns;
use roster_core::server::run_http_server;
use roster_core::session::{AutoStaffing, RosterSession};
use roster_core::store::autosave::Autosaver;
use roster_core::store::kv::FileKeyValueStore;
use roster_core::store::pattern::PatternStore;
use roster_core::{matching::unassigned_shifts, SkillMatchEngine};

/// Roster: recurring shift patterns, skill-based staffing and undoable roster edits
#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Generate shifts from recurring patterns, auto-staff them by skill match, and edit the roster with undo/redo.")]
#[command(version)]
struct Cli {
    /// Extra configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand recurring patterns into concrete shifts
    Expand {
        /// JSON file with an array of patterns
        #[arg(short, long)]
        patterns: PathBuf,
        /// First day of the window (YYYY-MM-DD)
        #[arg(short, long)]
        from: NaiveDate,
        /// Number of weeks to generate
        #[arg(short, long, default_value = "2")]
        weeks: u32,
        /// JSON file with shifts already on the roster
        #[arg(long)]
        existing: Option<PathBuf>,
    },
    /// Auto-assign staff to shift requirements
    Match {
        /// JSON file with an array of staff members
        #[arg(short, long)]
        staff: PathBuf,
        /// JSON file with an array of shift requirements
        #[arg(short, long)]
        requirements: PathBuf,
        /// JSON file with skill weight overrides
        #[arg(long)]
        weights: Option<PathBuf>,
        /// JSON file with shifts already on the roster
        #[arg(long)]
        existing: Option<PathBuf>,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Walk through generation, auto-staffing and undo on a sample centre
    Demo,
    /// Start an interactive roster editing session
    Interactive {
        /// Pre-load the sample staff and patterns
        #[arg(long)]
        demo: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Expand {
            patterns,
            from,
            weeks,
            existing,
        } => run_expand(&patterns, from, weeks, existing.as_deref()),
        Commands::Match {
            staff,
            requirements,
            weights,
            existing,
        } => run_match(&config, &staff, &requirements, weights.as_deref(), existing.as_deref()),
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run_http_server(config).await.context("server failed")
        }
        Commands::Demo => run_demo(&config).await,
        Commands::Interactive { demo } => run_interactive(&config, demo).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("roster_core=info,roster=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn read_optional_json<T: DeserializeOwned + Default>(path: Option<&Path>) -> anyhow::Result<T> {
    match path {
        Some(path) => read_json(path),
        None => Ok(T::default()),
    }
}

// ---------------------------------------------------------------------------
// One-shot commands
// ---------------------------------------------------------------------------

fn run_expand(
    patterns: &Path,
    from: NaiveDate,
    weeks: u32,
    existing: Option<&Path>,
) -> anyhow::Result<()> {
    let patterns: Vec<RecurringShiftPattern> = read_json(patterns)?;
    let existing: Vec<Shift> = read_optional_json(existing)?;

    let generation = generate_bulk_shifts_from_patterns(&patterns, from, weeks, &existing);
    for count in &generation.summary {
        eprintln!("  {:<24} {} shifts", count.pattern_name, count.count);
    }
    println!("{}", serde_json::to_string_pretty(&generation.shifts)?);
    Ok(())
}

fn run_match(
    config: &AppConfig,
    staff: &Path,
    requirements: &Path,
    weights: Option<&Path>,
    existing: Option<&Path>,
) -> anyhow::Result<()> {
    let staff: Vec<StaffMember> = read_json(staff)?;
    let requirements: Vec<ShiftSkillRequirement> = read_json(requirements)?;
    let weights: SkillWeights = read_optional_json(weights)?;
    let existing: Vec<Shift> = read_optional_json(existing)?;

    let engine = SkillMatchEngine::new(config.matching.clone());
    let assignments = engine.auto_match_all_shifts(&staff, &requirements, &weights, &existing);
    let open = unassigned_shifts(&requirements, &assignments);

    if !open.is_empty() {
        eprintln!(
            "Could not auto-assign {} of {} shifts",
            open.len(),
            requirements.len()
        );
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "assignments": assignments,
            "unassigned": open,
        }))?
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Demo data
// ---------------------------------------------------------------------------

fn demo_staff() -> Vec<StaffMember> {
    vec![
        StaffMember::new("S1", "Ava Nguyen", StaffRole::RoomLeader)
            .with_qualification(QualificationType::Diploma)
            .with_qualification(QualificationType::FirstAid)
            .with_qualification(QualificationType::WorkingWithChildren),
        StaffMember::new("S2", "Ben Carter", StaffRole::Educator)
            .with_qualification(QualificationType::CertificateIii)
            .with_qualification(QualificationType::FirstAid),
        StaffMember::new("S3", "Chloe Smith", StaffRole::EarlyChildhoodTeacher)
            .with_qualification(QualificationType::EarlyChildhoodTeacher)
            .with_qualification(QualificationType::Cpr),
        StaffMember::new("S4", "Dev Patel", StaffRole::Assistant),
    ]
}

fn demo_patterns(start: NaiveDate) -> Vec<RecurringShiftPattern> {
    let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default();
    let template = |start_time, end_time, room: &str, required: Vec<QualificationType>| ShiftTemplate {
        start_time,
        end_time,
        role: Some("educator".to_string()),
        centre_id: "main".to_string(),
        room_id: Some(room.to_string()),
        required_qualifications: required,
        break_minutes: 30,
    };

    vec![
        RecurringShiftPattern::new(
            "Nursery opener",
            start,
            template(hm(7, 0), hm(15, 0), "nursery", vec![QualificationType::FirstAid]),
        )
        .on_days([1, 3, 5]),
        RecurringShiftPattern::new(
            "Kindy teacher",
            start,
            template(hm(8, 30), hm(16, 30), "kindy", vec![QualificationType::EarlyChildhoodTeacher]),
        )
        .with_recurrence(RecurrenceKind::Fortnightly)
        .on_days([2, 4]),
        RecurringShiftPattern::new(
            "Toddler closer",
            start,
            template(hm(10, 0), hm(18, 0), "toddlers", Vec::new()),
        )
        .on_days([1, 2, 3, 4, 5]),
    ]
}

fn next_monday() -> NaiveDate {
    use chrono::{Datelike, Duration};
    let today = chrono::Local::now().date_naive();
    let ahead = (7 - today.weekday().num_days_from_monday()) % 7;
    today + Duration::days(i64::from(ahead))
}

async fn run_demo(config: &AppConfig) -> anyhow::Result<()> {
    let monday = next_monday();
    let staff = demo_staff();
    let weights = SkillWeights::new();
    let patterns = PatternStore::with_patterns(demo_patterns(monday));
    let active: Vec<RecurringShiftPattern> = patterns.active().cloned().collect();

    let session = RosterSession::new(
        Vec::new(),
        config.history.max_history,
        SkillMatchEngine::new(config.matching.clone()),
    );

    println!("=== Roster demo: week of {} ===\n", monday);
    let report = session
        .generate_from_patterns(
            &active,
            monday,
            2,
            Some(AutoStaffing {
                staff: &staff,
                skill_weights: &weights,
            }),
        )
        .await;

    for count in &report.summary {
        println!("  {:<18} {:>3} shifts", count.pattern_name, count.count);
    }
    println!(
        "\n  Generated {} shifts, auto-assigned {}, could not auto-assign {}",
        report.created,
        report.assignments.len(),
        report.unassigned.len()
    );

    print_roster(&session.shifts().await, &staff);

    println!("\n--- Undo the bulk generation ---");
    session.undo().await;
    println!("  Shifts on roster: {}", session.shifts().await.len());

    println!("\n--- Redo ---");
    session.redo().await;
    println!("  Shifts on roster: {}", session.shifts().await.len());

    println!("\n--- History ---");
    print_history(&session).await;
    Ok(())
}

fn staff_name<'a>(staff: &'a [StaffMember], id: Option<&str>) -> &'a str {
    id.and_then(|id| staff.iter().find(|s| s.id == id))
        .map(|s| s.name.as_str())
        .unwrap_or("(open)")
}

fn print_roster(shifts: &[Shift], staff: &[StaffMember]) {
    if shifts.is_empty() {
        println!("  (no shifts)");
        return;
    }
    for (index, shift) in shifts.iter().enumerate() {
        println!(
            "  [{:>2}] {} {}  {}-{}  {:<10} {}",
            index,
            shift.date.format("%a"),
            shift.date,
            shift.start_time.format("%H:%M"),
            shift.end_time.format("%H:%M"),
            shift.room_id.as_deref().unwrap_or("-"),
            staff_name(staff, shift.staff_id.as_deref()),
        );
    }
}

async fn print_history(session: &RosterSession) {
    let view = session.history().await;
    for entry in &view.entries {
        let marker = if entry.is_current { "*" } else { " " };
        println!(
            "  {} [{:>2}] {} {:<8} {}",
            marker,
            entry.index,
            entry.timestamp.format("%H:%M:%S"),
            format!("{:?}", entry.action_type).to_lowercase(),
            entry.description
        );
    }
}

// ---------------------------------------------------------------------------
// Interactive REPL
// ---------------------------------------------------------------------------

/// State shared by REPL commands.
struct Repl {
    session: RosterSession,
    patterns: PatternStore,
    staff: Vec<StaffMember>,
    weights: SkillWeights,
}

async fn open_session(config: &AppConfig) -> anyhow::Result<RosterSession> {
    let autosaver = if config.autosave.enabled {
        let store = FileKeyValueStore::open(&config.autosave.path)
            .await
            .with_context(|| format!("failed to open {}", config.autosave.path.display()))?;
        Some(Arc::new(Autosaver::new(Arc::new(store), config.autosave.key.clone())))
    } else {
        None
    };
    Ok(RosterSession::open(config, autosaver).await)
}

async fn run_interactive(config: &AppConfig, load_demo: bool) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let autosave = session.spawn_autosave(std::time::Duration::from_secs(
        config.autosave.interval_secs.max(1),
    ));

    let mut repl = Repl {
        session,
        patterns: PatternStore::new(),
        staff: Vec::new(),
        weights: SkillWeights::new(),
    };

    println!("=== Roster Interactive REPL ===");
    println!("Every edit is undoable and autosaved.\n");

    if load_demo {
        cmd_load_demo(&mut repl);
    }
    print_help();

    let stdin = io::stdin();
    loop {
        print!("\nroster> ");
        io::stdout().flush().ok();

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let parts: Vec<&str> = input.splitn(2, char::is_whitespace).collect();
        let cmd = parts[0].to_lowercase();
        let args: Vec<&str> = parts
            .get(1)
            .map(|rest| rest.split_whitespace().collect())
            .unwrap_or_default();

        let result = match cmd.as_str() {
            "help" | "h" | "?" => {
                print_help();
                Ok(())
            }
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "status" => cmd_status(&repl).await,
            "load-demo" => {
                cmd_load_demo(&mut repl);
                Ok(())
            }
            "list" | "ls" => {
                print_roster(&repl.session.shifts().await, &repl.staff);
                Ok(())
            }
            "add" => cmd_add(&repl, &args).await,
            "delete" | "rm" => cmd_delete(&repl, &args).await,
            "move" | "mv" => cmd_move(&repl, &args).await,
            "resize" => cmd_resize(&repl, &args).await,
            "copy-week" => cmd_copy_week(&repl, &args).await,
            "generate" | "gen" => cmd_generate(&repl, &args).await,
            "undo" | "u" => {
                report_navigation(repl.session.undo().await, "Nothing to undo");
                Ok(())
            }
            "redo" | "r" => {
                report_navigation(repl.session.redo().await, "Nothing to redo");
                Ok(())
            }
            "history" => {
                print_history(&repl.session).await;
                Ok(())
            }
            "revert" => cmd_revert(&repl, &args).await,
            "reset" => {
                repl.session.reset(Vec::new()).await;
                println!("  Roster cleared, history reset.");
                Ok(())
            }
            _ => {
                println!(
                    "  Unknown command: '{}'. Type 'help' for available commands.",
                    cmd
                );
                Ok(())
            }
        };

        if let Err(e) = result {
            eprintln!("  Error: {}", e);
        }
    }

    if let Some(handle) = autosave {
        handle.abort();
    }
    Ok(())
}

fn print_help() {
    println!("  Commands:");
    println!("    status                          Show roster, history and autosave state");
    println!("    load-demo                       Load sample staff and recurring patterns");
    println!("    list                            List shifts with their index");
    println!("    add <date> <start> <end> [staff] Add a shift (e.g. 'add 2024-03-04 07:00 15:00 S1')");
    println!("    delete <n>                      Delete shift n");
    println!("    move <n> <date> [staff]         Move shift n to another day / staff");
    println!("    resize <n> <start> <end>        Change the times of shift n");
    println!("    copy-week <from> <to>           Copy a week of shifts");
    println!("    generate <date> [weeks]         Generate and auto-staff from active patterns");
    println!("    undo / redo                     Step through history");
    println!("    history                         Show the history log");
    println!("    revert <index>                  Jump to a history entry");
    println!("    reset                           Clear the roster and history");
    println!("    help                            Show this help message");
    println!("    quit                            Exit the REPL");
}

// ---------------------------------------------------------------------------
// REPL commands
// ---------------------------------------------------------------------------

fn parse_date(arg: Option<&&str>) -> anyhow::Result<NaiveDate> {
    let raw = arg.context("missing date")?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("invalid date '{raw}'"))
}

fn parse_time(arg: Option<&&str>) -> anyhow::Result<NaiveTime> {
    let raw = arg.context("missing time")?;
    NaiveTime::parse_from_str(raw, "%H:%M").with_context(|| format!("invalid time '{raw}'"))
}

async fn shift_at(repl: &Repl, arg: Option<&&str>) -> anyhow::Result<Shift> {
    let raw = arg.context("missing shift index")?;
    let index: usize = raw.parse().with_context(|| format!("invalid index '{raw}'"))?;
    let shifts = repl.session.shifts().await;
    match shifts.get(index) {
        Some(shift) => Ok(shift.clone()),
        None => bail!("no shift at index {index}"),
    }
}

fn report_change(changed: bool) {
    if changed {
        println!("  Done.");
    } else {
        println!("  No change.");
    }
}

fn report_navigation(moved: bool, at_end: &str) {
    if moved {
        println!("  Done.");
    } else {
        println!("  {}", at_end);
    }
}

async fn cmd_status(repl: &Repl) -> anyhow::Result<()> {
    let shifts = repl.session.shifts().await;
    let open = shifts.iter().filter(|s| s.is_open()).count();
    let view = repl.session.history().await;

    println!("  Shifts: {} ({} open)", shifts.len(), open);
    println!(
        "  History: entry {} of {} (undo: {}, redo: {})",
        view.current_index + 1,
        view.entries.len(),
        view.can_undo,
        view.can_redo
    );
    println!(
        "  Patterns: {} ({} active), staff: {}",
        repl.patterns.len(),
        repl.patterns.active().count(),
        repl.staff.len()
    );
    match repl.session.autosave_status().await {
        Some(status) => match (status.last_saved, status.last_error) {
            (_, Some(error)) => println!("  Autosave: failing ({error})"),
            (Some(at), None) => println!("  Autosave: last saved {}", at.format("%H:%M:%S")),
            (None, None) => println!("  Autosave: nothing saved yet"),
        },
        None => println!("  Autosave: disabled"),
    }
    Ok(())
}

fn cmd_load_demo(repl: &mut Repl) {
    let monday = next_monday();
    repl.staff = demo_staff();
    for pattern in demo_patterns(monday) {
        if let Err(e) = repl.patterns.create(pattern) {
            eprintln!("  Error: {}", e);
        }
    }
    println!(
        "  Loaded {} staff and {} patterns. Try 'generate {}'.",
        repl.staff.len(),
        repl.patterns.len(),
        monday
    );
}

async fn cmd_add(repl: &Repl, args: &[&str]) -> anyhow::Result<()> {
    let date = parse_date(args.first())?;
    let start = parse_time(args.get(1))?;
    let end = parse_time(args.get(2))?;

    let mut shift = Shift::new(date, start, end, "main");
    if let Some(staff) = args.get(3) {
        shift = shift.with_staff(*staff);
    }
    report_change(repl.session.add_shift(shift).await?);
    Ok(())
}

async fn cmd_delete(repl: &Repl, args: &[&str]) -> anyhow::Result<()> {
    let shift = shift_at(repl, args.first()).await?;
    report_change(repl.session.delete_shift(shift.id).await?);
    Ok(())
}

async fn cmd_move(repl: &Repl, args: &[&str]) -> anyhow::Result<()> {
    let shift = shift_at(repl, args.first()).await?;
    let date = parse_date(args.get(1))?;
    let staff = args.get(2).map(|s| s.to_string());
    report_change(repl.session.move_shift(shift.id, date, staff).await?);
    Ok(())
}

async fn cmd_resize(repl: &Repl, args: &[&str]) -> anyhow::Result<()> {
    let shift = shift_at(repl, args.first()).await?;
    let start = parse_time(args.get(1))?;
    let end = parse_time(args.get(2))?;
    report_change(repl.session.resize_shift(shift.id, start, end).await?);
    Ok(())
}

async fn cmd_copy_week(repl: &Repl, args: &[&str]) -> anyhow::Result<()> {
    let from = parse_date(args.first())?;
    let to = parse_date(args.get(1))?;
    report_change(repl.session.copy_week(from, to).await?);
    Ok(())
}

async fn cmd_generate(repl: &Repl, args: &[&str]) -> anyhow::Result<()> {
    let from = parse_date(args.first())?;
    let weeks: u32 = match args.get(1) {
        Some(raw) => raw.parse().with_context(|| format!("invalid week count '{raw}'"))?,
        None => 2,
    };

    let active: Vec<RecurringShiftPattern> = repl.patterns.active().cloned().collect();
    if active.is_empty() {
        bail!("no active patterns (try 'load-demo')");
    }

    let auto_staff = (!repl.staff.is_empty()).then(|| AutoStaffing {
        staff: &repl.staff,
        skill_weights: &repl.weights,
    });
    let report = repl
        .session
        .generate_from_patterns(&active, from, weeks, auto_staff)
        .await;

    for count in &report.summary {
        println!("  {:<18} {:>3} shifts", count.pattern_name, count.count);
    }
    println!(
        "  Generated {} shifts; auto-assigned {}; left open {}",
        report.created,
        report.assignments.len(),
        report.unassigned.len()
    );
    Ok(())
}

async fn cmd_revert(repl: &Repl, args: &[&str]) -> anyhow::Result<()> {
    let raw = args.first().context("missing history index")?;
    let index: usize = raw.parse().with_context(|| format!("invalid index '{raw}'"))?;
    report_navigation(
        repl.session.revert_to_index(index).await,
        "No such history entry",
    );
    Ok(())
}
