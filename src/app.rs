use std::io::IsTerminal;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{debug, info};

use crate::browse::{BrowseSession, Flow};
use crate::cli::args::{CliArgs, Command, ListArgs, SchoolFields};
use crate::cli::validation;
use crate::config::{self, ConfigFile, EnvSettings};
use crate::diagnostics::{self, DiagnosticOutcome, DiagnosticReport, ErrorDetails, Stage};
use crate::form::{CreationForm, Notice, SubmitOutcome};
use crate::gateway::{
    GatewayConfig, RecordGateway, RecordStore, DEFAULT_TABLE, DEFAULT_TIMEOUT_SECONDS,
};
use crate::listing::ListingView;
use crate::model::{Field, RecordId, SchoolDraft, SchoolRecord};
use crate::output::{self, image::ImageDisplay, OutputFormat, RecordCard};
use crate::overlay::{DeleteOutcome, DetailOverlay, SaveOutcome, DELETE_SUCCESS, SAVE_SUCCESS};

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn set_or_missing(value: &str) -> &'static str {
    if value.trim().is_empty() {
        "missing"
    } else {
        "set"
    }
}

struct RunConfig {
    command: Command,
    gateway: GatewayConfig,
    output_format: OutputFormat,
    no_color: bool,
    check_images: bool,
    verbose: u8,
    spinner: bool,
}

fn command_format(command: &Command) -> Option<&str> {
    match command {
        Command::List(list) => list.render.format.as_deref(),
        Command::Show { render, .. } => render.format.as_deref(),
        Command::Diagnose { format } => format.as_deref(),
        _ => None,
    }
}

fn command_checks_images(command: &Command) -> bool {
    match command {
        Command::List(list) => list.render.check_images,
        Command::Show { render, .. } => render.check_images,
        _ => false,
    }
}

fn build_run_config(
    args: CliArgs,
    cfg: ConfigFile,
    env: EnvSettings,
) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    let service_url = args
        .service_url
        .or(env.service_url)
        .or(cfg.service_url)
        .unwrap_or_default();
    let anon_key = args
        .anon_key
        .or(env.anon_key)
        .or(cfg.anon_key)
        .unwrap_or_default();
    let table = args
        .table
        .or(cfg.table)
        .unwrap_or_else(|| DEFAULT_TABLE.to_string());
    let timeout_seconds = args
        .timeout
        .or(cfg.timeout)
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
    if timeout_seconds == 0 {
        return Err("invalid timeout, expected positive integer".to_string());
    }

    let format_raw = command_format(&args.command)
        .map(str::to_string)
        .or(cfg.output_format)
        .unwrap_or_else(|| "text".to_string());
    let output_format = OutputFormat::parse(&format_raw)
        .ok_or_else(|| format!("invalid output format '{format_raw}', expected text or json"))?;

    let check_images = command_checks_images(&args.command) || cfg.check_images.unwrap_or(false);

    Ok(RunConfig {
        command: args.command,
        gateway: GatewayConfig {
            service_url: service_url.trim().to_string(),
            anon_key: anon_key.trim().to_string(),
            table,
            timeout_seconds,
        },
        output_format,
        no_color,
        check_images,
        verbose: args.verbose,
        spinner: std::io::stderr().is_terminal(),
    })
}

fn spinner(enabled: bool, message: &str) -> Result<ProgressBar, String> {
    if !enabled {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg} [{elapsed}]")
            .map_err(|e| format!("failed to build spinner style: {e}"))?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(message.to_string());
    Ok(pb)
}

fn connect(run: &RunConfig) -> Result<RecordGateway, String> {
    RecordGateway::new(&run.gateway).map_err(|e| e.to_string())
}

type InputLines = Lines<BufReader<Stdin>>;

fn input_lines() -> InputLines {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn prompt(lines: &mut InputLines, label: &str) -> Result<Option<String>, String> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(label.as_bytes())
        .await
        .map_err(|e| format!("failed to write prompt: {e}"))?;
    stdout
        .flush()
        .await
        .map_err(|e| format!("failed to write prompt: {e}"))?;
    lines
        .next_line()
        .await
        .map_err(|e| format!("failed to read input: {e}"))
}

async fn cards_for(
    records: &[&SchoolRecord],
    check_images: bool,
    spinner_on: bool,
) -> Result<Vec<RecordCard>, String> {
    if !check_images {
        return Ok(records
            .iter()
            .map(|r| RecordCard::new((*r).clone(), &ImageDisplay::assume(r.image.as_deref())))
            .collect());
    }
    // Image requests go out without the service key.
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| format!("failed to build http client: {e}"))?;
    let pb = spinner(spinner_on, "checking images")?;
    let mut cards = Vec::with_capacity(records.len());
    for record in records {
        let display = ImageDisplay::probe(&client, record.image.as_deref()).await;
        if let ImageDisplay::Failed(url) = &display {
            debug!(id = %record.id, %url, "image did not load");
        }
        cards.push(RecordCard::new((*record).clone(), &display));
    }
    pb.finish_and_clear();
    Ok(cards)
}

async fn load_listing(run: &RunConfig, store: &dyn RecordStore) -> Result<ListingView, String> {
    let mut view = ListingView::new();
    let pb = spinner(run.spinner, "loading schools")?;
    let loaded = view.load(store).await;
    pb.finish_and_clear();
    loaded.map_err(|e| format!("failed to load schools: {e}"))?;
    Ok(view)
}

async fn fetch_record(
    run: &RunConfig,
    store: &dyn RecordStore,
    id: &str,
) -> Result<SchoolRecord, String> {
    let id = RecordId::new(id.trim());
    let pb = spinner(run.spinner, "loading school")?;
    let found = store.get_by_id(&id).await;
    pb.finish_and_clear();
    found
        .map_err(|e| format!("failed to load school {id}: {e}"))?
        .ok_or_else(|| format!("no school with id {id}"))
}

async fn run_list(run: &RunConfig, store: &dyn RecordStore, list: &ListArgs) -> Result<(), String> {
    let mut view = load_listing(run, store).await?;
    if let Some(query) = list.query.as_deref() {
        view.set_query(query);
    }
    view.set_city(list.city.clone());
    info!(
        total = view.total(),
        shown = view.filtered().len(),
        "listing ready"
    );

    let cards = cards_for(&view.filtered(), run.check_images, run.spinner).await?;
    match run.output_format {
        OutputFormat::Text => print!("{}", output::render_listing_text(&view, &cards)),
        OutputFormat::Json => println!("{}", output::render_listing_json(&cards)),
    }
    Ok(())
}

async fn run_cities(run: &RunConfig, store: &dyn RecordStore) -> Result<(), String> {
    let view = load_listing(run, store).await?;
    for city in view.cities() {
        println!("{city}");
    }
    Ok(())
}

async fn run_show(run: &RunConfig, store: &dyn RecordStore, id: &str) -> Result<(), String> {
    let record = fetch_record(run, store, id).await?;
    let mut cards = cards_for(&[&record], run.check_images, run.spinner).await?;
    let Some(card) = cards.pop() else {
        return Ok(());
    };
    match run.output_format {
        OutputFormat::Text => print!("{}", output::render_detail_text(&card)),
        OutputFormat::Json => println!("{}", output::render_record_json(&card)),
    }
    Ok(())
}

async fn run_add(run: &RunConfig, store: &dyn RecordStore, fields: &SchoolFields) -> Result<(), String> {
    let mut draft = SchoolDraft::default();
    fields.apply_to(&mut draft);

    if std::io::stdin().is_terminal() {
        let mut lines = input_lines();
        for field in Field::ALL {
            if field == Field::Image || !draft.get(field).is_empty() {
                continue;
            }
            let label = format!("{}: ", field.label());
            if let Some(value) = prompt(&mut lines, &label).await? {
                draft.set(field, value);
            }
        }
    }

    let mut form = CreationForm::with_draft(draft);
    let pb = spinner(run.spinner, "adding school")?;
    let outcome = form.submit(store).await;
    pb.finish_and_clear();

    match outcome {
        SubmitOutcome::Created(record) => {
            if let Some(notice) = form.notice() {
                println!("{}", output::render_notice(notice));
            }
            format_kv_line("ID", record.id.as_str());
            Ok(())
        }
        SubmitOutcome::Invalid(errors) => {
            eprint!("{}", output::render_field_errors(&errors));
            Err("school not added, fix the fields above".to_string())
        }
        SubmitOutcome::Failed(text) => Err(text),
        SubmitOutcome::Busy => Err("a submission is already in progress".to_string()),
    }
}

async fn run_edit(
    run: &RunConfig,
    store: &dyn RecordStore,
    id: &str,
    fields: &SchoolFields,
) -> Result<(), String> {
    let record = fetch_record(run, store, id).await?;
    let mut overlay = DetailOverlay::open(record);
    overlay.begin_edit();
    if let Some(draft) = overlay.draft_mut() {
        fields.apply_to(draft);
    }

    info!(
        id = %overlay.record().id,
        "saving without a version check, last write wins"
    );
    let pb = spinner(run.spinner, "saving school")?;
    let outcome = overlay.save(store).await;
    pb.finish_and_clear();

    match outcome {
        SaveOutcome::Saved(record) => {
            let display = ImageDisplay::assume(record.image.as_deref());
            print!("{}", output::render_detail_text(&RecordCard::new(record, &display)));
            println!(
                "{}",
                output::render_notice(&Notice::Success(SAVE_SUCCESS.to_string()))
            );
            Ok(())
        }
        SaveOutcome::Invalid(errors) => {
            eprint!("{}", output::render_field_errors(&errors));
            Err("school not saved, fix the fields above".to_string())
        }
        SaveOutcome::Failed(text) => Err(text),
        SaveOutcome::NotEditing | SaveOutcome::Busy => {
            Err("school could not be edited".to_string())
        }
    }
}

async fn run_delete(
    run: &RunConfig,
    store: &dyn RecordStore,
    id: &str,
    yes: bool,
) -> Result<(), String> {
    let record = fetch_record(run, store, id).await?;
    let mut overlay = DetailOverlay::open(record);

    if !yes {
        let question = format!(
            "Delete {} ({})? [y/N] ",
            overlay.record().name.bold(),
            overlay.record().id
        );
        let mut lines = input_lines();
        let answer = prompt(&mut lines, &question).await?.unwrap_or_default();
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("cancelled");
            return Ok(());
        }
    }
    overlay.request_delete();

    let pb = spinner(run.spinner, "deleting school")?;
    let outcome = overlay.confirm_delete(store).await;
    pb.finish_and_clear();

    match outcome {
        DeleteOutcome::Deleted(id) => {
            println!(
                "{}",
                output::render_notice(&Notice::Success(DELETE_SUCCESS.to_string()))
            );
            format_kv_line("ID", id.as_str());
            Ok(())
        }
        DeleteOutcome::Failed(text) => Err(text),
        DeleteOutcome::NotConfirmed | DeleteOutcome::Busy => {
            Err("school could not be deleted".to_string())
        }
    }
}

async fn run_browse(run: &RunConfig, store: &dyn RecordStore) -> Result<(), String> {
    let mut session = BrowseSession::new(store);
    let pb = spinner(run.spinner, "loading schools")?;
    let first = session.start().await;
    pb.finish_and_clear();
    println!("{first}");
    println!("{}", "type `help` for commands".dimmed());

    let mut lines = input_lines();
    loop {
        let Some(line) = prompt(&mut lines, "schooldir> ").await? else {
            break;
        };
        let (flow, out) = session.handle(&line).await;
        if !out.is_empty() {
            println!("{}", out.trim_end());
        }
        if flow == Flow::Quit {
            break;
        }
    }
    Ok(())
}

async fn run_diagnose(run: &RunConfig) -> Result<(), String> {
    let report = match RecordGateway::new(&run.gateway) {
        Ok(gateway) => {
            let table_url = gateway.table_url().to_string();
            let pb = spinner(run.spinner, "testing database connection")?;
            let report = diagnostics::run(&gateway, table_url).await;
            pb.finish_and_clear();
            report
        }
        // A missing URL or key fails the connection stage.
        Err(e) => DiagnosticReport {
            table_url: format!("{}/rest/v1/{}", run.gateway.service_url, run.gateway.table),
            outcome: DiagnosticOutcome::Failed {
                stage: Stage::Connection,
                error: ErrorDetails::from(&e),
            },
        },
    };

    match run.output_format {
        OutputFormat::Text => print!("{}", output::render_diagnostics_text(&report)),
        OutputFormat::Json => println!("{}", output::render_diagnostics_json(&report)),
    }
    if report.is_success() {
        Ok(())
    } else {
        Err(report.status_line())
    }
}

fn run_init_config(path: Option<&String>) -> Result<(), String> {
    let path = match path {
        Some(p) => config::expand_tilde(p),
        None => config::default_config_path()
            .ok_or_else(|| "could not determine home directory".to_string())?,
    };
    if config::ensure_default_config_file(&path)? {
        println!("wrote {}", path.display());
    } else {
        println!("{} already exists", path.display());
    }
    Ok(())
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }

    if let Command::Diagnose { .. } = run.command {
        return run_diagnose(&run).await;
    }

    let gateway = connect(&run)?;
    let store: &dyn RecordStore = &gateway;
    match &run.command {
        Command::List(list) => run_list(&run, store, list).await,
        Command::Cities => run_cities(&run, store).await,
        Command::Add(fields) => run_add(&run, store, fields).await,
        Command::Show { id, .. } => run_show(&run, store, id).await,
        Command::Edit { id, fields } => run_edit(&run, store, id, fields).await,
        Command::Delete { id, yes } => run_delete(&run, store, id, *yes).await,
        Command::Browse => run_browse(&run, store).await,
        Command::Diagnose { .. } | Command::InitConfig => Ok(()),
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                print!("{e}");
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    if let Command::InitConfig = args.command {
        return run_init_config(args.config.as_ref());
    }

    let cfg = match args.config.as_deref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg, EnvSettings::from_env())?;
    crate::logging::init(run.verbose, run.no_color);
    info!(
        service_url = set_or_missing(&run.gateway.service_url),
        anon_key = set_or_missing(&run.gateway.anon_key),
        table = %run.gateway.table,
        timeout = run.gateway.timeout_seconds,
        "configuration loaded"
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
