pub mod image;

use colored::Colorize;
use serde::Serialize;

use crate::diagnostics::{DiagnosticOutcome, DiagnosticReport};
use crate::form::Notice;
use crate::listing::{ListingState, ListingView};
use crate::model::{Field, FieldError, SchoolDraft, SchoolRecord};

use self::image::{image_slot, ImageDisplay};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// A record as shown to the user, with the image decision already made.
#[derive(Clone, Debug, Serialize)]
pub struct RecordCard {
    #[serde(flatten)]
    pub record: SchoolRecord,
    pub image_status: &'static str,
    #[serde(skip)]
    display: ImageDisplay,
}

impl RecordCard {
    pub fn new(record: SchoolRecord, display: &ImageDisplay) -> Self {
        let image_status = match display {
            ImageDisplay::Loaded(_) => "loaded",
            ImageDisplay::Failed(_) => "failed",
            ImageDisplay::Absent => "absent",
        };
        Self {
            record,
            image_status,
            display: display.clone(),
        }
    }

    pub fn display(&self) -> &ImageDisplay {
        &self.display
    }
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

fn truncate(value: &str, max: usize) -> String {
    let count = value.chars().count();
    if count <= max {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn listing_summary(view: &ListingView) -> String {
    format!(
        "Showing {} of {} schools",
        view.filtered().len(),
        view.total()
    )
}

/// One line per card plus the header and empty-state hints.
pub fn render_listing_text(view: &ListingView, cards: &[RecordCard]) -> String {
    let mut out = String::new();
    match view.state() {
        ListingState::Loading => {
            out.push_str("Loading schools...\n");
            return out;
        }
        ListingState::Failed(message) => {
            out.push_str(&format!("{} {}\n", "error:".bold().red(), message));
            return out;
        }
        ListingState::Empty | ListingState::NoMatches => {
            out.push_str(&format!("{}\n", "No schools found".bold()));
            if let Some(hint) = view.state().hint() {
                out.push_str(hint);
                out.push('\n');
            }
            out.push_str(&format!("{}\n", listing_summary(view).dimmed()));
            return out;
        }
        ListingState::Showing { .. } => {}
    }

    for (idx, card) in cards.iter().enumerate() {
        let r = &card.record;
        out.push_str(&format!(
            "{:>3}. {}  {}\n",
            idx + 1,
            truncate(or_dash(&r.name), 48).bold(),
            or_dash(&r.location()).cyan()
        ));
        out.push_str(&format!("     {}\n", truncate(or_dash(&r.address), 72)));
        out.push_str(&format!(
            "     {} {}\n",
            image_slot(card.display()).render().dimmed(),
            format!("id={}", r.id).dimmed()
        ));
    }
    out.push_str(&format!("\n{}\n", listing_summary(view).dimmed()));
    out
}

pub fn render_listing_json(cards: &[RecordCard]) -> String {
    serde_json::to_string_pretty(cards).unwrap_or_else(|_| "[]".to_string())
}

fn kv(out: &mut String, label: &str, value: &str) {
    out.push_str(&format!(":: {:<10}: {}\n", label, or_dash(value)));
}

pub fn render_detail_text(card: &RecordCard) -> String {
    let r = &card.record;
    let mut out = String::new();
    out.push_str(&format!("{}\n", or_dash(&r.name).bold()));
    kv(&mut out, "Address", &r.address);
    kv(&mut out, "City", &r.city);
    kv(&mut out, "State", &r.state);
    kv(&mut out, "Contact", &r.contact);
    kv(&mut out, "Email", &r.email_id);
    kv(&mut out, "Image", &image_slot(card.display()).render());
    kv(&mut out, "Added", &r.created_label());
    kv(&mut out, "Id", r.id.as_str());
    out
}

pub fn render_record_json(card: &RecordCard) -> String {
    serde_json::to_string_pretty(card).unwrap_or_else(|_| "{}".to_string())
}

pub fn render_draft(draft: &SchoolDraft, errors: &[FieldError]) -> String {
    let mut out = String::new();
    for field in Field::ALL {
        out.push_str(&format!(":: {:<10}: {}\n", field.column(), draft.get(field)));
        for e in errors.iter().filter(|e| e.field == field) {
            out.push_str(&format!("   {}\n", e.message.red()));
        }
    }
    out
}

pub fn render_field_errors(errors: &[FieldError]) -> String {
    let mut out = String::new();
    for e in errors {
        out.push_str(&format!(
            "{} {}: {}\n",
            "invalid".bold().red(),
            e.field.label(),
            e.message
        ));
    }
    out
}

pub fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::Success(text) => format!("{} {}", "[OK]".bold().green(), text),
        Notice::Error(text) => format!("{} {}", "[ERR]".bold().red(), text),
    }
}

pub fn render_diagnostics_text(report: &DiagnosticReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "Database Connection Test".bold()));
    kv(&mut out, "Table", &report.table_url);
    match &report.outcome {
        DiagnosticOutcome::Success { count, records } => {
            kv(&mut out, "Status", &report.status_line().green().to_string());
            kv(&mut out, "Count", &count.to_string());
            out.push_str(&format!("\nData Retrieved ({} records)\n", records.len()));
            out.push_str(&serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string()));
            out.push('\n');
        }
        DiagnosticOutcome::Failed { error, .. } => {
            kv(&mut out, "Status", &report.status_line().red().to_string());
            out.push_str("\nError Details\n");
            out.push_str(&serde_json::to_string_pretty(error).unwrap_or_else(|_| "{}".to_string()));
            out.push('\n');
        }
    }
    out
}

pub fn render_diagnostics_json(report: &DiagnosticReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}
