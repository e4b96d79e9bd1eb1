use colored::Colorize;

use crate::form::{CreationForm, Notice, SubmitOutcome};
use crate::gateway::RecordStore;
use crate::listing::ListingView;
use crate::model::{Field, RecordId, SchoolDraft};
use crate::output::{self, image::ImageDisplay, RecordCard};
use crate::overlay::{
    DeleteOutcome, DetailOverlay, OverlayMode, SaveOutcome, DELETE_SUCCESS, SAVE_SUCCESS,
};

pub const HELP: &str = "\
commands:
  list                    show the current results
  search [TEXT]           filter by name, city or state (no text clears)
  city [NAME]             only schools in exactly this city (no name clears)
  cities                  list the cities in the directory
  open <N|ID>             open result number N, or the record with this id
  edit                    edit the open record
  set <FIELD> [VALUE]     change a field of the form being edited
  save                    save the edited record
  cancel                  discard edits, or back out of a pending delete
  delete                  ask to delete the open record
  confirm                 delete the open record after `delete`
  close                   close the open record
  new                     start adding a school
  submit                  add the school being entered
  reload                  fetch the directory again
  help                    show this text
  quit                    leave";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowseCommand {
    List,
    Search(String),
    City(Option<String>),
    Cities,
    Open(String),
    Edit,
    Set(Field, String),
    Save,
    Cancel,
    Delete,
    Confirm,
    Close,
    New,
    Submit,
    Reload,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> BrowseCommand {
    let line = line.trim();
    if line.is_empty() {
        return BrowseCommand::Empty;
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let optional = |rest: &str| {
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    };
    match head.to_lowercase().as_str() {
        "list" | "ls" => BrowseCommand::List,
        "search" | "s" | "q" => BrowseCommand::Search(rest.to_string()),
        "city" => BrowseCommand::City(optional(rest)),
        "cities" => BrowseCommand::Cities,
        "open" | "o" if !rest.is_empty() => BrowseCommand::Open(rest.to_string()),
        "edit" | "e" => BrowseCommand::Edit,
        "set" => {
            let (name, value) = match rest.split_once(char::is_whitespace) {
                Some((name, value)) => (name, value.trim()),
                None => (rest, ""),
            };
            match Field::parse(name) {
                Some(field) => BrowseCommand::Set(field, value.to_string()),
                None => BrowseCommand::Unknown(line.to_string()),
            }
        }
        "save" => BrowseCommand::Save,
        "cancel" => BrowseCommand::Cancel,
        "delete" | "rm" => BrowseCommand::Delete,
        "confirm" | "yes" => BrowseCommand::Confirm,
        "close" => BrowseCommand::Close,
        "new" | "add" => BrowseCommand::New,
        "submit" => BrowseCommand::Submit,
        "reload" => BrowseCommand::Reload,
        "help" | "?" => BrowseCommand::Help,
        "quit" | "exit" => BrowseCommand::Quit,
        _ => BrowseCommand::Unknown(line.to_string()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Interactive state: the listing, at most one open record, and at most one
/// creation form. All rendering is returned as text for the caller to print.
pub struct BrowseSession<'a> {
    store: &'a dyn RecordStore,
    listing: ListingView,
    overlay: Option<DetailOverlay>,
    creating: Option<CreationForm>,
}

impl<'a> BrowseSession<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self {
            store,
            listing: ListingView::new(),
            overlay: None,
            creating: None,
        }
    }

    pub fn listing(&self) -> &ListingView {
        &self.listing
    }

    pub fn overlay(&self) -> Option<&DetailOverlay> {
        self.overlay.as_ref().filter(|o| o.is_open())
    }

    pub async fn start(&mut self) -> String {
        self.reload().await
    }

    async fn reload(&mut self) -> String {
        match self.listing.load(self.store).await {
            Ok(()) => self.render_listing(),
            Err(e) => format!("{} {}", "error:".bold().red(), e),
        }
    }

    fn render_listing(&self) -> String {
        let cards: Vec<RecordCard> = self
            .listing
            .filtered()
            .into_iter()
            .map(|r| RecordCard::new(r.clone(), &ImageDisplay::assume(r.image.as_deref())))
            .collect();
        output::render_listing_text(&self.listing, &cards)
    }

    fn render_overlay(&self) -> String {
        let Some(overlay) = self.overlay() else {
            return "no record is open".to_string();
        };
        let mut out = match overlay.mode() {
            OverlayMode::Editing { draft, errors } => {
                format!("{}\n{}", "editing".bold().yellow(), output::render_draft(draft, errors))
            }
            _ => {
                let record = overlay.record();
                let card = RecordCard::new(
                    record.clone(),
                    &ImageDisplay::assume(record.image.as_deref()),
                );
                output::render_detail_text(&card)
            }
        };
        if overlay.delete_requested() {
            out.push_str(&format!(
                "{}\n",
                "Delete this school? Type `confirm` to delete or `cancel` to keep it.".yellow()
            ));
        }
        if let Some(notice) = overlay.notice() {
            out.push_str(&output::render_notice(notice));
            out.push('\n');
        }
        out
    }

    fn resolve(&self, target: &str) -> Option<RecordId> {
        if let Ok(n) = target.parse::<usize>() {
            if n >= 1 {
                if let Some(record) = self.listing.filtered().get(n - 1) {
                    return Some(record.id.clone());
                }
            }
        }
        let id = RecordId::from(target);
        self.listing.get(&id).map(|r| r.id.clone())
    }

    fn open_overlay_mut(&mut self) -> Option<&mut DetailOverlay> {
        self.overlay.as_mut().filter(|o| o.is_open())
    }

    pub async fn handle(&mut self, line: &str) -> (Flow, String) {
        let out = match parse_command(line) {
            BrowseCommand::Quit => return (Flow::Quit, String::new()),
            BrowseCommand::Empty => String::new(),
            BrowseCommand::Help => HELP.to_string(),
            BrowseCommand::Unknown(raw) => format!("unknown command '{raw}', try `help`"),
            BrowseCommand::List => self.render_listing(),
            BrowseCommand::Reload => self.reload().await,
            BrowseCommand::Search(text) => {
                self.listing.set_query(text);
                self.render_listing()
            }
            BrowseCommand::City(city) => {
                self.listing.set_city(city);
                self.render_listing()
            }
            BrowseCommand::Cities => {
                let cities = self.listing.cities();
                if cities.is_empty() {
                    "no cities yet".to_string()
                } else {
                    cities.join("\n")
                }
            }
            BrowseCommand::Open(target) => match self.resolve(&target) {
                Some(id) => {
                    let record = self.listing.get(&id).cloned();
                    match record {
                        Some(record) => {
                            // One form at a time: a pending new school is dropped.
                            let dropped = self.creating.take().is_some();
                            self.overlay = Some(DetailOverlay::open(record));
                            let mut out = String::new();
                            if dropped {
                                out.push_str("new school discarded\n");
                            }
                            out.push_str(&self.render_overlay());
                            out
                        }
                        None => format!("no school matches '{target}'"),
                    }
                }
                None => format!("no school matches '{target}'"),
            },
            BrowseCommand::Edit => match self.open_overlay_mut().map(|o| o.begin_edit()) {
                Some(true) => self.render_overlay(),
                Some(false) => "already editing".to_string(),
                None => "no record is open".to_string(),
            },
            BrowseCommand::Set(field, value) => self.set_field(field, value),
            BrowseCommand::Save => self.save().await,
            BrowseCommand::Cancel => self.cancel(),
            BrowseCommand::Delete => match self.open_overlay_mut() {
                Some(overlay) => {
                    overlay.request_delete();
                    self.render_overlay()
                }
                None => "no record is open".to_string(),
            },
            BrowseCommand::Confirm => self.confirm_delete().await,
            BrowseCommand::Close => match self.overlay.as_mut() {
                Some(overlay) => {
                    overlay.close();
                    self.overlay = None;
                    "closed".to_string()
                }
                None => "no record is open".to_string(),
            },
            BrowseCommand::New => {
                if let Some(overlay) = self.overlay.as_mut() {
                    overlay.close();
                }
                self.overlay = None;
                self.creating = Some(CreationForm::new());
                format!(
                    "{}\n{}",
                    "new school: use `set <field> <value>`, then `submit`".bold(),
                    output::render_draft(&SchoolDraft::default(), &[])
                )
            }
            BrowseCommand::Submit => self.submit().await,
        };
        (Flow::Continue, out)
    }

    fn set_field(&mut self, field: Field, value: String) -> String {
        if let Some(form) = self.creating.as_mut() {
            form.draft_mut().set(field, value);
            return output::render_draft(form.draft(), form.errors());
        }
        match self.open_overlay_mut().and_then(|o| o.draft_mut()) {
            Some(draft) => {
                draft.set(field, value);
                self.render_overlay()
            }
            None => "nothing is being edited, use `edit` or `new` first".to_string(),
        }
    }

    fn cancel(&mut self) -> String {
        if self.creating.take().is_some() {
            return "new school discarded".to_string();
        }
        let Some(overlay) = self.open_overlay_mut() else {
            return "no record is open".to_string();
        };
        let cancelled = if overlay.delete_requested() {
            overlay.cancel_delete();
            true
        } else {
            overlay.cancel_edit()
        };
        if cancelled {
            self.render_overlay()
        } else {
            "nothing to cancel".to_string()
        }
    }

    async fn save(&mut self) -> String {
        let store = self.store;
        let Some(overlay) = self.open_overlay_mut() else {
            return "no record is open".to_string();
        };
        let outcome = overlay.save(store).await;
        match outcome {
            SaveOutcome::Saved(record) => {
                self.listing.apply_updated(record);
                let mut out = self.render_overlay();
                out.push_str(&output::render_notice(&Notice::Success(SAVE_SUCCESS.to_string())));
                out
            }
            SaveOutcome::NotEditing => "use `edit` first".to_string(),
            SaveOutcome::Busy => "a save is already in progress".to_string(),
            SaveOutcome::Invalid(_) | SaveOutcome::Failed(_) => self.render_overlay(),
        }
    }

    async fn confirm_delete(&mut self) -> String {
        let store = self.store;
        let Some(overlay) = self.open_overlay_mut() else {
            return "no record is open".to_string();
        };
        let outcome = overlay.confirm_delete(store).await;
        match outcome {
            DeleteOutcome::Deleted(id) => {
                self.listing.apply_deleted(&id);
                self.overlay = None;
                output::render_notice(&Notice::Success(DELETE_SUCCESS.to_string()))
            }
            DeleteOutcome::NotConfirmed => "use `delete` first".to_string(),
            DeleteOutcome::Busy => "a delete is already in progress".to_string(),
            DeleteOutcome::Failed(_) => self.render_overlay(),
        }
    }

    async fn submit(&mut self) -> String {
        let store = self.store;
        let Some(form) = self.creating.as_mut() else {
            return "use `new` first".to_string();
        };
        let outcome = form.submit(store).await;
        match outcome {
            SubmitOutcome::Created(record) => {
                let notice = form.notice().cloned();
                self.creating = None;
                self.listing.apply_created(record);
                notice
                    .map(|n| output::render_notice(&n))
                    .unwrap_or_default()
            }
            SubmitOutcome::Invalid(errors) => output::render_draft(form.draft(), &errors),
            SubmitOutcome::Busy => "a submission is already in progress".to_string(),
            SubmitOutcome::Failed(_) => form
                .notice()
                .map(output::render_notice)
                .unwrap_or_default(),
        }
    }
}
