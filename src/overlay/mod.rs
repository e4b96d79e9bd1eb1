use tracing::{info, warn};

use crate::form::{remote_error_text, Notice};
use crate::gateway::{GatewayError, RecordStore};
use crate::model::{validate_edit, FieldError, RecordId, SchoolDraft, SchoolPatch, SchoolRecord};

pub const SAVE_SUCCESS: &str = "School updated successfully!";
pub const DELETE_SUCCESS: &str = "School deleted.";
pub const SAVE_FALLBACK_ERROR: &str = "Failed to update school. Please try again.";
pub const DELETE_FALLBACK_ERROR: &str = "Failed to delete school. Please try again.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverlayMode {
    Viewing,
    Editing {
        draft: SchoolDraft,
        errors: Vec<FieldError>,
    },
    Closed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SaveOutcome {
    /// Only the Editing state can save.
    NotEditing,
    Busy,
    Invalid(Vec<FieldError>),
    /// The service's row, now shown in Viewing. Patch the listing with it.
    Saved(SchoolRecord),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No confirmation was requested first; nothing was sent.
    NotConfirmed,
    Busy,
    /// The overlay is closed. Remove the id from the listing.
    Deleted(RecordId),
    Failed(String),
}

/// Detail view of one record that can switch into an edit form.
///
/// Failed writes leave the overlay open in its current mode so the user can
/// retry or back out. Writes carry no version check, so a concurrent edit
/// from another client is silently overwritten by whichever write lands last.
#[derive(Clone, Debug)]
pub struct DetailOverlay {
    record: SchoolRecord,
    mode: OverlayMode,
    delete_requested: bool,
    saving: bool,
    deleting: bool,
    notice: Option<Notice>,
}

impl DetailOverlay {
    pub fn open(record: SchoolRecord) -> Self {
        Self {
            record,
            mode: OverlayMode::Viewing,
            delete_requested: false,
            saving: false,
            deleting: false,
            notice: None,
        }
    }

    pub fn record(&self) -> &SchoolRecord {
        &self.record
    }

    pub fn mode(&self) -> &OverlayMode {
        &self.mode
    }

    pub fn is_open(&self) -> bool {
        self.mode != OverlayMode::Closed
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, OverlayMode::Editing { .. })
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn delete_requested(&self) -> bool {
        self.delete_requested
    }

    pub fn can_save(&self) -> bool {
        self.is_editing() && !self.saving
    }

    pub fn can_delete(&self) -> bool {
        self.is_open() && !self.deleting
    }

    /// Viewing to Editing, with the form filled from the current record.
    pub fn begin_edit(&mut self) -> bool {
        if self.mode != OverlayMode::Viewing {
            return false;
        }
        self.mode = OverlayMode::Editing {
            draft: SchoolDraft::from_record(&self.record),
            errors: Vec::new(),
        };
        self.notice = None;
        true
    }

    pub fn draft_mut(&mut self) -> Option<&mut SchoolDraft> {
        match &mut self.mode {
            OverlayMode::Editing { draft, .. } => Some(draft),
            _ => None,
        }
    }

    pub fn draft(&self) -> Option<&SchoolDraft> {
        match &self.mode {
            OverlayMode::Editing { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Editing to Viewing, discarding edits.
    pub fn cancel_edit(&mut self) -> bool {
        if !self.is_editing() {
            return false;
        }
        self.mode = OverlayMode::Viewing;
        self.notice = None;
        true
    }

    pub fn close(&mut self) {
        self.mode = OverlayMode::Closed;
        self.delete_requested = false;
    }

    pub fn begin_save(&mut self) -> Result<(RecordId, SchoolPatch), SaveOutcome> {
        if self.saving {
            return Err(SaveOutcome::Busy);
        }
        let OverlayMode::Editing { draft, errors } = &mut self.mode else {
            return Err(SaveOutcome::NotEditing);
        };
        *errors = validate_edit(draft);
        if !errors.is_empty() {
            return Err(SaveOutcome::Invalid(errors.clone()));
        }
        let patch = draft.to_patch();
        self.saving = true;
        self.notice = None;
        Ok((self.record.id.clone(), patch))
    }

    pub fn finish_save(&mut self, result: Result<SchoolRecord, GatewayError>) -> SaveOutcome {
        self.saving = false;
        match result {
            Ok(updated) => {
                info!(id = %updated.id, "school updated");
                self.record = updated.clone();
                // A close that raced the save wins.
                if self.is_editing() {
                    self.mode = OverlayMode::Viewing;
                }
                SaveOutcome::Saved(updated)
            }
            Err(e) => {
                warn!(id = %self.record.id, error = %e, "error updating school");
                let text = remote_error_text(&e, SAVE_FALLBACK_ERROR);
                self.notice = Some(Notice::Error(text.clone()));
                SaveOutcome::Failed(text)
            }
        }
    }

    pub async fn save(&mut self, store: &dyn RecordStore) -> SaveOutcome {
        let (id, patch) = match self.begin_save() {
            Ok(request) => request,
            Err(outcome) => return outcome,
        };
        let result = store.update_by_id(&id, &patch).await;
        self.finish_save(result)
    }

    /// Arms the delete action; the remote call waits for [`confirm_delete`].
    ///
    /// [`confirm_delete`]: DetailOverlay::confirm_delete
    pub fn request_delete(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.delete_requested = true;
        true
    }

    pub fn cancel_delete(&mut self) {
        self.delete_requested = false;
    }

    pub fn begin_delete(&mut self) -> Result<RecordId, DeleteOutcome> {
        if self.deleting {
            return Err(DeleteOutcome::Busy);
        }
        if !self.delete_requested || !self.is_open() {
            return Err(DeleteOutcome::NotConfirmed);
        }
        self.deleting = true;
        self.notice = None;
        Ok(self.record.id.clone())
    }

    pub fn finish_delete(&mut self, result: Result<(), GatewayError>) -> DeleteOutcome {
        self.deleting = false;
        self.delete_requested = false;
        match result {
            Ok(()) => {
                info!(id = %self.record.id, "school deleted");
                self.mode = OverlayMode::Closed;
                DeleteOutcome::Deleted(self.record.id.clone())
            }
            Err(e) => {
                warn!(id = %self.record.id, error = %e, "error deleting school");
                let text = remote_error_text(&e, DELETE_FALLBACK_ERROR);
                self.notice = Some(Notice::Error(text.clone()));
                DeleteOutcome::Failed(text)
            }
        }
    }

    pub async fn confirm_delete(&mut self, store: &dyn RecordStore) -> DeleteOutcome {
        let id = match self.begin_delete() {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };
        let result = store.delete_by_id(&id).await;
        self.finish_delete(result)
    }
}
