use tracing::{info, warn};

use crate::gateway::{GatewayError, RecordStore};
use crate::model::{validate, FieldError, NewSchool, SchoolDraft, SchoolRecord};
use crate::output::image::ImageDisplay;

pub const CREATE_SUCCESS: &str = "School added successfully!";
pub const CREATE_FALLBACK_ERROR: &str = "Failed to add school. Please try again.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Success(text) | Notice::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

/// Message for a failed remote write: the service's words when it gave any,
/// otherwise the caller's fallback.
pub fn remote_error_text(err: &GatewayError, fallback: &str) -> String {
    let text = err.to_string();
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// A submission is already in flight; nothing was sent.
    Busy,
    /// Client-side validation failed; nothing was sent.
    Invalid(Vec<FieldError>),
    Created(SchoolRecord),
    Failed(String),
}

#[derive(Clone, Debug, Default)]
pub struct CreationForm {
    draft: SchoolDraft,
    errors: Vec<FieldError>,
    notice: Option<Notice>,
    submitting: bool,
}

impl CreationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_draft(draft: SchoolDraft) -> Self {
        Self {
            draft,
            ..Self::default()
        }
    }

    pub fn draft(&self) -> &SchoolDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut SchoolDraft {
        &mut self.draft
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        !self.submitting
    }

    pub fn image_preview(&self) -> ImageDisplay {
        ImageDisplay::assume(Some(self.draft.image.as_str()))
    }

    /// First half of a submission: validates and, on success, marks the
    /// form in flight and returns the insert payload.
    pub fn begin_submit(&mut self) -> Result<NewSchool, SubmitOutcome> {
        if self.submitting {
            return Err(SubmitOutcome::Busy);
        }
        self.errors = validate(&self.draft);
        if !self.errors.is_empty() {
            return Err(SubmitOutcome::Invalid(self.errors.clone()));
        }
        self.notice = None;
        self.submitting = true;
        Ok(self.draft.to_new_school())
    }

    /// Second half of a submission: records the service's answer.
    pub fn finish_submit(&mut self, result: Result<SchoolRecord, GatewayError>) -> SubmitOutcome {
        self.submitting = false;
        match result {
            Ok(record) => {
                info!(id = %record.id, name = %record.name, "school added");
                self.draft.clear();
                self.errors.clear();
                self.notice = Some(Notice::Success(CREATE_SUCCESS.to_string()));
                SubmitOutcome::Created(record)
            }
            Err(e) => {
                warn!(error = %e, "error adding school");
                let text = remote_error_text(&e, CREATE_FALLBACK_ERROR);
                self.notice = Some(Notice::Error(text.clone()));
                SubmitOutcome::Failed(text)
            }
        }
    }

    pub async fn submit(&mut self, store: &dyn RecordStore) -> SubmitOutcome {
        let row = match self.begin_submit() {
            Ok(row) => row,
            Err(outcome) => return outcome,
        };
        let result = store.insert(&row).await;
        self.finish_submit(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;
    use crate::tests::support::{valid_draft, MemoryStore};

    #[tokio::test]
    async fn success_clears_fields_and_shows_notice() {
        let store = MemoryStore::default();
        let mut form = CreationForm::with_draft(valid_draft());
        let outcome = form.submit(&store).await;
        let created = match outcome {
            SubmitOutcome::Created(record) => record,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(created.name, "Lakeside High");
        assert_eq!(form.draft(), &SchoolDraft::default());
        assert_eq!(
            form.notice(),
            Some(&Notice::Success(CREATE_SUCCESS.to_string()))
        );
        assert!(form.can_submit());
        assert_eq!(store.calls("insert"), 1);
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test]
    async fn failure_keeps_fields_and_shows_remote_message() {
        let store = MemoryStore::default();
        store.fail_next("duplicate key value violates unique constraint");
        let mut form = CreationForm::with_draft(valid_draft());
        let outcome = form.submit(&store).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Failed("duplicate key value violates unique constraint".to_string())
        );
        assert_eq!(form.draft(), &valid_draft());
        assert!(form.notice().unwrap().is_error());
        assert!(form.can_submit());
    }

    #[tokio::test]
    async fn blank_remote_message_uses_fallback() {
        let store = MemoryStore::default();
        store.fail_next("");
        let mut form = CreationForm::with_draft(valid_draft());
        assert_eq!(
            form.submit(&store).await,
            SubmitOutcome::Failed(CREATE_FALLBACK_ERROR.to_string())
        );
    }

    #[tokio::test]
    async fn invalid_contact_never_reaches_the_store() {
        let store = MemoryStore::default();
        for contact in ["512555010", "51255501000"] {
            let mut draft = valid_draft();
            draft.contact = contact.to_string();
            let mut form = CreationForm::with_draft(draft);
            match form.submit(&store).await {
                SubmitOutcome::Invalid(errors) => {
                    assert_eq!(errors.len(), 1);
                    assert_eq!(errors[0].field, Field::Contact);
                }
                other => panic!("unexpected outcome {other:?}"),
            }
            assert_eq!(form.errors().len(), 1);
        }
        assert_eq!(store.calls("insert"), 0);
    }

    #[tokio::test]
    async fn malformed_email_never_reaches_the_store() {
        let store = MemoryStore::default();
        let mut draft = valid_draft();
        draft.email_id = "office-at-lakeside".to_string();
        let mut form = CreationForm::with_draft(draft);
        assert!(matches!(form.submit(&store).await, SubmitOutcome::Invalid(_)));
        assert_eq!(store.calls("insert"), 0);
    }

    #[test]
    fn second_submit_while_in_flight_is_busy() {
        let mut form = CreationForm::with_draft(valid_draft());
        let row = form.begin_submit().unwrap();
        assert_eq!(row.image, None);
        assert!(!form.can_submit());
        assert_eq!(form.begin_submit(), Err(SubmitOutcome::Busy));
        form.finish_submit(Err(GatewayError::remote(500, "boom")));
        assert!(form.can_submit());
    }

    #[test]
    fn image_preview_follows_the_draft() {
        let mut form = CreationForm::new();
        assert_eq!(form.image_preview(), ImageDisplay::Absent);
        form.draft_mut().image = "https://example.com/a.png".to_string();
        assert_eq!(
            form.image_preview(),
            ImageDisplay::Loaded("https://example.com/a.png".to_string())
        );
        form.draft_mut().image = "nope".to_string();
        assert_eq!(form.image_preview(), ImageDisplay::Failed("nope".to_string()));
    }
}
