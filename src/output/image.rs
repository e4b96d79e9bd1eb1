use std::time::Duration;

use tracing::debug;

use crate::model::draft::is_valid_image_url;

/// Outcome of trying to show a record's image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageDisplay {
    Loaded(String),
    Failed(String),
    Absent,
}

impl ImageDisplay {
    /// Decision without touching the network: a well-formed http(s) URL is
    /// assumed to load.
    pub fn assume(url: Option<&str>) -> Self {
        match url.map(str::trim).filter(|u| !u.is_empty()) {
            None => ImageDisplay::Absent,
            Some(url) if is_valid_image_url(url) => ImageDisplay::Loaded(url.to_string()),
            Some(url) => ImageDisplay::Failed(url.to_string()),
        }
    }

    /// Decision after fetching the image headers. Anything other than a
    /// successful `image/*` response counts as failed.
    pub async fn probe(client: &reqwest::Client, url: Option<&str>) -> Self {
        let url = match ImageDisplay::assume(url) {
            ImageDisplay::Loaded(url) => url,
            other => return other,
        };
        let response = client
            .head(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        match response {
            Ok(resp) if resp.status().is_success() && is_image(&resp) => ImageDisplay::Loaded(url),
            Ok(resp) => {
                debug!(%url, status = resp.status().as_u16(), "image did not load");
                ImageDisplay::Failed(url)
            }
            Err(e) => {
                debug!(%url, error = %e, "image did not load");
                ImageDisplay::Failed(url)
            }
        }
    }
}

fn is_image(resp: &reqwest::Response) -> bool {
    resp.headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        // Servers that omit the content type get the benefit of the doubt.
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(true)
}

/// What to draw in the image slot of a card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSlot {
    Picture { url: String },
    Placeholder { note: Option<&'static str> },
}

pub fn image_slot(display: &ImageDisplay) -> ImageSlot {
    match display {
        ImageDisplay::Loaded(url) => ImageSlot::Picture { url: url.clone() },
        ImageDisplay::Failed(_) => ImageSlot::Placeholder {
            note: Some("image unavailable"),
        },
        ImageDisplay::Absent => ImageSlot::Placeholder { note: None },
    }
}

impl ImageSlot {
    pub fn render(&self) -> String {
        match self {
            ImageSlot::Picture { url } => url.clone(),
            ImageSlot::Placeholder { note: None } => "[building]".to_string(),
            ImageSlot::Placeholder { note: Some(note) } => format!("[building] ({note})"),
        }
    }
}
