//! Error types

use fos_css::CssError;
use fos_dom::DomError;
use fos_html::HtmlError;

/// Errors raised by the sticky pipeline and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum StickyError {
    /// The other end of the message channel is gone (service restarting)
    #[error("could not establish connection: receiving end does not exist")]
    Disconnected,

    #[error("service did not respond after {attempts} attempts")]
    ServiceUnavailable { attempts: u32 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response to {request}: {response}")]
    UnexpectedResponse { request: &'static str, response: String },

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("HTTP error: {status} for {url}")]
    Http { url: String, status: u16 },

    #[error(transparent)]
    Css(#[from] CssError),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Html(#[from] HtmlError),
}

pub type Result<T> = std::result::Result<T, StickyError>;
