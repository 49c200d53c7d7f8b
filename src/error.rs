use thiserror::Error;

/// Failure modes of a portal fetch.
///
/// A fetch either returns a complete [`crate::series::FetchResult`] or fails
/// with exactly one of these; there are no partial results. Note that a
/// rejected login produces a data page without the chart element, so bad
/// credentials surface as [`PortalError::Extraction`] at the chart step.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The HTTP exchange failed: DNS, TLS, timeout, connection reset or the
    /// redirect cap was exceeded.
    #[error("failed fetching data from {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The expected HTML structure was not found in the response.
    #[error("failed extracting {what} from the response")]
    Extraction { what: String },

    /// The chart attribute held text that is not valid JSON.
    #[error("failed decoding extracted data")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
}

impl PortalError {
    pub(crate) fn transport(url: &str, source: reqwest::Error) -> Self {
        // reqwest reports the final URL after query encoding and redirects;
        // prefer it over the bare request URL when available.
        let url = source
            .url()
            .map_or_else(|| url.to_owned(), ToString::to_string);
        PortalError::Transport { url, source }
    }

    pub(crate) fn extraction(what: impl Into<String>) -> Self {
        PortalError::Extraction { what: what.into() }
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(source: serde_json::Error) -> Self {
        PortalError::Decode { source }
    }
}
