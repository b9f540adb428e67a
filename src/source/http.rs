//! HTTP tile source backed by a URL template.

use super::{FetchError, TileSource};
use bytes::Bytes;
use tracing::trace;

/// Fetches tiles from a tile server whose URLs embed the coordinate.
///
/// The template uses `{zoom}`, `{row}` and `{col}` placeholders, e.g.
/// `https://tiles.example.org/{zoom}/{col}/{row}.png`. The underlying
/// `reqwest::Client` pools connections and is cheap to clone, so one client
/// can back several sources.
///
/// # Example
///
/// ```
/// use tileflow::HttpTileSource;
///
/// let client = reqwest::Client::new();
/// let source = HttpTileSource::new(client, "https://tiles.example.org/{zoom}/{col}/{row}.png");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTileSource {
    client: reqwest::Client,
    template: String,
}

impl HttpTileSource {
    /// Creates a source over an existing HTTP client and URL template.
    pub fn new(client: reqwest::Client, template: impl Into<String>) -> Self {
        Self {
            client,
            template: template.into(),
        }
    }

    /// Expands the URL template for one coordinate.
    fn url_for(&self, row: u32, col: u32, zoom: u8) -> String {
        self.template
            .replace("{zoom}", &zoom.to_string())
            .replace("{row}", &row.to_string())
            .replace("{col}", &col.to_string())
    }
}

impl TileSource for HttpTileSource {
    async fn fetch_tile(&self, row: u32, col: u32, zoom: u8) -> Result<Bytes, FetchError> {
        let url = self.url_for(row, col, zoom);
        trace!(%url, "fetching tile");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                row,
                col,
                zoom,
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_template_expansion() {
        let source = HttpTileSource::new(
            reqwest::Client::new(),
            "https://tiles.example.org/{zoom}/{col}/{row}.png",
        );

        assert_eq!(
            source.url_for(42, 7, 16),
            "https://tiles.example.org/16/7/42.png"
        );
    }

    #[test]
    fn test_url_template_with_repeated_placeholders() {
        let source = HttpTileSource::new(
            reqwest::Client::new(),
            "https://{zoom}.example.org/{zoom}/{row}_{col}",
        );

        assert_eq!(source.url_for(1, 2, 3), "https://3.example.org/3/1_2");
    }

    #[test]
    fn test_name() {
        let source = HttpTileSource::new(reqwest::Client::new(), "x");
        assert_eq!(source.name(), "http");
    }
}
