//! Capacités d'une source HTTP déduites de la réponse

use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};

use super::{AudioFileType, HeaderParserOutput, Parser};
use crate::network::ResponseInfo;

/// En-tête Shoutcast/Icecast portant la cadence des métadonnées
pub const ICY_METAINT: &str = "icy-metaint";

/// Parse la réponse HTTP initiale d'un flux.
///
/// - seek supporté si `Accept-Ranges` est présent et différent de `none`
/// - longueur : `Content-Length` pour un 200, total de `Content-Range` pour un 206
/// - cadence ICY : `icy-metaint`, 0 par défaut
///
/// Retourne `None` si la réponse ne porte aucun en-tête.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpHeaderParser;

impl Parser<&ResponseInfo> for HttpHeaderParser {
    type Output = Option<HeaderParserOutput>;

    fn parse(&self, response: &ResponseInfo) -> Self::Output {
        let headers = &response.headers;
        if headers.is_empty() {
            return None;
        }

        let supports_seek = header_str(headers, ACCEPT_RANGES.as_str())
            .map(|value| !value.trim().eq_ignore_ascii_case("none"))
            .unwrap_or(false);

        let type_id = header_str(headers, CONTENT_TYPE.as_str())
            .map(AudioFileType::from_mime)
            .unwrap_or_default();

        let file_length = match response.status {
            200 => header_str(headers, CONTENT_LENGTH.as_str())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(0),
            206 => header_str(headers, CONTENT_RANGE.as_str())
                .and_then(content_range_total)
                .unwrap_or(0),
            _ => 0,
        };

        let metadata_step = header_str(headers, ICY_METAINT)
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        Some(HeaderParserOutput {
            supports_seek,
            file_length,
            type_id,
            metadata_step,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// `bytes 100-199/5000` -> 5000 ; `bytes 0-99/*` -> None
fn content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}
