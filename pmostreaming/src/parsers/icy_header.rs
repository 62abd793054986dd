//! Bloc d'en-têtes brut d'un serveur Shoutcast v1 (`ICY 200 OK`)

use std::collections::HashMap;

use super::{http_header::ICY_METAINT, AudioFileType, HeaderParserOutput, Parser};

/// Parse un bloc d'en-têtes ICY brut.
///
/// Le bloc est découpé sur CR/LF, chaque ligne sur le premier `:`. Les
/// lignes vides et la ligne de statut sont ignorées. Un flux ICY n'est
/// jamais seekable et sa longueur est inconnue.
#[derive(Debug, Default, Clone, Copy)]
pub struct IcyHeaderParser;

impl IcyHeaderParser {
    /// Paires clé/valeur du bloc, clés en minuscules
    pub fn fields(block: &[u8]) -> HashMap<String, String> {
        String::from_utf8_lossy(block)
            .split(['\r', '\n'])
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
            .collect()
    }
}

impl Parser<&[u8]> for IcyHeaderParser {
    type Output = Option<HeaderParserOutput>;

    fn parse(&self, block: &[u8]) -> Self::Output {
        let fields = Self::fields(block);
        if fields.is_empty() {
            return None;
        }

        let type_id = fields
            .get("content-type")
            .map(|value| AudioFileType::from_mime(value))
            .unwrap_or_default();
        let metadata_step = fields
            .get(ICY_METAINT)
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(0);

        Some(HeaderParserOutput {
            supports_seek: false,
            file_length: 0,
            type_id,
            metadata_step,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shoutcast_block() {
        let block = b"ICY 200 OK\r\nicy-name:Radio Test\r\nContent-Type: audio/aacp\r\nicy-metaint:8192\r\n\r\n";
        let output = IcyHeaderParser.parse(&block[..]).unwrap();

        assert!(!output.supports_seek);
        assert_eq!(output.file_length, 0);
        assert_eq!(output.type_id, AudioFileType::AacAdts);
        assert_eq!(output.metadata_step, 8192);
    }

    #[test]
    fn test_value_keeps_colons_after_first() {
        let fields = IcyHeaderParser::fields(b"icy-url:http://radio.example/\n");
        assert_eq!(fields.get("icy-url").map(String::as_str), Some("http://radio.example/"));
    }

    #[test]
    fn test_block_without_fields_is_none() {
        assert!(IcyHeaderParser.parse(&b"ICY 200 OK\r\n\r\n"[..]).is_none());
        assert!(IcyHeaderParser.parse(&b""[..]).is_none());
    }

    #[test]
    fn test_missing_metaint_defaults_to_zero() {
        let output = IcyHeaderParser.parse(&b"icy-br:128\r\n"[..]).unwrap();
        assert_eq!(output.metadata_step, 0);
        assert_eq!(output.type_id, AudioFileType::Unknown);
    }
}
