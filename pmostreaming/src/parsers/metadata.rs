//! Bloc de métadonnées ICY : `StreamTitle='Artiste - Titre';StreamUrl='';`

use std::collections::HashMap;

use super::Parser;

/// Tags extraits d'un bloc ICY (clé telle que transmise par le serveur)
pub type StreamMetadata = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MetadataParsingError {
    /// Bloc présent mais vide (seulement du padding NUL)
    #[error("empty metadata block")]
    Empty,

    /// Bloc absent ou sans aucune paire clé=valeur
    #[error("unable to parse metadata block")]
    UnableToParse,
}

/// Parse un bloc de métadonnées ICY.
///
/// Les parties sont séparées par `;`, chaque partie est coupée sur le
/// premier `=` et la valeur est débarrassée de ses apostrophes. Un `;` à
/// l'intérieur d'une valeur n'est pas échappé et coupe la valeur.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataParser;

impl Parser<Option<&[u8]>> for MetadataParser {
    type Output = Result<StreamMetadata, MetadataParsingError>;

    fn parse(&self, input: Option<&[u8]>) -> Self::Output {
        let bytes = input.ok_or(MetadataParsingError::UnableToParse)?;
        let end = bytes
            .iter()
            .rposition(|byte| *byte != 0)
            .map(|pos| pos + 1)
            .unwrap_or(0);
        let text = String::from_utf8_lossy(&bytes[..end]);
        let text = text.trim();
        if text.is_empty() {
            return Err(MetadataParsingError::Empty);
        }

        let tags: StreamMetadata = text
            .split(';')
            .filter_map(|part| part.split_once('='))
            .map(|(key, value)| {
                let value = value.trim();
                let value = value.strip_prefix('\'').unwrap_or(value);
                let value = value.strip_suffix('\'').unwrap_or(value);
                (key.trim().to_string(), value.to_string())
            })
            .filter(|(key, _)| !key.is_empty())
            .collect();

        if tags.is_empty() {
            Err(MetadataParsingError::UnableToParse)
        } else {
            Ok(tags)
        }
    }
}
