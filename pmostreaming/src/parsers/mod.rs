//! Parseurs purs des réponses de transport et des métadonnées
//!
//! Un parseur est une fonction pure `Input -> Output` : pas d'état partagé,
//! pas d'I/O. Un en-tête partiel ou malformé est une entrée normale pour un
//! flux live ; l'échec se traduit donc par un résultat absent (`None`) ou
//! une erreur typée, jamais par une panique.

pub mod file_type;
pub mod http_header;
pub mod icy_header;
pub mod metadata;

pub use file_type::AudioFileType;
pub use http_header::HttpHeaderParser;
pub use icy_header::IcyHeaderParser;
pub use metadata::{MetadataParser, MetadataParsingError, StreamMetadata};

/// Fonction pure d'un type d'entrée vers un type de sortie
pub trait Parser<I> {
    type Output;

    fn parse(&self, input: I) -> Self::Output;
}

/// Capacités d'une source déduites de ses en-têtes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderParserOutput {
    /// La source accepte les requêtes `Range`
    pub supports_seek: bool,
    /// Longueur totale en octets (0 = inconnue)
    pub file_length: u64,
    /// Type de conteneur annoncé
    pub type_id: AudioFileType,
    /// Cadence des blocs de métadonnées ICY (0 = aucune)
    pub metadata_step: usize,
}
