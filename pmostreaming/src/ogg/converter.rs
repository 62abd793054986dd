//! Conversion entre l'enregistrement Ogg Vorbis « fil » (largeurs fixes) et
//! la description native utilisée par le reste de la crate.

use super::Parser;

/// Enregistrement à largeurs fixes, tel que produit par l'analyse des en-têtes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OggVorbisStreamData {
    pub serial_number: u32,
    pub page_count: u64,
    pub total_samples: u64,
    pub sample_rate: u32,
    pub channels: u32,
    /// Débits en kbit/s
    pub bit_rate: u32,
    pub nominal_bitrate: u32,
    pub min_bitrate: u32,
    pub max_bitrate: u32,
    pub blocksize0: i32,
    pub blocksize1: i32,
    pub granule_position: i64,
    /// Table de seek : position de page et granule, en parallèle
    pub page_offsets: Vec<u64>,
    pub page_granules: Vec<u64>,
}

/// Description native d'un flux Ogg Vorbis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OggVorbisStreamInfo {
    pub serial_number: usize,
    pub page_count: u64,
    pub total_samples: u64,
    pub sample_rate: usize,
    pub channels: usize,
    pub bit_rate: usize,
    pub nominal_bitrate: usize,
    pub min_bitrate: usize,
    pub max_bitrate: usize,
    pub blocksize0: isize,
    pub blocksize1: isize,
    pub granule_position: i64,
    pub page_offsets: Vec<u64>,
    pub page_granules: Vec<u64>,
}

impl OggVorbisStreamInfo {
    /// Durée en secondes déduite du nombre total d'échantillons
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.total_samples as f64 / self.sample_rate as f64
    }

    /// Position de la page contenant l'échantillon `sample`.
    ///
    /// La granule d'une page désigne le dernier échantillon qu'elle termine :
    /// on retient la première page dont la granule atteint la cible.
    pub fn offset_for_sample(&self, sample: u64) -> Option<u64> {
        if self.page_offsets.is_empty() {
            return None;
        }
        let index = self
            .page_granules
            .partition_point(|granule| *granule < sample)
            .min(self.page_offsets.len() - 1);
        self.page_offsets.get(index).copied()
    }

    /// Position de seek pour un temps en secondes
    pub fn offset_for_time(&self, seconds: f64) -> Option<u64> {
        if self.sample_rate == 0 || seconds < 0.0 {
            return None;
        }
        self.offset_for_sample((seconds * self.sample_rate as f64) as u64)
    }
}

impl From<OggVorbisStreamData> for OggVorbisStreamInfo {
    fn from(data: OggVorbisStreamData) -> Self {
        Self {
            serial_number: data.serial_number as usize,
            page_count: data.page_count,
            total_samples: data.total_samples,
            sample_rate: data.sample_rate as usize,
            channels: data.channels as usize,
            bit_rate: data.bit_rate as usize,
            nominal_bitrate: data.nominal_bitrate as usize,
            min_bitrate: data.min_bitrate as usize,
            max_bitrate: data.max_bitrate as usize,
            blocksize0: data.blocksize0 as isize,
            blocksize1: data.blocksize1 as isize,
            granule_position: data.granule_position,
            page_offsets: data.page_offsets,
            page_granules: data.page_granules,
        }
    }
}

/// Champ de [`OggVorbisStreamInfo`] trop grand pour l'enregistrement fil
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Ogg Vorbis field `{field}` does not fit the wire record")]
pub struct FieldOutOfRange {
    pub field: &'static str,
}

fn narrow<T, S>(field: &'static str, value: S) -> Result<T, FieldOutOfRange>
where
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| FieldOutOfRange { field })
}

/// Jamais de troncature : un champ hors plage est une erreur
impl TryFrom<OggVorbisStreamInfo> for OggVorbisStreamData {
    type Error = FieldOutOfRange;

    fn try_from(info: OggVorbisStreamInfo) -> Result<Self, Self::Error> {
        Ok(Self {
            serial_number: narrow("serial_number", info.serial_number)?,
            page_count: info.page_count,
            total_samples: info.total_samples,
            sample_rate: narrow("sample_rate", info.sample_rate)?,
            channels: narrow("channels", info.channels)?,
            bit_rate: narrow("bit_rate", info.bit_rate)?,
            nominal_bitrate: narrow("nominal_bitrate", info.nominal_bitrate)?,
            min_bitrate: narrow("min_bitrate", info.min_bitrate)?,
            max_bitrate: narrow("max_bitrate", info.max_bitrate)?,
            blocksize0: narrow("blocksize0", info.blocksize0)?,
            blocksize1: narrow("blocksize1", info.blocksize1)?,
            granule_position: info.granule_position,
            page_offsets: info.page_offsets,
            page_granules: info.page_granules,
        })
    }
}

/// Convertisseur sans perte entre [`OggVorbisStreamData`] et [`OggVorbisStreamInfo`]
#[derive(Debug, Default, Clone, Copy)]
pub struct OggVorbisConverter;

impl OggVorbisConverter {
    pub fn to_info(data: &OggVorbisStreamData) -> OggVorbisStreamInfo {
        data.clone().into()
    }

    pub fn to_data(info: &OggVorbisStreamInfo) -> Result<OggVorbisStreamData, FieldOutOfRange> {
        info.clone().try_into()
    }
}

impl Parser<&OggVorbisStreamData> for OggVorbisConverter {
    type Output = OggVorbisStreamInfo;

    fn parse(&self, data: &OggVorbisStreamData) -> Self::Output {
        Self::to_info(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> OggVorbisStreamData {
        OggVorbisStreamData {
            serial_number: 0xCAFE,
            page_count: 42,
            total_samples: 441_000,
            sample_rate: 44_100,
            channels: 2,
            bit_rate: 128,
            nominal_bitrate: 128,
            min_bitrate: 0,
            max_bitrate: 320,
            blocksize0: 256,
            blocksize1: 2048,
            granule_position: 440_000,
            page_offsets: vec![3_900, 8_100, 12_300],
            page_granules: vec![1_024, 5_120, 9_216],
        }
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let data = sample_data();
        let info = OggVorbisConverter::to_info(&data);
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.page_offsets, data.page_offsets);
        assert_eq!(OggVorbisConverter::to_data(&info), Ok(data));
    }

    #[test]
    fn test_round_trip_extremes() {
        let zero = OggVorbisStreamData::default();
        assert_eq!(
            OggVorbisConverter::to_data(&OggVorbisConverter::to_info(&zero)),
            Ok(zero)
        );

        let max = OggVorbisStreamData {
            serial_number: u32::MAX,
            page_count: u64::MAX,
            total_samples: u64::MAX,
            sample_rate: u32::MAX,
            channels: u32::MAX,
            bit_rate: u32::MAX,
            nominal_bitrate: u32::MAX,
            min_bitrate: u32::MAX,
            max_bitrate: u32::MAX,
            blocksize0: i32::MAX,
            blocksize1: i32::MIN,
            granule_position: i64::MIN,
            page_offsets: vec![u64::MAX, 0],
            page_granules: vec![0, u64::MAX],
        };
        let info: OggVorbisStreamInfo = max.clone().into();
        assert_eq!(info.serial_number, u32::MAX as usize);
        assert_eq!(info.blocksize1, i32::MIN as isize);
        assert_eq!(OggVorbisStreamData::try_from(info), Ok(max));
    }

    #[test]
    fn test_round_trip_from_native_description() {
        let info = OggVorbisStreamInfo {
            serial_number: 0x5eed,
            page_count: 7,
            total_samples: 96_000,
            sample_rate: 48_000,
            channels: 6,
            bit_rate: 256,
            nominal_bitrate: 256,
            min_bitrate: 96,
            max_bitrate: 500,
            blocksize0: 256,
            blocksize1: -4096,
            granule_position: -1,
            page_offsets: vec![4_000, 9_000],
            page_granules: vec![48_000, 96_000],
        };
        let data = OggVorbisConverter::to_data(&info).unwrap();
        assert_eq!(data.channels, 6);
        assert_eq!(data.blocksize1, -4096);
        assert_eq!(OggVorbisConverter::to_info(&data), info);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_oversized_fields_are_rejected() {
        let info = OggVorbisStreamInfo {
            serial_number: u32::MAX as usize + 5,
            ..OggVorbisStreamInfo::default()
        };
        assert_eq!(
            OggVorbisConverter::to_data(&info),
            Err(FieldOutOfRange {
                field: "serial_number"
            })
        );

        let info = OggVorbisStreamInfo {
            blocksize0: i32::MIN as isize - 1,
            ..OggVorbisStreamInfo::default()
        };
        let err = OggVorbisStreamData::try_from(info).unwrap_err();
        assert_eq!(err.field, "blocksize0");

        let largest = OggVorbisStreamInfo {
            sample_rate: u32::MAX as usize,
            ..OggVorbisStreamInfo::default()
        };
        assert_eq!(
            OggVorbisConverter::to_data(&largest).map(|data| data.sample_rate),
            Ok(u32::MAX)
        );
    }

    #[test]
    fn test_seek_table_lookup() {
        let info = OggVorbisConverter.parse(&sample_data());
        assert_eq!(info.offset_for_sample(0), Some(3_900));
        assert_eq!(info.offset_for_sample(1_024), Some(3_900));
        assert_eq!(info.offset_for_sample(1_025), Some(8_100));
        assert_eq!(info.offset_for_sample(1_000_000), Some(12_300));
        assert_eq!(info.offset_for_time(0.1), Some(8_100));
        assert!((info.duration() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_seek_table() {
        let info = OggVorbisStreamInfo::default();
        assert_eq!(info.offset_for_sample(10), None);
        assert_eq!(info.offset_for_time(1.0), None);
        assert_eq!(info.duration(), 0.0);
    }
}
