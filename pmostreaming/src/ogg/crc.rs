//! CRC32 des pages Ogg (polynôme 0x04c11db7, valeur initiale 0, pas de XOR final)

const POLYNOMIAL: u32 = 0x04c11db7;

const fn table_entry(index: u32) -> u32 {
    let mut value = index << 24;
    let mut bit = 0;
    while bit < 8 {
        value = if value & 0x8000_0000 != 0 {
            (value << 1) ^ POLYNOMIAL
        } else {
            value << 1
        };
        bit += 1;
    }
    value
}

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut index = 0;
    while index < 256 {
        table[index] = table_entry(index as u32);
        index += 1;
    }
    table
}

static TABLE: [u32; 256] = build_table();

/// Met à jour `crc` avec `data`
pub fn update(crc: u32, data: &[u8]) -> u32 {
    data.iter().fold(crc, |crc, byte| {
        (crc << 8) ^ TABLE[((crc >> 24) ^ u32::from(*byte)) as usize]
    })
}

/// Somme de contrôle d'une page complète, le champ CRC (octets 22..26) compté à zéro
pub fn page_checksum(page: &[u8]) -> u32 {
    let crc = update(0, &page[..22]);
    let crc = update(crc, &[0; 4]);
    update(crc, &page[26..])
}
