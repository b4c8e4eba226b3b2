//! Byte-level encoding sniffing for files that must be rewritten in the
//! encoding they were read with.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Encoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    /// Windows-1252 / ISO-8859-1 fallback for bytes that are not valid UTF-8.
    Latin1,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf8Bom => "utf-8-sig",
            Encoding::Utf16Le => "utf-16-le",
            Encoding::Utf16Be => "utf-16-be",
            Encoding::Latin1 => "latin-1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Encoding::Utf8),
            "utf-8-sig" => Some(Encoding::Utf8Bom),
            "utf-16-le" | "utf-16le" => Some(Encoding::Utf16Le),
            "utf-16-be" | "utf-16be" => Some(Encoding::Utf16Be),
            "latin-1" | "latin1" | "iso-8859-1" | "windows-1252" | "cp1252" => {
                Some(Encoding::Latin1)
            }
            _ => None,
        }
    }

    pub fn is_utf8(self) -> bool {
        matches!(self, Encoding::Utf8 | Encoding::Utf8Bom)
    }
}

pub fn detect(bytes: &[u8]) -> Encoding {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Encoding::Utf8Bom;
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Encoding::Utf16Le;
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Encoding::Utf16Be;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return Encoding::Utf8;
    }
    // BOM-less UTF-16 shows up as a NUL in every other byte of ASCII text.
    let sample = &bytes[..bytes.len().min(512)];
    if sample.len() >= 4 {
        let even_nuls = sample.iter().step_by(2).filter(|byte| **byte == 0).count();
        let odd_nuls = sample.iter().skip(1).step_by(2).filter(|byte| **byte == 0).count();
        let half = sample.len() / 2;
        if odd_nuls * 10 >= half * 8 && even_nuls == 0 {
            return Encoding::Utf16Le;
        }
        if even_nuls * 10 >= half * 8 && odd_nuls == 0 {
            return Encoding::Utf16Be;
        }
    }
    Encoding::Latin1
}

pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<String, String> {
    match encoding {
        Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|error| error.to_string()),
        Encoding::Utf8Bom => {
            let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
            String::from_utf8(body.to_vec()).map_err(|error| error.to_string())
        }
        Encoding::Utf16Le | Encoding::Utf16Be => {
            let body = bytes
                .strip_prefix(&[0xFF, 0xFE])
                .or_else(|| bytes.strip_prefix(&[0xFE, 0xFF]))
                .unwrap_or(bytes);
            if body.len() % 2 != 0 {
                return Err("odd number of bytes in UTF-16 content".to_string());
            }
            let units = body
                .chunks_exact(2)
                .map(|pair| match encoding {
                    Encoding::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
                    _ => u16::from_be_bytes([pair[0], pair[1]]),
                })
                .collect::<Vec<_>>();
            String::from_utf16(&units).map_err(|error| error.to_string())
        }
        Encoding::Latin1 => Ok(bytes.iter().map(|byte| char::from(*byte)).collect()),
    }
}

/// Decodes with the detected encoding, returning both the text and the encoding.
pub fn decode_detected(bytes: &[u8]) -> Result<(String, Encoding), String> {
    let encoding = detect(bytes);
    decode(bytes, encoding).map(|text| (text, encoding))
}

pub fn encode(text: &str, encoding: Encoding) -> Result<Vec<u8>, String> {
    match encoding {
        Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        Encoding::Utf8Bom => {
            let mut bytes = vec![0xEF, 0xBB, 0xBF];
            bytes.extend_from_slice(text.as_bytes());
            Ok(bytes)
        }
        Encoding::Utf16Le => {
            let mut bytes = vec![0xFF, 0xFE];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            Ok(bytes)
        }
        Encoding::Utf16Be => {
            let mut bytes = vec![0xFE, 0xFF];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            Ok(bytes)
        }
        Encoding::Latin1 => text
            .chars()
            .map(|character| {
                let code = character as u32;
                if code <= 0xFF {
                    Ok(code as u8)
                } else {
                    Err(format!("character {character:?} is not representable in latin-1"))
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_utf8_and_bom() {
        assert_eq!(detect("name: test".as_bytes()), Encoding::Utf8);
        assert_eq!(detect(&[0xEF, 0xBB, 0xBF, b'a']), Encoding::Utf8Bom);
    }

    #[test]
    fn falls_back_to_latin1_for_mojibake() {
        let bytes = [b'c', b'a', b'f', 0xE9];
        let (text, encoding) = decode_detected(&bytes).expect("decode");
        assert_eq!(encoding, Encoding::Latin1);
        assert_eq!(text, "café");
    }

    #[test]
    fn utf16_survives_encode_decode() {
        let bytes = encode("déjà vu", Encoding::Utf16Le).expect("encode");
        assert_eq!(detect(&bytes), Encoding::Utf16Le);
        assert_eq!(decode(&bytes, Encoding::Utf16Le).expect("decode"), "déjà vu");
    }
}
