use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;
const MAX_NAXIS: usize = 999;

/// Keywords of a single HDU, in card order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FitsHeader {
    cards: Vec<(String, String)>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a keyword, replacing an earlier card with the same name
    pub fn insert(&mut self, keyword: impl Into<String>, value: impl Into<String>) {
        let keyword = keyword.into().to_uppercase();
        let value = value.into();
        match self.cards.iter_mut().find(|(k, _)| *k == keyword) {
            Some(card) => card.1 = value,
            None => self.cards.push((keyword, value)),
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.cards
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(keyword))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        // FITS allows Fortran-style exponents
        self.get(keyword)
            .and_then(|v| v.replace(['D', 'd'], "E").parse::<f64>().ok())
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        let raw = self.get(keyword)?;
        raw.parse::<i64>().ok().or_else(|| {
            // Integral values written as reals (e.g. NAXIS3 = 1.0)
            self.get_f64(keyword)
                .filter(|v| v.fract() == 0.0)
                .map(|v| v as i64)
        })
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Size in bytes of the data segment following this header, unpadded
    fn data_size(&self) -> Result<usize> {
        let naxis = self.get_i64("NAXIS").unwrap_or(0).max(0) as usize;
        if naxis == 0 {
            return Ok(0);
        }
        if naxis > MAX_NAXIS {
            anyhow::bail!("NAXIS = {} exceeds the FITS limit of {}", naxis, MAX_NAXIS);
        }
        let bitpix = self.get_i64("BITPIX").unwrap_or(8).unsigned_abs() as usize;
        let pcount = self.get_i64("PCOUNT").unwrap_or(0).max(0) as usize;
        let gcount = self.get_i64("GCOUNT").unwrap_or(1).max(1) as usize;

        // Random groups put a zero in NAXIS1
        let first = if self.get_i64("NAXIS1") == Some(0) && naxis > 1 { 2 } else { 1 };
        let overflow = || anyhow::anyhow!("FITS data segment size overflows");
        let mut elements: usize = 1;
        for i in first..=naxis {
            let n = self.get_i64(&format!("NAXIS{}", i)).unwrap_or(0).max(0) as usize;
            elements = elements.checked_mul(n).ok_or_else(overflow)?;
        }

        pcount
            .checked_add(elements)
            .and_then(|n| n.checked_mul(gcount))
            .and_then(|n| n.checked_mul(bitpix / 8))
            .ok_or_else(overflow)
    }
}

/// Read every HDU header from a file on disk.
///
/// Both real FITS files and plain-text header dumps (one card per line,
/// HDUs terminated by `END`) are accepted.
pub fn read_headers(path: &Path) -> Result<Vec<FitsHeader>> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if is_binary_fits(&data) {
        parse_fits_blocks(&data)
    } else {
        Ok(parse_header_text(&String::from_utf8_lossy(&data)))
    }
}

fn is_binary_fits(data: &[u8]) -> bool {
    data.len() >= CARD_SIZE
        && data.starts_with(b"SIMPLE  =")
        && !data[..CARD_SIZE].contains(&b'\n')
}

/// Walk the HDUs of a FITS byte stream, skipping data segments
pub fn parse_fits_blocks(data: &[u8]) -> Result<Vec<FitsHeader>> {
    let mut headers = Vec::new();
    let mut offset = 0;

    while offset < data.len() && data.len() - offset >= BLOCK_SIZE {
        let mut header = FitsHeader::new();
        let mut ended = false;

        // Read header blocks until we find END
        while !ended {
            if data.len() - offset < BLOCK_SIZE {
                anyhow::bail!("FITS header {} is not terminated by END", headers.len());
            }
            let block = &data[offset..offset + BLOCK_SIZE];
            offset += BLOCK_SIZE;

            for chunk in block.chunks(CARD_SIZE) {
                let card = String::from_utf8_lossy(chunk);
                if is_end_card(&card) {
                    ended = true;
                    break;
                }
                if let Some((keyword, value)) = parse_card(&card) {
                    header.insert(keyword, value);
                }
            }
        }

        let data_size = header
            .data_size()
            .with_context(|| format!("Bad data size in FITS header {}", headers.len()))?;
        offset = data_size
            .div_ceil(BLOCK_SIZE)
            .checked_mul(BLOCK_SIZE)
            .and_then(|padded| offset.checked_add(padded))
            .context("FITS data segment runs past the addressable range")?;
        headers.push(header);
    }

    Ok(headers)
}

/// Parse a header dump where each line is one card and `END` closes an HDU
pub fn parse_header_text(text: &str) -> Vec<FitsHeader> {
    let mut headers = Vec::new();
    let mut current = FitsHeader::new();
    let mut pending = false;

    for line in text.lines() {
        if is_end_card(line) {
            headers.push(std::mem::take(&mut current));
            pending = false;
            continue;
        }
        if let Some((keyword, value)) = parse_card(line) {
            current.insert(keyword, value);
            pending = true;
        }
    }

    // Tolerate a missing final END
    if pending {
        headers.push(current);
    }

    headers
}

fn is_end_card(card: &str) -> bool {
    card.trim_end() == "END"
}

/// Parse one `KEYWORD = VALUE / COMMENT` card
fn parse_card(card: &str) -> Option<(String, String)> {
    let card = card.trim_end_matches(['\r', '\n']);

    // Skip empty cards, COMMENT, and HISTORY
    let trimmed = card.trim();
    if trimmed.is_empty() || trimmed.starts_with("COMMENT") || trimmed.starts_with("HISTORY") {
        return None;
    }

    let eq_pos = card.find('=')?;
    let keyword = card[..eq_pos].trim();
    if keyword.is_empty() || keyword.contains(' ') {
        return None;
    }

    let value_part = card[eq_pos + 1..].trim_start();
    let value = if let Some(quoted) = value_part.strip_prefix('\'') {
        parse_quoted(quoted)
    } else {
        // Find the value (before the comment if any)
        match value_part.find('/') {
            Some(comment_pos) => value_part[..comment_pos].trim().to_string(),
            None => value_part.trim().to_string(),
        }
    };

    Some((keyword.to_uppercase(), value))
}

/// Read a quoted string value; `''` is an escaped quote
fn parse_quoted(rest: &str) -> String {
    let mut value = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                value.push('\'');
                chars.next();
            } else {
                break;
            }
        } else {
            value.push(c);
        }
    }
    value.trim_end().to_string()
}
