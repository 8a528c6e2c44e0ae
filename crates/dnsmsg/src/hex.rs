use std::fmt;

/// Render octets as lowercase hex, two digits per octet.
pub fn encode(octets: &[u8]) -> String {
    let mut out = String::with_capacity(octets.len() * 2);
    for octet in octets {
        out.push(digit(octet >> 4));
        out.push(digit(octet & 0b1111));
    }
    out
}

/// Parse hex, ignoring any whitespace between digits.
pub fn decode(s: &str) -> Result<Vec<u8>, Error> {
    let digits = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<Vec<char>>();

    if digits.len() % 2 != 0 {
        return Err(Error::OddLength);
    }

    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks(2) {
        let hi = value(pair[0])?;
        let lo = value(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

fn digit(nibble: u8) -> char {
    char::from_digit(u32::from(nibble), 16).unwrap_or('?')
}

#[allow(clippy::cast_possible_truncation)]
fn value(c: char) -> Result<u8, Error> {
    // to_digit(16) is at most 15
    c.to_digit(16).map(|d| d as u8).ok_or(Error::BadDigit(c))
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    OddLength,
    BadDigit(char),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OddLength => write!(f, "odd number of hex digits"),
            Error::BadDigit(c) => write!(f, "'{c}' is not a hex digit"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
