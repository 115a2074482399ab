//! Version strings of the form `a.b.c.d`, encoded as `(a << 24) | (b << 16) | (c << 8) | d`.

use super::{finish, Result, TextParseError};
use nom::{
    bytes::complete::tag, character::complete::digit1, combinator::all_consuming,
    multi::separated_nonempty_list,
};

fn component(input: &str) -> Result<u32> {
    let (input, digits) = digit1(input)?;
    match digits.parse::<u8>() {
        Ok(v) => Ok((input, u32::from(v))),
        Err(_) => Err(nom::Err::Failure(TextParseError::VersionComponent)),
    }
}

fn components(input: &str) -> Result<Vec<u32>> {
    separated_nonempty_list(tag("."), component)(input)
}

/// Parses `"20.0.0.5"` into `0x14000005`. Missing trailing components count as zero.
pub fn parse_version(input: &str) -> std::result::Result<u32, TextParseError> {
    let parts = finish(all_consuming(components)(input.trim()))?;
    if parts.len() > 4 {
        return Err(TextParseError::VersionComponent);
    }

    Ok(parts
        .iter()
        .chain(std::iter::repeat(&0))
        .take(4)
        .fold(0, |acc, part| (acc << 8) | part))
}

/// Inverse of `parse_version`.
pub fn format_version(version: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        version >> 24,
        (version >> 16) & 0xff,
        (version >> 8) & 0xff,
        version & 0xff
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_components() {
        assert_eq!(parse_version("20.0.0.5"), Ok(0x1400_0005));
        assert_eq!(parse_version("4.0.0.2"), Ok(0x0400_0002));
        assert_eq!(parse_version("255.255.255.255"), Ok(0xffff_ffff));
    }

    #[test]
    fn short_versions_are_padded() {
        assert_eq!(parse_version("3.3"), Ok(0x0303_0000));
        assert_eq!(parse_version("10"), Ok(0x0a00_0000));
    }

    #[test]
    fn ordering_follows_components() {
        let a = parse_version("10.0.1.2").unwrap();
        let b = parse_version("10.1.0.0").unwrap();
        let c = parse_version("20.0.0.4").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn malformed() {
        assert_eq!(parse_version("256.0.0.0"), Err(TextParseError::VersionComponent));
        assert_eq!(parse_version("1.2.3.4.5"), Err(TextParseError::VersionComponent));
        assert!(parse_version("1..2").is_err());
        assert!(parse_version("v1.0").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn formats_back() {
        assert_eq!(format_version(0x1402_0007), "20.2.0.7");
    }
}
