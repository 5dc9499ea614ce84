//! Dotted numeric versions as reported by emulator executables.

use std::cmp::Ordering;
use std::fmt;

/// A dotted decimal version such as `7.0.1.1`.
///
/// Missing trailing components compare as zero, so `5` == `5.0.0`.
#[derive(Clone, Debug, Default)]
pub struct Version(Vec<u32>);

impl Version {
    pub fn new(parts: &[u32]) -> Self {
        Self(parts.to_vec())
    }

    /// Parses the leading dotted-number part of a version string.
    ///
    /// Non-numeric suffixes (`"5.12.0.1044 (x64)"`) are ignored. Returns `None`
    /// when the string does not start with a number.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = Vec::new();
        for piece in text.trim().split('.') {
            let digits: String = piece.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                break;
            }
            parts.push(digits.parse().ok()?);
            if digits.len() != piece.len() {
                break;
            }
        }
        if parts.is_empty() { None } else { Some(Self(parts)) }
    }

    /// Major component, 0 for an empty version.
    pub fn major(&self) -> u32 {
        self.0.first().copied().unwrap_or(0)
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }

    fn component(&self, idx: usize) -> u32 {
        self.0.get(idx).copied().unwrap_or(0)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "unknown");
        }
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Version::parse("7.0.1.1"), Some(Version::new(&[7, 0, 1, 1])));
        assert_eq!(
            Version::parse("5.12.0.1044 (x64)"),
            Some(Version::new(&[5, 12, 0, 1044]))
        );
        assert_eq!(Version::parse("4.280"), Some(Version::new(&[4, 280])));
        assert_eq!(Version::parse("v7"), None);
        assert_eq!(Version::parse(""), None);
    }

    #[test]
    fn test_ordering() {
        let threshold = Version::new(&[7, 0, 1, 1]);
        assert!(Version::parse("7.0.1.1").unwrap() >= threshold);
        assert!(Version::parse("7.0.2").unwrap() > threshold);
        assert!(Version::parse("7.0.1").unwrap() < threshold);
        assert!(Version::parse("6.6.1.5").unwrap() < threshold);
        assert_eq!(Version::new(&[5]), Version::new(&[5, 0, 0]));
    }

    #[test]
    fn test_display() {
        assert_eq!(Version::new(&[5, 9, 0]).to_string(), "5.9.0");
        assert_eq!(Version::default().to_string(), "unknown");
        assert_eq!(Version::default().major(), 0);
    }
}
