use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Error type for identifier construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("Identifier is empty")]
    Empty,
    #[error("Identifier contains control character at byte {0}")]
    ControlCharacter(usize),
}

/// Opaque name of one rule set, used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Arc<str>);

impl Identifier {
    pub fn new(name: impl AsRef<str>) -> Result<Self, IdentifierError> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if let Some((pos, _)) = name.char_indices().find(|(_, c)| c.is_control()) {
            return Err(IdentifierError::ControlCharacter(pos));
        }
        Ok(Self(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        let id = Identifier::new("ads").unwrap();
        assert_eq!(id.as_str(), "ads");
        assert_eq!(id.to_string(), "ads");
        assert_eq!("trackers".parse::<Identifier>().unwrap().as_str(), "trackers");
    }

    #[test]
    fn rejects_empty_and_control_characters() {
        assert_eq!(Identifier::new(""), Err(IdentifierError::Empty));
        assert_eq!(Identifier::new("ad\ns"), Err(IdentifierError::ControlCharacter(2)));
    }

    #[test]
    fn equal_names_are_equal_keys() {
        let a = Identifier::new("ads").unwrap();
        let b = Identifier::try_from("ads").unwrap();
        assert_eq!(a, b);
    }
}
