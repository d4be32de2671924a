//! Validator ballots.

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// A validator's vote on a pending link request.
///
/// Encoded on the wire as its numeric discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Ballot {
    None = 0,
    Agreement = 1,
    Opposition = 2,
    Abstaining = 3,
}

impl TryFrom<u8> for Ballot {
    type Error = TypesError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Agreement),
            2 => Ok(Self::Opposition),
            3 => Ok(Self::Abstaining),
            other => Err(TypesError::UnknownBallot(other)),
        }
    }
}

impl From<Ballot> for u8 {
    fn from(ballot: Ballot) -> Self {
        ballot as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_is_numeric() {
        assert_eq!(serde_json::to_string(&Ballot::Agreement).unwrap(), "1");
        let parsed: Ballot = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, Ballot::Opposition);
        assert!(serde_json::from_str::<Ballot>("7").is_err());
    }
}
