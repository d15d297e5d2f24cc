use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use highland_core::MapJson;
use thiserror::Error;

const TRANSFER_DOMAIN: &str = "highland";
const TRANSFER_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded map payload.
pub(crate) const TRANSFER_HEADER: &str = "highland:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Encodes a map into a single-line string suitable for clipboard transfer.
pub(crate) fn encode(map: &MapJson) -> Result<String, TransferError> {
    let (columns, rows) = map.dimensions().ok_or(TransferError::RaggedMap)?;
    let json = serde_json::to_vec(map).map_err(TransferError::InvalidPayload)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    Ok(format!("{TRANSFER_HEADER}:{columns}x{rows}:{encoded}"))
}

/// Decodes a map from its transfer string.
pub(crate) fn decode(value: &str) -> Result<MapJson, TransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TransferError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(TransferError::MissingPrefix)?;
    let version = parts.next().ok_or(TransferError::MissingVersion)?;
    let dimensions = parts.next().ok_or(TransferError::MissingDimensions)?;
    let payload = parts.next().ok_or(TransferError::MissingPayload)?;

    if domain != TRANSFER_DOMAIN {
        return Err(TransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != TRANSFER_VERSION {
        return Err(TransferError::UnsupportedVersion(version.to_owned()));
    }

    let (columns, rows) = parse_dimensions(dimensions)?;
    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(TransferError::InvalidEncoding)?;
    let map: MapJson = serde_json::from_slice(&bytes).map_err(TransferError::InvalidPayload)?;

    match map.dimensions() {
        Some(found) if found == (columns, rows) => Ok(map),
        Some((found_columns, found_rows)) => Err(TransferError::DimensionMismatch {
            declared: dimensions.to_owned(),
            found_columns,
            found_rows,
        }),
        None => Err(TransferError::RaggedMap),
    }
}

/// Errors that can occur while encoding or decoding map transfer strings.
#[derive(Debug, Error)]
pub(crate) enum TransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("transfer string was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("transfer string is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("transfer string is missing the version")]
    MissingVersion,
    /// The grid dimensions were missing.
    #[error("transfer string is missing the grid dimensions")]
    MissingDimensions,
    /// The payload segment was missing.
    #[error("transfer string is missing the payload")]
    MissingPayload,
    /// The prefix segment named another format.
    #[error("transfer prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The version segment named an unsupported revision.
    #[error("transfer version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed.
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    /// The declared dimensions disagree with the payload.
    #[error("declared dimensions {declared} do not match the {found_columns}x{found_rows} payload")]
    DimensionMismatch {
        /// Dimensions segment as written.
        declared: String,
        /// Columns found in the payload.
        found_columns: u32,
        /// Rows found in the payload.
        found_rows: u32,
    },
    /// The map rows have different lengths.
    #[error("map rows have different lengths")]
    RaggedMap,
    /// The base64 payload could not be decoded.
    #[error("could not decode transfer payload: {0}")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The payload is not a valid map.
    #[error("could not parse transfer payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), TransferError> {
    let (columns, rows) = dimensions
        .split_once(['x', 'X'])
        .ok_or_else(|| TransferError::InvalidDimensions(dimensions.to_owned()))?;

    let columns = columns
        .trim()
        .parse::<u32>()
        .map_err(|_| TransferError::InvalidDimensions(dimensions.to_owned()))?;
    let rows = rows
        .trim()
        .parse::<u32>()
        .map_err(|_| TransferError::InvalidDimensions(dimensions.to_owned()))?;

    if columns == 0 || rows == 0 {
        return Err(TransferError::InvalidDimensions(dimensions.to_owned()));
    }

    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use highland_core::{Elevation, GroundEntryJson, TileJson};

    use super::*;

    fn map(columns: usize, rows: usize) -> MapJson {
        let tile = TileJson {
            zorder: vec![GroundEntryJson {
                kind: "water".to_owned(),
                variant: "middle".to_owned(),
                elevation: Elevation::GROUND,
            }],
        };
        MapJson {
            ground: vec![vec![tile; columns]; rows],
        }
    }

    #[test]
    fn round_trip_keeps_the_map() {
        let mut original = map(3, 2);
        original.ground[1][2].zorder.push(GroundEntryJson {
            kind: "rock".to_owned(),
            variant: "cliff-up".to_owned(),
            elevation: Elevation::whole(2).cliff_below(),
        });

        let encoded = encode(&original).expect("rectangular map encodes");
        assert!(encoded.starts_with(&format!("{TRANSFER_HEADER}:3x2:")));
        assert!(!encoded.contains('='), "payload is unpadded");

        let decoded = decode(&encoded).expect("transfer string decodes");
        assert_eq!(decoded, original);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let encoded = encode(&map(1, 1)).expect("rectangular map encodes");
        let decoded = decode(&format!("  {encoded}\n")).expect("trimmed before parsing");
        assert_eq!(decoded, map(1, 1));
    }

    #[test]
    fn foreign_prefixes_are_rejected() {
        let encoded = encode(&map(1, 1)).expect("rectangular map encodes");
        let foreign = encoded.replacen(TRANSFER_DOMAIN, "tiled", 1);
        assert!(matches!(
            decode(&foreign),
            Err(TransferError::InvalidPrefix(prefix)) if prefix == "tiled"
        ));
    }

    #[test]
    fn dimensions_must_match_the_payload() {
        let encoded = encode(&map(2, 2)).expect("rectangular map encodes");
        let lying = encoded.replacen(":2x2:", ":3x2:", 1);
        assert!(matches!(
            decode(&lying),
            Err(TransferError::DimensionMismatch {
                found_columns: 2,
                found_rows: 2,
                ..
            })
        ));
    }

    #[test]
    fn malformed_strings_are_rejected() {
        assert!(matches!(decode("   "), Err(TransferError::EmptyPayload)));
        assert!(matches!(decode("highland"), Err(TransferError::MissingVersion)));
        assert!(matches!(decode("highland:v2:1x1:e30"), Err(TransferError::UnsupportedVersion(_))));
        assert!(matches!(decode("highland:v1:0x1:e30"), Err(TransferError::InvalidDimensions(_))));
        assert!(matches!(decode("highland:v1:1x1:!!"), Err(TransferError::InvalidEncoding(_))));
    }
}
