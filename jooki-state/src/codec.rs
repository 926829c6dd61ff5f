//! Tolerant codecs for the quirks of the Jooki wire encoding.
//!
//! The device is inconsistent about primitive representations: numeric track
//! attributes arrive as quoted strings, the repeat mode has historically been
//! sent as either an integer or a boolean, and the artwork reference is either
//! a URL string or the literal `false`. Each wrapper here decodes every form
//! observed on the wire and re-encodes the form the device expects back.

use serde::{Deserialize, Serialize};

/// An integer carried as quoted text on the wire (e.g. a track's byte size).
///
/// Decodes from either `"12345"` or `12345`; always encodes as `"12345"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NumericRepr<i64>", into = "String")]
pub struct IntString(pub i64);

impl From<IntString> for String {
    fn from(value: IntString) -> String {
        value.0.to_string()
    }
}

impl TryFrom<NumericRepr<i64>> for IntString {
    type Error = std::num::ParseIntError;

    fn try_from(repr: NumericRepr<i64>) -> Result<Self, Self::Error> {
        match repr {
            NumericRepr::Text(s) => s.trim().parse().map(IntString),
            NumericRepr::Number(n) => Ok(IntString(n)),
        }
    }
}

/// A float carried as quoted text on the wire (e.g. a track duration).
///
/// Decodes from either `"212.61"` or `212.61`; always encodes as text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NumericRepr<f64>", into = "String")]
pub struct FloatString(pub f64);

impl From<FloatString> for String {
    fn from(value: FloatString) -> String {
        value.0.to_string()
    }
}

impl TryFrom<NumericRepr<f64>> for FloatString {
    type Error = std::num::ParseFloatError;

    fn try_from(repr: NumericRepr<f64>) -> Result<Self, Self::Error> {
        match repr {
            NumericRepr::Text(s) => s.trim().parse().map(FloatString),
            NumericRepr::Number(n) => Ok(FloatString(n)),
        }
    }
}

/// Wire form shared by [`IntString`] and [`FloatString`].
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericRepr<N> {
    Number(N),
    Text(String),
}

/// Artwork reference: a URL string on the wire, or literal `false` for none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ImageRepr", into = "ImageRepr")]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ImageRepr {
    Missing(bool),
    Url(String),
}

impl From<ImageRepr> for ImageRef {
    fn from(repr: ImageRepr) -> Self {
        match repr {
            ImageRepr::Url(url) => ImageRef(url),
            ImageRepr::Missing(_) => ImageRef(String::new()),
        }
    }
}

impl From<ImageRef> for ImageRepr {
    fn from(image: ImageRef) -> Self {
        if image.is_empty() {
            ImageRepr::Missing(false)
        } else {
            ImageRepr::Url(image.0)
        }
    }
}

/// Repeat mode for audio playback.
///
/// Integer on the wire today, but older firmware sent a boolean; both decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RepeatRepr", into = "u8")]
pub enum RepeatMode {
    #[default]
    Off,
    On,
    Once,
    /// A mode this library does not know about, preserved as received.
    Other(u8),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RepeatRepr {
    Number(u8),
    Flag(bool),
}

impl From<RepeatRepr> for RepeatMode {
    fn from(repr: RepeatRepr) -> Self {
        match repr {
            RepeatRepr::Number(0) | RepeatRepr::Flag(false) => RepeatMode::Off,
            RepeatRepr::Number(1) | RepeatRepr::Flag(true) => RepeatMode::On,
            RepeatRepr::Number(2) => RepeatMode::Once,
            RepeatRepr::Number(n) => RepeatMode::Other(n),
        }
    }
}

impl From<RepeatMode> for u8 {
    fn from(mode: RepeatMode) -> u8 {
        match mode {
            RepeatMode::Off => 0,
            RepeatMode::On => 1,
            RepeatMode::Once => 2,
            RepeatMode::Other(n) => n,
        }
    }
}

/// Deserialize an optional record field that the device sometimes sends as
/// `null` or an empty array instead of an object.
pub(crate) fn lenient_record<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null | serde_json::Value::Array(_) => Ok(None),
        other => serde_json::from_value(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_string_decodes_quoted_and_bare() {
        let quoted: IntString = serde_json::from_str(r#""4378634""#).unwrap();
        assert_eq!(quoted, IntString(4378634));

        let bare: IntString = serde_json::from_str("4378634").unwrap();
        assert_eq!(bare, IntString(4378634));
    }

    #[test]
    fn test_int_string_encodes_as_text() {
        let json = serde_json::to_string(&IntString(99)).unwrap();
        assert_eq!(json, r#""99""#);
    }

    #[test]
    fn test_int_string_rejects_garbage() {
        let result: Result<IntString, _> = serde_json::from_str(r#""not a number""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_float_string_round_trip() {
        let decoded: FloatString = serde_json::from_str(r#""212.61""#).unwrap();
        assert!((decoded.0 - 212.61).abs() < 1e-9);

        let bare: FloatString = serde_json::from_str("212.61").unwrap();
        assert!((bare.0 - 212.61).abs() < 1e-9);

        let json = serde_json::to_string(&FloatString(1.5)).unwrap();
        assert_eq!(json, r#""1.5""#);
    }

    #[test]
    fn test_image_ref_false_means_absent() {
        let image: ImageRef = serde_json::from_str("false").unwrap();
        assert!(image.is_empty());

        let image: ImageRef = serde_json::from_str(r#""/artwork/abc.jpg""#).unwrap();
        assert_eq!(image.as_str(), "/artwork/abc.jpg");
    }

    #[test]
    fn test_image_ref_encodes_false_when_empty() {
        assert_eq!(serde_json::to_string(&ImageRef::default()).unwrap(), "false");
        assert_eq!(
            serde_json::to_string(&ImageRef("x.jpg".into())).unwrap(),
            r#""x.jpg""#
        );
    }

    #[test]
    fn test_repeat_mode_decodes_int_and_bool() {
        assert_eq!(
            serde_json::from_str::<RepeatMode>("0").unwrap(),
            RepeatMode::Off
        );
        assert_eq!(
            serde_json::from_str::<RepeatMode>("2").unwrap(),
            RepeatMode::Once
        );
        assert_eq!(
            serde_json::from_str::<RepeatMode>("true").unwrap(),
            RepeatMode::On
        );
        assert_eq!(
            serde_json::from_str::<RepeatMode>("false").unwrap(),
            RepeatMode::Off
        );
        assert_eq!(
            serde_json::from_str::<RepeatMode>("7").unwrap(),
            RepeatMode::Other(7)
        );
    }

    #[test]
    fn test_repeat_mode_encodes_as_int() {
        assert_eq!(serde_json::to_string(&RepeatMode::Once).unwrap(), "2");
        assert_eq!(serde_json::to_string(&RepeatMode::Other(9)).unwrap(), "9");
    }
}
