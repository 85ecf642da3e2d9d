//! Locale parsing and stream-purpose/mode tables.

use crate::error::ErrorKind;
use crate::message::StreamType;

/// Language code selected for a speech stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    EnglishUs,
    EnglishUk,
    EnglishAu,
    French,
    German,
}

/// Server-side mode for `Intent`/`IntentGraph` streams. `KnowledgeGraph`
/// streams take a distinct construction path and never need one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotMode {
    VoiceCommand,
    Game,
}

/// Maps a high-level [`StreamType`] onto a [`RobotMode`].
///
/// `KnowledgeGraph` has no `RobotMode` - its construction path is handled
/// separately by the coordinator - so it returns `None` rather than an
/// error; every other `StreamType` has exactly one mode.
pub fn mode_for_stream_type(stream_type: StreamType) -> Option<RobotMode> {
    match stream_type {
        StreamType::Normal => Some(RobotMode::VoiceCommand),
        StreamType::Blackjack => Some(RobotMode::Game),
        StreamType::KnowledgeGraph => None,
    }
}

/// Parses a `xx-YY` or `xx_YY` locale string into a [`Language`].
///
/// An empty string is treated as `"en-US"`. Any input that doesn't split
/// into exactly two parts on `-` or `_` is `ErrorKind::InvalidConfig`.
/// Every two-part input resolves to *some* `Language` - unknown language
/// prefixes (anything but `fr`/`de`/`en`) default to `EnglishUs`, and
/// unknown English country codes (anything but `gb`/`au`) do too.
pub fn parse_locale(locale: &str) -> Result<Language, ErrorKind> {
    let locale = if locale.is_empty() { "en-US" } else { locale };

    let mut parts: Vec<&str> = locale.split('-').collect();
    if parts.len() != 2 {
        parts = locale.split('_').collect();
    }
    let [lang, country] = match parts.as_slice() {
        [a, b] => [*a, *b],
        _ => return Err(ErrorKind::InvalidConfig),
    };

    let lang = lang.to_lowercase();
    let country = country.to_lowercase();

    Ok(match lang.as_str() {
        "fr" => Language::French,
        "de" => Language::German,
        "en" => match country.as_str() {
            "gb" => Language::EnglishUk,
            "au" => Language::EnglishAu,
            _ => Language::EnglishUs,
        },
        _ => Language::EnglishUs,
    })
}
