//! Hardware attributes, helper command verbs, and the cached hardware state.
//!
//! The bridge never talks to the relay card directly.  It only knows what the
//! helper program last reported, and caches that view in a [`HardwareState`].
//! The cache is in-memory only: it is seeded once at startup from the helper's
//! status output and then updated after every successful mutating command.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when the panel names something the bridge does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// A `StatusQuery` named an attribute that is not cached.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// An `Action` named a verb the helper program does not support.
    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),
}

// ── Attributes ────────────────────────────────────────────────────────────────

/// A named piece of hardware state that the bridge caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Whether the amplifier's mains relay is closed.
    Power,
}

impl Attribute {
    /// Every attribute the bridge caches, in push order.
    pub const ALL: [Attribute; 1] = [Attribute::Power];

    /// Wire name of the attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Power => "power",
        }
    }
}

impl FromStr for Attribute {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "power" => Ok(Attribute::Power),
            other => Err(AttributeError::UnknownAttribute(other.to_string())),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Command verbs ─────────────────────────────────────────────────────────────

/// Verbs understood by the relay helper program.
///
/// ```text
/// akai_amp power  <on|off>
/// akai_amp volume <up|down> [1|2|3]
/// akai_amp reset
/// ```
///
/// `reset` is a power-off followed by turning the volume fully down, so it
/// always leaves the amplifier powered off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmpCommand {
    Power,
    Volume,
    Reset,
}

impl AmpCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            AmpCommand::Power => "power",
            AmpCommand::Volume => "volume",
            AmpCommand::Reset => "reset",
        }
    }

    /// The power state this command leaves behind when it succeeds, if any.
    ///
    /// `power` follows its first argument (`on…` or `off…`); `reset` always
    /// powers down; `volume` does not touch the power relay.
    pub fn resulting_power(self, params: &str) -> Option<bool> {
        match self {
            AmpCommand::Power if params.starts_with("on") => Some(true),
            AmpCommand::Power if params.starts_with("off") => Some(false),
            AmpCommand::Power => None,
            AmpCommand::Reset => Some(false),
            AmpCommand::Volume => None,
        }
    }
}

impl FromStr for AmpCommand {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "power" => Ok(AmpCommand::Power),
            "volume" => Ok(AmpCommand::Volume),
            "reset" => Ok(AmpCommand::Reset),
            other => Err(AttributeError::UnrecognizedCommand(other.to_string())),
        }
    }
}

/// Builds the helper command line from a verb and its argument string.
///
/// Blank parameters produce just the verb, so `("reset", "")` becomes
/// `"reset"` rather than `"reset "`.
pub fn resolve_command(command: &str, params: &str) -> String {
    let params = params.trim();
    if params.is_empty() {
        command.to_string()
    } else {
        format!("{command} {params}")
    }
}

/// Interprets the output of the helper's `status short` command.
///
/// The helper prints the relay bank as a short digit string; the second
/// character is the mains relay: `'1'` for on, `'0'` for off.  Anything else
/// is treated as malformed and yields `None`.
pub fn parse_status_output(stdout: &str) -> Option<bool> {
    match stdout.chars().nth(1) {
        Some('1') => Some(true),
        Some('0') => Some(false),
        _ => None,
    }
}

// ── Cached state ──────────────────────────────────────────────────────────────

/// Last known value of every cached attribute.
///
/// Unset attributes read as `false`, which is also what a freshly started
/// bridge reports until seeding succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareState {
    values: HashMap<Attribute, bool>,
}

impl HardwareState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, attribute: Attribute) -> bool {
        self.values.get(&attribute).copied().unwrap_or(false)
    }

    pub fn set(&mut self, attribute: Attribute, value: bool) {
        self.values.insert(attribute, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_attribute_parses() {
        assert_eq!("power".parse::<Attribute>(), Ok(Attribute::Power));
        assert_eq!(Attribute::Power.to_string(), "power");
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        let result = "volume".parse::<Attribute>();
        assert_eq!(
            result,
            Err(AttributeError::UnknownAttribute("volume".to_string()))
        );
    }

    #[test]
    fn test_known_commands_parse() {
        assert_eq!("power".parse::<AmpCommand>(), Ok(AmpCommand::Power));
        assert_eq!("volume".parse::<AmpCommand>(), Ok(AmpCommand::Volume));
        assert_eq!("reset".parse::<AmpCommand>(), Ok(AmpCommand::Reset));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(matches!(
            "status".parse::<AmpCommand>(),
            Err(AttributeError::UnrecognizedCommand(ref c)) if c == "status"
        ));
    }

    #[test]
    fn test_power_on_and_off_resulting_state() {
        assert_eq!(AmpCommand::Power.resulting_power("on"), Some(true));
        assert_eq!(AmpCommand::Power.resulting_power("off"), Some(false));
        // Prefix match, as the panel may append extra words.
        assert_eq!(AmpCommand::Power.resulting_power("on now"), Some(true));
        assert_eq!(AmpCommand::Power.resulting_power("toggle"), None);
    }

    #[test]
    fn test_reset_always_powers_down_and_volume_leaves_power() {
        assert_eq!(AmpCommand::Reset.resulting_power(""), Some(false));
        assert_eq!(AmpCommand::Reset.resulting_power("all"), Some(false));
        assert_eq!(AmpCommand::Volume.resulting_power("up 3"), None);
    }

    #[test]
    fn test_resolve_command_joins_verb_and_params() {
        assert_eq!(resolve_command("power", "on"), "power on");
        assert_eq!(resolve_command("volume", "down 3"), "volume down 3");
    }

    #[test]
    fn test_resolve_command_with_blank_params_is_just_the_verb() {
        assert_eq!(resolve_command("reset", ""), "reset");
        assert_eq!(resolve_command("reset", "   "), "reset");
    }

    #[test]
    fn test_parse_status_output_reads_second_character() {
        assert_eq!(parse_status_output("01000000\n"), Some(true));
        assert_eq!(parse_status_output("00000000\n"), Some(false));
    }

    #[test]
    fn test_parse_status_output_rejects_malformed_text() {
        assert_eq!(parse_status_output(""), None);
        assert_eq!(parse_status_output("0"), None);
        assert_eq!(parse_status_output("No serial ports found"), None);
    }

    #[test]
    fn test_hardware_state_defaults_to_false() {
        let state = HardwareState::new();
        assert!(!state.get(Attribute::Power));
    }

    #[test]
    fn test_hardware_state_set_overwrites() {
        let mut state = HardwareState::new();
        state.set(Attribute::Power, true);
        assert!(state.get(Attribute::Power));
        state.set(Attribute::Power, true);
        assert!(state.get(Attribute::Power));
        state.set(Attribute::Power, false);
        assert!(!state.get(Attribute::Power));
    }
}
