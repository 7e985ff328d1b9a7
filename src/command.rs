//! Outbound command payloads for the printer's request topic.

use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

use crate::sequence_id::SequenceId;

/// A command to publish on the request topic.
///
/// Serializes to the wire shape the printer expects: a single-key object
/// naming the command family, e.g. `{"print": {"command": "pause", ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// A print-family command.
    Print(Print),
    /// A pushing-family command.
    Pushing(Pushing),
}

impl Command {
    /// Start printing a file previously uploaded to the printer's storage.
    pub fn start_print(filename: &str) -> Self {
        Command::Print(Print::ProjectFile(ProjectFile {
            sequence_id: SequenceId::next(),
            param: "Metadata/plate_1.gcode".to_string(),
            url: format!("file:///sdcard/{filename}"),
            subtask_name: filename.to_string(),
            use_ams: true,
            timelapse: false,
            bed_leveling: true,
        }))
    }

    /// Pause the current print.
    pub fn pause() -> Self {
        Command::Print(Print::Pause(Pause {
            sequence_id: SequenceId::next(),
        }))
    }

    /// Resume the current print.
    pub fn resume() -> Self {
        Command::Print(Print::Resume(Resume {
            sequence_id: SequenceId::next(),
        }))
    }

    /// Stop the current print.
    pub fn stop() -> Self {
        Command::Print(Print::Stop(Stop {
            sequence_id: SequenceId::next(),
        }))
    }

    /// Set the print speed profile.
    pub fn print_speed(profile: SpeedProfile) -> Self {
        Command::Print(Print::PrintSpeed(PrintSpeed {
            sequence_id: SequenceId::next(),
            param: profile,
        }))
    }

    /// Ask the printer to push its full status, including the AMS block.
    pub fn push_all() -> Self {
        Command::Pushing(Pushing::Pushall(Pushall {
            sequence_id: SequenceId::next(),
        }))
    }
}

/// A print-family command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum Print {
    /// Start printing an uploaded project file.
    ProjectFile(ProjectFile),
    /// Pause the current print.
    Pause(Pause),
    /// Resume the current print.
    Resume(Resume),
    /// Stop the current print.
    Stop(Stop),
    /// Set the print speed profile.
    PrintSpeed(PrintSpeed),
}

/// A pushing-family command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum Pushing {
    /// Request a full status push.
    Pushall(Pushall),
}

/// The payload for starting an uploaded project file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectFile {
    /// The sequence id.
    pub sequence_id: SequenceId,
    /// The gcode entry inside the project to print.
    pub param: String,
    /// Where the printer finds the file, on its own storage.
    pub url: String,
    /// The job name shown on the printer display.
    pub subtask_name: String,
    /// Whether to feed filament from the AMS.
    pub use_ams: bool,
    /// Whether to record a timelapse.
    pub timelapse: bool,
    /// Whether to level the bed before printing.
    pub bed_leveling: bool,
}

/// The payload for pausing the current print.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pause {
    /// The sequence id.
    pub sequence_id: SequenceId,
}

/// The payload for resuming the current print.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resume {
    /// The sequence id.
    pub sequence_id: SequenceId,
}

/// The payload for stopping the current print.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stop {
    /// The sequence id.
    pub sequence_id: SequenceId,
}

/// The payload for setting the speed profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrintSpeed {
    /// The sequence id.
    pub sequence_id: SequenceId,
    /// The profile.
    pub param: SpeedProfile,
}

/// The payload for requesting a full status push.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pushall {
    /// The sequence id.
    pub sequence_id: SequenceId,
}

/// Speed profiles the printer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromStr, Serialize, Deserialize)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SpeedProfile {
    /// Silent mode.
    Silent,
    /// Standard mode.
    Standard,
    /// Sport mode.
    Sport,
    /// Ludicrous mode.
    Ludicrous,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serialize_start_print() {
        let payload = serde_json::to_string(&Command::start_print("benchy.gcode")).unwrap();
        assert_eq!(
            payload,
            r#"{"print":{"command":"project_file","sequence_id":"1","param":"Metadata/plate_1.gcode","url":"file:///sdcard/benchy.gcode","subtask_name":"benchy.gcode","use_ams":true,"timelapse":false,"bed_leveling":true}}"#
        );
    }

    #[test]
    fn start_print_body_names_the_file() {
        let payload = serde_json::to_string(&Command::start_print("bracket_v2.gcode")).unwrap();
        assert!(payload.contains("bracket_v2.gcode"));
    }

    #[test]
    fn serialize_pause() {
        let payload = serde_json::to_string(&Command::pause()).unwrap();
        assert_eq!(payload, r#"{"print":{"command":"pause","sequence_id":"1"}}"#);
    }

    #[test]
    fn serialize_print_speed() {
        let payload = serde_json::to_string(&Command::print_speed(SpeedProfile::Ludicrous)).unwrap();
        assert_eq!(
            payload,
            r#"{"print":{"command":"print_speed","sequence_id":"1","param":"ludicrous"}}"#
        );
    }

    #[test]
    fn serialize_push_all() {
        let payload = serde_json::to_string(&Command::push_all()).unwrap();
        assert_eq!(payload, r#"{"pushing":{"command":"pushall","sequence_id":"1"}}"#);
    }

    #[test]
    fn deserialize_stop() {
        let payload = r#"{"print": {"sequence_id": "1", "command": "stop"}}"#;
        let command: Command = serde_json::from_str(payload).unwrap();
        assert_eq!(command, Command::stop());
    }
}
