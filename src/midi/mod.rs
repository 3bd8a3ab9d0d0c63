/// MIDI gate output using midir - each row's gate becomes a note
use crate::config::MidiSettings;
use crate::error::MidiError;
use crate::sequencer::row::RowIndex;
use midir::{MidiOutput, MidiOutputConnection};

const CLIENT_NAME: &str = "gatelogic MIDI Output";

pub struct MidiGateOutput {
    connection: Option<MidiOutputConnection>,
    channel: u8,
    base_note: u8,
}

impl MidiGateOutput {
    pub fn new(settings: &MidiSettings) -> Self {
        Self {
            connection: None,
            channel: settings.channel.min(15),
            base_note: settings.base_note.min(127 - 7),
        }
    }

    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<(), MidiError> {
        let midi_out =
            MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::InitError(e.to_string()))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or(MidiError::InvalidPort(port_index))?;

        let connection = midi_out
            .connect(port, "gatelogic")
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        self.connection = Some(connection);
        log::info!("MIDI: gate output connected to port {}", port_index);
        Ok(())
    }

    /// Connect to the first port whose name contains `pattern` (case-insensitive)
    pub fn connect_matching(&mut self, pattern: &str) -> Result<(), MidiError> {
        let needle = pattern.to_lowercase();
        let index = Self::available_ports()
            .iter()
            .position(|name| name.to_lowercase().contains(&needle))
            .ok_or_else(|| MidiError::PortNotFound(pattern.to_string()))?;
        self.connect(index)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn note_for(&self, row: RowIndex) -> u8 {
        self.base_note + row.get() as u8
    }

    /// Note on when the gate opens, note off when it closes. A no-op while disconnected.
    pub fn send_gate(&mut self, row: RowIndex, high: bool) -> Result<(), MidiError> {
        let message = gate_message(self.channel, self.note_for(row), high);
        if let Some(ref mut conn) = self.connection {
            conn.send(&message)
                .map_err(|e| MidiError::SendError(e.to_string()))?;
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.connection = None;
    }
}

impl Default for MidiGateOutput {
    fn default() -> Self {
        Self::new(&MidiSettings::default())
    }
}

fn gate_message(channel: u8, note: u8, high: bool) -> [u8; 3] {
    if high {
        [0x90 | channel, note, 100]
    } else {
        [0x80 | channel, note, 0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_messages() {
        assert_eq!(gate_message(0, 36, true), [0x90, 36, 100]);
        assert_eq!(gate_message(9, 40, false), [0x89, 40, 0]);
    }

    #[test]
    fn test_rows_map_to_consecutive_notes() {
        let output = MidiGateOutput::new(&MidiSettings {
            port_match: None,
            channel: 3,
            base_note: 60,
        });
        assert_eq!(output.note_for(RowIndex::new(0).unwrap()), 60);
        assert_eq!(output.note_for(RowIndex::new(7).unwrap()), 67);
    }

    #[test]
    fn test_disconnected_send_is_noop() {
        let mut output = MidiGateOutput::default();
        assert!(!output.is_connected());
        assert!(output.send_gate(RowIndex::new(2).unwrap(), true).is_ok());
    }
}
