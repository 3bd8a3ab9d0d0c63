#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use gatelogic::{
    config::{default_settings_path, Settings},
    host::{B_FULL, GRID_HEIGHT, GRID_WIDTH},
    load_settings, AudioOutput, Controller, DesktopHost, Event, FilePresetStore, MidiGateOutput,
    PulseKind, Sequencer,
};
#[cfg(feature = "gui")]
use std::time::{Duration, Instant};

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let settings = load_settings(&default_settings_path());
    log::info!("gatelogic starting up");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 560.0])
            .with_title("gatelogic - Trigger Generator"),
        ..Default::default()
    };

    eframe::run_native(
        "gatelogic",
        options,
        Box::new(move |_cc| Ok(Box::new(GateApp::new(settings)))),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

#[cfg(feature = "gui")]
struct GateApp {
    controller: Controller,
    host: DesktopHost,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    knob: u16,
}

#[cfg(feature = "gui")]
impl GateApp {
    fn new(settings: Settings) -> Self {
        let available_midi_ports = MidiGateOutput::available_ports();

        let mut midi = MidiGateOutput::new(&settings.midi);
        let mut selected_port = None;
        if let Some(pattern) = settings.midi.port_match.as_deref() {
            match midi.connect_matching(pattern) {
                Ok(()) => {
                    selected_port = available_midi_ports
                        .iter()
                        .position(|p| p.to_lowercase().contains(&pattern.to_lowercase()));
                }
                Err(e) => log::warn!("MIDI: {}", e),
            }
        }

        let store = FilePresetStore::new(settings.presets_dir());
        let mut host = DesktopHost::new(store, midi, AudioOutput::default());
        let mut controller = Controller::new(&settings);
        controller.init(&mut host);

        Self {
            controller,
            host,
            available_midi_ports,
            selected_port,
            knob: 0,
        }
    }

    fn send(&mut self, event: Event) {
        self.controller.process_event(event, &mut self.host);
    }

    fn run_due_timers(&mut self) {
        let now = Instant::now();
        while let Some(id) = self.host.pop_due(now) {
            self.send(Event::TimerFired(id));
        }
    }

    fn status_line(&self) -> String {
        let seq: &Sequencer = self.controller.sequencer();
        let session = self.controller.session();
        format!(
            "{:?} page | {:?} mode | {:?} input | {} | {} ticks/min",
            session.page,
            seq.mode(),
            seq.input_mode(),
            session.selected_preset,
            self.controller.playback().speed(),
        )
    }
}

#[cfg(feature = "gui")]
fn led_color(level: u8) -> egui::Color32 {
    let v = 40 + (level.min(B_FULL) as u32 * 200 / B_FULL as u32) as u8;
    if level == 0 {
        egui::Color32::from_rgb(30, 30, 30)
    } else {
        egui::Color32::from_rgb(v, v, v / 2)
    }
}

#[cfg(feature = "gui")]
impl eframe::App for GateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.run_due_timers();
        let wait = self
            .host
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_millis(50));
        ctx.request_repaint_after(wait);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("gatelogic");
            ui.label(self.status_line());
            ui.add_space(10.0);

            // MIDI Port Selection
            let mut selected_port_changed = None;
            ui.horizontal(|ui| {
                ui.label("MIDI Output:");
                if self.available_midi_ports.is_empty() {
                    ui.label("No MIDI ports available");
                } else {
                    egui::ComboBox::from_label("")
                        .selected_text(
                            self.selected_port
                                .and_then(|i| self.available_midi_ports.get(i))
                                .map(String::as_str)
                                .unwrap_or("Select port..."),
                        )
                        .show_ui(ui, |ui| {
                            for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                                if ui
                                    .selectable_label(self.selected_port == Some(i), port_name)
                                    .clicked()
                                {
                                    selected_port_changed = Some(i);
                                }
                            }
                        });
                }
            });

            if let Some(port_idx) = selected_port_changed {
                match self.host.midi_mut().connect(port_idx) {
                    Ok(()) => self.selected_port = Some(port_idx),
                    Err(e) => log::warn!("MIDI: {}", e),
                }
            }

            ui.add_space(10.0);

            // Front panel
            let mut events = Vec::new();
            ui.horizontal(|ui| {
                if ui.button("Page").clicked() {
                    events.push(Event::FrontButton);
                }
                if ui.button("Save").clicked() {
                    events.push(Event::FrontButtonHeld);
                }

                ui.add_space(20.0);

                if ui.button("Clock pulse").clicked() {
                    events.push(Event::ClockPulse(PulseKind::Tick));
                }
                if ui.button("Rotate pulse").clicked() {
                    events.push(Event::ClockPulse(PulseKind::Rotate));
                }

                ui.add_space(20.0);

                ui.label("Speed:");
                let mut knob = self.knob;
                if ui
                    .add(egui::Slider::new(&mut knob, 0..=u16::MAX).show_value(false))
                    .changed()
                {
                    self.knob = knob;
                    self.host.set_knob(knob);
                }
            });

            ui.add_space(20.0);

            // Grid (16 x 8); right click holds a key
            let leds = *self.host.leds();
            let gates = *self.host.gates();
            for y in 0..GRID_HEIGHT {
                ui.horizontal(|ui| {
                    let gate = if gates[y as usize] { "●" } else { "○" };
                    ui.label(gate);
                    for x in 0..GRID_WIDTH {
                        let level = leds[y as usize][x as usize];
                        let button = egui::Button::new("")
                            .min_size(egui::vec2(40.0, 40.0))
                            .fill(led_color(level));
                        let response = ui.add(button);
                        if response.clicked() {
                            events.push(Event::GridKey { x, y, pressed: true });
                            events.push(Event::GridKey { x, y, pressed: false });
                        }
                        if response.secondary_clicked() {
                            events.push(Event::GridKeyHeld { x, y });
                        }
                    }
                });
            }

            for event in events {
                self.send(event);
            }

            // Info
            ui.separator();
            ui.label("Click keys to press them, right click to hold");
            if !self.host.midi().is_connected() {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "⚠ No MIDI output connected - audio monitor only",
                );
            }
        });
    }
}
