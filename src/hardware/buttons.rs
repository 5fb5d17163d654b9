use anyhow::Result;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::gpio::SysfsInput;
use crate::playback::command::{CommandSlot, TransportCommand};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Next,
    Previous,
    PlayPause,
}

impl Button {
    pub fn command(self) -> TransportCommand {
        match self {
            Button::Next => TransportCommand::Next,
            Button::Previous => TransportCommand::Previous,
            Button::PlayPause => TransportCommand::TogglePause,
        }
    }
}

/// Turns button presses into debounced transport commands.
pub struct TransportController {
    slot: CommandSlot,
    debounce: Duration,
    last_press: HashMap<Button, Instant>,
    shutdown: Option<Arc<AtomicBool>>,
}

impl TransportController {
    pub fn new(slot: CommandSlot, debounce: Duration) -> Self {
        Self {
            slot,
            debounce,
            last_press: HashMap::new(),
            shutdown: None,
        }
    }

    /// Flag raised when the keyboard asks to quit, and watched by the GPIO poller.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Returns whether the press produced a command.
    pub fn press(&mut self, button: Button, at: Instant) -> bool {
        if let Some(&last) = self.last_press.get(&button) {
            if at.saturating_duration_since(last) < self.debounce {
                log::debug!("Ignoring bounced {:?}", button);
                return false;
            }
        }
        self.last_press.insert(button, at);
        log::info!("Button {:?}", button);
        self.slot.send(button.command());
        true
    }

    fn request_shutdown(&self) {
        if let Some(flag) = &self.shutdown {
            flag.store(true, Ordering::SeqCst);
        }
    }

    fn shutting_down(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Read commands from stdin lines: `n` next, `p` previous, empty line
    /// or `t` toggles pause, `q` quits.
    pub fn spawn_keyboard(mut self) -> JoinHandle<()> {
        log::info!("Keys: [n]ext, [p]revious, [t]oggle pause (or Enter), [q]uit");
        thread::spawn(move || {
            let stdin = std::io::stdin();
            self.read_keys(stdin.lock());
        })
    }

    /// Only `q` requests shutdown. End of input just ends the reader, so a
    /// show started without a terminal keeps playing.
    fn read_keys(&mut self, input: impl BufRead) {
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::debug!("Keyboard input closed: {}", e);
                    return;
                }
            };
            match parse_key(&line) {
                Some(KeyInput::Button(button)) => {
                    self.press(button, Instant::now());
                }
                Some(KeyInput::Quit) => {
                    self.request_shutdown();
                    return;
                }
                None => log::warn!("Unknown key {:?}", line.trim()),
            }
        }
        log::debug!("Keyboard input reached end of file");
    }

    /// Poll active-low buttons (pulled up, pressed = 0) and fire on each
    /// press edge.
    pub fn spawn_gpio(
        mut self,
        root: &Path,
        pins: [(Button, u32); 3],
        poll: Duration,
    ) -> Result<JoinHandle<()>> {
        let inputs = pins
            .iter()
            .map(|&(button, pin)| -> Result<(Button, SysfsInput)> {
                Ok((button, SysfsInput::open(root, pin)?))
            })
            .collect::<Result<Vec<_>>>()?;
        log::info!("Polling {} GPIO button(s) every {:?}", inputs.len(), poll);

        Ok(thread::spawn(move || {
            let mut was_pressed = vec![false; inputs.len()];
            while !self.shutting_down() {
                for (i, (button, input)) in inputs.iter().enumerate() {
                    let pressed = match input.is_high() {
                        Ok(high) => !high,
                        Err(e) => {
                            log::warn!("{:#}", e);
                            continue;
                        }
                    };
                    if pressed && !was_pressed[i] {
                        self.press(*button, Instant::now());
                    }
                    was_pressed[i] = pressed;
                }
                thread::sleep(poll);
            }
        }))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum KeyInput {
    Button(Button),
    Quit,
}

fn parse_key(line: &str) -> Option<KeyInput> {
    match line.trim().to_ascii_lowercase().as_str() {
        "n" | "next" => Some(KeyInput::Button(Button::Next)),
        "p" | "prev" | "previous" => Some(KeyInput::Button(Button::Previous)),
        "" | "t" | "pause" | "play" => Some(KeyInput::Button(Button::PlayPause)),
        "q" | "quit" => Some(KeyInput::Quit),
        _ => None,
    }
}
