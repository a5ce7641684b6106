//! Per-tick input snapshot
//!
//! The host feeds key events through [`GameInput::handle_key`]; the update
//! reads the resulting [`GameControl`] states. Toggles are edge flags and are
//! cleared by [`GameInput::end_tick`] once a tick has consumed them.

/// State of one logical control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameControl {
    held: bool,
    toggled: bool,
}

impl GameControl {
    /// Control is currently down
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Control changed state since the last tick
    pub fn was_toggled(&self) -> bool {
        self.toggled
    }

    /// Control went down during the last tick
    pub fn was_pressed(&self) -> bool {
        self.held && self.toggled
    }

    pub fn press(&mut self) {
        if !self.held {
            self.held = true;
            self.toggled = true;
        }
    }

    pub fn release(&mut self) {
        if self.held {
            self.held = false;
            self.toggled = true;
        }
    }

    fn end_tick(&mut self) {
        self.toggled = false;
    }
}

/// Logical controls the update reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Action,
}

impl Control {
    pub const ALL: [Control; 5] = [
        Control::MoveLeft,
        Control::MoveRight,
        Control::MoveUp,
        Control::MoveDown,
        Control::Action,
    ];
}

/// Physical keys the host may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    A,
    D,
    W,
    S,
    Space,
    Escape,
}

/// What a key does when pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Control(Control),
    Quit,
}

/// Key to control mapping
#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings: Vec<(Key, Binding)>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            bindings: vec![
                (Key::A, Binding::Control(Control::MoveLeft)),
                (Key::D, Binding::Control(Control::MoveRight)),
                (Key::W, Binding::Control(Control::MoveUp)),
                (Key::S, Binding::Control(Control::MoveDown)),
                (Key::Space, Binding::Control(Control::Action)),
                (Key::Escape, Binding::Quit),
            ],
        }
    }
}

impl KeyBindings {
    pub fn lookup(&self, key: Key) -> Option<Binding> {
        self.bindings
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, binding)| *binding)
    }

    /// Rebind a key, replacing any existing binding for it
    pub fn bind(&mut self, key: Key, binding: Binding) {
        match self.bindings.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = binding,
            None => self.bindings.push((key, binding)),
        }
    }
}

/// Input collected for the next update
#[derive(Debug, Clone, Default)]
pub struct GameInput {
    pub move_left: GameControl,
    pub move_right: GameControl,
    pub move_up: GameControl,
    pub move_down: GameControl,
    pub action: GameControl,
    /// Text line submitted to the console this tick
    pub text: String,
    /// Host asked the game to exit
    pub quit: bool,
}

impl GameInput {
    pub fn control(&self, control: Control) -> &GameControl {
        match control {
            Control::MoveLeft => &self.move_left,
            Control::MoveRight => &self.move_right,
            Control::MoveUp => &self.move_up,
            Control::MoveDown => &self.move_down,
            Control::Action => &self.action,
        }
    }

    pub fn control_mut(&mut self, control: Control) -> &mut GameControl {
        match control {
            Control::MoveLeft => &mut self.move_left,
            Control::MoveRight => &mut self.move_right,
            Control::MoveUp => &mut self.move_up,
            Control::MoveDown => &mut self.move_down,
            Control::Action => &mut self.action,
        }
    }

    /// Apply a key event. Unbound keys are ignored.
    pub fn handle_key(&mut self, bindings: &KeyBindings, key: Key, pressed: bool) {
        match bindings.lookup(key) {
            Some(Binding::Control(control)) => {
                let state = self.control_mut(control);
                if pressed {
                    state.press();
                } else {
                    state.release();
                }
            }
            Some(Binding::Quit) => {
                if pressed {
                    self.quit = !self.quit;
                }
            }
            None => {}
        }
    }

    /// Clear one-shot inputs after a tick has processed them
    pub fn end_tick(&mut self) {
        for control in Control::ALL {
            self.control_mut(control).end_tick();
        }
        self.text.clear();
    }
}
