use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneLayout {
    #[default]
    Four,
    Six,
}

impl LaneLayout {
    pub fn lane_count(self) -> usize {
        self.keys().len()
    }

    pub fn keys(self) -> &'static [char] {
        match self {
            LaneLayout::Four => &['d', 'f', 'j', 'k'],
            LaneLayout::Six => &['s', 'd', 'f', 'j', 'k', 'l'],
        }
    }

    pub fn lane_for(self, key: char) -> Option<usize> {
        let key = key.to_ascii_lowercase();
        self.keys().iter().position(|&k| k == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
}

/// What a raw key event means to the game after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneInput {
    Down(usize),
    Up(usize),
    Pause,
}

/// Maps keys to lanes and drops auto-repeat key-downs while a lane is held.
#[derive(Debug, Clone)]
pub struct InputGate {
    layout: LaneLayout,
    held: Vec<bool>,
}

impl InputGate {
    pub fn new(layout: LaneLayout) -> Self {
        Self {
            layout,
            held: vec![false; layout.lane_count()],
        }
    }

    pub fn layout(&self) -> LaneLayout {
        self.layout
    }

    pub fn is_held(&self, lane: usize) -> bool {
        self.held.get(lane).copied().unwrap_or(false)
    }

    pub fn key_down(&mut self, key: Key) -> Option<LaneInput> {
        match key {
            Key::Escape => Some(LaneInput::Pause),
            Key::Char(c) => {
                let lane = self.layout.lane_for(c)?;
                if self.held[lane] {
                    return None;
                }
                self.held[lane] = true;
                Some(LaneInput::Down(lane))
            }
        }
    }

    pub fn key_up(&mut self, key: Key) -> Option<LaneInput> {
        let Key::Char(c) = key else {
            return None;
        };
        let lane = self.layout.lane_for(c)?;
        if !self.held[lane] {
            return None;
        }
        self.held[lane] = false;
        Some(LaneInput::Up(lane))
    }

    pub fn reset(&mut self) {
        self.held.iter_mut().for_each(|held| *held = false);
    }
}
