use clap::ValueEnum;
use imaging::FileId;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use warmer::Direction;

/// Navigation pattern the simulated viewer follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AccessPattern {
    /// Scroll forward through every slice of every volume.
    Sweep,
    /// Scroll to the end of a volume, back to the start, then move on.
    PingPong,
    /// Jump to random slices of random volumes.
    Random,
}

/// One simulated viewer interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    pub file: FileId,
    pub slice: u32,
    pub total: u32,
    pub direction: Direction,
}

/// Stable id for the `index`-th synthetic volume.
pub fn volume_id(index: u32) -> FileId {
    FileId::new(format!("vol-{index:03}"))
}

/// Deterministic stream of navigation events.
///
/// Sweep and ping-pong know their direction of travel; the random pattern
/// infers it per volume from the previous access, the way a viewer
/// front-end would report it.
pub struct Workload {
    pattern: AccessPattern,
    volumes: u32,
    slices: u32,
    steps: u32,
    emitted: u32,
    rng: ChaCha8Rng,
    volume: u32,
    position: u32,
    descending: bool,
    last_seen: HashMap<u32, u32>,
}

impl Workload {
    pub fn new(pattern: AccessPattern, volumes: u32, slices: u32, steps: u32, seed: u64) -> Self {
        Self {
            pattern,
            volumes: volumes.max(1),
            slices: slices.max(1),
            steps,
            emitted: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            volume: 0,
            position: 0,
            descending: false,
            last_seen: HashMap::new(),
        }
    }

    fn event(&self, volume: u32, slice: u32, direction: Direction) -> AccessEvent {
        AccessEvent {
            file: volume_id(volume),
            slice,
            total: self.slices,
            direction,
        }
    }

    fn sweep(&mut self) -> AccessEvent {
        let event = self.event(self.volume, self.position, Direction::Forward);
        self.position += 1;
        if self.position == self.slices {
            self.position = 0;
            self.volume = (self.volume + 1) % self.volumes;
        }
        event
    }

    fn ping_pong(&mut self) -> AccessEvent {
        let direction = if self.descending {
            Direction::Backward
        } else {
            Direction::Forward
        };
        let event = self.event(self.volume, self.position, direction);

        if self.descending {
            if self.position == 0 {
                self.descending = false;
                self.volume = (self.volume + 1) % self.volumes;
            } else {
                self.position -= 1;
            }
        } else if self.position + 1 >= self.slices {
            self.descending = true;
            self.position = self.position.saturating_sub(1);
        } else {
            self.position += 1;
        }
        event
    }

    fn random(&mut self) -> AccessEvent {
        let volume = self.rng.gen_range(0..self.volumes);
        let slice = self.rng.gen_range(0..self.slices);
        let direction = match self.last_seen.get(&volume) {
            Some(&last) if slice > last => Direction::Forward,
            Some(&last) if slice < last => Direction::Backward,
            _ => Direction::Both,
        };
        self.last_seen.insert(volume, slice);
        self.event(volume, slice, direction)
    }
}

impl Iterator for Workload {
    type Item = AccessEvent;

    fn next(&mut self) -> Option<AccessEvent> {
        if self.emitted == self.steps {
            return None;
        }
        self.emitted += 1;
        Some(match self.pattern {
            AccessPattern::Sweep => self.sweep(),
            AccessPattern::PingPong => self.ping_pong(),
            AccessPattern::Random => self.random(),
        })
    }
}
