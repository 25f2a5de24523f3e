//! Vehicle State Machine
//!
//! Defines the vehicle model and the rules each control command applies to it.
//! Locking is the owner's concern; every method here is a single atomic step
//! when called under one exclusive guard.

use std::fmt;

use thiserror::Error;

use crate::defaults::LOW_BATTERY_PERCENT;

/// Maximum speed in km/h
pub const MAX_SPEED: f64 = 100.0;

/// Speed change per speed-up / speed-down
pub const SPEED_STEP: f64 = 10.0;

/// Battery drained by each successful speed-up
pub const SPEED_UP_BATTERY_COST: u8 = 2;

/// Temperature rise per successful speed-up
pub const SPEED_UP_HEAT: f64 = 1.0;

/// Temperature drop per successful speed-down
pub const SPEED_DOWN_COOLING: f64 = 0.5;

/// Compass heading, cycling NORTH -> EAST -> SOUTH -> WEST
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    const CYCLE: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

    fn index(self) -> usize {
        match self {
            Heading::North => 0,
            Heading::East => 1,
            Heading::South => 2,
            Heading::West => 3,
        }
    }

    /// Heading after a right turn
    pub fn right(self) -> Self {
        Self::CYCLE[(self.index() + 1) % 4]
    }

    /// Heading after a left turn
    pub fn left(self) -> Self {
        Self::CYCLE[(self.index() + 3) % 4]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Heading::North => "NORTH",
            Heading::East => "EAST",
            Heading::South => "SOUTH",
            Heading::West => "WEST",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::CYCLE.into_iter().find(|h| h.as_str() == name)
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control commands that mutate the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleCommand {
    SpeedUp,
    SpeedDown,
    TurnLeft,
    TurnRight,
}

/// Reasons a command is refused; `Display` is the wire reason code
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("LOW_BATTERY")]
    LowBattery,

    #[error("SPEED_LIMIT")]
    SpeedLimit,
}

/// Speed, battery, temperature and heading of the simulated vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    /// km/h, always within [0, MAX_SPEED]
    pub speed: f64,
    /// percent
    pub battery: u8,
    /// degrees Celsius
    pub temperature: f64,
    pub heading: Heading,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::new()
    }
}

impl VehicleState {
    /// Parked, fully charged, at ambient temperature, facing north
    pub fn new() -> Self {
        Self {
            speed: 0.0,
            battery: 100,
            temperature: 25.0,
            heading: Heading::North,
        }
    }

    /// Apply a command; on error the state is untouched
    pub fn apply(&mut self, command: VehicleCommand) -> Result<(), CommandError> {
        match command {
            VehicleCommand::SpeedUp => self.speed_up(),
            VehicleCommand::SpeedDown => self.speed_down(),
            VehicleCommand::TurnLeft => {
                self.turn_left();
                Ok(())
            }
            VehicleCommand::TurnRight => {
                self.turn_right();
                Ok(())
            }
        }
    }

    pub fn speed_up(&mut self) -> Result<(), CommandError> {
        if self.battery < LOW_BATTERY_PERCENT {
            return Err(CommandError::LowBattery);
        }
        if self.speed >= MAX_SPEED {
            return Err(CommandError::SpeedLimit);
        }
        self.speed = (self.speed + SPEED_STEP).min(MAX_SPEED);
        self.battery = self.battery.saturating_sub(SPEED_UP_BATTERY_COST);
        self.temperature += SPEED_UP_HEAT;
        Ok(())
    }

    pub fn speed_down(&mut self) -> Result<(), CommandError> {
        if self.speed <= 0.0 {
            return Err(CommandError::SpeedLimit);
        }
        self.speed = (self.speed - SPEED_STEP).max(0.0);
        self.temperature -= SPEED_DOWN_COOLING;
        Ok(())
    }

    pub fn turn_left(&mut self) {
        self.heading = self.heading.left();
    }

    pub fn turn_right(&mut self) {
        self.heading = self.heading.right();
    }

    /// `SPEED:<v>|BATTERY:<n>|TEMP:<v>|DIR:<name>` with one decimal place
    pub fn telemetry_payload(&self) -> String {
        format!(
            "SPEED:{:.1}|BATTERY:{}|TEMP:{:.1}|DIR:{}",
            self.speed, self.battery, self.temperature, self.heading
        )
    }
}

/// Telemetry as read back from a `TELE` payload
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryReport {
    pub speed: f64,
    pub battery: u8,
    pub temperature: f64,
    pub heading: Heading,
}

impl TelemetryReport {
    /// Parse a `TELE` payload, `None` if any field is missing or malformed
    pub fn parse(payload: &str) -> Option<Self> {
        let mut speed = None;
        let mut battery = None;
        let mut temperature = None;
        let mut heading = None;

        for field in payload.trim().split('|') {
            let (key, value) = field.split_once(':')?;
            match key {
                "SPEED" => speed = value.parse().ok(),
                "BATTERY" => battery = value.parse().ok(),
                "TEMP" => temperature = value.parse().ok(),
                "DIR" => heading = Heading::parse(value),
                _ => {}
            }
        }

        Some(Self {
            speed: speed?,
            battery: battery?,
            temperature: temperature?,
            heading: heading?,
        })
    }
}

impl fmt::Display for TelemetryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "speed={:.1} km/h battery={}% temp={:.1}C heading={}",
            self.speed, self.battery, self.temperature, self.heading
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = VehicleState::new();
        assert_eq!(state.speed, 0.0);
        assert_eq!(state.battery, 100);
        assert_eq!(state.temperature, 25.0);
        assert_eq!(state.heading, Heading::North);
    }

    #[test]
    fn test_speed_up_effects() {
        let mut state = VehicleState::new();
        assert_eq!(state.apply(VehicleCommand::SpeedUp), Ok(()));
        assert_eq!(state.speed, 10.0);
        assert_eq!(state.battery, 98);
        assert_eq!(state.temperature, 26.0);
    }

    #[test]
    fn test_speed_limit() {
        let mut state = VehicleState::new();
        for _ in 0..10 {
            state.speed_up().expect("below limit");
        }
        assert_eq!(state.speed, MAX_SPEED);
        let before = state.clone();
        assert_eq!(state.speed_up(), Err(CommandError::SpeedLimit));
        assert_eq!(state, before);
    }

    #[test]
    fn test_speed_up_clamps_partial_step() {
        let mut state = VehicleState::new();
        state.speed = 95.0;
        state.speed_up().expect("below limit");
        assert_eq!(state.speed, MAX_SPEED);
    }

    #[test]
    fn test_low_battery_checked_first() {
        let mut state = VehicleState::new();
        state.battery = 19;
        state.speed = MAX_SPEED;
        assert_eq!(state.speed_up(), Err(CommandError::LowBattery));
        assert_eq!(state.battery, 19);

        state.battery = 20;
        state.speed = 0.0;
        assert_eq!(state.speed_up(), Ok(()));
        assert_eq!(state.battery, 18);
    }

    #[test]
    fn test_speed_down() {
        let mut state = VehicleState::new();
        assert_eq!(state.speed_down(), Err(CommandError::SpeedLimit));
        assert_eq!(state.temperature, 25.0);

        state.speed = 5.0;
        state.speed_down().expect("moving");
        assert_eq!(state.speed, 0.0);
        assert_eq!(state.temperature, 24.5);
    }

    #[test]
    fn test_speed_stays_in_range() {
        let mut state = VehicleState::new();
        let script = [
            VehicleCommand::SpeedDown,
            VehicleCommand::SpeedUp,
            VehicleCommand::SpeedUp,
            VehicleCommand::SpeedDown,
            VehicleCommand::SpeedDown,
            VehicleCommand::SpeedDown,
        ];
        for _ in 0..30 {
            for cmd in script {
                let _ = state.apply(cmd);
                assert!((0.0..=MAX_SPEED).contains(&state.speed));
                assert!(state.battery <= 100);
            }
        }
    }

    #[test]
    fn test_turns_cycle() {
        let mut state = VehicleState::new();
        let mut seen = Vec::new();
        for _ in 0..4 {
            state.turn_right();
            seen.push(state.heading);
        }
        assert_eq!(
            seen,
            vec![Heading::East, Heading::South, Heading::West, Heading::North]
        );

        for start in Heading::CYCLE {
            assert_eq!(start.left().right(), start);
            assert_eq!(start.right().left(), start);
        }
        assert_eq!(Heading::North.left(), Heading::West);
    }

    #[test]
    fn test_telemetry_payload() {
        let mut state = VehicleState::new();
        state.speed_up().expect("charged");
        assert_eq!(
            state.telemetry_payload(),
            "SPEED:10.0|BATTERY:98|TEMP:26.0|DIR:NORTH"
        );
    }

    #[test]
    fn test_telemetry_report_parse() {
        let report = TelemetryReport::parse("SPEED:10.0|BATTERY:98|TEMP:26.0|DIR:EAST")
            .expect("well-formed payload");
        assert_eq!(report.speed, 10.0);
        assert_eq!(report.battery, 98);
        assert_eq!(report.heading, Heading::East);

        assert!(TelemetryReport::parse("SPEED:10.0|BATTERY:98").is_none());
        assert!(TelemetryReport::parse("SPEED:x|BATTERY:98|TEMP:1.0|DIR:NORTH").is_none());
    }
}
