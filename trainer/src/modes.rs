//! Training modes and the per-mode session counters.

use crate::config::{BattleConfig, RushConfig};
use crate::scoring::round_div;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// Puzzles near your rating; results move the rating.
    Rated,
    /// Theme and rating-range filter.
    Custom,
    /// One puzzle per calendar day.
    Daily,
    /// Solve as many as possible before the clock or three strikes end it.
    Rush,
    /// Race a simulated opponent to a target score.
    Battle,
}

impl ModeKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rated => "rated",
            Self::Custom => "custom",
            Self::Daily => "daily",
            Self::Rush => "rush",
            Self::Battle => "battle",
        }
    }

    /// Rush and battle: no hints, no solutions, no manual skipping, no rating.
    pub fn is_competitive(self) -> bool {
        matches!(self, Self::Rush | Self::Battle)
    }
}

impl std::fmt::Display for ModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RushSession {
    pub remaining_secs: u32,
    pub strikes: u8,
    pub max_strikes: u8,
    pub score: u32,
    pub solved: u32,
}

impl RushSession {
    pub fn new(config: &RushConfig) -> Self {
        Self {
            remaining_secs: config.duration_secs,
            strikes: 0,
            max_strikes: config.max_strikes.max(1),
            score: 0,
            solved: 0,
        }
    }

    /// One second off the clock.
    pub fn tick(&mut self) {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
    }

    /// Points for a solve: 10 plus a bonus for a positive swing.
    pub fn record_solve(&mut self, swing: i32) -> u32 {
        let points = 10 + round_div(swing, 10).max(0) as u32;
        self.score += points;
        self.solved += 1;
        points
    }

    pub fn record_strike(&mut self) {
        self.strikes = (self.strikes + 1).min(self.max_strikes);
    }

    pub fn end_reason(&self) -> Option<RushEnd> {
        if self.strikes >= self.max_strikes {
            Some(RushEnd::Strikes)
        } else if self.remaining_secs == 0 {
            Some(RushEnd::TimeUp)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RushEnd {
    TimeUp,
    Strikes,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleSide {
    Player,
    Opponent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BattleSession {
    pub player_score: u32,
    pub opponent_score: u32,
    pub target_score: u32,
}

impl BattleSession {
    pub fn new(config: &BattleConfig) -> Self {
        Self {
            player_score: 0,
            opponent_score: 0,
            target_score: config.target_score.max(1),
        }
    }

    /// Credit one solved puzzle to `side`.
    pub fn score(&mut self, side: BattleSide) {
        if self.winner().is_some() {
            return;
        }
        match side {
            BattleSide::Player => self.player_score += 1,
            BattleSide::Opponent => self.opponent_score += 1,
        }
    }

    pub fn winner(&self) -> Option<BattleSide> {
        if self.player_score >= self.target_score {
            Some(BattleSide::Player)
        } else if self.opponent_score >= self.target_score {
            Some(BattleSide::Opponent)
        } else {
            None
        }
    }
}

/// The one active mode and its counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSession {
    Standard(ModeKind),
    Rush(RushSession),
    Battle(BattleSession),
}

impl ModeSession {
    pub fn start(kind: ModeKind, rush: &RushConfig, battle: &BattleConfig) -> Self {
        match kind {
            ModeKind::Rush => Self::Rush(RushSession::new(rush)),
            ModeKind::Battle => Self::Battle(BattleSession::new(battle)),
            other => Self::Standard(other),
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Standard(kind) => *kind,
            Self::Rush(_) => ModeKind::Rush,
            Self::Battle(_) => ModeKind::Battle,
        }
    }

    /// Final tally once the mode is over or abandoned.
    pub fn summary(&self, stopped: bool) -> ModeSummary {
        match self {
            Self::Standard(kind) => ModeSummary::Standard { kind: *kind },
            Self::Rush(rush) => ModeSummary::Rush {
                score: rush.score,
                solved: rush.solved,
                strikes: rush.strikes,
                reason: match rush.end_reason() {
                    Some(reason) if !stopped => reason,
                    _ => RushEnd::Stopped,
                },
            },
            Self::Battle(battle) => ModeSummary::Battle {
                player_score: battle.player_score,
                opponent_score: battle.opponent_score,
                winner: battle.winner(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeSummary {
    Standard {
        kind: ModeKind,
    },
    Rush {
        score: u32,
        solved: u32,
        strikes: u8,
        reason: RushEnd,
    },
    Battle {
        player_score: u32,
        opponent_score: u32,
        winner: Option<BattleSide>,
    },
}

impl std::fmt::Display for ModeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard { kind } => write!(f, "{} mode ended.", kind),
            Self::Rush {
                score,
                solved,
                reason,
                ..
            } => {
                let why = match reason {
                    RushEnd::TimeUp => "Time's up",
                    RushEnd::Strikes => "Three strikes",
                    RushEnd::Stopped => "Rush stopped",
                };
                write!(f, "{}! {} points from {} puzzles.", why, score, solved)
            }
            Self::Battle {
                player_score,
                opponent_score,
                winner,
            } => match winner {
                Some(BattleSide::Player) => {
                    write!(f, "You win {}-{}!", player_score, opponent_score)
                }
                Some(BattleSide::Opponent) => {
                    write!(f, "Opponent wins {}-{}.", opponent_score, player_score)
                }
                None => write!(f, "Battle ended {}-{}.", player_score, opponent_score),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rush_points() {
        let mut rush = RushSession::new(&RushConfig::default());
        assert_eq!(rush.record_solve(0), 10);
        assert_eq!(rush.record_solve(45), 15);
        assert_eq!(rush.record_solve(-300), 10);
        assert_eq!(rush.score, 35);
        assert_eq!(rush.solved, 3);
    }

    #[test]
    fn test_rush_ends_on_third_strike() {
        let mut rush = RushSession::new(&RushConfig::default());
        for _ in 0..2 {
            rush.record_strike();
            assert_eq!(rush.end_reason(), None);
        }
        rush.record_strike();
        assert_eq!(rush.end_reason(), Some(RushEnd::Strikes));
        rush.record_strike();
        assert_eq!(rush.strikes, 3);
    }

    #[test]
    fn test_rush_ends_exactly_at_zero() {
        let mut rush = RushSession::new(&RushConfig {
            duration_secs: 3,
            ..Default::default()
        });
        let mut previous = rush.remaining_secs;
        for _ in 0..2 {
            rush.tick();
            assert!(rush.remaining_secs < previous);
            previous = rush.remaining_secs;
            assert_eq!(rush.end_reason(), None);
        }
        rush.tick();
        assert_eq!(rush.end_reason(), Some(RushEnd::TimeUp));
    }

    #[test]
    fn test_battle_ends_when_target_first_reached() {
        let mut battle = BattleSession::new(&BattleConfig::default());
        for _ in 0..4 {
            battle.score(BattleSide::Player);
        }
        assert_eq!(battle.winner(), None);
        assert_eq!((battle.player_score, battle.opponent_score), (4, 0));
        battle.score(BattleSide::Player);
        assert_eq!((battle.player_score, battle.opponent_score), (5, 0));
        assert_eq!(battle.winner(), Some(BattleSide::Player));

        // Nothing counts after the battle is decided.
        battle.score(BattleSide::Opponent);
        assert_eq!(battle.opponent_score, 0);
    }

    #[test]
    fn test_summary_for_abandoned_rush() {
        let session = ModeSession::start(
            ModeKind::Rush,
            &RushConfig::default(),
            &BattleConfig::default(),
        );
        assert_eq!(session.kind(), ModeKind::Rush);
        let summary = session.summary(true);
        assert!(matches!(
            summary,
            ModeSummary::Rush {
                reason: RushEnd::Stopped,
                ..
            }
        ));
        assert_eq!(summary.to_string(), "Rush stopped! 0 points from 0 puzzles.");
    }
}
