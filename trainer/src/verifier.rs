//! Move classification against engine evaluations.
//!
//! A played move is checked with two searches: the position before the move
//! (shallower, multi-line) gives the accepted first moves and the reference
//! score, the position after it (full depth, one line) gives the resulting
//! score. Engine trouble yields [`Verdict::Unverifiable`], never a penalty.

use crate::error::TrainerError;
use chess::{convert_cozy_castling_to_uci, format_uci_move, MATE_CP};
use cozy_chess::{Board, GameStatus, Move};
use engine::{EngineGateway, EvaluationLine};

/// Largest centipawn loss against the engine's main line still accepted.
pub const SWING_TOLERANCE: i32 = 30;
/// The pre-move search never goes shallower than this.
pub const MIN_PRE_MOVE_DEPTH: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// `top_tier` when the move heads one of the engine's lines.
    Correct { top_tier: bool, swing: i32 },
    Incorrect { swing: i32 },
    Unverifiable { reason: TrainerError },
}

impl Verdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, Self::Correct { .. })
    }

    pub fn swing(&self) -> Option<i32> {
        match self {
            Self::Correct { swing, .. } | Self::Incorrect { swing } => Some(*swing),
            Self::Unverifiable { .. } => None,
        }
    }
}

/// Depth for the pre-move search at a configured depth.
pub fn pre_move_depth(depth: u8) -> u8 {
    depth.saturating_sub(2).max(MIN_PRE_MOVE_DEPTH)
}

/// Decide a verdict from the pre-move lines and the post-move score.
///
/// `played` is in UCI encoding. `post_cp` is from the mover's point of view,
/// `None` when the post-move evaluation was not available.
pub fn classify(played: Move, pre_lines: &[EvaluationLine], post_cp: Option<i32>) -> Verdict {
    let Some(top) = pre_lines.first() else {
        return Verdict::Unverifiable {
            reason: TrainerError::Internal("engine returned no lines".to_string()),
        };
    };
    let top_tier = pre_lines.iter().any(|l| l.first_move() == Some(played));

    match post_cp {
        Some(post_cp) => {
            let swing = post_cp - top.score.to_cp();
            if top_tier || swing > -SWING_TOLERANCE {
                Verdict::Correct { top_tier, swing }
            } else {
                Verdict::Incorrect { swing }
            }
        }
        None if top_tier => Verdict::Correct { top_tier, swing: 0 },
        None => Verdict::Unverifiable {
            reason: TrainerError::EngineNotReady,
        },
    }
}

#[derive(Debug, Clone)]
pub struct MoveVerifier {
    gateway: EngineGateway,
}

impl MoveVerifier {
    pub fn new(gateway: EngineGateway) -> Self {
        Self { gateway }
    }

    /// Classify `mv` (board encoding) played from `before`.
    pub async fn verify(&self, before: &Board, mv: Move, depth: u8, lines: u8) -> Verdict {
        if !before.is_legal(mv) {
            return Verdict::Unverifiable {
                reason: TrainerError::InvalidMove(format_uci_move(mv)),
            };
        }
        let played = convert_cozy_castling_to_uci(before, mv);
        let mut after = before.clone();
        after.play_unchecked(mv);

        let pre_lines = match self
            .gateway
            .request_eval(&before.to_string(), pre_move_depth(depth), lines)
            .await
        {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!("Pre-move evaluation failed: {}", e);
                return Verdict::Unverifiable { reason: e.into() };
            }
        };
        if pre_lines.is_empty() {
            return classify(played, &pre_lines, None);
        }

        let post_cp = match after.status() {
            // The side to move after our move is mated.
            GameStatus::Won => Some(MATE_CP),
            GameStatus::Drawn => Some(0),
            GameStatus::Ongoing => {
                let post = self.gateway.request_eval(&after.to_string(), depth, 1).await;
                match post {
                    Ok(post) => post.first().map(|l| -l.score.to_cp()),
                    Err(e) => {
                        tracing::warn!("Post-move evaluation failed: {}", e);
                        None
                    }
                }
            }
        };

        let verdict = classify(played, &pre_lines, post_cp);
        tracing::debug!(
            played = %format_uci_move(played),
            best = ?pre_lines.first().and_then(EvaluationLine::first_move).map(format_uci_move),
            ?verdict,
            "Move verified"
        );
        verdict
    }
}
