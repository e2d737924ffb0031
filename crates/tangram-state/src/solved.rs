//! The puzzle-solved predicate. A pure function of
//! `(GameState, GameConfig)`: depends only on tile positions, rotations
//! and shape_kinds, never on peer identity or clock.

use std::collections::HashMap;

use tangram_protocol::ShapeKind;

use crate::model::{GameConfig, GameState, Point, TargetTan};

/// Recomputes `matched` on every tile and `solved` on the state, in place.
pub fn check_solution(config: &GameConfig, state: &mut GameState) {
    let mut by_kind: HashMap<ShapeKind, Vec<usize>> = HashMap::new();

    for (index, tan) in state.tiles.iter_mut().enumerate() {
        tan.matched = false;
        by_kind.entry(tan.shape_kind).or_default().push(index);
    }

    let mut matched_targets = 0;
    for target in &config.targets {
        let candidates = by_kind.get(&target.shape_kind).cloned().unwrap_or_default();
        if match_one(state, config, &candidates, target) {
            matched_targets += 1;
        }
    }

    state.solved = matched_targets == config.targets.len();
}

/// Scans `candidates` for the first tile matching `target`; marks it
/// matched and returns whether a match was found.
fn match_one(
    state: &mut GameState,
    config: &GameConfig,
    candidates: &[usize],
    target: &TargetTan,
) -> bool {
    for &index in candidates {
        if is_match(config, &state.tiles[index], target) {
            state.tiles[index].matched = true;
            return true;
        }
    }
    false
}

fn is_match(config: &GameConfig, tan: &crate::model::Tan, target: &TargetTan) -> bool {
    let period = target.shape_kind.rotation_period();
    let rotation_matches = tan.rotation % period == target.rotation % period;
    let target_location = target.location.add(config.offset);
    let within_margin = tan.location.chebyshev_distance(target_location) <= config.margin;
    rotation_matches && within_margin
}
