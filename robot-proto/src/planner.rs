//! Incremental navigation planner: given the robot's reported positions, decide the next
//! action that walks it to the origin while discovering its heading and obstacles along
//! the way.

use crate::core::{Action, Position, Rotation};

/// Pure state machine driving a single robot to `(0, 0)`.
///
/// `rotation` stays `None` until two observed positions disagree without an intervening
/// obstacle — there is no way to read an absolute heading off a single coordinate.
#[derive(Debug, Clone, Default)]
pub struct NavigationPlanner {
    position: Option<Position>,
    rotation: Option<Rotation>,
    previous_action: Option<Action>,
    banned: Vec<Position>,
    obstacles: Vec<Position>,
}

/// A snapshot of planner state for observers (visualisers) to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapState {
    pub position: Option<Position>,
    pub rotation: Option<Rotation>,
    pub obstacles: Vec<Position>,
}

impl NavigationPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_state(&self) -> MapState {
        MapState {
            position: self.position,
            rotation: self.rotation,
            obstacles: self.obstacles.clone(),
        }
    }

    /// Feeds a newly reported position and returns the next action to send.
    pub fn update_position(&mut self, new_position: Position) -> Action {
        let action = self.plan(new_position);
        self.previous_action = Some(action);
        // A turn only advances a heading that is already known; see the module-level note
        // on `plan`'s early-return branch for why this asymmetry exists.
        if let Some(rotation) = self.rotation {
            self.rotation = Some(match action {
                Action::TurnLeft => rotation.turn_left(),
                Action::TurnRight => rotation.turn_right(),
                Action::Move => rotation,
            });
        }
        action
    }

    fn plan(&mut self, new_position: Position) -> Action {
        let previous_position = self.position.replace(new_position);

        let previous_position = match previous_position {
            None => return Action::Move,
            Some(position) => position,
        };

        if self.rotation.is_none() {
            let delta = new_position - previous_position;
            if delta == Position::new(0, 0) {
                // Blocked before a heading could ever be read off a move: we cannot record
                // an obstacle without knowing which way "forward" is, so this one is lost.
                return if self.previous_action == Some(Action::Move) {
                    Action::TurnRight
                } else {
                    Action::Move
                };
            }
            self.rotation = Some(Rotation::toward_origin_from(delta)[0]);
        }
        let rotation = self.rotation.expect("set above when still unknown");

        let next_position = new_position + rotation.to_position();
        let mut available: Vec<Rotation> = Rotation::toward_origin_from(new_position)
            .into_iter()
            .map(Rotation::opposite)
            .collect();

        if previous_position == new_position && self.previous_action == Some(Action::Move) {
            self.banned.push(next_position);
            self.obstacles.push(next_position);
            available.retain(|candidate| *candidate != rotation);
        }

        available.retain(|candidate| !self.banned.contains(&(new_position + candidate.to_position())));

        if available.is_empty() {
            return if self.banned.contains(&next_position) {
                Action::TurnRight
            } else {
                self.banned.push(new_position);
                Action::Move
            };
        }

        if !available.contains(&rotation) {
            return rotation
                .turn_for(&available)
                .expect("rotation was just excluded from `available`");
        }
        Action::Move
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn first_report_always_moves() {
        let mut planner = NavigationPlanner::new();
        assert_eq!(planner.update_position(pos(0, 0)), Action::Move);
    }

    #[test]
    fn straight_line_to_origin() {
        let mut planner = NavigationPlanner::new();
        assert_eq!(planner.update_position(pos(0, -1)), Action::Move);
        assert_eq!(planner.update_position(pos(0, -1)), Action::Move);
        assert_eq!(planner.update_position(pos(0, 0)), Action::Move);
    }

    #[test]
    fn detour_around_an_obstacle() {
        // Moves, then turns around a cell blocked by an obstacle.
        let mut planner = NavigationPlanner::new();
        assert_eq!(planner.update_position(pos(-1, -1)), Action::Move);
        assert_eq!(planner.update_position(pos(-1, -1)), Action::TurnRight);
        assert_eq!(planner.update_position(pos(-1, -1)), Action::Move);
        assert_eq!(planner.update_position(pos(0, -1)), Action::TurnLeft);
        assert_eq!(planner.update_position(pos(0, -1)), Action::Move);
        assert_eq!(planner.update_position(pos(0, 0)), Action::Move);
    }

    #[test]
    fn blocked_before_heading_known_loses_the_obstacle() {
        let mut planner = NavigationPlanner::new();
        planner.update_position(pos(0, 0));
        // Repeated position after a MOVE with heading still unknown: TURN_RIGHT, but the
        // obstacle at this cell is never recorded because heading wasn't known yet.
        assert_eq!(planner.update_position(pos(0, 0)), Action::TurnRight);
        assert_eq!(planner.map_state().obstacles, Vec::new());
        assert_eq!(planner.map_state().rotation, None);
    }

    #[test]
    fn obstacle_recorded_once_heading_is_known() {
        let mut planner = NavigationPlanner::new();
        assert_eq!(planner.update_position(pos(-2, -2)), Action::Move);
        assert_eq!(planner.update_position(pos(-2, -2)), Action::TurnRight);
        assert_eq!(planner.update_position(pos(-2, -2)), Action::Move);
        assert_eq!(planner.update_position(pos(-1, -2)), Action::Move);
        assert_eq!(planner.map_state().obstacles, Vec::new());
        // Same position reported again after a MOVE: the forward cell is an obstacle,
        // now that heading (RIGHT, about to turn) is known.
        let action = planner.update_position(pos(-1, -2));
        assert!(matches!(action, Action::TurnLeft | Action::TurnRight));
        let state = planner.map_state();
        assert_eq!(state.obstacles, vec![pos(0, -2)]);
        assert_ne!(state.rotation, Some(Rotation::Right));
    }

    #[test]
    fn determinism() {
        let positions = [
            pos(0, -2),
            pos(0, -2),
            pos(0, -1),
            pos(0, -1),
            pos(0, 0),
        ];
        let mut a = NavigationPlanner::new();
        let mut b = NavigationPlanner::new();
        let actions_a: Vec<_> = positions.iter().map(|&p| a.update_position(p)).collect();
        let actions_b: Vec<_> = positions.iter().map(|&p| b.update_position(p)).collect();
        assert_eq!(actions_a, actions_b);
    }
}
