use crate::learning::reward::RewardModel;
use crate::learning::types::{Action, StateKey, VerticalMotion};

/// Hand-tuned priors layered on top of the UCB1 score.
#[derive(Debug, Clone)]
pub struct HeuristicBonus {
    jump_right: f64,
    forward: f64,
    leftward_penalty: f64,
    wait_penalty: f64,
    bias_weight: f64,
    falling_jump: f64,
    route_hint: f64,
}

impl HeuristicBonus {
    pub fn new(jump_right: f64, forward: f64, leftward_penalty: f64, wait_penalty: f64) -> Self {
        Self {
            jump_right,
            forward,
            leftward_penalty,
            wait_penalty,
            bias_weight: 0.2,
            falling_jump: 0.1,
            route_hint: 0.15,
        }
    }

    pub fn action_bonus(&self, action: Action) -> f64 {
        match action {
            Action::JumpRight => self.jump_right,
            Action::JumpOnly | Action::MoveRight => self.forward,
            Action::MoveLeft | Action::JumpLeft => -self.leftward_penalty,
            Action::Wait => -self.wait_penalty,
        }
    }

    pub fn contextual_bonus(
        &self,
        action: Action,
        state: &StateKey,
        reward: &RewardModel,
        route_hint: Option<Action>,
    ) -> f64 {
        let mut bonus = reward.bias(action) * self.bias_weight;
        if state.vertical == VerticalMotion::Falling && action.is_jump() {
            bonus += self.falling_jump;
        }
        if route_hint == Some(action) {
            bonus += self.route_hint;
        }
        bonus
    }

    pub fn total(&self, action: Action, state: &StateKey, reward: &RewardModel, route_hint: Option<Action>) -> f64 {
        self.action_bonus(action) + self.contextual_bonus(action, state, reward, route_hint)
    }
}

impl Default for HeuristicBonus {
    fn default() -> Self {
        Self::new(0.5, 0.2, 0.3, 0.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::types::HorizontalMotion;

    fn falling() -> StateKey {
        StateKey {
            grid_x: 0,
            grid_y: 0,
            on_ground: false,
            horizontal: HorizontalMotion::Still,
            vertical: VerticalMotion::Falling,
            goal_bucket: 3,
        }
    }

    #[test]
    fn rightward_jump_is_preferred() {
        let heuristic = HeuristicBonus::default();
        let best = Action::ALL
            .into_iter()
            .max_by(|a, b| heuristic.action_bonus(*a).total_cmp(&heuristic.action_bonus(*b)));
        assert_eq!(best, Some(Action::JumpRight));
        assert!(heuristic.action_bonus(Action::Wait) < heuristic.action_bonus(Action::MoveLeft));
    }

    #[test]
    fn falling_favours_jumps_and_hints() {
        let heuristic = HeuristicBonus::default();
        let reward = RewardModel::default();
        let jump = heuristic.contextual_bonus(Action::JumpOnly, &falling(), &reward, None);
        let walk = heuristic.contextual_bonus(Action::MoveRight, &falling(), &reward, None);
        assert!(jump > walk);
        let hinted = heuristic.contextual_bonus(Action::MoveRight, &falling(), &reward, Some(Action::MoveRight));
        assert!(hinted > walk);
    }
}
