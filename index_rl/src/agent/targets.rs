// Double-Q target math

/// Index of the largest score; ties resolve to the lowest index.
pub fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }
    best
}

/// Learning target for one transition. The online network picks the next
/// action, the target network values it. Terminal transitions bootstrap
/// nothing and the target is the reward.
pub fn double_q_target(
    reward: f32,
    gamma: f32,
    next: Option<(&[f32], &[f32])>,
) -> f32 {
    match next {
        None => reward,
        Some((online_next, target_next)) => {
            let best_action = argmax(online_next);
            reward + gamma * target_next[best_action]
        }
    }
}
