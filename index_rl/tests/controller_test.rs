mod common;

use std::collections::HashMap;

use common::{greedy_agent_settings, memory_settings, seeded_agent_settings, ScriptedApproximator};
use index_rl::controller::{ApproximatorFactory, DdqnController, StateSource};
use index_rl::error::AgentError;
use index_rl::settings::{AgentSettings, ControllerSettings};

fn arms(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("ix_arm_{}", i)).collect()
}

fn controller(
    agent: AgentSettings,
    state_source: StateSource,
    factory: ApproximatorFactory<ScriptedApproximator>,
) -> DdqnController<String, ScriptedApproximator> {
    DdqnController::new(
        agent,
        memory_settings(),
        &ControllerSettings { state_source },
        factory,
    )
}

/// Greedy controller whose online network always prefers `best`.
fn favoring(best: usize, state_source: StateSource) -> DdqnController<String, ScriptedApproximator> {
    controller(
        greedy_agent_settings(11),
        state_source,
        Box::new(move |s, a| Ok(ScriptedApproximator::favoring(s, a, best))),
    )
}

fn contexts() -> Vec<Vec<f32>> {
    vec![vec![0.0, 1.0], vec![1.0, 1.0], vec![2.0, 4.0]]
}

fn rewards(name: &str, values: &[f64]) -> HashMap<String, Vec<f64>> {
    HashMap::from([(name.to_string(), values.to_vec())])
}

#[test]
fn test_initialize_sizes_agent_from_contexts() {
    let mut c = favoring(0, StateSource::Observed);
    assert!(!c.is_initialized());
    c.initialize(&contexts()).unwrap();
    assert!(c.is_initialized());
    assert_eq!(c.state_size(), 2);
    assert_eq!(c.action_size(), 3);
}

#[test]
fn test_initialize_rejects_empty_contexts() {
    let mut c = favoring(0, StateSource::Observed);
    assert!(matches!(c.initialize(&[]), Err(AgentError::Configuration(_))));
    assert!(matches!(
        c.initialize(&[vec![1.0], vec![1.0, 2.0]]),
        Err(AgentError::Configuration(_))
    ));
    assert!(!c.is_initialized());
}

#[test]
fn test_select_before_initialize_is_empty() {
    let mut c = favoring(0, StateSource::Observed);
    c.set_arms(arms(3));
    assert!(c.select_action(&contexts()).is_empty());
}

#[test]
fn test_update_before_initialize_fails() {
    let mut c = favoring(0, StateSource::Observed);
    c.set_arms(arms(3));
    let result = c.update(&[0], &rewards("ix_arm_0", &[1.0]));
    assert!(matches!(result, Err(AgentError::Uninitialized)));
}

#[test]
fn test_select_uses_mean_pooling_on_length_mismatch() {
    // state depends on the pooled first feature: mean of 0, 1, 2 is 1.0
    let mut c = controller(
        greedy_agent_settings(12),
        StateSource::Observed,
        Box::new(|s, a| {
            Ok(ScriptedApproximator::new(
                s,
                a,
                |state| {
                    if state[0] == 1.0 {
                        vec![0.0, 0.0, 1.0]
                    } else {
                        vec![1.0, 0.0, 0.0]
                    }
                },
                |_| vec![0.0, 0.0, 0.0],
            ))
        }),
    );
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));
    assert_eq!(c.select_action(&contexts()), vec![2]);
}

#[test]
fn test_out_of_range_action_yields_empty_selection() {
    let mut c = favoring(2, StateSource::Observed);
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(2));
    assert!(c.select_action(&contexts()).is_empty());
}

#[test]
fn test_ragged_contexts_yield_empty_selection() {
    let mut c = favoring(1, StateSource::Observed);
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));
    let ragged = vec![vec![1.0, 2.0], vec![1.0]];
    assert!(c.select_action(&ragged).is_empty());
}

#[test]
fn test_update_without_reward_is_noop() {
    let mut c = favoring(1, StateSource::Observed);
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));
    let chosen = c.select_action(&contexts());
    assert_eq!(chosen, vec![1]);

    let reports = c.update(&chosen, &rewards("some_other_index", &[1.0])).unwrap();
    assert!(reports.is_empty());
    assert_eq!(c.steps(), 0);
}

#[test]
fn test_update_threads_selection_state() {
    let mut c = favoring(1, StateSource::Observed);
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));
    let chosen = c.select_action(&contexts());

    let reports = c.update(&chosen, &rewards("ix_arm_1", &[1.0, -0.25])).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(c.steps(), 1);

    let agent = c.agent().unwrap();
    let (states, targets) = &agent.approximator().train_calls[0];
    assert_eq!(states[0], vec![1.0, 2.0]);
    // reward 0.75 plus gamma times the target network's value of action 1
    let expected = 0.75 + 0.99 * 1.0;
    assert!((targets[0][1] - expected).abs() < 1e-5);
}

#[test]
fn test_update_skips_arm_never_selected() {
    let mut c = favoring(1, StateSource::Observed);
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));
    let reports = c.update(&[0], &rewards("ix_arm_0", &[1.0])).unwrap();
    assert!(reports.is_empty());
    assert_eq!(c.steps(), 0);
}

#[test]
fn test_random_placeholder_states() {
    let mut c = controller(
        seeded_agent_settings(13),
        StateSource::RandomPlaceholder,
        Box::new(|s, a| Ok(ScriptedApproximator::favoring(s, a, 0))),
    );
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));

    let reports = c.update(&[2], &rewards("ix_arm_2", &[0.5])).unwrap();
    assert_eq!(reports.len(), 1);
    let (states, _) = &c.agent().unwrap().approximator().train_calls[0];
    assert_eq!(states[0].len(), 2);
}

#[test]
fn test_unknown_arm_id_is_ignored() {
    let mut c = favoring(1, StateSource::RandomPlaceholder);
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));
    let reports = c.update(&[7], &rewards("ix_arm_7", &[1.0])).unwrap();
    assert!(reports.is_empty());
}

#[test]
fn test_reinitialize_discards_learning() {
    let mut c = favoring(1, StateSource::RandomPlaceholder);
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));
    c.update(&[1], &rewards("ix_arm_1", &[1.0])).unwrap();
    assert_eq!(c.steps(), 1);

    c.initialize(&contexts()).unwrap();
    assert_eq!(c.steps(), 0);
    c.workload_change("tpc-h -> tpc-ds");
}

#[test]
fn test_selection_state_is_consumed_by_update() {
    let mut c = favoring(1, StateSource::Observed);
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));
    let chosen = c.select_action(&contexts());

    let first = c.update(&chosen, &rewards("ix_arm_1", &[1.0])).unwrap();
    assert_eq!(first.len(), 1);
    let again = c.update(&chosen, &rewards("ix_arm_1", &[1.0])).unwrap();
    assert!(again.is_empty());
    assert_eq!(c.steps(), 1);

    let chosen = c.select_action(&contexts());
    assert_eq!(c.update(&chosen, &rewards("ix_arm_1", &[1.0])).unwrap().len(), 1);
    assert_eq!(c.steps(), 2);
}

#[test]
fn test_pooled_rounds_are_counted() {
    let mut c = favoring(0, StateSource::Observed);
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));
    assert_eq!(c.pooled_rounds(), 0);

    c.select_action(&contexts());
    c.select_action(&contexts());
    assert_eq!(c.pooled_rounds(), 2);

    // two values concatenate to exactly the state size
    c.select_action(&[vec![0.5], vec![0.5]]);
    assert_eq!(c.pooled_rounds(), 2);

    c.initialize(&contexts()).unwrap();
    assert_eq!(c.pooled_rounds(), 0);
}

#[test]
fn test_nan_reward_surfaces_from_update() {
    let mut c = favoring(1, StateSource::Observed);
    c.initialize(&contexts()).unwrap();
    c.set_arms(arms(3));
    let chosen = c.select_action(&contexts());
    let result = c.update(&chosen, &rewards("ix_arm_1", &[f64::NAN]));
    assert!(matches!(result, Err(AgentError::NonFiniteTdError(_))));
    assert_eq!(c.steps(), 0);
}
