use headfix_core::{CatchConfig, IntervalConfig, SessionConfig, StimConfig, TrialType};
use headfix_session::{generate_session, PlannerOptions, RandomSource, SequencePlanner};

fn scenario_a() -> SessionConfig {
    SessionConfig {
        total_trials: 20,
        percent_punish: 0.5,
        starting_reward: 5,
        max_sequential_punish: 3,
        max_sequential_reward: 3,
        ..SessionConfig::default()
    }
}

fn scenario_b() -> SessionConfig {
    SessionConfig {
        catch_trials: CatchConfig {
            enabled: true,
            num_catch_reward: 2,
            num_catch_punish: 2,
            catch_offset: 0.3,
        },
        ..scenario_a()
    }
}

#[test]
fn test_scenario_a_quota_and_runs() {
    let config = scenario_a();
    for seed in 0..25 {
        let trials = SequencePlanner::new(&config)
            .generate(&mut RandomSource::from_seed(seed))
            .unwrap();
        assert_eq!(trials.len(), 20);
        assert_eq!(trials.count(TrialType::Punish), 10);
        assert_eq!(trials.count(TrialType::Reward), 10);
        assert!(trials.longest_run(TrialType::is_punish_like) <= 3);
        assert!(trials.longest_run_from(5, TrialType::is_reward_like) <= 3);
        assert!(trials.first_index(TrialType::is_punish_like).unwrap() >= 5);
    }
}

#[test]
fn test_scenario_b_catch_in_last_six() {
    let config = scenario_b();
    for seed in 0..25 {
        let trials = SequencePlanner::new(&config)
            .generate(&mut RandomSource::from_seed(seed))
            .unwrap();
        assert_eq!(trials.count(TrialType::RewardCatch), 2);
        assert_eq!(trials.count(TrialType::PunishCatch), 2);
        for (i, t) in trials.iter().enumerate() {
            if t.is_catch() {
                assert!((14..20).contains(&i), "seed {seed}: catch at {i}");
            }
        }
        assert!(trials.longest_run(TrialType::is_punish_like) <= 3);
        assert!(trials.first_index(TrialType::is_punish_like).unwrap() >= 5);
    }
}

#[test]
fn test_full_session_lengths_and_determinism() {
    let config = SessionConfig {
        iti: IntervalConfig::jittered(20000, 40000),
        tone: IntervalConfig::jittered(1000, 3000),
        ..scenario_b()
    };
    let a = generate_session(&config, &mut RandomSource::from_seed(99), PlannerOptions::default())
        .unwrap();
    let b = generate_session(&config, &mut RandomSource::from_seed(99), PlannerOptions::default())
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(a.arrays.trials.len(), 20);
    assert_eq!(a.arrays.iti.len(), 20);
    assert_eq!(a.arrays.tone.len(), 20);
    assert_eq!(a.arrays.led, vec![0]);

    let total_ms: u32 = a.arrays.iti.iter().sum::<u32>() + a.arrays.tone.iter().sum::<u32>();
    assert_eq!(a.session_length_s, f64::from(total_ms) / 1000.0);
}

#[test]
fn test_stim_session_led_per_block_trial() {
    let config = SessionConfig {
        total_trials: 60,
        percent_punish: 0.5,
        starting_reward: 5,
        iti: IntervalConfig::fixed(30000),
        stim: StimConfig {
            enabled: true,
            num_stim_reward: 3,
            num_stim_punish: 3,
            num_stim_alone: 3,
            stim_start_position: 40,
            lead_ms: 1000,
            ..StimConfig::default()
        },
        ..SessionConfig::default()
    };
    let session =
        generate_session(&config, &mut RandomSource::from_seed(5), PlannerOptions::default())
            .unwrap();
    let trials = &session.arrays.trials;
    assert_eq!(trials.count(TrialType::StimReward), 3);
    assert_eq!(trials.count(TrialType::StimPunish), 3);
    assert_eq!(trials.count(TrialType::StimAlone), 3);
    assert_eq!(session.arrays.led, vec![29000; 9]);
    assert_eq!(session.wire_arrays().unwrap().len(), 4);
}

#[test]
fn test_invalid_config_is_rejected_before_planning() {
    let config = SessionConfig {
        percent_punish: -0.1,
        ..scenario_a()
    };
    let err = generate_session(&config, &mut RandomSource::from_seed(0), PlannerOptions::default())
        .unwrap_err();
    assert!(matches!(err, headfix_session::SessionError::InvalidConfig(_)));
}

#[test]
fn test_session_serializes_for_export() {
    let session = generate_session(
        &scenario_a(),
        &mut RandomSource::from_seed(3),
        PlannerOptions::default(),
    )
    .unwrap();
    let json = serde_json::to_string(&session).unwrap();
    let back: headfix_session::AssembledSession = serde_json::from_str(&json).unwrap();
    assert_eq!(back.arrays, session.arrays);
    assert_eq!(back.stim_enabled, session.stim_enabled);

    let summary = serde_json::to_value(session.summary()).unwrap();
    assert_eq!(summary["total_trials"], 20);
    assert_eq!(summary["counts"]["Punish"], 10);
}
