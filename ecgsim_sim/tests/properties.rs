//! Property tests over the conduction engine, run through the simulation harness.

use approx::assert_relative_eq;
use ecgsim_core::lead_projection::project;
use ecgsim_core::{AnatomyTable, HeartRateEstimator, NodeField, NodeSpec, ParamChange, PathField, PathSpec};
use ecgsim_sim::{SimConfig, SimWorld};
use nalgebra::Vector3;
use proptest::prelude::*;

fn config(seed: u64, secs: f64) -> SimConfig {
    SimConfig {
        seed,
        duration_secs: secs,
        ..SimConfig::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_automatic_node_keeps_its_interval(rate in 30.0f64..200.0) {
        let table = AnatomyTable::new()
            .node(NodeSpec::new("sa", [0.0, 0.0, 0.0]).with_automaticity(rate).with_refractory(100.0))
            .node(NodeSpec::new("ra", [1.0, 0.0, 0.0]))
            .path(PathSpec::new("sa_ra", "sa", "ra").with_delay(20.0));
        let mut world = SimWorld::new(config(7, 6.0), &table).unwrap();
        world.run();

        let interval = 60_000.0 / rate;
        let step = world.stepper().config().step_ms;
        let fires = world.ledger().fires("sa");
        prop_assert!(fires.len() >= 2);
        for pair in fires.windows(2) {
            let gap = pair[1].at - pair[0].at;
            prop_assert!(gap >= interval - 1e-9, "gap {} < interval {}", gap, interval);
            prop_assert!(gap < interval + step + 1e-9, "gap {} overshoots interval {}", gap, interval);
        }
    }

    #[test]
    fn test_no_node_fires_while_refractory(
        seed in any::<u64>(),
        sa_rate in 40.0f64..220.0,
        av_delay in 40.0f64..250.0,
        av_refractory in 150.0f64..500.0,
        jitter in 0.0f64..30.0,
    ) {
        let changes = [
            ParamChange::node("sa", NodeField::Rate(sa_rate)),
            ParamChange::path("av_his", PathField::Delay(av_delay)),
            ParamChange::path("av_his", PathField::Refractory(av_refractory)),
            ParamChange::path("av_his", PathField::Jitter(jitter)),
            ParamChange::path("ra_av", PathField::Jitter(jitter)),
        ];
        let mut world = SimWorld::standard(config(seed, 5.0), &changes).unwrap();
        world.run();

        prop_assert!(world.ledger().is_clean(), "{:?}", world.ledger().violations());
        prop_assert!(world.ledger().total_fires() > 0);
    }

    #[test]
    fn test_rate_ignores_interval_order(
        intervals in prop::collection::vec(300u32..2000, 6),
        shuffle_seed in any::<u64>(),
    ) {
        let mut shuffled = intervals.clone();
        let n = shuffled.len();
        let mut state = shuffle_seed;
        for i in (1..n).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (state >> 33) as usize % (i + 1));
        }

        let rate_of = |intervals: &[u32]| {
            let mut estimator = HeartRateEstimator::new(6);
            let mut t = 0.0;
            let mut bpm = estimator.push_beat(t);
            for &rr in intervals {
                t += rr as f64;
                bpm = estimator.push_beat(t);
            }
            bpm
        };

        prop_assert_eq!(rate_of(&intervals), rate_of(&shuffled));
    }

    #[test]
    fn test_projection_is_pure_and_antisymmetric(
        a in prop::array::uniform3(-8.0f64..8.0),
        b in prop::array::uniform3(-8.0f64..8.0),
    ) {
        let from = Vector3::from(a);
        let to = Vector3::from(b);
        prop_assume!((to - from).norm() > 1e-3);

        let forward = project(&from, &to);
        prop_assert_eq!(forward, project(&from, &to));

        let backward = project(&to, &from);
        for (lead, value) in forward.iter() {
            assert_relative_eq!(value, -backward.get(lead), epsilon = 1e-9);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn test_same_seed_replays_identically(seed in any::<u64>(), probability in 0.2f64..0.9) {
        let changes = [
            ParamChange::path("av_his", PathField::Jitter(25.0)),
            ParamChange::path("av_his", PathField::Probability(Some(probability))),
            ParamChange::path("sa_ra", PathField::Jitter(10.0)),
        ];
        let run = || {
            let mut world = SimWorld::standard(config(seed, 4.0), &changes).unwrap();
            world.run();
            world
        };
        let first = run();
        let second = run();

        prop_assert!(first.ledger() == second.ledger());
        prop_assert_eq!(first.stepper().beat_count(), second.stepper().beat_count());
        prop_assert_eq!(first.stepper().heart_rate(), second.stepper().heart_rate());
        for lead in ecgsim_core::Lead::ALL {
            prop_assert_eq!(
                first.stepper().streams().stream(lead).snapshot(),
                second.stepper().streams().stream(lead).snapshot()
            );
        }
    }
}
