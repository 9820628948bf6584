use std::{sync::Arc, thread};

use moodsync_core::{
    analysis::adaptive_threshold, AudioEngine, FixedBpm, ManualClock, PhaseDriver, PointerField,
    SpectralEnergyAnalyzer, SyncConfig, SyncHandle, SyncState, ENERGY_HISTORY_SIZE,
};

fn build_engine() -> AudioEngine {
    let analyzer = SpectralEnergyAnalyzer::with_bpm_source(Box::new(FixedBpm(0.5)));
    AudioEngine::with_analyzer(analyzer, 16)
}

#[test]
fn warm_up_then_spike_reaches_sync_state() {
    let engine = build_engine();
    let bpm = engine.set_genre("pop").unwrap();
    let beats = engine.subscribe().unwrap();

    let clock = ManualClock::new();
    let state = SyncState::with_clock(SyncConfig::default(), Arc::new(clock.clone())).unwrap();
    let sync = SyncHandle::new(state);

    for _ in 0..ENERGY_HISTORY_SIZE {
        assert_eq!(engine.push_magnitudes(&[1.0]).unwrap(), None);
    }

    // Energy 10 against an average of 1 with zero variance.
    let beat = engine
        .push_magnitudes(&[1.0, 3.0])
        .unwrap()
        .expect("spike should fire");
    let c = adaptive_threshold(0.0);
    let expected = (0.6 + (10.0 - c) / (2.0 * c)).min(1.0);
    assert!((beat.intensity - expected).abs() < 1e-9);
    assert_eq!(beat.intensity, 1.0);
    assert_eq!(beat.bpm, bpm);

    assert_eq!(sync.apply_pending(&beats).unwrap(), 1);
    let snapshot = sync.snapshot().unwrap();
    assert_eq!(snapshot.tempo, 110.0);
    assert_eq!(snapshot.beat_intensity, 1.0);
    assert_eq!(snapshot.beat_influence, 1.0);
    assert!((snapshot.color_shift - 0.1).abs() < 1e-12);
}

#[test]
fn frame_ticks_and_clicks_shape_the_snapshot() {
    let clock = ManualClock::new();
    let state = SyncState::with_clock(SyncConfig::default(), Arc::new(clock.clone())).unwrap();
    let sync = SyncHandle::new(state);
    let pointer = PointerField::default();
    let mut driver = PhaseDriver::default();

    sync.add_interaction_ripple(pointer.ripple_strength(400.0, 380.0))
        .unwrap();
    for _ in 0..60 {
        clock.advance_ms(16);
        let phase = driver.advance(120.0);
        sync.update(phase, pointer.mouse_influence(400.0, 300.0)).unwrap();
    }

    let snapshot = sync.snapshot().unwrap();
    assert!((snapshot.interaction_ripple - 0.8).abs() < 1e-12);
    assert_eq!(snapshot.visual_phase, driver.phase());
    assert!(snapshot.rotation_speed > 1.0);

    let ring: Vec<f64> = (0..24)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / 24.0;
            snapshot.pattern_value(angle, 120.0, 2)
        })
        .collect();
    assert!(ring.iter().all(|v| v.is_finite() && v.abs() <= 1.0));
}

#[test]
fn concurrent_producers_share_one_state() {
    let engine = build_engine();
    let sync = SyncHandle::new(SyncState::default());
    let listener = sync.spawn_beat_listener(engine.subscribe().unwrap());

    let audio = {
        let engine = engine.clone();
        thread::spawn(move || {
            for i in 0..400 {
                let frame: &[f32] = if i % 50 == 49 { &[4.0] } else { &[1.0] };
                engine.push_magnitudes(frame).unwrap();
            }
        })
    };
    let ticks = {
        let sync = sync.clone();
        thread::spawn(move || {
            let mut driver = PhaseDriver::default();
            for _ in 0..400 {
                let phase = driver.advance(100.0);
                sync.update(phase, 0.1).unwrap();
            }
        })
    };
    let clicks = {
        let sync = sync.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                sync.add_interaction_ripple(5.0).unwrap();
            }
        })
    };

    audio.join().unwrap();
    ticks.join().unwrap();
    clicks.join().unwrap();
    engine.stop().unwrap();

    let applied = listener.join().unwrap().unwrap();
    let detected = engine.with_analysis(|a| a.beats_detected()).unwrap();
    assert_eq!(applied as u64, detected);
    assert!(detected >= 1);

    let snapshot = sync.snapshot().unwrap();
    assert!((0.0..=1.0).contains(&snapshot.beat_influence));
    assert!((0.0..1.0).contains(&snapshot.color_shift));
    assert!((0.0..=1.0).contains(&snapshot.interaction_ripple));
    assert!(snapshot.rotation_speed >= 0.1);
    assert!(snapshot.scale_multiplier >= 0.5);
}
