use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use soundpay_core::{
    airtime, decode, encode, Decoder, Encoder, Framer, ModemConfig, ModemError, ToneModulator,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Configuration used in the payment-request scenario: 2400 Hz carrier,
/// 44.1 kHz, 100 baud, three copies per bit.
fn scenario_config() -> ModemConfig {
    ModemConfig::default()
        .with_carrier_hz(2400.0)
        .with_sample_rate_hz(44100)
        .with_baud(100)
        .with_repetition(3)
}

fn gaussian(len: usize, sigma: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, sigma).unwrap();
    (0..len).map(|_| normal.sample(&mut rng)).collect()
}

fn add_noise(samples: &mut [f32], sigma: f32, seed: u64) {
    let noise = gaussian(samples.len(), sigma, seed);
    for (sample, n) in samples.iter_mut().zip(noise) {
        *sample += n;
    }
}

#[test]
fn test_payment_request_scenario() {
    init_logging();
    let config = scenario_config();
    let payload = b"PAY:1000";

    let samples = encode(payload, &config).expect("Failed to encode");
    let slots = 13 * 3 + (8 + 8 * 8 + 16) * 3;
    assert_eq!(samples.len(), slots * 441);

    let decoded = decode(&samples, &config).expect("Failed to decode");
    assert_eq!(decoded, payload);
}

#[test]
fn test_encode_decode_round_trip_lengths() {
    init_logging();
    let config = ModemConfig::default();
    let encoder = Encoder::new(config.clone()).unwrap();
    let decoder = Decoder::new(config).unwrap();

    for len in [0usize, 1, 2, 7, 32, 54, 108, 128] {
        let payload: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
        let samples = encoder.encode(&payload).expect("Failed to encode");
        let decoded = decoder.decode(&samples).expect("Failed to decode");
        assert_eq!(decoded, payload, "round trip failed for {} bytes", len);
    }
}

#[test]
fn test_encode_decode_binary_data() {
    let config = scenario_config();
    let payload = vec![0, 1, 2, 255, 128, 64, 32, 16, 8, 4, 2, 1, 0, 0xAA, 0x55];
    let samples = encode(&payload, &config).unwrap();
    assert_eq!(decode(&samples, &config).unwrap(), payload);
}

#[test]
fn test_encode_decode_all_zero_and_all_one_payloads() {
    let config = scenario_config();
    for payload in [vec![0x00; 24], vec![0xFF; 24]] {
        let samples = encode(&payload, &config).unwrap();
        assert_eq!(decode(&samples, &config).unwrap(), payload);
    }
}

#[test]
fn test_encode_is_idempotent() {
    let config = scenario_config();
    let first = encode(b"PAY:1000", &config).unwrap();
    let second = encode(b"PAY:1000", &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_payload_too_large() {
    let config = ModemConfig::default().with_max_payload_bytes(16);
    match encode(&[7u8; 17], &config) {
        Err(ModemError::PayloadTooLarge { len: 17, max: 16 }) => {}
        other => panic!("Expected PayloadTooLarge, got {:?}", other.map(|s| s.len())),
    }
}

#[test]
fn test_all_silence_not_found() {
    init_logging();
    let config = scenario_config();
    for len in [0usize, 100, 441 * 10, 44100 * 2] {
        let silence = vec![0.0f32; len];
        assert_eq!(
            decode(&silence, &config),
            Err(ModemError::NotFound),
            "silence of {} samples",
            len
        );
    }
}

#[test]
fn test_noise_only_not_found() {
    let config = scenario_config();
    let noise = gaussian(44100 * 2, 0.3, 99);
    assert_eq!(decode(&noise, &config), Err(ModemError::NotFound));
}

#[test]
fn test_flipped_payload_byte_is_checksum_mismatch() {
    init_logging();
    let config = scenario_config();
    let framer = Framer::from_config(&config);
    let mut slots = framer.frame(b"PAY:1000").unwrap();

    // Invert every copy of every bit of payload byte 3 after framing
    let byte_start = framer.preamble_slots() + 8 * 3 + 3 * 8 * 3;
    for slot in &mut slots[byte_start..byte_start + 8 * 3] {
        *slot = !*slot;
    }
    let samples = ToneModulator::new(&config).modulate(&slots);

    match decode(&samples, &config) {
        Err(ModemError::ChecksumMismatch { .. }) => {}
        other => panic!("Expected ChecksumMismatch, got {:?}", other),
    }
}

#[test]
fn test_flipped_bit_groups_never_yield_wrong_payload() {
    let config = scenario_config();
    let framer = Framer::from_config(&config);
    let modulator = ToneModulator::new(&config);
    let clean = framer.frame(b"PAY:1000").unwrap();
    let data_start = framer.preamble_slots();
    let groups = (clean.len() - data_start) / 3;

    for group in (0..groups).step_by(7) {
        // One copy flipped: the majority still carries the bit
        let mut slots = clean.clone();
        let first = data_start + group * 3;
        slots[first + 1] = !slots[first + 1];
        let decoded = decode(&modulator.modulate(&slots), &config);
        assert_eq!(decoded.as_deref(), Ok(&b"PAY:1000"[..]), "group {}", group);

        // Whole group flipped: the result is an error, never different bytes
        let mut slots = clean.clone();
        for slot in &mut slots[first..first + 3] {
            *slot = !*slot;
        }
        match decode(&modulator.modulate(&slots), &config) {
            Ok(payload) => panic!("group {} decoded to {:?}", group, payload),
            Err(err) => assert!(err.is_channel_error(), "group {}: {:?}", group, err),
        }
    }
}

#[test]
fn test_single_copy_flips_across_frame_are_corrected() {
    let config = scenario_config();
    let framer = Framer::from_config(&config);
    let mut slots = framer.frame(b"correct me").unwrap();
    let data_start = framer.preamble_slots();
    let mut i = data_start + 2;
    while i < slots.len() {
        slots[i] = !slots[i];
        i += 3;
    }
    let samples = ToneModulator::new(&config).modulate(&slots);
    assert_eq!(decode(&samples, &config).unwrap(), b"correct me");
}

#[test]
fn test_leading_silence_offsets() {
    init_logging();
    let config = scenario_config();
    let samples = encode(b"PAY:1000", &config).unwrap();

    for lead in [1usize, 37, 220, 441, 1000, 12345, 22050, 48001] {
        let mut capture = vec![0.0f32; lead];
        capture.extend_from_slice(&samples);
        capture.extend(vec![0.0f32; 4410]);
        assert_eq!(
            decode(&capture, &config).as_deref(),
            Ok(&b"PAY:1000"[..]),
            "lead of {} samples",
            lead
        );
    }
}

#[test]
fn test_leading_low_level_noise() {
    let config = scenario_config();
    let samples = encode(b"PAY:1000", &config).unwrap();

    for (seed, lead) in [(1u64, 5000usize), (2, 17321), (3, 30000)] {
        let mut capture = gaussian(lead, 0.01, seed);
        capture.extend_from_slice(&samples);
        capture.extend(gaussian(8000, 0.01, seed + 100));
        assert_eq!(
            decode(&capture, &config).as_deref(),
            Ok(&b"PAY:1000"[..]),
            "lead of {} noisy samples",
            lead
        );
    }
}

#[test]
fn test_long_noisy_lead_without_repetition() {
    init_logging();
    // A 13-slot preamble is short enough for seconds of noise to mimic it now
    // and then. The real frame behind such a false start must still decode.
    let config = scenario_config().with_repetition(1);
    let payload = b"PAY:1000";
    let samples = encode(payload, &config).unwrap();

    for seed in 0..10u64 {
        let mut capture = vec![0.0f32; 44100 * 5];
        capture.extend_from_slice(&samples);
        capture.extend(vec![0.0f32; 22050]);
        add_noise(&mut capture, 0.1, 500 + seed);
        assert_eq!(
            decode(&capture, &config).as_deref(),
            Ok(&payload[..]),
            "seed {}",
            seed
        );
    }
}

#[test]
fn test_corrupt_frame_does_not_hide_later_frame() {
    let config = scenario_config();
    let framer = Framer::from_config(&config);
    let modulator = ToneModulator::new(&config);

    let mut damaged = framer.frame(b"PAY:0000").unwrap();
    let length_start = framer.preamble_slots();
    // Length 8 becomes 136: over the maximum
    for slot in &mut damaged[length_start..length_start + 3] {
        *slot = true;
    }

    let mut capture = vec![0.0f32; 2000];
    capture.extend(modulator.modulate(&damaged));
    capture.extend(vec![0.0f32; 4410]);
    capture.extend(encode(b"PAY:1000", &config).unwrap());
    capture.extend(vec![0.0f32; 2000]);

    assert_eq!(decode(&capture, &config).as_deref(), Ok(&b"PAY:1000"[..]));

    // On its own the damaged frame reports why it was rejected
    let alone = modulator.modulate(&damaged);
    assert_eq!(
        decode(&alone, &config),
        Err(ModemError::InvalidLength { len: 136, max: 128 })
    );
}

#[test]
fn test_gaussian_noise_margin() {
    init_logging();
    let config = scenario_config();
    let payload = b"PAY:1000";
    let samples = encode(payload, &config).unwrap();

    // Noise standard deviation at 30% of the tone amplitude
    let sigma = 0.3 * config.amplitude;
    let trials = 20;
    let mut successes = 0;
    for seed in 0..trials {
        let mut capture = vec![0.0f32; 3000 + seed as usize * 17];
        capture.extend_from_slice(&samples);
        capture.extend(vec![0.0f32; 3000]);
        add_noise(&mut capture, sigma, seed);
        if decode(&capture, &config).as_deref() == Ok(&payload[..]) {
            successes += 1;
        }
    }
    assert!(
        successes >= 18,
        "only {} of {} noisy trials decoded",
        successes,
        trials
    );
}

#[test]
fn test_noisy_decode_never_returns_wrong_bytes() {
    let config = scenario_config();
    let payload = b"PAY:1000";
    let samples = encode(payload, &config).unwrap();

    // Heavy noise: failures are allowed, wrong payloads are not
    for seed in 0..10u64 {
        let mut capture = samples.clone();
        add_noise(&mut capture, 1.5, 1000 + seed);
        if let Ok(decoded) = decode(&capture, &config) {
            assert_eq!(decoded, payload, "seed {}", seed);
        }
    }
}

#[test]
fn test_clipped_capture() {
    let config = scenario_config();
    let samples = encode(b"clip", &config).unwrap();
    let clipped: Vec<f32> = samples.iter().map(|s| (s * 4.0).clamp(-1.0, 1.0)).collect();
    assert_eq!(decode(&clipped, &config).unwrap(), b"clip");
}

#[test]
fn test_quiet_capture_and_dc_offset() {
    let config = scenario_config();
    let samples = encode(b"quiet", &config).unwrap();

    let quiet: Vec<f32> = samples.iter().map(|s| s * 0.01).collect();
    assert_eq!(decode(&quiet, &config).unwrap(), b"quiet");

    let offset: Vec<f32> = samples.iter().map(|s| s * 0.5 + 0.1).collect();
    assert_eq!(decode(&offset, &config).unwrap(), b"quiet");
}

#[test]
fn test_clock_drift() {
    let config = scenario_config();
    let samples = encode(b"PAY:1000", &config).unwrap();

    // Playback clock 0.1% fast relative to the capture clock
    let ratio = 1.001f64;
    let len = (samples.len() as f64 / ratio) as usize;
    let mut drifted = vec![0.0f32; 2000];
    for i in 0..len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx];
        let b = samples.get(idx + 1).copied().unwrap_or(0.0);
        drifted.push(a * (1.0 - frac) + b * frac);
    }
    drifted.extend(vec![0.0f32; 2000]);

    assert_eq!(decode(&drifted, &config).unwrap(), b"PAY:1000");
}

#[test]
fn test_first_of_two_frames_wins() {
    let config = scenario_config();
    let mut capture = vec![0.0f32; 1234];
    capture.extend(encode(b"first", &config).unwrap());
    capture.extend(vec![0.0f32; 20000]);
    capture.extend(encode(b"second", &config).unwrap());
    assert_eq!(decode(&capture, &config).unwrap(), b"first");
}

#[test]
fn test_guard_silence_round_trip() {
    let config = ModemConfig::default().with_guard_ms(200);
    let samples = encode(b"guarded", &config).unwrap();
    let expected = airtime(7, &config).as_secs_f64() * 48000.0;
    assert!((samples.len() as f64 - expected).abs() < 1.0);
    assert_eq!(decode(&samples, &config).unwrap(), b"guarded");
}

#[test]
fn test_even_repetition_round_trip() {
    let config = scenario_config().with_repetition(2);
    let samples = encode(b"two copies", &config).unwrap();
    assert_eq!(decode(&samples, &config).unwrap(), b"two copies");
}

#[test]
fn test_single_copy_round_trip() {
    let config = scenario_config().with_repetition(1);
    let samples = encode(b"no redundancy", &config).unwrap();
    assert_eq!(decode(&samples, &config).unwrap(), b"no redundancy");
}

#[test]
fn test_alternative_rates() {
    let configs = [
        ModemConfig::default()
            .with_sample_rate_hz(16000)
            .with_carrier_hz(1800.0),
        ModemConfig::default().with_baud(50),
        ModemConfig::default()
            .with_baud(200)
            .with_carrier_hz(3000.0),
    ];
    for config in configs {
        let samples = encode(b"rates", &config).unwrap();
        assert_eq!(
            decode(&samples, &config).unwrap(),
            b"rates",
            "config {:?}",
            config
        );
    }
}

#[test]
fn test_mismatched_carrier_does_not_decode() {
    let sender = scenario_config().with_carrier_hz(1200.0);
    let receiver = scenario_config();
    let samples = encode(b"wrong band", &sender).unwrap();
    assert_eq!(decode(&samples, &receiver), Err(ModemError::NotFound));
}

#[test]
fn test_concurrent_encode_decode() {
    let config = scenario_config();
    let encoder = Encoder::new(config.clone()).unwrap();
    let decoder = Decoder::new(config).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let encoder = &encoder;
                let decoder = &decoder;
                scope.spawn(move || {
                    let payload = vec![i; 10 + i as usize];
                    let samples = encoder.encode(&payload).unwrap();
                    (payload, decoder.decode(&samples).unwrap())
                })
            })
            .collect();
        for handle in handles {
            let (sent, received) = handle.join().unwrap();
            assert_eq!(sent, received);
        }
    });
}
