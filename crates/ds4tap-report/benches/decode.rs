use std::time::Duration;

use codspeed_criterion_compat::{black_box, criterion_group, criterion_main, Criterion};
use ds4tap_report::{decode, FULL_REPORT_LEN, MIN_REPORT_LEN, REPORT_ID};

fn sample_report() -> [u8; FULL_REPORT_LEN] {
    let mut raw = [0u8; FULL_REPORT_LEN];
    raw[0] = REPORT_ID;
    raw[1..5].copy_from_slice(&[0x7F, 0x80, 0x7E, 0x81]);
    raw[5] = 0x08;
    raw[13..25].copy_from_slice(&[
        0x01, 0x00, 0xFE, 0xFF, 0x10, 0x00, 0x00, 0x20, 0x00, 0xE0, 0x40, 0x1F,
    ]);
    raw[30] = 0x1A;
    raw[35] = 0x80;
    raw[39] = 0x80;
    raw
}

fn bench_decode(c: &mut Criterion) {
    let full = sample_report();

    c.bench_function("decode_full_report", |b| {
        b.iter(|| {
            let telemetry = decode(black_box(&full), MIN_REPORT_LEN, Duration::ZERO)
                .expect("report should decode");
            black_box(telemetry);
        })
    });

    c.bench_function("decode_minimal_report", |b| {
        b.iter(|| {
            let telemetry = decode(
                black_box(&full[..MIN_REPORT_LEN]),
                MIN_REPORT_LEN,
                Duration::ZERO,
            )
            .expect("report should decode");
            black_box(telemetry);
        })
    });
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
