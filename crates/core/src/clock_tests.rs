// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_elapsed_is_monotonic() {
    let clock = SystemClock::new();
    let t1 = clock.elapsed();
    std::thread::sleep(Duration::from_millis(1));
    let t2 = clock.elapsed();
    assert!(t2 > t1);
}

#[test]
fn fake_clock_starts_at_zero_and_advances() {
    let clock = FakeClock::new();
    assert_eq!(clock.elapsed(), Duration::ZERO);
    clock.advance(Duration::from_millis(250));
    assert_eq!(clock.elapsed(), Duration::from_millis(250));
}

#[test]
fn fake_clock_clones_share_time() {
    let a = FakeClock::new();
    let b = a.clone();
    b.advance(Duration::from_secs(3));
    assert_eq!(a.elapsed(), Duration::from_secs(3));
}
