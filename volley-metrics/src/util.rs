use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

pub fn nanos_to_dur(v: u128) -> Duration {
    let secs = (v / NANOS_PER_SEC).min(u128::from(u64::MAX)) as u64;
    Duration::new(secs, (v % NANOS_PER_SEC) as u32)
}
