use criterion::{criterion_group, criterion_main};


criterion_group!(
    benches,
    device::bench_dispatch_request,
    device::bench_power_usage_event,
    device::bench_reply_token
);
criterion_main!(benches);
