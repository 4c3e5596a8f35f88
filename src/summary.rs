//! Post-run aggregation over the frozen record set.
//!
//! `summarize` is a pure reduction: deterministic for a fixed input and
//! safe to call repeatedly. Percentiles use linear interpolation on the
//! sorted success latencies, the same method the offline analysis uses,
//! so online and offline numbers agree.

use crate::record::{Outcome, RequestRecord, RunSummary};

/// Compute aggregate statistics over a complete record set.
///
/// A run where everything failed still produces a summary: percentiles are
/// derived only from the (possibly empty) success set and report 0.0 when
/// nothing succeeded.
pub fn summarize(records: &[RequestRecord]) -> RunSummary {
    let mut successful = 0u64;
    let mut http_errors = 0u64;
    let mut timeouts = 0u64;
    let mut transport_errors = 0u64;
    let mut prompt_tokens = 0u64;
    let mut generated_tokens = 0u64;
    let mut prompt_eval_time_s = 0.0f64;
    let mut gen_eval_time_s = 0.0f64;
    let mut success_latencies: Vec<f64> = Vec::new();

    for record in records {
        match record.outcome {
            Outcome::Success => {
                successful += 1;
                prompt_tokens += record.prompt_tokens;
                generated_tokens += record.completion_tokens;
                prompt_eval_time_s += record.prompt_eval_duration_s;
                gen_eval_time_s += record.eval_duration_s;
                success_latencies.push(record.latency_ms);
            }
            Outcome::HttpError => http_errors += 1,
            Outcome::Timeout => timeouts += 1,
            Outcome::TransportError => transport_errors += 1,
        }
    }

    success_latencies.sort_by(|a, b| a.partial_cmp(b).expect("latency is never NaN"));

    let wall_clock_s = match (
        records.iter().map(|r| r.start_iso).min(),
        records.iter().map(|r| r.end_iso).max(),
    ) {
        (Some(first), Some(last)) => (last - first)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0),
        _ => 0.0,
    };

    let aggregate_gen_tokens_per_sec = if gen_eval_time_s > 0.0 {
        generated_tokens as f64 / gen_eval_time_s
    } else {
        0.0
    };

    RunSummary {
        total: records.len() as u64,
        successful,
        http_errors,
        timeouts,
        transport_errors,
        latency_p50_ms: percentile(&success_latencies, 50.0),
        latency_p90_ms: percentile(&success_latencies, 90.0),
        latency_p95_ms: percentile(&success_latencies, 95.0),
        prompt_tokens,
        generated_tokens,
        prompt_eval_time_s,
        gen_eval_time_s,
        aggregate_gen_tokens_per_sec,
        wall_clock_s,
    }
}

/// Linear-interpolation percentile over an ascending-sorted slice.
/// Empty input yields 0.0.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}
