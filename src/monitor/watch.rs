use anyhow::Context;
use tracing::{error, info};

use crate::config::WatchParams;
use crate::monitor::{ClusterSnapshot, LoadSimulator, Verdict};
use crate::optimizer::HotspotDetector;

/// Re-evaluate one snapshot over simulated monitoring ticks.
///
/// Tick 1 evaluates the readings as given; every later tick drifts them
/// first. `on_tick` sees each verdict as it is produced. An evaluation
/// fault is logged and stops the loop.
pub async fn watch<F>(
    detector: &HotspotDetector,
    snapshot: &mut ClusterSnapshot,
    params: &WatchParams,
    mut on_tick: F,
) -> anyhow::Result<Vec<Verdict>>
where
    F: FnMut(usize, &Verdict),
{
    if params.interval.is_zero() {
        return Err(anyhow::anyhow!("Interval must be greater than zero"));
    }
    if !params.jitter_percent.is_finite() {
        return Err(anyhow::anyhow!(
            "Jitter must be a finite percentage: {}",
            params.jitter_percent
        ));
    }

    let mut simulator = LoadSimulator::new(params.jitter_percent, params.seed);
    let mut ticker = tokio::time::interval(params.interval);
    let mut verdicts = Vec::with_capacity(params.ticks);

    for tick in 1..=params.ticks {
        ticker.tick().await;
        if tick > 1 {
            simulator.perturb(&mut snapshot.nodes);
        }

        let verdict = match detector.evaluate(snapshot) {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(tick, error = %e, "hotspot evaluation failed");
                return Err(e).context(format!("Evaluation failed at tick {}", tick));
            }
        };

        on_tick(tick, verdict);
        verdicts.push(verdict.clone());
    }

    info!(ticks = params.ticks, "watch finished");
    Ok(verdicts)
}
