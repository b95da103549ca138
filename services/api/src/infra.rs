use admissions::students::Branch;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Parses `BRANCH=N` as given to `--capacity`.
pub(crate) fn parse_capacity(raw: &str) -> Result<(Branch, u32), String> {
    let (branch, seats) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected BRANCH=N, got '{raw}'"))?;

    let branch = branch
        .parse::<Branch>()
        .map_err(|err| err.to_string())?;
    let seats = seats
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("invalid seat count '{}' ({err})", seats.trim()))?;

    Ok((branch, seats))
}
