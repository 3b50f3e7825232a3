use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder, with the built-in scrape listener when an
/// address is configured, and pre-register the engine's counters so they
/// appear before the first increment.
pub fn init_metrics(listen_addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let builder = PrometheusBuilder::new();
    match listen_addr {
        Some(addr) => builder.with_http_listener(addr).install()?,
        None => {
            builder.install_recorder()?;
        }
    }

    counter!("bids_placed_total").absolute(0);
    counter!("bids_rejected_total").absolute(0);
    counter!("settlement_items_finished_total").absolute(0);
    counter!("settlement_winners_picked_total").absolute(0);
    counter!("settlement_bids_refunded_total").absolute(0);
    counter!("settlement_bids_paid_total").absolute(0);

    Ok(())
}
