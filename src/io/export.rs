use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::{EventService, SettlementReport};
use crate::storage::EventSnapshot;

/// Full event export: the recorded data plus its computed settlement
#[derive(Debug, Clone, Serialize)]
pub struct EventExport {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    #[serde(flatten)]
    pub snapshot: EventSnapshot,
    pub settlement: SettlementReport,
}

/// Exporter for writing event data and settlements to CSV or JSON
pub struct Exporter<'a> {
    service: &'a EventService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a EventService) -> Self {
        Self { service }
    }

    /// Export per-participant balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, event_id: &str, writer: W) -> Result<usize> {
        let report = self.service.settle(event_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["participant_id", "name", "balance_cents", "balance"])?;

        for line in &report.balances {
            csv_writer.write_record([
                line.participant_id.to_string(),
                line.name.clone(),
                line.balance_cents.to_string(),
                line.balance.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(report.balances.len())
    }

    /// Export settling transfers to CSV format
    pub async fn export_transfers_csv<W: Write>(&self, event_id: &str, writer: W) -> Result<usize> {
        let report = self.service.settle(event_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["from", "to", "amount_cents", "amount"])?;

        for line in &report.transfers {
            csv_writer.write_record([
                line.from.clone(),
                line.to.clone(),
                line.amount_cents.to_string(),
                line.amount.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(report.transfers.len())
    }

    /// Export an event with its settlement as a JSON document
    pub async fn export_event_json<W: Write>(
        &self,
        event_id: &str,
        mut writer: W,
    ) -> Result<EventExport> {
        let snapshot = self.service.event_detail(event_id).await?;
        let settlement = SettlementReport::from_snapshot(&snapshot)?;

        let export = EventExport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            snapshot,
            settlement,
        };

        let json = serde_json::to_string_pretty(&export)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(export)
    }
}
